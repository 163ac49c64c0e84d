// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
// Per-callback timing context. Every real-time call receives one of these
// instead of reading ambient transport state, so tests can inject synthetic
// time.
//

/// Context passed into every audio callback invocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessContext {
    /// Absolute time in milliseconds at the first frame of this block.
    pub time_ms: f64,
    /// Number of frames rendered per callback.
    pub block_size: usize,
    /// Engine sample rate in Hz.
    pub sample_rate: u32,
}

impl ProcessContext {
    /// Builds a context for the block starting at `time_ms`.
    pub fn new(time_ms: f64, block_size: usize, sample_rate: u32) -> Self {
        Self {
            time_ms,
            block_size,
            sample_rate,
        }
    }

    /// Milliseconds per frame.
    pub fn inv_sample_rate_ms(&self) -> f64 {
        1000.0 / self.sample_rate as f64
    }

    /// Duration of one block in milliseconds.
    pub fn block_duration_ms(&self) -> f64 {
        self.block_size as f64 * self.inv_sample_rate_ms()
    }

    /// The absolute time of the given frame within this block.
    #[inline]
    pub fn frame_time(&self, frame: usize) -> f64 {
        self.time_ms + frame as f64 * self.inv_sample_rate_ms()
    }

    /// Returns true if an event at `time` must be handled while rendering this
    /// block. Times in the past count as inside the frame, so late events are
    /// handled as soon as possible rather than dropped.
    pub fn is_time_within_frame(&self, time: f64) -> bool {
        time < self.time_ms + self.block_duration_ms()
    }

    /// The context for the block that follows this one.
    pub fn next(&self) -> Self {
        Self {
            time_ms: self.time_ms + self.block_duration_ms(),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time() {
        let ctx = ProcessContext::new(1000.0, 480, 48000);
        assert_eq!(ctx.frame_time(0), 1000.0);
        assert!((ctx.frame_time(48) - 1001.0).abs() < 1e-9);
        assert!((ctx.block_duration_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_within_frame() {
        let ctx = ProcessContext::new(1000.0, 480, 48000);
        assert!(ctx.is_time_within_frame(1000.0));
        assert!(ctx.is_time_within_frame(1009.9));
        assert!(!ctx.is_time_within_frame(1010.0));
        // Late events are always due.
        assert!(ctx.is_time_within_frame(500.0));
    }

    #[test]
    fn test_next() {
        let ctx = ProcessContext::new(0.0, 480, 48000).next();
        assert!((ctx.time_ms - 10.0).abs() < 1e-9);
        assert_eq!(ctx.block_size, 480);
    }
}
