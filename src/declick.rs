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

//! Switch-and-ramp declicking.
//!
//! Before the read head jumps, the last emitted sample of each channel is
//! captured as a carry value. The carry is added to every following sample and
//! shrinks geometrically, fading from the old signal level to the new one.

use crate::audio::buffer::ChannelBuffer;

/// Per-sample multiplier applied to the carry.
pub const DECAY: f32 = 0.999;

/// Carry magnitudes below this snap to exactly zero.
pub const EPSILON: f32 = 0.0001;

/// Tracks the carry-over and last output sample for each channel.
#[derive(Clone, Debug)]
pub struct DeclickMixer {
    carry: Vec<f32>,
    last_output: Vec<f32>,
    active_channels: usize,
}

impl DeclickMixer {
    /// Creates a mixer for up to `max_channels` channels.
    pub fn new(max_channels: usize) -> Self {
        let max_channels = max_channels.max(1);
        Self {
            carry: vec![0.0; max_channels],
            last_output: vec![0.0; max_channels],
            active_channels: 1,
        }
    }

    pub fn num_active_channels(&self) -> usize {
        self.active_channels
    }

    /// Tracks the engine's active channel count. Channels that become active
    /// start from silence.
    pub fn set_num_active_channels(&mut self, channels: usize) {
        let channels = channels.clamp(1, self.carry.len());
        for ch in self.active_channels..channels {
            self.carry[ch] = 0.0;
            self.last_output[ch] = 0.0;
        }
        self.active_channels = channels;
    }

    /// Captures the last emitted sample of each channel as the carry value.
    /// Call before any discontinuous jump of the read head.
    pub fn switch_and_ramp(&mut self) {
        let active = self.active_channels;
        self.carry[..active].copy_from_slice(&self.last_output[..active]);
    }

    /// Adds the decaying carry to the first `frames` samples of each active
    /// channel of `buffer`.
    pub fn apply(&mut self, buffer: &mut ChannelBuffer, frames: usize) {
        let channels = self.active_channels.min(buffer.num_active_channels());
        for ch in 0..channels {
            let carry = &mut self.carry[ch];
            for sample in buffer.channel_mut(ch)[..frames].iter_mut() {
                *sample += *carry;
                *carry = decay_step(*carry);
            }
        }
    }

    /// Remembers the final sample of each channel as the source for the next
    /// switch.
    pub fn record_last_output(&mut self, buffer: &ChannelBuffer, frames: usize) {
        if frames == 0 {
            return;
        }
        let channels = self.active_channels.min(buffer.num_active_channels());
        for ch in 0..channels {
            self.last_output[ch] = buffer.channel(ch)[frames - 1];
        }
    }

    pub fn carry(&self, channel: usize) -> f32 {
        self.carry.get(channel).copied().unwrap_or(0.0)
    }

    pub fn last_output(&self, channel: usize) -> f32 {
        self.last_output.get(channel).copied().unwrap_or(0.0)
    }

    /// Returns true once every channel's carry has reached zero.
    pub fn is_settled(&self) -> bool {
        self.carry[..self.active_channels].iter().all(|c| *c == 0.0)
    }
}

/// One sample of carry decay.
#[inline]
pub fn decay_step(carry: f32) -> f32 {
    let next = carry * DECAY;
    if next.abs() < EPSILON {
        0.0
    } else {
        next
    }
}
