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

/// A planar block of audio, pre-sized at construction so that nothing in the
/// audio callback needs to allocate. The active channel count can shrink and
/// grow freely within the allocated capacity.
#[derive(Clone, Debug)]
pub struct ChannelBuffer {
    /// One Vec per channel, each exactly `block_size` long.
    channels: Vec<Vec<f32>>,
    /// Number of channels currently in use.
    active_channels: usize,
    block_size: usize,
}

impl ChannelBuffer {
    /// Creates a zeroed buffer with room for `max_channels` channels.
    pub fn new(max_channels: usize, block_size: usize) -> Self {
        let max_channels = max_channels.max(1);
        Self {
            channels: vec![vec![0.0; block_size]; max_channels],
            active_channels: max_channels,
            block_size,
        }
    }

    /// Frames per channel.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The number of channels currently in use.
    pub fn num_active_channels(&self) -> usize {
        self.active_channels
    }

    /// The number of channels this buffer can hold.
    pub fn max_channels(&self) -> usize {
        self.channels.len()
    }

    /// Sets the number of channels in use, clamped to the allocated capacity.
    pub fn set_num_active_channels(&mut self, channels: usize) {
        self.active_channels = channels.clamp(1, self.channels.len());
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.channels[channel]
    }

    /// Zeroes every channel, active or not.
    pub fn clear(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.fill(0.0);
        }
    }

    /// Adds `source` into the given channel sample by sample.
    pub fn add_to_channel(&mut self, channel: usize, source: &[f32]) {
        for (dst, src) in self.channels[channel].iter_mut().zip(source.iter()) {
            *dst += *src;
        }
    }

    /// Writes the active channels into an interleaved slice of
    /// `frames * output_channels` samples. Output channels beyond the active
    /// channel count repeat the last active channel (so mono fills stereo).
    pub fn write_interleaved(&self, output: &mut [f32], output_channels: usize, start_frame: usize) {
        if output_channels == 0 {
            return;
        }
        for (frame_idx, frame) in output.chunks_mut(output_channels).enumerate() {
            let src_frame = start_frame + frame_idx;
            if src_frame >= self.block_size {
                break;
            }
            for (ch, sample) in frame.iter_mut().enumerate() {
                let src_ch = ch.min(self.active_channels - 1);
                *sample = self.channels[src_ch][src_frame];
            }
        }
    }
}

/// A downstream audio target. The engine mixes additively into the target's
/// buffer; a target without a ready buffer makes the engine skip the block.
pub trait AudioSink {
    /// The buffer to mix into for the current block, if the target is ready.
    fn buffer_mut(&mut self) -> Option<&mut ChannelBuffer>;
}

impl AudioSink for ChannelBuffer {
    fn buffer_mut(&mut self) -> Option<&mut ChannelBuffer> {
        Some(self)
    }
}

impl AudioSink for Option<ChannelBuffer> {
    fn buffer_mut(&mut self) -> Option<&mut ChannelBuffer> {
        self.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_channels_clamped() {
        let mut buffer = ChannelBuffer::new(2, 16);
        buffer.set_num_active_channels(8);
        assert_eq!(buffer.num_active_channels(), 2);
        buffer.set_num_active_channels(0);
        assert_eq!(buffer.num_active_channels(), 1);
    }

    #[test]
    fn test_add_is_additive() {
        let mut buffer = ChannelBuffer::new(1, 4);
        buffer.add_to_channel(0, &[1.0, 1.0, 1.0, 1.0]);
        buffer.add_to_channel(0, &[0.5, 0.5, 0.5, 0.5]);
        assert_eq!(buffer.channel(0), &[1.5, 1.5, 1.5, 1.5]);
        buffer.clear();
        assert_eq!(buffer.channel(0), &[0.0; 4]);
    }

    #[test]
    fn test_write_interleaved_mono_to_stereo() {
        let mut buffer = ChannelBuffer::new(2, 3);
        buffer.set_num_active_channels(1);
        buffer.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3]);

        let mut out = vec![0.0; 4];
        buffer.write_interleaved(&mut out, 2, 1);
        assert_eq!(out, vec![0.2, 0.2, 0.3, 0.3]);
    }
}
