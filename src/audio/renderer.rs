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
use crate::audio::buffer::ChannelBuffer;
use crate::audio::context::ProcessContext;
use crate::engine::PlaybackEngine;

/// Adapts the fixed-size blocks the engine renders to device buffers of any
/// length. Frames left over from one device callback are written at the
/// start of the next.
pub struct BlockRenderer {
    engine: PlaybackEngine,
    block: ChannelBuffer,
    ctx: ProcessContext,
    /// Frames of `block` already handed to the device.
    consumed: usize,
}

impl BlockRenderer {
    pub fn new(engine: PlaybackEngine, block_size: usize, max_channels: usize, sample_rate: u32) -> Self {
        Self {
            engine,
            block: ChannelBuffer::new(max_channels, block_size),
            // The first block starts at time zero.
            ctx: ProcessContext::new(-(block_size as f64) * 1000.0 / sample_rate as f64, block_size, sample_rate),
            consumed: block_size,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Start time of the block rendered most recently.
    pub fn time_ms(&self) -> f64 {
        self.ctx.time_ms
    }

    /// Fills an interleaved device buffer with `channels` channels.
    pub fn fill(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let frames = output.len() / channels;
        let block_size = self.block.block_size();
        let mut written = 0;
        while written < frames {
            if self.consumed >= block_size {
                self.render_block();
            }
            let count = (block_size - self.consumed).min(frames - written);
            self.block.write_interleaved(
                &mut output[written * channels..(written + count) * channels],
                channels,
                self.consumed,
            );
            self.consumed += count;
            written += count;
        }
    }

    fn render_block(&mut self) {
        self.ctx = self.ctx.next();
        self.block.clear();
        self.block.set_num_active_channels(1);
        self.engine.process(&self.ctx, &mut self.block);
        self.consumed = 0;
    }
}
