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

//! In-memory sample data and the playable resource that reads it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use tracing::{error, info};

use super::error::SampleError;
use super::loader;
use crate::audio::buffer::ChannelBuffer;

/// Decoded planar audio at its native sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioData {
    /// Creates audio from planar channels. Channels are truncated to the
    /// shortest one so every channel has the same length.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.truncate(frames);
        }
        Self {
            channels,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Zero-length audio.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn len_frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

/// Sample data that may still be decoding. Readers see "loading" until the
/// decode thread publishes the finished audio exactly once.
#[derive(Debug)]
pub struct SampleData {
    name: String,
    audio: OnceLock<AudioData>,
    /// Load progress in [0, 1], stored as f32 bits.
    progress: AtomicU32,
    load_error: OnceLock<String>,
}

impl SampleData {
    /// Finished data.
    pub fn from_audio(name: &str, audio: AudioData) -> Self {
        let data = Self::pending(name);
        data.finish(audio);
        data
    }

    /// Data that has not been decoded yet.
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            audio: OnceLock::new(),
            progress: AtomicU32::new(0f32.to_bits()),
            load_error: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded audio, or None while loading.
    pub fn audio(&self) -> Option<&AudioData> {
        self.audio.get()
    }

    pub fn is_loading(&self) -> bool {
        self.audio.get().is_none()
    }

    pub fn load_progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// The decode error, if the asynchronous load failed.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.get().map(|e| e.as_str())
    }

    fn set_progress(&self, progress: f32) {
        self.progress
            .store(progress.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn finish(&self, audio: AudioData) {
        self.set_progress(1.0);
        let _ = self.audio.set(audio);
    }

    fn fail(&self, error: String) {
        let _ = self.load_error.set(error);
        self.finish(AudioData::empty(1));
    }
}

/// Who is responsible for the sample data. Fixed when the resource is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// The resource is the only long-lived holder of its data.
    Owned,
    /// The data belongs to someone else (e.g. a sample bank).
    Borrowed,
}

/// A playable sample: shared data plus a private read head.
#[derive(Clone, Debug)]
pub struct Sample {
    data: Arc<SampleData>,
    ownership: Ownership,
    /// Engine sample rate used to convert between native and engine frames.
    engine_rate: u32,
    /// Read position in native frames. May be negative to pre-roll silence.
    position: f64,
    rate: f32,
    looping: bool,
}

impl Sample {
    fn with_data(data: Arc<SampleData>, ownership: Ownership, engine_rate: u32) -> Self {
        Self {
            data,
            ownership,
            engine_rate: engine_rate.max(1),
            position: 0.0,
            rate: 1.0,
            looping: false,
        }
    }

    /// A resource that owns `data`.
    pub fn owned(data: SampleData, engine_rate: u32) -> Self {
        Self::with_data(Arc::new(data), Ownership::Owned, engine_rate)
    }

    /// A resource reading data owned elsewhere.
    pub fn borrowed(data: Arc<SampleData>, engine_rate: u32) -> Self {
        Self::with_data(data, Ownership::Borrowed, engine_rate)
    }

    /// A zero-length resource.
    pub fn empty(engine_rate: u32) -> Self {
        Self::owned(
            SampleData::from_audio("", AudioData::empty(engine_rate)),
            engine_rate,
        )
    }

    /// Wraps already decoded audio.
    pub fn from_audio(name: &str, audio: AudioData, engine_rate: u32) -> Self {
        Self::owned(SampleData::from_audio(name, audio), engine_rate)
    }

    /// Builds a mono sample at the engine rate from raw values.
    pub fn from_mono(name: &str, samples: Vec<f32>, engine_rate: u32) -> Self {
        Self::from_audio(name, AudioData::new(vec![samples], engine_rate), engine_rate)
    }

    /// Decodes a file synchronously.
    pub fn read(path: &Path, engine_rate: u32) -> Result<Self, SampleError> {
        let audio = loader::decode_file(path, |_| {})?;
        Ok(Self::from_audio(&file_stem(path), audio, engine_rate))
    }

    /// Starts decoding a file on a background thread. The returned resource
    /// reports loading until the decode finishes. A failed decode leaves an
    /// empty sample and records the error.
    pub fn read_async(path: &Path, name: &str, engine_rate: u32) -> Self {
        let data = Arc::new(SampleData::pending(name));
        let path: PathBuf = path.to_path_buf();
        {
            let data = data.clone();
            thread::spawn(move || {
                match loader::decode_file(&path, |progress| data.set_progress(progress)) {
                    Ok(audio) => {
                        info!(
                            path = ?path,
                            channels = audio.num_channels(),
                            sample_rate = audio.sample_rate(),
                            memory_kb = audio.memory_size() / 1024,
                            "Sample loaded"
                        );
                        data.finish(audio);
                    }
                    Err(e) => {
                        error!(path = ?path, err = %e, "Failed to load sample");
                        data.fail(e.to_string());
                    }
                }
            });
        }
        Self::with_data(data, Ownership::Owned, engine_rate)
    }

    pub fn data(&self) -> &Arc<SampleData> {
        &self.data
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn is_loading(&self) -> bool {
        self.data.is_loading()
    }

    pub fn load_progress(&self) -> f32 {
        self.data.load_progress()
    }

    /// Length in native frames; zero while loading.
    pub fn len_in_samples(&self) -> usize {
        self.data.audio().map(|a| a.len_frames()).unwrap_or(0)
    }

    /// True when there is something to play.
    pub fn is_playable(&self) -> bool {
        !self.is_loading() && self.len_in_samples() > 0
    }

    /// Channel count, at least one.
    pub fn num_channels(&self) -> usize {
        self.data
            .audio()
            .map(|a| a.num_channels())
            .unwrap_or(1)
            .max(1)
    }

    pub fn engine_rate(&self) -> u32 {
        self.engine_rate
    }

    /// Native sample rate divided by the engine sample rate.
    pub fn sample_rate_ratio(&self) -> f64 {
        match self.data.audio() {
            Some(audio) => audio.sample_rate() as f64 / self.engine_rate as f64,
            None => 1.0,
        }
    }

    /// Native frames per second of sample time.
    pub fn frames_per_second(&self) -> f64 {
        self.engine_rate as f64 * self.sample_rate_ratio()
    }

    pub fn length_seconds(&self) -> f32 {
        (self.len_in_samples() as f64 / self.frames_per_second()) as f32
    }

    pub fn play_position(&self) -> f64 {
        self.position
    }

    pub fn set_play_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Renders `frames` frames into `output`, advancing the read head by
    /// `rate * sample_rate_ratio` native frames per output frame. Returns false
    /// without writing when there is nothing left to play: the data is still
    /// loading or empty, or the head has run off either end without looping.
    pub fn consume_data(&mut self, output: &mut ChannelBuffer, frames: usize) -> bool {
        let Some(audio) = self.data.audio() else {
            return false;
        };
        let len = audio.len_frames();
        if len == 0 {
            return false;
        }
        let len_f = len as f64;
        let step = self.rate as f64 * self.sample_rate_ratio();
        if !self.looping && (self.position >= len_f || (self.position < 0.0 && step <= 0.0)) {
            return false;
        }

        let channels = audio.num_channels().min(output.num_active_channels());
        let frames = frames.min(output.block_size());
        for i in 0..frames {
            if self.looping && (self.position >= len_f || self.position < 0.0) {
                self.position = self.position.rem_euclid(len_f);
            }
            for ch in 0..channels {
                output.channel_mut(ch)[i] = interpolate(audio.channel(ch), self.position);
            }
            self.position += step;
        }
        true
    }
}

/// Linear interpolation at a fractional frame; silence outside the data.
#[inline]
fn interpolate(data: &[f32], position: f64) -> f32 {
    if position < 0.0 {
        return 0.0;
    }
    let index = position.floor() as usize;
    let Some(&s0) = data.get(index) else {
        return 0.0;
    };
    let s1 = data.get(index + 1).copied().unwrap_or(s0);
    let frac = (position - index as f64) as f32;
    s0 + (s1 - s0) * frac
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sample")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_consume_reads_forward() {
        let mut sample = Sample::from_mono("ramp", ramp(8), 48000);
        let mut out = ChannelBuffer::new(1, 4);
        assert!(sample.consume_data(&mut out, 4));
        assert_eq!(out.channel(0), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(sample.play_position(), 4.0);
    }

    #[test]
    fn test_consume_interpolates_fractional_rate() {
        let mut sample = Sample::from_mono("ramp", ramp(8), 48000);
        sample.set_rate(0.5);
        let mut out = ChannelBuffer::new(1, 4);
        assert!(sample.consume_data(&mut out, 4));
        assert_eq!(out.channel(0), &[0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_consume_exhausts_without_loop() {
        let mut sample = Sample::from_mono("ramp", ramp(6), 48000);
        let mut out = ChannelBuffer::new(1, 4);
        assert!(sample.consume_data(&mut out, 4));
        // Runs off the end mid-block and fills silence.
        assert!(sample.consume_data(&mut out, 4));
        assert_eq!(out.channel(0), &[4.0, 5.0, 0.0, 0.0]);
        assert!(!sample.consume_data(&mut out, 4));
    }

    #[test]
    fn test_consume_loops() {
        let mut sample = Sample::from_mono("ramp", ramp(3), 48000);
        sample.set_looping(true);
        let mut out = ChannelBuffer::new(1, 7);
        assert!(sample.consume_data(&mut out, 7));
        assert_eq!(out.channel(0), &[0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_consume_reverse() {
        let mut sample = Sample::from_mono("ramp", ramp(4), 48000);
        sample.set_rate(-1.0);
        sample.set_play_position(3.0);
        let mut out = ChannelBuffer::new(1, 4);
        assert!(sample.consume_data(&mut out, 4));
        assert_eq!(out.channel(0), &[3.0, 2.0, 1.0, 0.0]);
        assert!(!sample.consume_data(&mut out, 4));
    }

    #[test]
    fn test_negative_position_pre_rolls_silence() {
        let mut sample = Sample::from_mono("ramp", ramp(8), 48000);
        sample.set_play_position(-2.0);
        let mut out = ChannelBuffer::new(1, 4);
        assert!(sample.consume_data(&mut out, 4));
        assert_eq!(out.channel(0), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sample_rate_ratio() {
        let audio = AudioData::new(vec![ramp(44100)], 44100);
        let sample = Sample::from_audio("a", audio, 48000);
        assert!((sample.sample_rate_ratio() - 44100.0 / 48000.0).abs() < 1e-12);
        assert!((sample.length_seconds() - 1.0).abs() < 1e-6);
        assert!((sample.frames_per_second() - 44100.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_and_pending_are_not_playable() {
        let mut empty = Sample::empty(48000);
        assert!(!empty.is_loading());
        assert!(!empty.is_playable());
        let mut out = ChannelBuffer::new(1, 4);
        assert!(!empty.consume_data(&mut out, 4));

        let mut pending = Sample::owned(SampleData::pending("p"), 48000);
        assert!(pending.is_loading());
        assert_eq!(pending.len_in_samples(), 0);
        assert!(!pending.consume_data(&mut out, 4));
    }

    #[test]
    fn test_ownership_tag() {
        let owned = Sample::from_mono("a", ramp(4), 48000);
        assert_eq!(owned.ownership(), Ownership::Owned);

        let shared = Arc::new(SampleData::from_audio("b", AudioData::new(vec![ramp(4)], 48000)));
        let borrowed = Sample::borrowed(shared.clone(), 48000);
        assert_eq!(borrowed.ownership(), Ownership::Borrowed);
        assert!(Arc::ptr_eq(borrowed.data(), &shared));
    }

    #[test]
    fn test_failed_load_is_empty_with_error() {
        let data = SampleData::pending("bad");
        data.fail("no such file".to_string());
        assert!(!data.is_loading());
        assert_eq!(data.load_error(), Some("no such file"));
        assert_eq!(data.audio().map(|a| a.len_frames()), Some(0));
        assert_eq!(data.load_progress(), 1.0);
    }

    #[test]
    fn test_audio_data_truncates_to_shortest_channel() {
        let audio = AudioData::new(vec![ramp(5), ramp(3)], 48000);
        assert_eq!(audio.len_frames(), 3);
        assert_eq!(audio.channel(0).len(), 3);
    }
}
