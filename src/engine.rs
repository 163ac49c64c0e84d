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

//! The audio-side playback engine.
//!
//! The engine lives on the audio thread and is driven once per block by
//! [`PlaybackEngine::process`]. Control code never touches it directly; it sends
//! [`EngineCommand`]s through an [`EngineHandle`] and reads back an
//! [`EngineStatus`]. Commands are applied at the start of the next block, so a
//! sample swap is always seen whole. Replaced samples are handed back through a
//! retire channel so their memory is released off the audio thread.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::audio::buffer::{AudioSink, ChannelBuffer};
use crate::audio::context::ProcessContext;
use crate::cue::{CuePoint, CuePointTable, DEFAULT_CUE_POINTS};
use crate::declick::DeclickMixer;
use crate::envelope::{Adsr, AdsrShape, Phase};
use crate::module::NoteEvent;
use crate::sample::Sample;
use crate::scheduler::NoteInputBuffer;

/// Maximum magnitude of the speed while a controller wheel is grabbed.
pub const MAX_WHEEL_SPEED: f32 = 5.0;

/// Manual speed range.
pub const MIN_SPEED: f32 = -2.0;
pub const MAX_SPEED: f32 = 2.0;

/// Volume range. Gain is volume squared.
pub const MAX_VOLUME: f32 = 2.0;

/// How many replaced samples can wait for the control thread.
const RETIRE_CAPACITY: usize = 8;

/// Sentinel for "no note played yet".
const NO_PITCH: i32 = i32::MIN;

/// Construction-time engine settings.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub sample_rate: u32,
    pub block_size: usize,
    pub max_channels: usize,
    pub cue_points: usize,
    pub envelope: AdsrShape,
    /// Fraction of the distance to the target speed covered each block.
    pub speed_blend: f32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            max_channels: 2,
            cue_points: DEFAULT_CUE_POINTS,
            envelope: AdsrShape::default(),
            speed_blend: 1.0,
        }
    }
}

/// Requests from the control thread, applied at the start of the next block.
#[derive(Debug)]
pub enum EngineCommand {
    PlayNote(NoteEvent),
    /// Plays a cue at the current block time.
    PlayCue { index: i32, velocity: i32 },
    Play,
    Pause,
    Stop,
    /// Jumps to a position in seconds and plays from there.
    Scrub { seconds: f64 },
    UpdateSample(Sample),
    SetVolume(f32),
    SetSpeed(f32),
    SetLooping(bool),
    SetWheelGrabbed(bool),
    SetWheelSpeed(f32),
    SetCuePoint { index: i32, cue: CuePoint },
    SetEnabled(bool),
}

/// Values published by the audio thread for display and control decisions.
#[derive(Debug)]
pub struct EngineStatus {
    playing: AtomicBool,
    /// f64 bits, native frames.
    position: AtomicU64,
    /// f32 bits.
    play_speed: AtomicU32,
    /// f32 bits.
    speed: AtomicU32,
    /// f64 bits.
    time_ms: AtomicU64,
    /// Length of one block in ms.
    block_ms: f64,
    last_pitch: AtomicI32,
    /// Bumped whenever the engine moves the target speed itself.
    speed_changes: AtomicU64,
    /// Number of `SetSpeed` commands applied.
    speed_requests: AtomicU64,
}

impl EngineStatus {
    fn new(block_ms: f64) -> Self {
        Self {
            playing: AtomicBool::new(false),
            position: AtomicU64::new(0f64.to_bits()),
            play_speed: AtomicU32::new(1f32.to_bits()),
            speed: AtomicU32::new(1f32.to_bits()),
            time_ms: AtomicU64::new(0f64.to_bits()),
            block_ms,
            last_pitch: AtomicI32::new(NO_PITCH),
            speed_changes: AtomicU64::new(0),
            speed_requests: AtomicU64::new(0),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Read position in native frames.
    pub fn play_position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    /// The smoothed speed actually applied to the sample.
    pub fn play_speed(&self) -> f32 {
        f32::from_bits(self.play_speed.load(Ordering::Relaxed))
    }

    /// The manual target speed, which cue triggers also set.
    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }

    /// Start time of the most recently rendered block.
    pub fn time_ms(&self) -> f64 {
        f64::from_bits(self.time_ms.load(Ordering::Relaxed))
    }

    /// Start time of the next block to be rendered. Live input stamped with
    /// this time starts on that block's first frame.
    pub fn next_block_ms(&self) -> f64 {
        self.time_ms() + self.block_ms
    }

    /// How many times the engine has changed the target speed on its own,
    /// for example on a cue trigger.
    pub fn speed_changes(&self) -> u64 {
        self.speed_changes.load(Ordering::Acquire)
    }

    /// How many `SetSpeed` commands the engine has applied.
    pub fn speed_requests(&self) -> u64 {
        self.speed_requests.load(Ordering::Acquire)
    }

    /// Takes the pitch of the most recent trigger, if one happened since the
    /// last call.
    pub fn take_last_pitch(&self) -> Option<i32> {
        match self.last_pitch.swap(NO_PITCH, Ordering::Relaxed) {
            NO_PITCH => None,
            pitch => Some(pitch),
        }
    }
}

/// Control-side handle to an engine running elsewhere.
#[derive(Clone)]
pub struct EngineHandle {
    commands: Sender<EngineCommand>,
    retired: Receiver<Sample>,
    status: Arc<EngineStatus>,
}

impl EngineHandle {
    /// Queues a command for the next block. Returns false if the engine is gone.
    pub fn send(&self, command: EngineCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!(command = ?e.0, "Engine is no longer running");
                false
            }
        }
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// Drops every sample the engine has replaced. Returns how many were freed.
    pub fn collect_retired(&self) -> usize {
        let mut count = 0;
        while let Ok(sample) = self.retired.try_recv() {
            debug!(name = sample.name(), ownership = ?sample.ownership(), "Releasing replaced sample");
            count += 1;
        }
        count
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Wheel {
    grabbed: bool,
    speed: f32,
}

/// Plays cue regions of a single sample in response to notes and transport
/// actions.
pub struct PlaybackEngine {
    sample: Option<Sample>,
    cue_points: CuePointTable,
    envelope: Adsr,
    declick: DeclickMixer,
    notes: NoteInputBuffer,
    work: ChannelBuffer,
    ctx: ProcessContext,

    playing: bool,
    enabled: bool,
    looping: bool,
    volume: f32,
    target_speed: f32,
    play_speed: f32,
    speed_blend: f32,
    wheel: Wheel,
    /// Set when a sample was installed before its length was known.
    extent_pending: bool,

    status: Arc<EngineStatus>,
    commands: Option<Receiver<EngineCommand>>,
    retired: Option<Sender<Sample>>,
}

impl PlaybackEngine {
    /// Creates an engine driven by direct calls only.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            sample: None,
            cue_points: CuePointTable::new(options.cue_points),
            envelope: Adsr::new(options.envelope),
            declick: DeclickMixer::new(options.max_channels),
            notes: NoteInputBuffer::new(),
            work: ChannelBuffer::new(options.max_channels, options.block_size),
            ctx: ProcessContext::new(0.0, options.block_size, options.sample_rate),
            playing: false,
            enabled: true,
            looping: false,
            volume: 1.0,
            target_speed: 1.0,
            play_speed: 1.0,
            speed_blend: options.speed_blend.clamp(0.0, 1.0),
            wheel: Wheel::default(),
            extent_pending: false,
            status: Arc::new(EngineStatus::new(
                options.block_size as f64 * 1000.0 / options.sample_rate as f64,
            )),
            commands: None,
            retired: None,
        }
    }

    /// Creates an engine and the handle used to control it from another thread.
    pub fn with_handle(options: EngineOptions) -> (Self, EngineHandle) {
        let mut engine = Self::new(options);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (retire_tx, retire_rx) = crossbeam_channel::bounded(RETIRE_CAPACITY);
        engine.commands = Some(command_rx);
        engine.retired = Some(retire_tx);
        let handle = EngineHandle {
            commands: command_tx,
            retired: retire_rx,
            status: engine.status.clone(),
        };
        (engine, handle)
    }

    pub fn cue_points(&self) -> &CuePointTable {
        &self.cue_points
    }

    pub fn sample(&self) -> Option<&Sample> {
        self.sample.as_ref()
    }

    pub fn envelope(&self) -> &Adsr {
        &self.envelope
    }

    pub fn declick(&self) -> &DeclickMixer {
        &self.declick
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }

    pub fn play_speed(&self) -> f32 {
        self.play_speed
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pending_notes(&self) -> usize {
        self.notes.len()
    }

    pub fn status(&self) -> &Arc<EngineStatus> {
        &self.status
    }

    fn is_sample_playable(&self) -> bool {
        self.sample.as_ref().is_some_and(|s| s.is_playable())
    }

    /// Accepts a note. Notes for later blocks are queued; notes for the
    /// current block trigger immediately. Note-offs are ignored.
    pub fn play_note(&mut self, note: NoteEvent) {
        if !note.is_trigger() {
            return;
        }
        if !self.ctx.is_time_within_frame(note.time_ms) {
            if let Err(e) = self.notes.queue_note(note) {
                warn!(err = %e, "Dropping note");
            }
            return;
        }
        self.trigger(note);
    }

    fn trigger(&mut self, note: NoteEvent) {
        self.status.last_pitch.store(note.pitch, Ordering::Relaxed);
        let cue = self.cue_points.play_info_for_pitch(note.pitch);
        self.play_cue_point(cue, note.time_ms, note.velocity);
    }

    /// Starts `cue` at `time`. A time later than the current block start
    /// pre-rolls silence so the attack lands on the exact frame.
    pub fn play_cue_point(&mut self, cue: CuePoint, time: f64, velocity: i32) {
        let Some(sample) = self.sample.as_mut().filter(|s| s.is_playable()) else {
            return;
        };
        self.declick.switch_and_ramp();
        let position =
            ((self.ctx.time_ms - time) / 1000.0 + cue.start_seconds as f64) * sample.frames_per_second();
        sample.set_play_position(position);
        self.playing = true;
        self.target_speed = cue.speed;
        self.status
            .speed
            .store(cue.speed.to_bits(), Ordering::Relaxed);
        self.status.speed_changes.fetch_add(1, Ordering::Release);
        self.envelope.clear();
        self.envelope
            .start(time, velocity.clamp(0, 127) as f32 / 127.0);
        if cue.has_forced_stop() {
            self.envelope
                .stop(time + cue.length_seconds as f64 * 1000.0);
        }
    }

    /// Resumes from the current position.
    pub fn play(&mut self) {
        if !self.is_sample_playable() {
            return;
        }
        self.declick.switch_and_ramp();
        self.playing = true;
        self.envelope.start(self.ctx.time_ms, 1.0);
    }

    /// Stops without moving the read head.
    pub fn pause(&mut self) {
        self.playing = false;
        self.declick.switch_and_ramp();
    }

    /// Stops and rewinds to the start.
    pub fn stop(&mut self) {
        self.playing = false;
        if let Some(sample) = self.sample.as_mut() {
            sample.set_play_position(0.0);
        }
        self.declick.switch_and_ramp();
    }

    /// Jumps to `seconds` and plays from there with a fresh envelope.
    pub fn scrub_to(&mut self, seconds: f64) {
        let Some(sample) = self.sample.as_mut().filter(|s| s.is_playable()) else {
            return;
        };
        self.declick.switch_and_ramp();
        sample.set_play_position(seconds.max(0.0) * sample.frames_per_second());
        self.playing = true;
        self.envelope.start(self.ctx.time_ms, 1.0);
    }

    /// Installs a new sample and returns the one it replaces. The new sample
    /// takes on the engine's loop and speed settings, playback stops, and the
    /// volume resets.
    pub fn update_sample(&mut self, mut sample: Sample) -> Option<Sample> {
        sample.set_play_position(0.0);
        sample.set_looping(self.looping);
        sample.set_rate(self.play_speed);
        self.extent_pending = sample.is_loading();
        self.cue_points.set_extent(sample.length_seconds());
        debug!(
            name = sample.name(),
            ownership = ?sample.ownership(),
            loading = sample.is_loading(),
            "Installing sample"
        );

        let previous = self.sample.replace(sample);
        self.volume = 1.0;
        self.playing = false;
        self.envelope.clear();
        self.notes.clear();
        self.publish_status();
        previous
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.target_speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.status
            .speed
            .store(self.target_speed.to_bits(), Ordering::Relaxed);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if let Some(sample) = self.sample.as_mut() {
            sample.set_looping(looping);
        }
    }

    /// Grabbing hands speed control to the wheel, starting from standstill.
    pub fn set_wheel_grabbed(&mut self, grabbed: bool) {
        self.wheel.grabbed = grabbed;
        if grabbed {
            self.wheel.speed = 0.0;
        }
    }

    pub fn set_wheel_speed(&mut self, speed: f32) {
        self.wheel.speed = speed;
    }

    pub fn set_cue_point(&mut self, index: i32, cue: CuePoint) -> bool {
        self.cue_points
            .set_cue_point(index, cue.start_seconds, cue.length_seconds, cue.speed)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::PlayNote(note) => self.play_note(note),
            EngineCommand::PlayCue { index, velocity } => {
                self.trigger(NoteEvent::new(self.ctx.time_ms, index, velocity))
            }
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Stop => self.stop(),
            EngineCommand::Scrub { seconds } => self.scrub_to(seconds),
            EngineCommand::UpdateSample(sample) => {
                if let Some(previous) = self.update_sample(sample) {
                    self.retire(previous);
                }
            }
            EngineCommand::SetVolume(volume) => self.set_volume(volume),
            EngineCommand::SetSpeed(speed) => {
                self.set_speed(speed);
                self.status.speed_requests.fetch_add(1, Ordering::Release);
            }
            EngineCommand::SetLooping(looping) => self.set_looping(looping),
            EngineCommand::SetWheelGrabbed(grabbed) => self.set_wheel_grabbed(grabbed),
            EngineCommand::SetWheelSpeed(speed) => self.set_wheel_speed(speed),
            EngineCommand::SetCuePoint { index, cue } => {
                self.set_cue_point(index, cue);
            }
            EngineCommand::SetEnabled(enabled) => self.set_enabled(enabled),
        }
    }

    fn drain_commands(&mut self) {
        loop {
            let command = match &self.commands {
                Some(commands) => match commands.try_recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
                None => break,
            };
            self.apply(command);
        }
    }

    fn retire(&mut self, sample: Sample) {
        let Some(retired) = &self.retired else {
            return;
        };
        match retired.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(sample)) => {
                warn!(name = sample.name(), "Retire queue full, releasing sample on the audio thread");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn publish_status(&self) {
        let status = &self.status;
        status.playing.store(self.playing, Ordering::Relaxed);
        let position = self.sample.as_ref().map(|s| s.play_position()).unwrap_or(0.0);
        status.position.store(position.to_bits(), Ordering::Relaxed);
        status
            .play_speed
            .store(self.play_speed.to_bits(), Ordering::Relaxed);
        status
            .speed
            .store(self.target_speed.to_bits(), Ordering::Relaxed);
    }

    /// Renders one block and mixes it into `sink`.
    ///
    /// Panics if the block size in `ctx` differs from the sink's or the
    /// engine's, which means the host is misconfigured.
    pub fn process<S: AudioSink + ?Sized>(&mut self, ctx: &ProcessContext, sink: &mut S) {
        self.ctx = *ctx;
        self.status
            .time_ms
            .store(ctx.time_ms.to_bits(), Ordering::Relaxed);
        self.drain_commands();

        if !self.enabled {
            return;
        }
        match self.sample.as_ref() {
            Some(sample) if !sample.is_loading() => {
                if self.extent_pending {
                    self.extent_pending = false;
                    self.cue_points.set_extent(sample.length_seconds());
                }
            }
            _ => return,
        }
        let Some(output) = sink.buffer_mut() else {
            return;
        };
        assert_eq!(
            output.block_size(),
            ctx.block_size,
            "sink block size does not match the process context"
        );
        assert_eq!(
            self.work.block_size(),
            ctx.block_size,
            "engine block size does not match the process context"
        );

        // The queue is moved out while triggering; triggers never queue.
        let mut notes = std::mem::take(&mut self.notes);
        notes.process(ctx, |note| self.trigger(note));
        self.notes = notes;

        let target = if self.wheel.grabbed {
            self.wheel.speed
        } else {
            self.target_speed
        };
        self.play_speed = lerp(self.play_speed, target, self.speed_blend);
        if self.wheel.grabbed {
            self.play_speed = self.play_speed.clamp(-MAX_WHEEL_SPEED, MAX_WHEEL_SPEED);
        }

        let Some(sample) = self.sample.as_mut() else {
            return;
        };
        sample.set_rate(self.play_speed);
        let channels = sample
            .num_channels()
            .min(self.work.max_channels())
            .min(output.max_channels());
        self.work.set_num_active_channels(channels);
        self.declick.set_num_active_channels(channels);
        if output.num_active_channels() < channels {
            output.set_num_active_channels(channels);
        }

        let frames = ctx.block_size;
        let rendered = self.playing && sample.consume_data(&mut self.work, frames);
        if rendered {
            let gain = self.volume * self.volume;
            for i in 0..frames {
                let amplitude = gain * self.envelope.value(ctx.frame_time(i));
                for ch in 0..channels {
                    self.work.channel_mut(ch)[i] *= amplitude;
                }
            }
            if self.envelope.phase(ctx.frame_time(frames)) == Phase::Finished {
                self.playing = false;
            }
        } else {
            self.work.clear();
            if self.playing {
                debug!("Sample exhausted");
            }
            self.playing = false;
            self.envelope.stop(ctx.time_ms);
        }

        self.declick.apply(&mut self.work, frames);
        for ch in 0..channels {
            output.add_to_channel(ch, &self.work.channel(ch)[..frames]);
        }
        self.declick.record_last_output(&self.work, frames);
        self.publish_status();
    }
}

#[inline]
fn lerp(from: f32, to: f32, amount: f32) -> f32 {
    from + (to - from) * amount
}
