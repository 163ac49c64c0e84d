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

//! The control-rate side of the sample player.
//!
//! [`SamplePlayer`] turns user and controller actions into engine commands,
//! keeps an editable copy of the cue points, drives the background fetch job,
//! and holds the error string shown to the user.

mod zoom;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

pub use zoom::ZoomView;

use crate::cue::{CuePoint, CuePointTable};
use crate::engine::{EngineCommand, EngineHandle, MAX_SPEED, MAX_VOLUME, MIN_SPEED};
use crate::fetch::{FetchError, FetchJob, FetchOutcome, SearchResult};
use crate::module::{Module, NoteEvent, NoteReceiver};
use crate::sample::{Sample, SampleData, SampleError};
use crate::state::{PlayerState, SampleSnapshot};

/// Wheel position deltas are scaled by this to get a playback speed.
const WHEEL_SPEED_SCALE: f32 = 70.0;

/// Velocity used by the "play current cue" action.
const FULL_VELOCITY: i32 = 127;

pub struct SamplePlayer {
    name: String,
    engine: EngineHandle,
    engine_rate: u32,
    cue_points: CuePointTable,
    active_cue: usize,
    set_cue_on_click: bool,
    select_played: bool,
    zoom: ZoomView,
    scrubbing: bool,
    fetch: FetchJob,
    error: Option<String>,
    volume: f32,
    speed: f32,
    /// `SetSpeed` commands sent to the engine.
    speed_requests: u64,
    /// Engine-side speed changes already mirrored into `speed`.
    speed_changes_seen: u64,
    looping: bool,
    enabled: bool,
    /// Data of the installed sample.
    current: Option<Arc<SampleData>>,
    /// Whether the cue extents reflect the installed sample's final length.
    extent_known: bool,
    /// Last wheel position since the wheel was grabbed.
    wheel_position: Option<f32>,
}

impl SamplePlayer {
    pub fn new(
        name: &str,
        engine: EngineHandle,
        engine_rate: u32,
        cue_capacity: usize,
        fetch: FetchJob,
    ) -> Self {
        Self {
            name: name.to_string(),
            engine,
            engine_rate,
            cue_points: CuePointTable::new(cue_capacity),
            active_cue: 0,
            set_cue_on_click: false,
            select_played: false,
            zoom: ZoomView::default(),
            scrubbing: false,
            fetch,
            error: None,
            volume: 1.0,
            speed: 1.0,
            speed_requests: 0,
            speed_changes_seen: 0,
            looping: false,
            enabled: true,
            current: None,
            extent_known: true,
            wheel_position: None,
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// The message to show the user, if something went wrong.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.status().is_playing()
    }

    /// The installed sample's data.
    pub fn current_sample(&self) -> Option<&Arc<SampleData>> {
        self.current.as_ref()
    }

    /// Length of the installed sample in seconds, zero while loading.
    pub fn length_seconds(&self) -> f32 {
        self.current
            .as_ref()
            .and_then(|data| data.audio())
            .map(|audio| audio.len_frames() as f32 / audio.sample_rate() as f32)
            .unwrap_or(0.0)
    }

    fn len_frames(&self) -> f64 {
        self.current
            .as_ref()
            .and_then(|data| data.audio())
            .map(|audio| audio.len_frames() as f64)
            .unwrap_or(0.0)
    }

    fn native_rate(&self) -> f64 {
        self.current
            .as_ref()
            .and_then(|data| data.audio())
            .map(|audio| audio.sample_rate() as f64)
            .unwrap_or(self.engine_rate as f64)
    }

    /// Read position in seconds.
    pub fn play_position_seconds(&self) -> f64 {
        self.engine.status().play_position() / self.native_rate()
    }

    /// True while a helper is running or the sample is still decoding.
    pub fn is_busy(&self) -> bool {
        self.fetch.is_busy() || self.current.as_ref().is_some_and(|d| d.is_loading())
    }

    pub fn load_progress(&self) -> f32 {
        self.current
            .as_ref()
            .map(|data| data.load_progress())
            .unwrap_or(1.0)
    }

    pub fn zoom(&self) -> &ZoomView {
        &self.zoom
    }

    fn send(&self, command: EngineCommand) {
        self.engine.send(command);
    }

    pub fn play(&mut self) {
        self.send(EngineCommand::Play);
    }

    pub fn pause(&mut self) {
        self.send(EngineCommand::Pause);
    }

    pub fn stop(&mut self) {
        self.send(EngineCommand::Stop);
    }

    pub fn play_current_cue(&mut self) {
        self.send(EngineCommand::PlayCue {
            index: self.active_cue as i32,
            velocity: FULL_VELOCITY,
        });
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.send(EngineCommand::SetVolume(self.volume));
    }

    /// The manual speed. Cue triggers move it too.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.speed_requests += 1;
        self.send(EngineCommand::SetSpeed(self.speed));
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.send(EngineCommand::SetLooping(looping));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled player renders nothing but keeps its position and queued
    /// commands.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.send(EngineCommand::SetEnabled(enabled));
    }

    pub fn cue_points(&self) -> &CuePointTable {
        &self.cue_points
    }

    pub fn active_cue_index(&self) -> usize {
        self.active_cue
    }

    pub fn active_cue(&self) -> CuePoint {
        self.cue_points.play_info_for_pitch(self.active_cue as i32)
    }

    /// Selects the cue to edit. Out-of-range indices are ignored.
    pub fn set_active_cue(&mut self, index: i32) -> bool {
        if !self.cue_points.contains(index) {
            return false;
        }
        self.active_cue = index as usize;
        true
    }

    /// Edits a cue point. Values are clamped to the sample length.
    pub fn set_cue_point(&mut self, index: i32, cue: CuePoint) -> bool {
        if !self
            .cue_points
            .set_cue_point(index, cue.start_seconds, cue.length_seconds, cue.speed)
        {
            return false;
        }
        let cue = self.cue_points.play_info_for_pitch(index);
        self.send(EngineCommand::SetCuePoint { index, cue });
        true
    }

    pub fn set_cue_on_click(&mut self, enabled: bool) {
        self.set_cue_on_click = enabled;
    }

    pub fn set_select_played(&mut self, enabled: bool) {
        self.select_played = enabled;
    }

    /// Starts scrubbing at `x` (0..1 across the waveform view).
    pub fn mouse_pressed(&mut self, x: f32) {
        if !self.fetch.results().is_empty() || self.current.is_none() {
            return;
        }
        self.scrubbing = true;
        self.scrub(x);
    }

    pub fn mouse_moved(&mut self, x: f32) {
        if self.scrubbing {
            self.scrub(x);
        }
    }

    pub fn mouse_released(&mut self) {
        self.scrubbing = false;
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    fn scrub(&mut self, x: f32) {
        let seconds = self.zoom.position_for_x(x, self.len_frames()) / self.native_rate();
        self.send(EngineCommand::Scrub { seconds });
        if self.set_cue_on_click {
            let active = self.active_cue();
            self.set_cue_point(
                self.active_cue as i32,
                CuePoint::new(seconds as f32, active.length_seconds, self.speed),
            );
        }
    }

    /// Scroll over the waveform view with the cursor at `x` (0..1).
    pub fn mouse_scrolled(&mut self, x: f32, scroll_x: f32, scroll_y: f32) {
        self.zoom.scroll(x, scroll_x, scroll_y);
    }

    /// Grabbing the wheel hands speed control to it; releasing returns it to
    /// the manual speed.
    pub fn wheel_grabbed(&mut self, grabbed: bool) {
        if grabbed {
            self.wheel_position = None;
        }
        self.send(EngineCommand::SetWheelGrabbed(grabbed));
    }

    /// A wheel position update. Speed follows the change since the last one.
    pub fn wheel_moved(&mut self, position: f32) {
        let last = self.wheel_position.unwrap_or(position);
        self.wheel_position = Some(position);
        self.send(EngineCommand::SetWheelSpeed(
            (position - last) * WHEEL_SPEED_SCALE,
        ));
    }

    /// Maps a fader position (0..1) onto the speed range.
    pub fn fader_moved(&mut self, position: f32) {
        self.set_speed(MIN_SPEED + (MAX_SPEED - MIN_SPEED) * position.clamp(0.0, 1.0));
    }

    /// Installs a sample, replacing the current one.
    pub fn update_sample(&mut self, sample: Sample) {
        self.cue_points.set_extent(sample.length_seconds());
        self.extent_known = !sample.is_loading();
        self.current = Some(sample.data().clone());
        self.volume = 1.0;
        self.zoom.reset();
        self.scrubbing = false;
        self.error = None;
        info!(
            name = sample.name(),
            ownership = ?sample.ownership(),
            loading = sample.is_loading(),
            "Sample selected"
        );
        self.send(EngineCommand::UpdateSample(sample));
    }

    /// Loads a file synchronously. A file that cannot be read installs an
    /// empty sample and sets the error.
    pub fn load_file(&mut self, path: &Path) -> Result<(), SampleError> {
        match Sample::read(path, self.engine_rate) {
            Ok(sample) => {
                self.update_sample(sample);
                Ok(())
            }
            Err(e) => {
                warn!(path = ?path, err = %e, "Unable to load sample");
                self.update_sample(Sample::empty(self.engine_rate));
                self.error = Some(format!("couldn't load {}: {}", path.display(), e));
                Err(e)
            }
        }
    }

    /// Loads the first of a set of dropped files.
    pub fn files_dropped(&mut self, paths: &[&Path]) -> Result<(), SampleError> {
        match paths.first() {
            Some(path) => self.load_file(path),
            None => Ok(()),
        }
    }

    /// Starts decoding a file in the background.
    pub fn load_file_async(&mut self, path: &Path, name: &str) {
        self.update_sample(Sample::read_async(path, name, self.engine_rate));
    }

    /// Installs raw mono data at the engine rate.
    pub fn fill_data(&mut self, samples: Vec<f32>) {
        self.update_sample(Sample::from_mono("", samples, self.engine_rate));
    }

    /// Plays a sample borrowed from a connected sample bank.
    pub fn select_bank_sample(&mut self, source: &dyn Module, index: usize) -> bool {
        let Some(data) = source.as_sample_bank().and_then(|bank| bank.get(index)) else {
            return false;
        };
        self.update_sample(Sample::borrowed(data, self.engine_rate));
        true
    }

    pub fn search_results(&self) -> &[SearchResult] {
        self.fetch.results()
    }

    /// Starts a search for `term`.
    pub fn start_search(&mut self, term: &str) -> Result<(), FetchError> {
        self.fetch.start_search(term).inspect_err(|e| {
            self.error = Some(format!("couldn't search for {}: {}", term, e));
        })
    }

    /// Downloads from `locator`. Playback stops and rewinds first.
    pub fn start_download(&mut self, locator: &str, title: &str) -> Result<(), FetchError> {
        self.send(EngineCommand::Stop);
        self.fetch.start_download(locator, title).inspect_err(|e| {
            self.error = Some(format!("couldn't download sample: {}", e));
        })
    }

    /// Downloads one of the search results.
    pub fn download_search_result(&mut self, index: usize) -> Result<(), FetchError> {
        self.send(EngineCommand::Stop);
        self.fetch.download_result(index).inspect_err(|e| {
            self.error = Some(format!("couldn't download sample: {}", e));
        })
    }

    /// Runs one control-rate tick. Returns the outcome of a background job
    /// that finished during this tick.
    pub fn poll(&mut self) -> Option<FetchOutcome> {
        self.engine.collect_retired();

        let outcome = self.fetch.poll();
        match &outcome {
            Some(FetchOutcome::Search { term, results }) => {
                if results.is_empty() {
                    self.error = Some(format!("zero results found for {}", term));
                }
            }
            Some(FetchOutcome::Download { title, file }) => match file {
                Some(file) => self.load_file_async(file, title),
                None => {
                    self.update_sample(Sample::empty(self.engine_rate));
                    self.error = Some(
                        "couldn't download sample. is the download helper installed?".to_string(),
                    );
                }
            },
            None => {}
        }

        if !self.extent_known {
            if let Some(data) = self.current.clone().filter(|d| !d.is_loading()) {
                self.extent_known = true;
                self.cue_points.set_extent(self.length_seconds());
                match data.load_error() {
                    Some(e) => self.error = Some(format!("couldn't load sample: {}", e)),
                    None => info!(name = data.name(), seconds = self.length_seconds(), "Sample ready"),
                }
            }
        }

        self.mirror_engine_speed();
        if let Some(pitch) = self.engine.status().take_last_pitch() {
            if self.select_played {
                self.set_active_cue(pitch);
            }
        }

        outcome
    }

    /// Picks up a speed the engine chose itself, unless a manual speed is
    /// still on its way to the engine and will override it.
    fn mirror_engine_speed(&mut self) {
        let status = self.engine.status();
        let changes = status.speed_changes();
        if changes == self.speed_changes_seen {
            return;
        }
        self.speed_changes_seen = changes;
        if status.speed_requests() == self.speed_requests {
            self.speed = status.speed();
        }
    }

    /// Captures the sample and cue points.
    pub fn save_state(&self) -> PlayerState {
        let sample = self.current.as_ref().and_then(|data| {
            data.audio().map(|audio| SampleSnapshot {
                name: data.name().to_string(),
                audio: audio.clone(),
            })
        });
        PlayerState {
            sample,
            cue_points: self.cue_points.iter().copied().collect(),
        }
    }

    /// Restores a saved sample and cue points.
    pub fn load_state(&mut self, state: PlayerState) {
        if let Some(snapshot) = state.sample {
            self.update_sample(Sample::from_audio(
                &snapshot.name,
                snapshot.audio,
                self.engine_rate,
            ));
        }
        self.cue_points.load_from(&state.cue_points);
        for (index, cue) in self.cue_points.iter().enumerate() {
            self.engine.send(EngineCommand::SetCuePoint {
                index: index as i32,
                cue: *cue,
            });
        }
    }
}

impl NoteReceiver for SamplePlayer {
    fn play_note(&mut self, note: NoteEvent) {
        self.send(EngineCommand::PlayNote(note));
    }
}

impl Module for SamplePlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_note_receiver(&mut self) -> Option<&mut dyn NoteReceiver> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::ChannelBuffer;
    use crate::audio::context::ProcessContext;
    use crate::engine::{EngineOptions, PlaybackEngine};
    use crate::envelope::AdsrShape;
    use crate::fetch::{fake_job, FakeLauncher};
    use crate::sample::{AudioData, SampleBank};
    use crate::testutil::{eventually, write_wav};
    use std::time::Duration;

    const RATE: u32 = 1000;
    const BLOCK: usize = 10;

    struct Rig {
        player: SamplePlayer,
        engine: PlaybackEngine,
        launcher: FakeLauncher,
        out: ChannelBuffer,
        time: f64,
        _tempdir: tempfile::TempDir,
    }

    impl Rig {
        fn new() -> Self {
            let (engine, handle) = PlaybackEngine::with_handle(EngineOptions {
                sample_rate: RATE,
                block_size: BLOCK,
                max_channels: 2,
                cue_points: 8,
                envelope: AdsrShape::new(Duration::ZERO, Duration::ZERO, 1.0, Duration::ZERO),
                speed_blend: 1.0,
            });
            let tempdir = tempfile::tempdir().unwrap();
            let (job, launcher, _dir) = fake_job(tempdir.path());
            Self {
                player: SamplePlayer::new("sampleplayer", handle, RATE, 8, job),
                engine,
                launcher,
                out: ChannelBuffer::new(2, BLOCK),
                time: 0.0,
                _tempdir: tempdir,
            }
        }

        fn data_dir(&self) -> &Path {
            self._tempdir.path()
        }

        fn render(&mut self) {
            self.out.clear();
            self.engine
                .process(&ProcessContext::new(self.time, BLOCK, RATE), &mut self.out);
            self.time += BLOCK as f64;
        }
    }

    #[test]
    fn test_transport() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.5; 1000]);
        rig.player.play();
        rig.render();
        assert!(rig.player.is_playing());
        assert_eq!(rig.out.channel(0)[5], 0.5);

        rig.player.pause();
        rig.render();
        assert!(!rig.player.is_playing());
        assert!(rig.player.play_position_seconds() > 0.0);

        rig.player.stop();
        rig.render();
        assert_eq!(rig.player.play_position_seconds(), 0.0);
    }

    #[test]
    fn test_cue_edit_reaches_engine() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.0; 4000]);
        assert!(rig.player.set_cue_point(2, CuePoint::new(1.0, 10.0, 0.5)));
        assert!(!rig.player.set_cue_point(8, CuePoint::default()));
        rig.render();
        // Length is clamped to the four second sample.
        assert_eq!(
            rig.engine.cue_points().play_info_for_pitch(2),
            CuePoint::new(1.0, 4.0, 0.5)
        );
    }

    #[test]
    fn test_failed_download_installs_empty_sample() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.5; 1000]);
        rig.player.play();
        rig.render();

        rig.player.start_download("http://example.com/a", "a").unwrap();
        rig.launcher.finish();
        assert!(matches!(
            rig.player.poll(),
            Some(FetchOutcome::Download { file: None, .. })
        ));
        assert!(rig.player.error().unwrap().contains("couldn't download"));
        rig.render();
        assert!(!rig.player.is_playing());
        assert_eq!(rig.engine.sample().unwrap().len_in_samples(), 0);
    }

    #[test]
    fn test_zero_search_results_sets_error() {
        let mut rig = Rig::new();
        rig.player.start_search("duck").unwrap();
        rig.launcher.finish();
        rig.player.poll();
        assert_eq!(rig.player.error(), Some("zero results found for duck"));

        // The next successful load clears it.
        rig.player.fill_data(vec![0.0; 10]);
        assert_eq!(rig.player.error(), None);
    }

    #[test]
    fn test_download_loads_async_and_refreshes_extent() {
        let mut rig = Rig::new();
        rig.player.start_download("http://example.com/a", "Title").unwrap();
        write_wav(
            rig.data_dir().join("download.wav"),
            vec![vec![0.25_f32; 2000]],
            RATE,
        )
        .unwrap();
        rig.launcher.finish();
        rig.player.poll();

        let data = rig.player.current_sample().unwrap().clone();
        assert_eq!(data.name(), "Title");
        eventually(|| !data.is_loading(), "sample never finished loading");
        rig.player.poll();
        assert_eq!(rig.player.cue_points().extent_seconds(), 2.0);
        assert_eq!(rig.player.error(), None);
        assert!(!rig.player.is_busy());

        rig.render();
        assert_eq!(rig.engine.cue_points().extent_seconds(), 2.0);
    }

    #[test]
    fn test_select_played_is_bounds_checked() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.0; 1000]);
        rig.player.set_select_played(true);

        rig.player.play_note(NoteEvent::new(0.0, 3, 100));
        rig.render();
        rig.player.poll();
        assert_eq!(rig.player.active_cue_index(), 3);

        rig.player.play_note(NoteEvent::new(10.0, 100, 100));
        rig.render();
        rig.player.poll();
        assert_eq!(rig.player.active_cue_index(), 3);
    }

    #[test]
    fn test_scrub_sets_cue_on_click() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.0; 4000]);
        rig.player.set_cue_on_click(true);
        rig.player.set_active_cue(1);
        rig.player.mouse_pressed(0.5);
        assert!(rig.player.is_scrubbing());
        assert_eq!(rig.player.active_cue(), CuePoint::new(2.0, 0.0, 1.0));

        rig.render();
        assert!(rig.player.is_playing());

        rig.player.mouse_moved(0.25);
        assert_eq!(rig.player.active_cue().start_seconds, 1.0);
        rig.player.mouse_released();
        rig.player.mouse_moved(0.75);
        assert_eq!(rig.player.active_cue().start_seconds, 1.0);
    }

    #[test]
    fn test_wheel_and_fader() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.0; 10_000]);
        rig.player.wheel_grabbed(true);
        rig.player.wheel_moved(0.5);
        rig.render();
        assert_eq!(rig.engine.play_speed(), 0.0);

        rig.player.wheel_moved(0.52);
        rig.render();
        assert!((rig.engine.play_speed() - 1.4).abs() < 1e-4);

        rig.player.wheel_grabbed(false);
        rig.player.fader_moved(0.75);
        rig.render();
        assert!((rig.engine.play_speed() - 1.0).abs() < 1e-6);
        rig.player.poll();
        assert_eq!(rig.player.speed(), 1.0);
    }

    #[test]
    fn test_manual_speed_survives_poll() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.0; 4000]);
        rig.player.set_speed(1.5);
        rig.player.poll();
        assert_eq!(rig.player.speed(), 1.5);

        rig.player.set_cue_on_click(true);
        rig.player.mouse_pressed(0.5);
        assert_eq!(rig.player.active_cue(), CuePoint::new(2.0, 0.0, 1.5));
    }

    #[test]
    fn test_cue_trigger_speed_is_mirrored() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.0; 4000]);
        assert!(rig.player.set_cue_point(2, CuePoint::new(0.0, 0.0, 0.5)));
        rig.player.play_note(NoteEvent::new(0.0, 2, 100));
        rig.render();
        rig.player.poll();
        assert_eq!(rig.player.speed(), 0.5);

        // A manual speed the engine has not applied yet wins over a trigger
        // that happened before it.
        rig.player.play_note(NoteEvent::new(10.0, 2, 100));
        rig.render();
        rig.player.set_speed(1.25);
        rig.player.poll();
        assert_eq!(rig.player.speed(), 1.25);

        rig.render();
        rig.player.poll();
        assert_eq!(rig.engine.target_speed(), 1.25);
        assert_eq!(rig.player.speed(), 1.25);
    }

    #[test]
    fn test_disabled_player_is_silent() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.5; 1000]);
        rig.player.play();
        rig.player.set_enabled(false);
        rig.render();
        assert!(!rig.player.is_enabled());
        assert_eq!(rig.out.channel(0), &[0.0; BLOCK]);

        rig.player.set_enabled(true);
        rig.render();
        assert_eq!(rig.out.channel(0)[5], 0.5);
    }

    #[test]
    fn test_bank_sample_is_borrowed() {
        let mut rig = Rig::new();
        let mut bank = SampleBank::new("bank");
        bank.add("hit", AudioData::new(vec![vec![1.0; 100]], RATE));

        assert!(rig.player.select_bank_sample(&bank, 0));
        assert!(!rig.player.select_bank_sample(&bank, 3));
        rig.render();
        let sample = rig.engine.sample().unwrap();
        assert_eq!(sample.ownership(), crate::sample::Ownership::Borrowed);
        assert!(Arc::ptr_eq(sample.data(), &bank.get(0).unwrap()));
    }

    #[test]
    fn test_state_round_trip() {
        let mut rig = Rig::new();
        rig.player.fill_data(vec![0.1, 0.2, 0.3]);
        rig.player.set_cue_point(4, CuePoint::new(0.001, 0.0, 2.0));
        let state = rig.player.save_state();
        assert!(state.sample.is_some());

        let mut other = Rig::new();
        other.player.load_state(PlayerState::decode(&state.encode()).unwrap());
        other.render();
        assert_eq!(other.player.cue_points(), rig.player.cue_points());
        assert_eq!(
            other.engine.cue_points().play_info_for_pitch(4),
            CuePoint::new(0.001, 0.0, 2.0)
        );
        assert_eq!(other.engine.sample().unwrap().len_in_samples(), 3);
    }

    #[test]
    fn test_capabilities() {
        let mut rig = Rig::new();
        let module: &mut dyn Module = &mut rig.player;
        assert!(module.as_sample_bank().is_none());
        assert!(module.as_note_receiver().is_some());
    }
}
