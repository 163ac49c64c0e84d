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
use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use crate::engine::EngineOptions;
use crate::fetch::FetchSettings;

pub mod audio;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fetch;

pub use self::audio::Audio;
pub use self::controller::{Midi, Osc};
pub use self::error::ConfigError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Parses a duration string such as `10ms`.
pub(crate) fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// The configuration for the sample player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The audio output configuration.
    audio: Audio,
    /// Engine tuning.
    engine: Option<engine::Engine>,
    /// The MIDI input to take notes from.
    midi: Option<Midi>,
    /// The OSC controller listener.
    osc: Option<Osc>,
    /// Search and download helpers.
    fetch: Option<fetch::Fetch>,
    /// How often the control loop runs (default: 16ms)
    poll_interval: Option<String>,
}

impl Player {
    /// Parse a player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    pub fn osc(&self) -> Option<&Osc> {
        self.osc.as_ref()
    }

    /// Builds the engine settings from the audio and engine sections.
    pub fn engine_options(&self) -> Result<EngineOptions, ConfigError> {
        let engine = self.engine.clone().unwrap_or_default();
        Ok(EngineOptions {
            sample_rate: self.audio.sample_rate(),
            block_size: self.audio.buffer_size(),
            max_channels: self.audio.channels() as usize,
            cue_points: engine.cue_points(),
            envelope: engine.envelope()?,
            speed_blend: engine.speed_blend()?,
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        self.fetch.clone().unwrap_or_default().settings()
    }

    /// Returns the control loop interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.poll_interval {
            Some(interval) => parse_duration(interval),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }
}
