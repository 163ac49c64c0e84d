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
use serde::Deserialize;

use crate::cue::DEFAULT_CUE_POINTS;
use crate::envelope::AdsrShape;

use super::error::ConfigError;
use super::parse_duration;

/// The ADSR shape used for every trigger.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Envelope {
    attack: Option<String>,
    decay: Option<String>,
    sustain: Option<f32>,
    release: Option<String>,
}

impl Envelope {
    /// Converts to an envelope shape, keeping the defaults for anything unset.
    pub fn shape(&self) -> Result<AdsrShape, ConfigError> {
        let defaults = AdsrShape::default();
        let ms = |value: &Option<String>, default_ms: f64| -> Result<f64, ConfigError> {
            match value {
                Some(value) => Ok(parse_duration(value)?.as_secs_f64() * 1000.0),
                None => Ok(default_ms),
            }
        };
        Ok(AdsrShape {
            attack_ms: ms(&self.attack, defaults.attack_ms)?,
            decay_ms: ms(&self.decay, defaults.decay_ms)?,
            sustain: self.sustain.unwrap_or(defaults.sustain).clamp(0.0, 1.0),
            release_ms: ms(&self.release, defaults.release_ms)?,
        })
    }
}

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// Number of cue points (default: 128)
    cue_points: Option<usize>,

    envelope: Option<Envelope>,

    /// Fraction of the way to the target speed moved per block (default: 1.0)
    speed_blend: Option<f32>,
}

impl Engine {
    pub fn cue_points(&self) -> usize {
        self.cue_points.unwrap_or(DEFAULT_CUE_POINTS)
    }

    pub fn envelope(&self) -> Result<AdsrShape, ConfigError> {
        self.envelope.clone().unwrap_or_default().shape()
    }

    pub fn speed_blend(&self) -> Result<f32, ConfigError> {
        match self.speed_blend {
            Some(blend) if !(0.0..=1.0).contains(&blend) || blend == 0.0 => {
                Err(ConfigError::Invalid {
                    field: "engine.speed_blend",
                    reason: format!("{} is not in (0, 1]", blend),
                })
            }
            Some(blend) => Ok(blend),
            None => Ok(1.0),
        }
    }
}
