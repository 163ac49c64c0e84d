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

//! The persisted player state.
//!
//! The blob is a protobuf message carrying a format revision, whether a sample
//! is embedded, the sample itself, and every cue point in index order. Blobs
//! written by a newer revision are rejected rather than partially decoded.

use std::fs;
use std::path::Path;

use prost::Message;
use serde::Serialize;
use tracing::info;

use crate::cue::CuePoint;
use crate::sample::AudioData;

/// The revision this build writes.
pub const CURRENT_REVISION: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state revision {found} is newer than the supported revision {supported}")]
    UnsupportedRevision { found: i32, supported: i32 },

    #[error("state flags an embedded sample but none is present")]
    MissingSample,

    #[error("unable to decode state: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, PartialEq, Message)]
pub struct SavedCuePoint {
    #[prost(float, tag = "1")]
    pub start_seconds: f32,
    #[prost(float, tag = "2")]
    pub length_seconds: f32,
    #[prost(float, tag = "3")]
    pub speed: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SavedChannel {
    #[prost(float, repeated, tag = "1")]
    pub samples: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SavedSample {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub sample_rate: u32,
    #[prost(message, repeated, tag = "3")]
    pub channels: Vec<SavedChannel>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SavedState {
    #[prost(int32, tag = "1")]
    pub revision: i32,
    #[prost(bool, tag = "2")]
    pub has_sample: bool,
    #[prost(message, optional, tag = "3")]
    pub sample: Option<SavedSample>,
    #[prost(uint32, tag = "4")]
    pub cue_point_count: u32,
    #[prost(message, repeated, tag = "5")]
    pub cue_points: Vec<SavedCuePoint>,
}

/// An embedded sample.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSnapshot {
    pub name: String,
    pub audio: AudioData,
}

/// Everything the player persists.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerState {
    pub sample: Option<SampleSnapshot>,
    pub cue_points: Vec<CuePoint>,
}

impl PlayerState {
    pub fn encode(&self) -> Vec<u8> {
        let sample = self.sample.as_ref().map(|snapshot| SavedSample {
            name: snapshot.name.clone(),
            sample_rate: snapshot.audio.sample_rate(),
            channels: snapshot
                .audio
                .channels()
                .iter()
                .map(|samples| SavedChannel {
                    samples: samples.clone(),
                })
                .collect(),
        });
        SavedState {
            revision: CURRENT_REVISION,
            has_sample: sample.is_some(),
            sample,
            cue_point_count: self.cue_points.len() as u32,
            cue_points: self
                .cue_points
                .iter()
                .map(|cue| SavedCuePoint {
                    start_seconds: cue.start_seconds,
                    length_seconds: cue.length_seconds,
                    speed: cue.speed,
                })
                .collect(),
        }
        .encode_to_vec()
    }

    /// Decodes a blob written by this or any earlier revision.
    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        let saved = SavedState::decode(bytes)?;
        if saved.revision > CURRENT_REVISION {
            return Err(StateError::UnsupportedRevision {
                found: saved.revision,
                supported: CURRENT_REVISION,
            });
        }

        let sample = if saved.has_sample {
            let sample = saved.sample.ok_or(StateError::MissingSample)?;
            Some(SampleSnapshot {
                name: sample.name,
                audio: AudioData::new(
                    sample.channels.into_iter().map(|c| c.samples).collect(),
                    sample.sample_rate,
                ),
            })
        } else {
            None
        };

        let cue_points = saved
            .cue_points
            .into_iter()
            .take(saved.cue_point_count as usize)
            .map(|cue| CuePoint::new(cue.start_seconds, cue.length_seconds, cue.speed))
            .collect();

        Ok(Self { sample, cue_points })
    }

    pub fn write_file(&self, path: &Path) -> Result<(), StateError> {
        let bytes = self.encode();
        fs::write(path, &bytes)?;
        info!(path = ?path, bytes = bytes.len(), "Saved state");
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self, StateError> {
        let state = Self::decode(&fs::read(path)?)?;
        info!(path = ?path, cue_points = state.cue_points.len(), "Loaded state");
        Ok(state)
    }

    /// A printable overview without the audio data.
    pub fn summary(&self) -> StateSummary<'_> {
        StateSummary {
            revision: CURRENT_REVISION,
            sample: self.sample.as_ref().map(|s| SampleSummary {
                name: &s.name,
                channels: s.audio.num_channels(),
                frames: s.audio.len_frames(),
                sample_rate: s.audio.sample_rate(),
            }),
            cue_points: &self.cue_points,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SampleSummary<'a> {
    pub name: &'a str,
    pub channels: usize,
    pub frames: usize,
    pub sample_rate: u32,
}

#[derive(Debug, Serialize)]
pub struct StateSummary<'a> {
    pub revision: i32,
    pub sample: Option<SampleSummary<'a>>,
    pub cue_points: &'a [CuePoint],
}
