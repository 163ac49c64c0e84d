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

//! Note events and the capability interface used to connect modules.
//!
//! A connection target advertises what it can do through the accessors on
//! [`Module`]; callers ask for a capability rather than guessing a concrete
//! type.

use crate::sample::bank::SampleBank;

/// Per-note modulation values carried alongside a note.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModulationParameters {
    pub pitch_bend: f32,
    pub mod_wheel: f32,
    pub pressure: f32,
    pub pan: f32,
}

/// A note with an absolute timestamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    /// Absolute time in milliseconds.
    pub time_ms: f64,
    /// Pitch, unvalidated. Cue lookups treat out-of-range pitches safely.
    pub pitch: i32,
    /// Velocity 0..=127. Zero is a note-off.
    pub velocity: i32,
    /// Voice index assigned upstream, if any.
    pub voice: Option<usize>,
    pub modulation: ModulationParameters,
}

impl NoteEvent {
    pub fn new(time_ms: f64, pitch: i32, velocity: i32) -> Self {
        Self {
            time_ms,
            pitch,
            velocity,
            voice: None,
            modulation: ModulationParameters::default(),
        }
    }

    pub fn with_voice(mut self, voice: usize) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_modulation(mut self, modulation: ModulationParameters) -> Self {
        self.modulation = modulation;
        self
    }

    /// Velocity > 0 triggers; anything else is a note-off.
    pub fn is_trigger(&self) -> bool {
        self.velocity > 0
    }
}

/// Something that accepts notes.
pub trait NoteReceiver {
    fn play_note(&mut self, note: NoteEvent);
}

/// A connection target. Each capability accessor returns `None` unless the
/// implementation explicitly supports it.
pub trait Module {
    /// Display name.
    fn name(&self) -> &str;

    fn as_note_receiver(&mut self) -> Option<&mut dyn NoteReceiver> {
        None
    }

    fn as_sample_bank(&self) -> Option<&SampleBank> {
        None
    }
}
