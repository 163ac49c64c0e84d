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

//! Pitch-addressed cue points (key-zone style regions of a sample).

use serde::Serialize;

/// Default number of cue points, one per MIDI pitch.
pub const DEFAULT_CUE_POINTS: usize = 128;

/// A region of a sample that a pitch plays.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CuePoint {
    /// Offset into the sample in seconds.
    pub start_seconds: f32,
    /// How long to play before releasing. Zero plays to the natural end.
    pub length_seconds: f32,
    /// Playback speed for this region.
    pub speed: f32,
}

impl CuePoint {
    pub fn new(start_seconds: f32, length_seconds: f32, speed: f32) -> Self {
        Self {
            start_seconds,
            length_seconds,
            speed,
        }
    }

    /// Whether this cue forces a release after `length_seconds`.
    pub fn has_forced_stop(&self) -> bool {
        self.length_seconds > 0.0
    }
}

impl Default for CuePoint {
    /// Plays from the top at unity speed until the sample ends.
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// A fixed-capacity table of cue points indexed by pitch.
#[derive(Clone, Debug, PartialEq)]
pub struct CuePointTable {
    points: Vec<CuePoint>,
    /// Upper bound for start/length values, taken from the current sample
    /// length. Zero means no sample is known and values are not clamped.
    extent_seconds: f32,
}

impl CuePointTable {
    /// Creates a table with `capacity` default cue points.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: vec![CuePoint::default(); capacity],
            extent_seconds: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CuePoint> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CuePoint> {
        self.points.iter()
    }

    /// Returns true if `pitch` addresses a slot in this table.
    pub fn contains(&self, pitch: i32) -> bool {
        usize::try_from(pitch).is_ok_and(|index| index < self.points.len())
    }

    /// Resolves the region a pitch plays. Pitches outside the table fall back
    /// to the whole sample at unity speed.
    pub fn play_info_for_pitch(&self, pitch: i32) -> CuePoint {
        usize::try_from(pitch)
            .ok()
            .and_then(|index| self.points.get(index))
            .copied()
            .unwrap_or_default()
    }

    /// Overwrites the cue for `pitch`. Returns false and changes nothing if the
    /// pitch is outside the table.
    pub fn set_cue_point(
        &mut self,
        pitch: i32,
        start_seconds: f32,
        length_seconds: f32,
        speed: f32,
    ) -> bool {
        let extent = self.extent_seconds;
        let clamp = |value: f32| {
            if extent > 0.0 {
                value.clamp(0.0, extent)
            } else {
                value.max(0.0)
            }
        };
        match usize::try_from(pitch)
            .ok()
            .and_then(|index| self.points.get_mut(index))
        {
            Some(point) => {
                *point = CuePoint::new(clamp(start_seconds), clamp(length_seconds), speed);
                true
            }
            None => false,
        }
    }

    /// The current upper bound for cue start/length.
    pub fn extent_seconds(&self) -> f32 {
        self.extent_seconds
    }

    /// Reconfigures the start/length range from a sample length.
    pub fn set_extent(&mut self, length_seconds: f32) {
        self.extent_seconds = length_seconds.max(0.0);
    }

    /// Replaces the contents from a persisted list. Entries beyond the table
    /// capacity are ignored and missing entries reset to the default.
    pub fn load_from(&mut self, points: &[CuePoint]) {
        for (index, slot) in self.points.iter_mut().enumerate() {
            *slot = points.get(index).copied().unwrap_or_default();
        }
    }
}

impl Default for CuePointTable {
    fn default() -> Self {
        Self::new(DEFAULT_CUE_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_pitch_is_safe() {
        let table = CuePointTable::new(8);
        for pitch in [-1000, -1, 8, 9, 127, 128, i32::MAX, i32::MIN] {
            assert_eq!(table.play_info_for_pitch(pitch), CuePoint::new(0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn test_unconfigured_pitch_plays_whole_sample() {
        let table = CuePointTable::new(8);
        let info = table.play_info_for_pitch(5);
        assert_eq!(info.start_seconds, 0.0);
        assert_eq!(info.speed, 1.0);
        assert!(!info.has_forced_stop());
    }

    #[test]
    fn test_set_cue_point() {
        let mut table = CuePointTable::new(8);
        assert!(table.set_cue_point(3, 2.0, 1.0, 1.5));
        assert_eq!(table.play_info_for_pitch(3), CuePoint::new(2.0, 1.0, 1.5));

        assert!(!table.set_cue_point(8, 2.0, 1.0, 1.5));
        assert!(!table.set_cue_point(-1, 2.0, 1.0, 1.5));
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn test_set_cue_point_clamps_to_extent() {
        let mut table = CuePointTable::new(4);
        table.set_extent(3.0);
        table.set_cue_point(0, 5.0, 10.0, 1.0);
        assert_eq!(table.play_info_for_pitch(0), CuePoint::new(3.0, 3.0, 1.0));
    }

    #[test]
    fn test_load_from_keeps_capacity() {
        let mut table = CuePointTable::new(3);
        table.set_cue_point(2, 1.0, 1.0, 2.0);
        table.load_from(&[CuePoint::new(0.5, 0.0, 1.0); 5]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.play_info_for_pitch(2), CuePoint::new(0.5, 0.0, 1.0));

        table.load_from(&[CuePoint::new(0.5, 0.0, 1.0)]);
        assert_eq!(table.play_info_for_pitch(1), CuePoint::default());
    }
}
