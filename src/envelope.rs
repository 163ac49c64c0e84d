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

//! Attack/decay/sustain/release amplitude envelope driven by absolute time.
//!
//! The envelope only records when it was started and released. Its value at any
//! time is computed from those timestamps, so it can be evaluated per sample in
//! any order and always returns the same amplitude for the same time.

use std::time::Duration;

/// Envelope phase at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
    Finished,
}

/// Fixed ADSR time constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdsrShape {
    pub attack_ms: f64,
    pub decay_ms: f64,
    /// Sustain level as a fraction of the trigger velocity.
    pub sustain: f32,
    pub release_ms: f64,
}

impl AdsrShape {
    pub fn new(attack: Duration, decay: Duration, sustain: f32, release: Duration) -> Self {
        Self {
            attack_ms: attack.as_secs_f64() * 1000.0,
            decay_ms: decay.as_secs_f64() * 1000.0,
            sustain: sustain.clamp(0.0, 1.0),
            release_ms: release.as_secs_f64() * 1000.0,
        }
    }
}

impl Default for AdsrShape {
    /// A short 10ms attack and release with full sustain.
    fn default() -> Self {
        Self {
            attack_ms: 10.0,
            decay_ms: 1.0,
            sustain: 1.0,
            release_ms: 10.0,
        }
    }
}

/// An ADSR envelope.
#[derive(Clone, Debug)]
pub struct Adsr {
    shape: AdsrShape,
    /// Trigger time in ms, if started.
    start_time: Option<f64>,
    /// Release time in ms, if a stop has been requested.
    stop_time: Option<f64>,
    velocity: f32,
}

impl Adsr {
    pub fn new(shape: AdsrShape) -> Self {
        Self {
            shape,
            start_time: None,
            stop_time: None,
            velocity: 0.0,
        }
    }

    pub fn shape(&self) -> &AdsrShape {
        &self.shape
    }

    /// Forgets any previous trigger and release.
    pub fn clear(&mut self) {
        self.start_time = None;
        self.stop_time = None;
    }

    /// Begins the attack at `time`, peaking at `velocity`.
    pub fn start(&mut self, time: f64, velocity: f32) {
        self.clear();
        self.start_time = Some(time);
        self.velocity = velocity.max(0.0);
    }

    /// Schedules a release at `time`. The release fades from whatever value
    /// the envelope holds at that instant. An earlier pending release wins,
    /// and a stop without a start does nothing.
    pub fn stop(&mut self, time: f64) {
        let Some(start) = self.start_time else {
            return;
        };
        let time = time.max(start);
        self.stop_time = Some(match self.stop_time {
            Some(existing) => existing.min(time),
            None => time,
        });
    }

    /// The scheduled release time, if any.
    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    /// The trigger time, if started.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// The peak amplitude of the current trigger.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Amplitude before any release is applied.
    fn held_value(&self, start: f64, time: f64) -> f32 {
        let elapsed = time - start;
        if elapsed < 0.0 {
            return 0.0;
        }
        let sustain = self.shape.sustain * self.velocity;
        if elapsed < self.shape.attack_ms {
            return (elapsed / self.shape.attack_ms) as f32 * self.velocity;
        }
        let elapsed = elapsed - self.shape.attack_ms;
        if elapsed < self.shape.decay_ms {
            let t = (elapsed / self.shape.decay_ms) as f32;
            return self.velocity + (sustain - self.velocity) * t;
        }
        sustain
    }

    /// The amplitude at `time`, in `[0, velocity]`.
    pub fn value(&self, time: f64) -> f32 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        match self.stop_time {
            Some(stop) if time >= stop => {
                let from = self.held_value(start, stop);
                if self.shape.release_ms <= 0.0 {
                    return 0.0;
                }
                let t = ((time - stop) / self.shape.release_ms) as f32;
                (from * (1.0 - t)).max(0.0)
            }
            _ => self.held_value(start, time),
        }
    }

    /// The phase at `time`.
    pub fn phase(&self, time: f64) -> Phase {
        let Some(start) = self.start_time else {
            return Phase::Idle;
        };
        if time < start {
            return Phase::Idle;
        }
        if let Some(stop) = self.stop_time {
            if time >= stop + self.shape.release_ms {
                return Phase::Finished;
            }
            if time >= stop {
                return Phase::Release;
            }
        }
        let elapsed = time - start;
        if elapsed < self.shape.attack_ms {
            Phase::Attack
        } else if elapsed < self.shape.attack_ms + self.shape.decay_ms {
            Phase::Decay
        } else {
            Phase::Sustain
        }
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new(AdsrShape::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> AdsrShape {
        AdsrShape::new(
            Duration::from_millis(10),
            Duration::from_millis(5),
            0.5,
            Duration::from_millis(20),
        )
    }

    #[test]
    fn test_idle_before_start() {
        let mut adsr = Adsr::new(shape());
        assert_eq!(adsr.value(0.0), 0.0);
        adsr.start(100.0, 1.0);
        assert_eq!(adsr.value(99.0), 0.0);
        assert_eq!(adsr.phase(99.0), Phase::Idle);
    }

    #[test]
    fn test_phases() {
        let mut adsr = Adsr::new(shape());
        adsr.start(0.0, 1.0);
        assert!((adsr.value(5.0) - 0.5).abs() < 1e-6);
        assert_eq!(adsr.phase(5.0), Phase::Attack);
        assert!((adsr.value(12.5) - 0.75).abs() < 1e-6);
        assert_eq!(adsr.phase(12.5), Phase::Decay);
        assert!((adsr.value(100.0) - 0.5).abs() < 1e-6);
        assert_eq!(adsr.phase(100.0), Phase::Sustain);

        adsr.stop(200.0);
        assert!((adsr.value(210.0) - 0.25).abs() < 1e-6);
        assert_eq!(adsr.phase(210.0), Phase::Release);
        assert_eq!(adsr.value(220.0), 0.0);
        assert_eq!(adsr.phase(220.0), Phase::Finished);
    }

    #[test]
    fn test_value_is_time_pure() {
        let mut adsr = Adsr::new(shape());
        adsr.start(0.0, 0.8);
        adsr.stop(30.0);
        let times = [35.0, 2.0, 35.0, 12.0, 2.0, 45.0];
        let first: Vec<f32> = times.iter().map(|t| adsr.value(*t)).collect();
        let second: Vec<f32> = times.iter().rev().map(|t| adsr.value(*t)).collect();
        let reversed: Vec<f32> = second.into_iter().rev().collect();
        assert_eq!(first, reversed);
    }

    #[test]
    fn test_stop_during_attack_releases_from_reached_level() {
        let mut adsr = Adsr::new(shape());
        adsr.start(0.0, 1.0);
        adsr.stop(2.0);
        // Attack had reached 0.2 at the stop, never jumping to the peak.
        assert!((adsr.value(2.0) - 0.2).abs() < 1e-6);
        for i in 0..40 {
            assert!(adsr.value(2.0 + i as f64 * 0.5) <= 0.2 + 1e-6);
        }
    }

    #[test]
    fn test_continuous_at_stop_boundaries() {
        let step_ms = 1000.0 / 48000.0;
        let max_attack_step = step_ms / 10.0 + 1e-4;
        for stop in [0.5, 3.0, 9.99, 10.0, 12.0, 14.9, 50.0] {
            let mut adsr = Adsr::new(shape());
            adsr.start(0.0, 1.0);
            adsr.stop(stop);
            let before = adsr.value(stop - step_ms);
            let at = adsr.value(stop);
            let after = adsr.value(stop + step_ms);
            assert!((at - before).abs() as f64 <= max_attack_step, "stop={stop}");
            assert!((after - at).abs() as f64 <= max_attack_step, "stop={stop}");
        }
    }

    #[test]
    fn test_earliest_stop_wins() {
        let mut adsr = Adsr::new(shape());
        adsr.start(0.0, 1.0);
        adsr.stop(1000.0);
        adsr.stop(50.0);
        adsr.stop(2000.0);
        assert_eq!(adsr.stop_time(), Some(50.0));
    }

    #[test]
    fn test_start_clears_release() {
        let mut adsr = Adsr::new(shape());
        adsr.start(0.0, 1.0);
        adsr.stop(20.0);
        adsr.start(100.0, 0.5);
        assert_eq!(adsr.stop_time(), None);
        assert!((adsr.value(200.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_stop_without_start_is_ignored() {
        let mut adsr = Adsr::default();
        adsr.stop(10.0);
        assert_eq!(adsr.stop_time(), None);
        assert_eq!(adsr.phase(20.0), Phase::Idle);
    }
}
