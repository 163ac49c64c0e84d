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

/// Horizontal scroll step per unit.
const PAN_STEP: f32 = 0.005;

/// Zoom step per unit of vertical scroll.
const ZOOM_STEP: f32 = 0.2;

const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 20.0;

/// The visible window over the waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomView {
    /// 1 shows the whole sample; larger values magnify.
    level: f32,
    /// Start of the window as a fraction of the sample.
    offset: f32,
}

impl ZoomView {
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Applies a scroll gesture with the cursor at `x` (0..1 across the view).
    /// Only the dominant axis is used: horizontal pans, vertical zooms around
    /// the cursor.
    pub fn scroll(&mut self, x: f32, scroll_x: f32, scroll_y: f32) {
        let (scroll_x, scroll_y) = if scroll_x.abs() > scroll_y.abs() {
            (scroll_x, 0.0)
        } else {
            (0.0, scroll_y)
        };

        self.offset = (self.offset + scroll_x * PAN_STEP).clamp(0.0, 1.0);

        let old_level = self.level;
        self.level = (self.level + scroll_y * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        let amount = (self.level - old_level) / old_level;
        let center = x.clamp(0.0, 1.0) / old_level;
        self.offset += center * amount;
        if self.level == MIN_ZOOM {
            self.offset = 0.0;
        }
    }

    /// First visible frame of a sample `len` frames long.
    pub fn start_sample(&self, len: f64) -> f64 {
        if len <= 0.0 {
            return 0.0;
        }
        (len * self.offset as f64).clamp(0.0, len)
    }

    /// Last visible frame of a sample `len` frames long.
    pub fn end_sample(&self, len: f64) -> f64 {
        if len <= 1.0 {
            return len.max(0.0);
        }
        (self.start_sample(len) + len / self.level as f64).clamp(1.0, len)
    }

    /// Maps `x` (0..1 across the view) to a frame.
    pub fn position_for_x(&self, x: f32, len: f64) -> f64 {
        let start = self.start_sample(len);
        let end = self.end_sample(len);
        start + (end - start) * x.clamp(0.0, 1.0) as f64
    }
}

impl Default for ZoomView {
    fn default() -> Self {
        Self {
            level: MIN_ZOOM,
            offset: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unzoomed_maps_whole_sample() {
        let view = ZoomView::default();
        assert_eq!(view.position_for_x(0.0, 1000.0), 0.0);
        assert_eq!(view.position_for_x(0.5, 1000.0), 500.0);
        assert_eq!(view.position_for_x(2.0, 1000.0), 1000.0);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut view = ZoomView::default();
        view.scroll(0.0, 0.0, 1000.0);
        assert_eq!(view.level(), MAX_ZOOM);
        view.scroll(0.0, 0.0, -1000.0);
        assert_eq!(view.level(), MIN_ZOOM);
        assert_eq!(view.offset(), 0.0);
    }

    #[test]
    fn test_zoom_around_cursor() {
        let mut view = ZoomView::default();
        // Zoom to 2x around the right edge.
        view.scroll(1.0, 0.0, 5.0);
        assert!((view.level() - 2.0).abs() < 1e-6);
        assert!((view.offset() - 1.0).abs() < 1e-6);
        assert_eq!(view.end_sample(1000.0), 1000.0);
    }

    #[test]
    fn test_pan_uses_dominant_axis() {
        let mut view = ZoomView::default();
        view.scroll(0.0, 0.0, 5.0);
        view.scroll(0.5, 10.0, 1.0);
        assert!((view.level() - 2.0).abs() < 1e-6);
        assert!((view.offset() - 0.05).abs() < 1e-6);
        assert!((view.start_sample(1000.0) - 50.0).abs() < 1e-3);
        assert!((view.end_sample(1000.0) - 550.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_sample() {
        let view = ZoomView::default();
        assert_eq!(view.position_for_x(0.5, 0.0), 0.0);
    }
}
