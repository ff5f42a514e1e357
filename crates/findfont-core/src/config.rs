#![forbid(unsafe_code)]

//! Overlay tuning knobs.

use std::time::Duration;

use crate::geometry::Size;

/// Overlay configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Gap kept between widgets and the viewport edge (default: 10px).
    pub margin: f64,
    /// Floating button edge length (default: 32px).
    pub button_size: f64,
    /// Panel size assumed before it has been laid out (default: 280×200).
    pub default_panel: Size,
    /// Trailing debounce applied to mouse-up (default: 150ms).
    pub debounce: Duration,
    /// Delay between hiding the panel and draining its content (default: 250ms).
    pub hide_delay: Duration,
    /// Delay before the page selection is cleared on dismiss (default: 50ms).
    pub selection_clear_delay: Duration,
    /// How long copy buttons keep the `copied` class (default: 1000ms).
    pub copied_feedback: Duration,
    /// Smallest preview font size in px (default: 12).
    pub preview_min_px: u32,
    /// Largest preview font size in px (default: 24).
    pub preview_max_px: u32,
    /// Fallback fonts shown before the expand toggle (default: 3).
    pub max_visible_fallbacks: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            margin: 10.0,
            button_size: 32.0,
            default_panel: Size::new(280.0, 200.0),
            debounce: Duration::from_millis(150),
            hide_delay: Duration::from_millis(250),
            selection_clear_delay: Duration::from_millis(50),
            copied_feedback: Duration::from_millis(1000),
            preview_min_px: 12,
            preview_max_px: 24,
            max_visible_fallbacks: 3,
        }
    }
}

impl OverlayConfig {
    /// Set the viewport margin.
    #[must_use]
    pub fn margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Set the floating button size.
    #[must_use]
    pub fn button_size(mut self, size: f64) -> Self {
        self.button_size = size;
        self
    }

    /// Set the panel size used before layout.
    #[must_use]
    pub fn default_panel(mut self, size: Size) -> Self {
        self.default_panel = size;
        self
    }

    /// Set the mouse-up debounce window.
    #[must_use]
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Set the panel hide delay.
    #[must_use]
    pub fn hide_delay(mut self, delay: Duration) -> Self {
        self.hide_delay = delay;
        self
    }

    /// Set the deferred selection-clear delay.
    #[must_use]
    pub fn selection_clear_delay(mut self, delay: Duration) -> Self {
        self.selection_clear_delay = delay;
        self
    }

    /// Set the copy feedback duration.
    #[must_use]
    pub fn copied_feedback(mut self, delay: Duration) -> Self {
        self.copied_feedback = delay;
        self
    }

    /// Set the preview font-size bounds. Bounds are swapped if reversed.
    #[must_use]
    pub fn preview_bounds(mut self, min_px: u32, max_px: u32) -> Self {
        self.preview_min_px = min_px.min(max_px);
        self.preview_max_px = min_px.max(max_px);
        self
    }

    /// Set how many fallback fonts are visible before the toggle.
    #[must_use]
    pub fn max_visible_fallbacks(mut self, count: usize) -> Self {
        self.max_visible_fallbacks = count;
        self
    }
}
