#![forbid(unsafe_code)]

//! Placement of the floating button and the info panel.
//!
//! # Invariants
//!
//! 1. The button never starts left of `margin` or above `margin`, and never
//!    extends past `viewport.width - margin` when the viewport is at least
//!    `button_size + 2 * margin` wide.
//! 2. Panel placement is an ordered fallback (right, left, below, above)
//!    followed by a clamp into the viewport. The first rule that fits wins;
//!    there is no search over alternatives.
//! 3. Both functions are pure: identical inputs give identical outputs.

use crate::config::OverlayConfig;

/// A point in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub left: f64,
    pub top: f64,
}

impl Point {
    #[must_use]
    pub const fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// A width/height pair in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (element not laid out).
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Viewport-relative rectangle, shaped like a DOM `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Which placement rule produced a panel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelSide {
    Right,
    Left,
    Below,
    Above,
}

/// Final panel position plus the rule that chose it (before clamping).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelPlacement {
    pub origin: Point,
    pub side: PanelSide,
}

/// Clamp a button origin into the viewport.
///
/// The left bound is applied before the right bound, so on a viewport too
/// narrow for the button the right bound wins.
#[must_use]
pub fn clamp_button(origin: Point, viewport: Size, config: &OverlayConfig) -> Point {
    let margin = config.margin;
    let max_left = viewport.width - config.button_size - margin;
    Point {
        left: origin.left.max(margin).min(max_left),
        top: origin.top.max(margin),
    }
}

/// Place the button just right of and above the selection.
#[must_use]
pub fn position_button(selection: Rect, viewport: Size, config: &OverlayConfig) -> Point {
    let wanted = Point {
        left: selection.right() + config.margin,
        top: selection.top - config.button_size - config.margin,
    };
    clamp_button(wanted, viewport, config)
}

/// Place the panel next to the button.
///
/// `panel` is the measured panel size; an unmeasured (empty) size falls back
/// to `config.default_panel`.
#[must_use]
pub fn position_panel(
    button: Point,
    panel: Size,
    viewport: Size,
    config: &OverlayConfig,
) -> PanelPlacement {
    let margin = config.margin;
    let button_size = config.button_size;
    let panel = effective_panel_size(panel, config);

    let mut side = PanelSide::Right;
    let mut left = button.left + button_size + margin;
    let mut top = button.top;

    if left + panel.width > viewport.width {
        side = PanelSide::Left;
        left = button.left - panel.width - margin;
    }

    if left < margin {
        side = PanelSide::Below;
        left = button.left;
        top = button.top + button_size + margin;
    }

    if top + panel.height > viewport.height {
        side = PanelSide::Above;
        top = button.top - panel.height - margin;
    }

    let left = left.min(viewport.width - panel.width - margin).max(margin);
    let top = top.min(viewport.height - panel.height - margin).max(margin);

    PanelPlacement {
        origin: Point { left, top },
        side,
    }
}

/// Measured size, or the configured default when the panel is not laid out.
#[must_use]
pub fn effective_panel_size(measured: Size, config: &OverlayConfig) -> Size {
    Size {
        width: if measured.width > 0.0 {
            measured.width
        } else {
            config.default_panel.width
        },
        height: if measured.height > 0.0 {
            measured.height
        } else {
            config.default_panel.height
        },
    }
}

/// Format a pixel value the way inline styles carry it (`"12px"`, `"10.5px"`).
#[must_use]
pub fn px(value: f64) -> String {
    format!("{value}px")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg() -> OverlayConfig {
        OverlayConfig::default()
    }

    #[test]
    fn button_sits_right_of_and_above_selection() {
        let rect = Rect::new(100.0, 200.0, 50.0, 20.0);
        let pos = position_button(rect, Size::new(1024.0, 768.0), &cfg());
        assert_eq!(pos, Point::new(160.0, 158.0));
    }

    #[test]
    fn button_pulled_left_at_right_edge() {
        let rect = Rect::new(980.0, 200.0, 40.0, 20.0);
        let pos = position_button(rect, Size::new(1024.0, 768.0), &cfg());
        assert_eq!(pos.left, 1024.0 - 32.0 - 10.0);
    }

    #[test]
    fn button_pushed_down_near_top() {
        let rect = Rect::new(10.0, 5.0, 40.0, 20.0);
        let pos = position_button(rect, Size::new(1024.0, 768.0), &cfg());
        assert_eq!(pos.top, 10.0);
    }

    #[test]
    fn button_never_left_of_margin() {
        let rect = Rect::new(-200.0, 300.0, 10.0, 20.0);
        let pos = position_button(rect, Size::new(800.0, 600.0), &cfg());
        assert_eq!(pos.left, 10.0);
    }

    #[test]
    fn panel_prefers_right() {
        let placement = position_panel(
            Point::new(100.0, 100.0),
            Size::new(280.0, 200.0),
            Size::new(1024.0, 768.0),
            &cfg(),
        );
        assert_eq!(placement.side, PanelSide::Right);
        assert_eq!(placement.origin, Point::new(142.0, 100.0));
    }

    #[test]
    fn panel_falls_back_to_left() {
        let placement = position_panel(
            Point::new(900.0, 100.0),
            Size::new(280.0, 200.0),
            Size::new(1024.0, 768.0),
            &cfg(),
        );
        assert_eq!(placement.side, PanelSide::Left);
        assert_eq!(placement.origin, Point::new(610.0, 100.0));
    }

    #[test]
    fn panel_falls_back_below_when_neither_side_fits() {
        let placement = position_panel(
            Point::new(150.0, 50.0),
            Size::new(280.0, 200.0),
            Size::new(400.0, 768.0),
            &cfg(),
        );
        assert_eq!(placement.side, PanelSide::Below);
        // Below the button, then clamped so the right edge keeps its margin.
        assert_eq!(placement.origin, Point::new(110.0, 92.0));
    }

    #[test]
    fn panel_goes_above_when_below_overflows() {
        let placement = position_panel(
            Point::new(150.0, 500.0),
            Size::new(280.0, 200.0),
            Size::new(400.0, 600.0),
            &cfg(),
        );
        assert_eq!(placement.side, PanelSide::Above);
        assert_eq!(placement.origin.top, 290.0);
    }

    #[test]
    fn unmeasured_panel_uses_default_size() {
        let measured = position_panel(
            Point::new(900.0, 100.0),
            Size::new(280.0, 200.0),
            Size::new(1024.0, 768.0),
            &cfg(),
        );
        let unmeasured = position_panel(
            Point::new(900.0, 100.0),
            Size::default(),
            Size::new(1024.0, 768.0),
            &cfg(),
        );
        assert_eq!(measured, unmeasured);
    }

    #[test]
    fn px_formats_inline_values() {
        assert_eq!(px(12.0), "12px");
        assert_eq!(px(10.5), "10.5px");
        assert_eq!(px(-3.0), "-3px");
    }
}
