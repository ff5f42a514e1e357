#![forbid(unsafe_code)]

//! Browser entry point for the FindFont overlay.
//!
//! This crate provides `FindFont`, a `wasm-bindgen`
//! exported handle that mounts an `OverlayController` on a `web-sys`
//! backed host and exposes `init`, `destroy`, `state` and `lastFontInfo`
//! to the content script.
//!
//! Only [`active`], [`options`], [`logging`] and [`state_name`] are
//! compiled on native targets; they carry the logic that does not need a
//! browser and are tested here.
//!
//! # Options
//!
//! The constructor accepts an optional object whose camelCase keys
//! override the overlay defaults: `margin`, `buttonSize`, `defaultPanel`
//! (`{ width, height }`), `debounce`, `hideDelay`, `selectionClearDelay`,
//! `copiedFeedback` (milliseconds), `previewMinPx`, `previewMaxPx`,
//! `maxVisibleFallbacks`, plus `logLevel` for the console.

use findfont_core::OverlayState;

pub mod active;
pub mod logging;
pub mod options;

#[cfg(target_arch = "wasm32")]
mod host;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::FindFont;

/// Name of `state` as reported to JavaScript.
#[must_use]
pub const fn state_name(state: OverlayState) -> &'static str {
    match state {
        OverlayState::Idle => "idle",
        OverlayState::ButtonShown => "buttonShown",
        OverlayState::PanelOpen => "panelOpen",
        OverlayState::Destroyed => "destroyed",
    }
}
