#![forbid(unsafe_code)]

//! Core of the FindFont selection inspector.
//!
//! # Role
//! `findfont-core` owns everything that does not need a real browser: the
//! placement math for the floating button and info panel, computed-style
//! analysis, construction of the overlay widgets, panel rendering and the
//! activation lifecycle that ties them together.
//!
//! # Primary responsibilities
//! - **OverlayController**: the Idle / ButtonShown / PanelOpen / Destroyed
//!   state machine, driven by host events and timer wake-ups.
//! - **Geometry**: ordered-fallback placement of the button and panel.
//! - **Font analysis**: family parsing, source classification, style
//!   description and colour formatting.
//! - **Resource bookkeeping**: listener registry with disposers and a
//!   cancellable timer queue, so teardown never leaks handlers.
//!
//! # How it fits
//! The controller talks to the page exclusively through the [`host::Host`]
//! trait. `findfont-web` implements it with `web-sys`; [`headless::HeadlessPage`]
//! implements it in memory for tests.

pub mod config;
pub mod controller;
pub mod font;
pub mod geometry;
pub mod headless;
pub mod host;
pub mod message;
pub mod panel;
pub mod registry;
pub mod timer;
pub mod widgets;

pub use config::OverlayConfig;
pub use controller::{OverlayController, OverlayState};
pub use font::{ComputedFontInfo, FontSource, ParsedFontFamily};
pub use geometry::{PanelPlacement, PanelSide, Point, Rect, Size};
pub use host::{DomEvent, EventKind, EventOutcome, EventTarget, Host, HostError};
pub use registry::{Disposer, ListenerId, ListenerOptions, ListenerRegistry};
pub use timer::{Debouncer, TimerId, TimerQueue};
