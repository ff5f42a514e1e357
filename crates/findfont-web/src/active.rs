#![forbid(unsafe_code)]

//! The one overlay allowed to own widgets on a page.
//!
//! Every `FindFont` handle owns its own controller, but only the handle that
//! most recently claimed the slot may have a button and panel attached.
//! Claiming destroys the previous occupant first.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use findfont_core::OverlayController;
use findfont_core::host::Host;

pub type Shared<H> = Rc<RefCell<OverlayController<H>>>;

/// Weak reference to the live controller.
pub struct ActiveOverlay<H: Host> {
    live: Option<Weak<RefCell<OverlayController<H>>>>,
}

impl<H: Host> Default for ActiveOverlay<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> ActiveOverlay<H> {
    #[must_use]
    pub const fn new() -> Self {
        Self { live: None }
    }

    /// Make `controller` the live overlay, destroying the previous one.
    ///
    /// Claiming again with the live controller does nothing.
    pub fn claim(&mut self, controller: &Shared<H>) {
        let candidate = Rc::downgrade(controller);
        if self.live.as_ref().is_some_and(|live| live.ptr_eq(&candidate)) {
            return;
        }
        if let Some(previous) = self.live.take().and_then(|live| live.upgrade()) {
            match previous.try_borrow_mut() {
                Ok(mut overlay) => overlay.destroy(),
                Err(_) => tracing::warn!("previous overlay busy; left attached"),
            }
        }
        tracing::debug!("overlay slot claimed");
        self.live = Some(candidate);
    }

    /// Whether `controller` is the live overlay.
    #[must_use]
    pub fn is_live(&self, controller: &Shared<H>) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.ptr_eq(&Rc::downgrade(controller)))
    }

    /// Give up the slot if `controller` holds it.
    pub fn release(&mut self, controller: &Shared<H>) {
        if self.is_live(controller) {
            self.live = None;
        }
    }
}
