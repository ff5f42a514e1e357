#![forbid(unsafe_code)]

//! The page surface the overlay runs against.
//!
//! [`Host`] is the only way the core reads or mutates the page. A host is
//! single-threaded and driven by its own event loop: it forwards events as
//! [`DomEvent`]s, applies the returned [`EventOutcome`], and calls back when a
//! requested wake-up elapses.
//!
//! # Failure Modes
//! - Style reads on detached elements return [`HostError::Detached`].
//! - Hosts without an extension runtime return [`HostError::Unavailable`] for
//!   `Runtime` listeners and outgoing messages; callers log and carry on.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::geometry::{Rect, Size};
use crate::registry::{ListenerId, ListenerOptions};

/// Errors reported by a [`Host`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The requested capability does not exist on this page.
    Unavailable(&'static str),
    /// The element is not attached to the document.
    Detached,
    /// A script-level failure with its message.
    Js(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(what) => write!(f, "{what} is unavailable"),
            Self::Detached => write!(f, "element is detached from the document"),
            Self::Js(msg) => write!(f, "script error: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Where a listener is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget<N> {
    Window,
    Document,
    Element(N),
    /// The extension messaging channel.
    Runtime,
}

/// Events the overlay subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    MouseUp,
    MouseEnter,
    MouseLeave,
    Resize,
    BeforeUnload,
    VisibilityChange,
    /// Incoming runtime message (payload carries the JSON body).
    Message,
    /// Extension is about to be suspended.
    Suspend,
}

impl EventKind {
    /// DOM event type name.
    #[must_use]
    pub const fn dom_name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::MouseUp => "mouseup",
            Self::MouseEnter => "mouseenter",
            Self::MouseLeave => "mouseleave",
            Self::Resize => "resize",
            Self::BeforeUnload => "beforeunload",
            Self::VisibilityChange => "visibilitychange",
            Self::Message => "message",
            Self::Suspend => "suspend",
        }
    }

    /// Whether the event bubbles from the target to its ancestors.
    #[must_use]
    pub const fn bubbles(self) -> bool {
        matches!(self, Self::Click | Self::MouseUp)
    }
}

/// An event delivered to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent<N> {
    /// Registration that fired.
    pub listener: ListenerId,
    pub kind: EventKind,
    /// `event.target`, when it is an element.
    pub target: Option<N>,
    /// Message body for [`EventKind::Message`].
    pub payload: Option<String>,
}

/// What the host should do after dispatching an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Call `stopPropagation()` on the DOM event.
    pub stop_propagation: bool,
    /// Reply to a runtime message (JSON).
    pub response: Option<String>,
}

impl EventOutcome {
    #[must_use]
    pub fn stop() -> Self {
        Self {
            stop_propagation: true,
            response: None,
        }
    }

    #[must_use]
    pub fn respond(response: String) -> Self {
        Self {
            stop_propagation: false,
            response: Some(response),
        }
    }
}

/// Resolved style properties of an element, keyed by CSS property name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl ComputedStyle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// State of the active selection at the time it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot<N> {
    /// `selection.toString()`.
    pub text: String,
    /// Bounding rectangle of the first range.
    pub rect: Rect,
    /// Element containing the whole first range.
    pub common_ancestor: Option<N>,
    /// Parent element of the focus node.
    pub focus_parent: Option<N>,
}

/// Page capabilities used by the overlay.
pub trait Host {
    /// Opaque element handle.
    type Node: Clone + PartialEq + fmt::Debug;

    // -- Tree ----------------------------------------------------------------

    fn body(&self) -> Self::Node;
    fn create_element(&mut self, tag: &str) -> Self::Node;
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);
    /// Detach `node` from its parent. No-op when already detached.
    fn remove(&mut self, node: &Self::Node);
    fn clear_children(&mut self, node: &Self::Node);
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    /// Whether `node` is connected to the document.
    fn is_attached(&self, node: &Self::Node) -> bool;

    // -- Element state -------------------------------------------------------

    fn tag_name(&self, node: &Self::Node) -> String;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn set_id(&mut self, node: &Self::Node, id: &str);
    fn set_class_name(&mut self, node: &Self::Node, class: &str);
    fn add_class(&mut self, node: &Self::Node, class: &str);
    fn remove_class(&mut self, node: &Self::Node, class: &str);
    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    fn set_text(&mut self, node: &Self::Node, text: &str);
    /// Replace the element's children with built-in markup (icons).
    fn set_markup(&mut self, node: &Self::Node, markup: &'static str);
    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str);
    fn style(&self, node: &Self::Node, property: &str) -> Option<String>;

    // -- Environment ---------------------------------------------------------

    fn viewport(&self) -> Size;
    /// Layout size of `node`; zero when it is not rendered.
    fn measure(&self, node: &Self::Node) -> Size;
    fn selection(&self) -> Option<SelectionSnapshot<Self::Node>>;
    fn clear_selection(&mut self);
    fn is_document_hidden(&self) -> bool;
    fn computed_style(&self, node: &Self::Node) -> Result<ComputedStyle, HostError>;
    /// Monotonic clock.
    fn now(&self) -> Duration;

    // -- Effects -------------------------------------------------------------

    fn listen(
        &mut self,
        id: ListenerId,
        target: &EventTarget<Self::Node>,
        kind: EventKind,
        options: ListenerOptions,
    ) -> Result<(), HostError>;
    fn unlisten(&mut self, id: ListenerId);
    /// One-shot clipboard write; completion is not observed.
    fn write_clipboard(&mut self, text: &str);
    /// Post a JSON message to the extension runtime.
    fn post_message(&mut self, json: &str) -> Result<(), HostError>;
    /// Ask to be woken (via the controller's `on_wakeup`) after `delay`.
    fn request_wakeup(&mut self, delay: Duration);
}

/// `element.closest(...)`-style ancestor walk, including `node` itself.
pub fn closest<H: Host>(
    host: &H,
    node: &H::Node,
    mut predicate: impl FnMut(&H, &H::Node) -> bool,
) -> Option<H::Node> {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if predicate(host, &candidate) {
            return Some(candidate);
        }
        current = host.parent(&candidate);
    }
    None
}

/// True for `input`, `textarea` and `[contenteditable="true"]` elements.
pub fn is_editable<H: Host>(host: &H, node: &H::Node) -> bool {
    let tag = host.tag_name(node).to_ascii_lowercase();
    tag == "input"
        || tag == "textarea"
        || host.attribute(node, "contenteditable").as_deref() == Some("true")
}

/// True when `node` sits inside an editable element.
pub fn within_editable<H: Host>(host: &H, node: &H::Node) -> bool {
    closest(host, node, is_editable::<H>).is_some()
}
