#![forbid(unsafe_code)]

//! In-memory page for tests.
//!
//! `HeadlessPage` implements [`Host`] over an element arena with a manual
//! clock. The arena is never compacted: removed nodes keep their handles,
//! children and text so tests can inspect them after teardown, and memory
//! grows with every render. It records everything the overlay does to the outside world
//! (listeners, clipboard writes, runtime messages, wake-up requests) so tests
//! can assert on it, and the `OverlayController<HeadlessPage>` helpers at the
//! bottom dispatch events the way a browser would: bubbling events walk from
//! the target up to the document and window, and `stopPropagation` ends the
//! walk after the current node.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use findfont_core::{OverlayConfig, OverlayController, OverlayState, Rect, Size};
//! use findfont_core::headless::HeadlessPage;
//! use findfont_core::host::Host;
//!
//! let mut overlay = OverlayController::new(
//!     HeadlessPage::new(Size::new(1024.0, 768.0)),
//!     OverlayConfig::default(),
//! );
//! overlay.initialize();
//!
//! let page = overlay.host_mut();
//! let body = page.body();
//! let para = page.create_element("p");
//! page.append_child(&body, &para);
//! page.select(&para, "hello", Rect::new(100.0, 200.0, 40.0, 16.0));
//!
//! overlay.mouse_up(para);
//! overlay.advance_time(Duration::from_millis(150));
//! assert_eq!(overlay.state(), OverlayState::ButtonShown);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use crate::controller::OverlayController;
use crate::font::FONT_PROPERTIES;
use crate::geometry::{Rect, Size};
use crate::host::{
    ComputedStyle, DomEvent, EventKind, EventOutcome, EventTarget, Host, HostError,
    SelectionSnapshot,
};
use crate::registry::{ListenerId, ListenerOptions};

/// Handle to an element in a [`HeadlessPage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const BODY: NodeId = NodeId(0);

/// Values resolved for elements nobody styled.
const DEFAULT_STYLE: [(&str, &str); 10] = [
    ("font-family", "\"Times New Roman\""),
    ("font-size", "16px"),
    ("font-weight", "400"),
    ("font-style", "normal"),
    ("text-decoration-line", "none"),
    ("text-decoration-style", "solid"),
    ("text-decoration-thickness", "auto"),
    ("color", "rgb(0, 0, 0)"),
    ("line-height", "normal"),
    ("letter-spacing", "normal"),
];

#[derive(Debug, Default)]
struct Element {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    text: String,
    markup: Option<&'static str>,
    inline: BTreeMap<String, String>,
    /// Author styles that resolve into the computed style (inherited).
    declared: BTreeMap<String, String>,
    layout: Size,
}

#[derive(Debug, Clone, PartialEq)]
struct Listener {
    target: EventTarget<NodeId>,
    kind: EventKind,
    options: ListenerOptions,
}

/// An in-memory document with a manual clock.
#[derive(Debug)]
pub struct HeadlessPage {
    elements: Vec<Element>,
    listeners: BTreeMap<ListenerId, Listener>,
    unlisten_calls: usize,
    viewport: Size,
    now: Duration,
    wakeups: Vec<Duration>,
    selection: Option<SelectionSnapshot<NodeId>>,
    selection_clears: usize,
    hidden: bool,
    runtime: bool,
    clipboard: Vec<String>,
    messages: Vec<String>,
}

impl HeadlessPage {
    /// Empty document (just `<body>`) with an extension runtime.
    #[must_use]
    pub fn new(viewport: Size) -> Self {
        Self {
            elements: vec![Element {
                tag: "body".to_owned(),
                ..Element::default()
            }],
            listeners: BTreeMap::new(),
            unlisten_calls: 0,
            viewport,
            now: Duration::ZERO,
            wakeups: Vec::new(),
            selection: None,
            selection_clears: 0,
            hidden: false,
            runtime: true,
            clipboard: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Drop the extension runtime: runtime listeners and messages fail.
    #[must_use]
    pub fn without_runtime(mut self) -> Self {
        self.runtime = false;
        self
    }

    fn el(&self, node: NodeId) -> &Element {
        &self.elements[node.0]
    }

    fn el_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.elements[node.0]
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.el_mut(node).parent.take() {
            self.el_mut(parent).children.retain(|child| *child != node);
        }
    }

    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), |n| self.el(*n).parent)
    }

    // -- Test setup ----------------------------------------------------------

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Declare an author style on `node`; descendants inherit it.
    pub fn set_declared_style(&mut self, node: &NodeId, property: &str, value: &str) {
        self.el_mut(*node)
            .declared
            .insert(property.to_owned(), value.to_owned());
    }

    /// Layout size reported by `measure` while the element is rendered.
    pub fn set_layout(&mut self, node: &NodeId, size: Size) {
        self.el_mut(*node).layout = size;
    }

    pub fn set_selection(&mut self, selection: Option<SelectionSnapshot<NodeId>>) {
        self.selection = selection;
    }

    /// Select `text` inside `node`, with `rect` as its bounding box.
    pub fn select(&mut self, node: &NodeId, text: &str, rect: Rect) {
        self.selection = Some(SelectionSnapshot {
            text: text.to_owned(),
            rect,
            common_ancestor: Some(*node),
            focus_parent: Some(*node),
        });
    }

    /// Move the clock without running anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = now;
    }

    // -- Inspection ----------------------------------------------------------

    #[must_use]
    pub fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.el(*node).children.clone()
    }

    /// The element's own text (not its descendants').
    #[must_use]
    pub fn text(&self, node: &NodeId) -> String {
        self.el(*node).text.clone()
    }

    /// `textContent`: own text followed by every descendant's, in order.
    #[must_use]
    pub fn text_content(&self, node: &NodeId) -> String {
        let el = self.el(*node);
        let mut out = el.text.clone();
        for child in &el.children {
            out.push_str(&self.text_content(child));
        }
        out
    }

    #[must_use]
    pub fn class_name(&self, node: &NodeId) -> String {
        self.el(*node).classes.join(" ")
    }

    #[must_use]
    pub fn markup(&self, node: &NodeId) -> Option<&'static str> {
        self.el(*node).markup
    }

    /// Attached elements carrying `class`, in document order.
    #[must_use]
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![BODY];
        while let Some(node) = stack.pop() {
            if self.has_class(&node, class) {
                found.push(node);
            }
            stack.extend(self.el(node).children.iter().rev());
        }
        found
    }

    /// First attached element with the given id, in document order.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut stack = vec![BODY];
        while let Some(node) = stack.pop() {
            if self.el(node).attributes.get("id").map(String::as_str) == Some(id) {
                return Some(node);
            }
            stack.extend(self.el(node).children.iter().rev());
        }
        None
    }

    /// Whether the element and all its ancestors are displayed.
    #[must_use]
    pub fn is_displayed(&self, node: &NodeId) -> bool {
        self.is_attached(node)
            && self
                .ancestors(*node)
                .all(|n| self.el(n).inline.get("display").map(String::as_str) != Some("none"))
    }

    #[must_use]
    pub fn attached_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Listeners for `kind` on `target`, in registration order.
    #[must_use]
    pub fn listeners_on(&self, target: &EventTarget<NodeId>, kind: EventKind) -> Vec<ListenerId> {
        self.listeners
            .iter()
            .filter(|(_, l)| l.kind == kind && l.target == *target)
            .map(|(id, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn listener_options(&self, id: ListenerId) -> Option<ListenerOptions> {
        self.listeners.get(&id).map(|l| l.options)
    }

    #[must_use]
    pub fn unlisten_calls(&self) -> usize {
        self.unlisten_calls
    }

    #[must_use]
    pub fn selection_clears(&self) -> usize {
        self.selection_clears
    }

    #[must_use]
    pub fn clipboard_writes(&self) -> &[String] {
        &self.clipboard
    }

    #[must_use]
    pub fn posted_messages(&self) -> &[String] {
        &self.messages
    }

    /// Earliest requested wake-up at or before `limit`.
    fn take_wakeup_until(&mut self, limit: Duration) -> Option<Duration> {
        let (pos, deadline) = self
            .wakeups
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, deadline)| *deadline <= limit)
            .min_by_key(|(_, deadline)| *deadline)?;
        self.wakeups.swap_remove(pos);
        Some(deadline)
    }

    /// Nodes an event visits, target first.
    fn propagation_path(&self, target: NodeId, kind: EventKind) -> Vec<EventTarget<NodeId>> {
        if !kind.bubbles() {
            return vec![EventTarget::Element(target)];
        }
        let mut path: Vec<_> = self.ancestors(target).map(EventTarget::Element).collect();
        if self.is_attached(&target) {
            path.push(EventTarget::Document);
            path.push(EventTarget::Window);
        }
        path
    }
}

impl Host for HeadlessPage {
    type Node = NodeId;

    fn body(&self) -> NodeId {
        BODY
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.elements.push(Element {
            tag: tag.to_owned(),
            ..Element::default()
        });
        NodeId(self.elements.len() - 1)
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.detach(*child);
        self.el_mut(*child).parent = Some(*parent);
        self.el_mut(*parent).children.push(*child);
    }

    fn remove(&mut self, node: &NodeId) {
        self.detach(*node);
    }

    fn clear_children(&mut self, node: &NodeId) {
        for child in std::mem::take(&mut self.el_mut(*node).children) {
            self.el_mut(child).parent = None;
        }
        let el = self.el_mut(*node);
        el.text.clear();
        el.markup = None;
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.el(*node).parent
    }

    fn is_attached(&self, node: &NodeId) -> bool {
        self.ancestors(*node).any(|n| n == BODY)
    }


    fn tag_name(&self, node: &NodeId) -> String {
        self.el(*node).tag.clone()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        if name == "class" {
            return Some(self.class_name(node));
        }
        self.el(*node).attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if name == "class" {
            self.set_class_name(node, value);
            return;
        }
        self.el_mut(*node)
            .attributes
            .insert(name.to_owned(), value.to_owned());
    }

    fn set_id(&mut self, node: &NodeId, id: &str) {
        self.set_attribute(node, "id", id);
    }

    fn set_class_name(&mut self, node: &NodeId, class: &str) {
        self.el_mut(*node).classes = class.split_whitespace().map(str::to_owned).collect();
    }

    fn add_class(&mut self, node: &NodeId, class: &str) {
        if !self.has_class(node, class) {
            self.el_mut(*node).classes.push(class.to_owned());
        }
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) {
        self.el_mut(*node).classes.retain(|c| c != class);
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.el(*node).classes.iter().any(|c| c == class)
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        self.clear_children(node);
        self.el_mut(*node).text = text.to_owned();
    }

    fn set_markup(&mut self, node: &NodeId, markup: &'static str) {
        self.clear_children(node);
        self.el_mut(*node).markup = Some(markup);
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) {
        self.el_mut(*node)
            .inline
            .insert(property.to_owned(), value.to_owned());
    }

    fn style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.el(*node).inline.get(property).cloned()
    }

    fn viewport(&self) -> Size {
        self.viewport
    }

    fn measure(&self, node: &NodeId) -> Size {
        if self.is_displayed(node) {
            self.el(*node).layout
        } else {
            Size::default()
        }
    }

    fn selection(&self) -> Option<SelectionSnapshot<NodeId>> {
        self.selection.clone()
    }

    fn clear_selection(&mut self) {
        self.selection = None;
        self.selection_clears += 1;
    }

    fn is_document_hidden(&self) -> bool {
        self.hidden
    }

    fn computed_style(&self, node: &NodeId) -> Result<ComputedStyle, HostError> {
        if !self.is_attached(node) {
            return Err(HostError::Detached);
        }
        let mut style = ComputedStyle::new();
        for property in FONT_PROPERTIES {
            let declared = self
                .ancestors(*node)
                .find_map(|n| self.el(n).declared.get(property).cloned());
            let fallback = DEFAULT_STYLE
                .iter()
                .find(|(name, _)| *name == property)
                .map(|(_, value)| (*value).to_owned());
            if let Some(value) = declared.or(fallback) {
                style.set(property, value);
            }
        }
        Ok(style)
    }

    fn now(&self) -> Duration {
        self.now
    }

    fn listen(
        &mut self,
        id: ListenerId,
        target: &EventTarget<NodeId>,
        kind: EventKind,
        options: ListenerOptions,
    ) -> Result<(), HostError> {
        if *target == EventTarget::Runtime && !self.runtime {
            return Err(HostError::Unavailable("extension runtime"));
        }
        self.listeners.insert(
            id,
            Listener {
                target: target.clone(),
                kind,
                options,
            },
        );
        Ok(())
    }

    fn unlisten(&mut self, id: ListenerId) {
        self.unlisten_calls += 1;
        self.listeners.remove(&id);
    }

    fn write_clipboard(&mut self, text: &str) {
        self.clipboard.push(text.to_owned());
    }

    fn post_message(&mut self, json: &str) -> Result<(), HostError> {
        if !self.runtime {
            return Err(HostError::Unavailable("extension runtime"));
        }
        self.messages.push(json.to_owned());
        Ok(())
    }

    fn request_wakeup(&mut self, delay: Duration) {
        self.wakeups.push(self.now.saturating_add(delay));
    }
}

/// Browser-like event dispatch and clock control for tests.
impl OverlayController<HeadlessPage> {
    /// Deliver `kind` along `path`, honouring `stopPropagation`.
    fn deliver(
        &mut self,
        path: Vec<EventTarget<NodeId>>,
        kind: EventKind,
        target: Option<NodeId>,
        payload: Option<&str>,
    ) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        for stage in path {
            let mut stopped = false;
            for listener in self.host().listeners_on(&stage, kind) {
                // An earlier handler may have removed this one.
                if self.host().listener_options(listener).is_none() {
                    continue;
                }
                let outcome = self.handle_event(DomEvent {
                    listener,
                    kind,
                    target,
                    payload: payload.map(str::to_owned),
                });
                stopped |= outcome.stop_propagation;
                outcomes.push(outcome);
            }
            if stopped {
                break;
            }
        }
        outcomes
    }

    /// Fire `kind` at an element, bubbling when the event bubbles.
    pub fn dispatch_on(&mut self, node: NodeId, kind: EventKind) -> Vec<EventOutcome> {
        let path = self.host().propagation_path(node, kind);
        self.deliver(path, kind, Some(node), None)
    }

    pub fn click(&mut self, node: NodeId) -> Vec<EventOutcome> {
        self.dispatch_on(node, EventKind::Click)
    }

    pub fn mouse_up(&mut self, node: NodeId) -> Vec<EventOutcome> {
        self.dispatch_on(node, EventKind::MouseUp)
    }

    pub fn hover(&mut self, node: NodeId) {
        self.dispatch_on(node, EventKind::MouseEnter);
    }

    pub fn unhover(&mut self, node: NodeId) {
        self.dispatch_on(node, EventKind::MouseLeave);
    }

    /// Change the viewport and fire `resize` on the window.
    pub fn resize(&mut self, viewport: Size) {
        self.host_mut().set_viewport(viewport);
        self.deliver(vec![EventTarget::Window], EventKind::Resize, None, None);
    }

    /// Flip document visibility and fire `visibilitychange`.
    pub fn set_document_hidden(&mut self, hidden: bool) {
        self.host_mut().set_hidden(hidden);
        self.deliver(
            vec![EventTarget::Document],
            EventKind::VisibilityChange,
            None,
            None,
        );
    }

    pub fn unload(&mut self) {
        self.deliver(vec![EventTarget::Window], EventKind::BeforeUnload, None, None);
    }

    pub fn suspend_runtime(&mut self) {
        self.deliver(vec![EventTarget::Runtime], EventKind::Suspend, None, None);
    }

    /// Deliver a runtime message; returns the first reply, if any.
    pub fn send_runtime_message(&mut self, json: &str) -> Option<String> {
        self.deliver(vec![EventTarget::Runtime], EventKind::Message, None, Some(json))
            .into_iter()
            .find_map(|outcome| outcome.response)
    }

    /// Advance the clock by `delta`, waking the controller at every requested
    /// deadline on the way.
    pub fn advance_time(&mut self, delta: Duration) {
        let target = self.host().now().saturating_add(delta);
        while let Some(deadline) = self.host_mut().take_wakeup_until(target) {
            let now = self.host().now().max(deadline);
            self.host_mut().set_now(now);
            self.on_wakeup();
        }
        self.host_mut().set_now(target);
    }
}
