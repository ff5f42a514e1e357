#![forbid(unsafe_code)]

//! Activation lifecycle of the selection overlay.
//!
//! ```text
//!           selection settles            button click
//!   Idle ─────────────────────▶ ButtonShown ──────────▶ PanelOpen
//!    ▲ ◀──── empty selection ──     ▲ ◀──── button click ───┘ │
//!    └──────────── close button / outside click ──────────────┘
//!
//!   any ── unload / hidden / suspend / cleanup ──▶ Destroyed
//! ```
//!
//! The controller owns every piece of mutable overlay state: the host, the
//! widgets, the listener registry, pending timers and the last detected font.
//! Hosts feed it [`DomEvent`]s and timer wake-ups; nothing else mutates it.
//!
//! # Invariants
//!
//! 1. At most one floating button and one info panel are attached, whatever
//!    the number of `initialize` calls.
//! 2. After [`OverlayController::destroy`] the registry is empty, no timer is
//!    pending and neither widget is attached. Further calls are no-ops.
//! 3. The outside-click listener exists exactly while the panel is open.
//! 4. Selections inside editable elements or inside the overlay itself never
//!    show the button.
//!
//! # Failure Modes
//! - Style extraction failures and missing panel content are logged; the
//!   current pass is abandoned and state is left as it was.
//! - A missing extension runtime only disables publishing and the runtime
//!   listeners.
//! - Events for listeners that were already removed are ignored.

use std::time::Duration;

use crate::config::OverlayConfig;
use crate::font::{ComputedFontInfo, copy_all_text, extract_font_info};
use crate::geometry::{Point, Rect, clamp_button, position_button, position_panel, px};
use crate::host::{DomEvent, EventKind, EventOutcome, EventTarget, Host, closest, within_editable};
use crate::message::{ControlRequest, ControlResponse, ExtensionMessage, parse_control_request};
use crate::panel::PanelRenderer;
use crate::registry::{Disposer, ListenerOptions, ListenerRegistry};
use crate::timer::{Debouncer, TimerId, TimerQueue};
use crate::widgets::{
    BUTTON_CLASS, COPIED_CLASS, FloatingButton, InfoPanel, OverlayRegistry, PANEL_CLASS,
    SHOW_CLASS, create_floating_button, create_info_panel, set_copy_visible,
};

/// Overlay lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayState {
    /// Widgets attached but hidden.
    Idle,
    /// Selection active; button visible, panel hidden.
    ButtonShown,
    /// Button and panel visible.
    PanelOpen,
    /// Nothing attached. Also the state before the first `initialize`.
    Destroyed,
}

impl OverlayState {
    #[must_use]
    pub const fn button_visible(self) -> bool {
        matches!(self, Self::ButtonShown | Self::PanelOpen)
    }
}

/// What a registered listener does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<N> {
    ButtonClick,
    CloseClick,
    DocumentMouseUp,
    /// Document click while the panel is open.
    OutsideClick,
    Resize,
    BeforeUnload,
    VisibilityChange,
    RuntimeMessage,
    RuntimeSuspend,
    /// Hover affordance for a copy button.
    RevealCopy {
        button: N,
        visible: bool,
        /// Ignore a hide request while the button shows its `copied` state.
        keep_while_copied: bool,
    },
    CopyProperty {
        button: N,
        text: String,
    },
    /// Copy the five-line block for the last detected font.
    CopyAll {
        button: N,
    },
    ToggleFallbacks,
}

#[derive(Debug, Clone, PartialEq)]
enum TimerTask<N> {
    /// Debounced mouse-up: read the selection.
    SelectionSettled { target: Option<N> },
    /// Hide transition over: hide the panel and drain its content.
    PanelHideFinish,
    ClearSelection,
    ClearCopied { button: N },
}

#[derive(Debug)]
struct Widgets<N> {
    button: FloatingButton<N>,
    panel: InfoPanel<N>,
    /// Header hover handlers. Live exactly as long as the panel.
    panel_hover: Disposer,
    /// Lifecycle, button, close and runtime handlers.
    lifecycle: Disposer,
}

/// Selection overlay state machine over a [`Host`].
#[derive(Debug)]
pub struct OverlayController<H: Host> {
    host: H,
    config: OverlayConfig,
    state: OverlayState,
    registry: OverlayRegistry<H::Node>,
    timers: TimerQueue<TimerTask<H::Node>>,
    debouncer: Debouncer,
    widgets: Option<Widgets<H::Node>>,
    renderer: PanelRenderer<H::Node>,
    outside_click: Option<Disposer>,
    hide_timer: Option<TimerId>,
    last_detected: Option<ComputedFontInfo>,
    button_origin: Point,
}

/// True when `node` is, or sits inside, the button or the panel.
fn within_overlay<H: Host>(host: &H, node: &H::Node) -> bool {
    closest(host, node, |h, n| {
        h.has_class(n, BUTTON_CLASS) || h.has_class(n, PANEL_CLASS)
    })
    .is_some()
}

impl<H: Host> OverlayController<H> {
    /// Wrap `host`. Nothing is attached until [`initialize`](Self::initialize).
    pub fn new(host: H, config: OverlayConfig) -> Self {
        let debouncer = Debouncer::new(config.debounce);
        Self {
            host,
            config,
            state: OverlayState::Destroyed,
            registry: ListenerRegistry::new(),
            timers: TimerQueue::new(),
            debouncer,
            widgets: None,
            renderer: PanelRenderer::new(),
            outside_click: None,
            hide_timer: None,
            last_detected: None,
            button_origin: Point::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> OverlayState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Most recent successful detection.
    #[must_use]
    pub fn last_detected(&self) -> Option<&ComputedFontInfo> {
        self.last_detected.as_ref()
    }

    /// Live listener registrations.
    #[must_use]
    pub fn attached_listeners(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Sections currently rendered in the panel.
    #[must_use]
    pub fn panel_sections(&self) -> usize {
        self.renderer.cleanup_len()
    }

    #[must_use]
    pub fn outside_click_active(&self) -> bool {
        self.outside_click.is_some()
    }

    #[must_use]
    pub fn button_origin(&self) -> Point {
        self.button_origin
    }

    #[must_use]
    pub fn button_node(&self) -> Option<&H::Node> {
        self.widgets.as_ref().map(|w| &w.button.node)
    }

    #[must_use]
    pub fn panel(&self) -> Option<&InfoPanel<H::Node>> {
        self.widgets.as_ref().map(|w| &w.panel)
    }

    /// Build and attach a fresh widget set.
    ///
    /// An existing instance is torn down first, so repeated calls never
    /// leave two buttons or two panels behind.
    pub fn initialize(&mut self) {
        let _span = tracing::debug_span!("overlay_initialize").entered();
        if self.widgets.is_some() {
            tracing::debug!("tearing down previous overlay instance");
            self.teardown();
        }

        let button = create_floating_button(&mut self.host);
        let panel = create_info_panel(&mut self.host, &mut self.registry);
        self.host.set_style(&button.node, "display", "none");
        self.host.set_style(&panel.widget.panel, "display", "none");
        let body = self.host.body();
        self.host.append_child(&body, &button.node);
        self.host.append_child(&body, &panel.widget.panel);

        let bindings = [
            (
                EventTarget::Element(panel.widget.close.clone()),
                EventKind::Click,
                Action::CloseClick,
            ),
            (
                EventTarget::Element(button.node.clone()),
                EventKind::Click,
                Action::ButtonClick,
            ),
            (EventTarget::Document, EventKind::MouseUp, Action::DocumentMouseUp),
            (EventTarget::Window, EventKind::Resize, Action::Resize),
            (EventTarget::Window, EventKind::BeforeUnload, Action::BeforeUnload),
            (
                EventTarget::Document,
                EventKind::VisibilityChange,
                Action::VisibilityChange,
            ),
            (EventTarget::Runtime, EventKind::Message, Action::RuntimeMessage),
            (EventTarget::Runtime, EventKind::Suspend, Action::RuntimeSuspend),
        ];
        let mut lifecycle = Disposer::empty();
        for (target, kind, action) in bindings {
            lifecycle.absorb(self.registry.add(
                &mut self.host,
                target,
                kind,
                ListenerOptions::empty(),
                action,
            ));
        }

        self.widgets = Some(Widgets {
            button,
            panel: panel.widget,
            panel_hover: panel.disposer,
            lifecycle,
        });
        self.transition(OverlayState::Idle);
        tracing::debug!(listeners = self.registry.len(), "overlay initialized");
    }

    /// Detach every listener and node. Idempotent.
    pub fn destroy(&mut self) {
        if self.widgets.is_none() {
            tracing::debug!("overlay already destroyed");
            return;
        }
        let _span = tracing::debug_span!("overlay_destroy").entered();
        self.teardown();
        self.last_detected = None;
        self.transition(OverlayState::Destroyed);
    }

    fn teardown(&mut self) {
        self.debouncer.cancel(&mut self.timers);
        self.timers.clear();
        self.hide_timer = None;
        self.remove_outside_click();
        if let Some(widgets) = self.widgets.take() {
            self.renderer
                .teardown(&mut self.host, &mut self.registry, &widgets.panel.content);
            widgets.panel_hover.dispose(&mut self.registry, &mut self.host);
            widgets.lifecycle.dispose(&mut self.registry, &mut self.host);
            self.host.remove(&widgets.button.node);
            self.host.remove(&widgets.panel.panel);
        }
        self.registry.remove_all(&mut self.host);
    }

    /// Dispatch one host event.
    pub fn handle_event(&mut self, event: DomEvent<H::Node>) -> EventOutcome {
        if self.state == OverlayState::Destroyed {
            return EventOutcome::default();
        }
        let Some(action) = self
            .registry
            .get(event.listener)
            .map(|registration| registration.action.clone())
        else {
            tracing::debug!(
                listener = event.listener.0,
                event = event.kind.dom_name(),
                "event for removed listener ignored"
            );
            return EventOutcome::default();
        };

        match action {
            Action::ButtonClick => {
                self.toggle_panel();
                EventOutcome::stop()
            }
            Action::CloseClick => {
                self.dismiss();
                EventOutcome::stop()
            }
            Action::DocumentMouseUp => {
                self.on_mouse_up(event.target);
                EventOutcome::default()
            }
            Action::OutsideClick => {
                self.on_document_click(event.target.as_ref());
                EventOutcome::default()
            }
            Action::Resize => {
                self.reposition();
                EventOutcome::default()
            }
            Action::BeforeUnload | Action::RuntimeSuspend => {
                self.destroy();
                EventOutcome::default()
            }
            Action::VisibilityChange => {
                if self.host.is_document_hidden() {
                    self.destroy();
                }
                EventOutcome::default()
            }
            Action::RuntimeMessage => self.on_runtime_message(event.payload.as_deref()),
            Action::RevealCopy {
                button,
                visible,
                keep_while_copied,
            } => {
                let pinned = keep_while_copied && self.host.has_class(&button, COPIED_CLASS);
                if visible || !pinned {
                    set_copy_visible(&mut self.host, &button, visible);
                }
                EventOutcome::default()
            }
            Action::CopyProperty { button, text } => {
                self.copy(&button, &text);
                EventOutcome::stop()
            }
            Action::CopyAll { button } => {
                if let Some(text) = self.last_detected.as_ref().map(copy_all_text) {
                    self.copy(&button, &text);
                }
                EventOutcome::stop()
            }
            Action::ToggleFallbacks => {
                self.renderer.toggle_fallbacks(&mut self.host);
                EventOutcome::stop()
            }
        }
    }

    /// Run every timer that is due at the host's current time.
    pub fn on_wakeup(&mut self) {
        let now = self.host.now();
        while let Some(task) = self.timers.pop_due(now) {
            self.run_task(task);
        }
        if let Some(deadline) = self.timers.next_deadline() {
            self.host.request_wakeup(deadline.saturating_sub(now));
        }
    }

    fn run_task(&mut self, task: TimerTask<H::Node>) {
        match task {
            TimerTask::SelectionSettled { target } => {
                self.debouncer.fired();
                self.detect_selection(target.as_ref());
            }
            TimerTask::PanelHideFinish => {
                self.hide_timer = None;
                self.finish_panel_hide();
            }
            TimerTask::ClearSelection => self.host.clear_selection(),
            TimerTask::ClearCopied { button } => self.host.remove_class(&button, COPIED_CLASS),
        }
    }

    fn schedule(&mut self, delay: Duration, task: TimerTask<H::Node>) -> TimerId {
        let id = self.timers.schedule(self.host.now(), delay, task);
        self.host.request_wakeup(delay);
        id
    }

    fn transition(&mut self, next: OverlayState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "overlay state");
            self.state = next;
        }
    }

    fn is_guarded(&self, node: &H::Node) -> bool {
        within_editable(&self.host, node) || within_overlay(&self.host, node)
    }

    fn on_mouse_up(&mut self, target: Option<H::Node>) {
        if target.as_ref().is_some_and(|node| self.is_guarded(node)) {
            tracing::debug!("mouseup inside editable area or overlay ignored");
            return;
        }
        let now = self.host.now();
        self.debouncer
            .schedule(&mut self.timers, now, TimerTask::SelectionSettled { target });
        self.host.request_wakeup(self.debouncer.delay());
    }

    fn detect_selection(&mut self, target: Option<&H::Node>) {
        let _span = tracing::debug_span!("font_detection").entered();
        let Some(selection) = self
            .host
            .selection()
            .filter(|selection| !selection.text.trim().is_empty())
        else {
            self.collapse();
            return;
        };

        let in_editable = selection
            .common_ancestor
            .as_ref()
            .is_some_and(|node| within_editable(&self.host, node));
        if in_editable || target.is_some_and(|node| self.is_guarded(node)) {
            tracing::debug!("selection inside editable area or overlay ignored");
            return;
        }

        self.show_button(selection.rect);

        let Some(element) = selection.focus_parent else {
            tracing::debug!("selection has no focus element");
            return;
        };
        let Some(info) = extract_font_info(&self.host, &element) else {
            return;
        };
        tracing::debug!(family = %info.font_family, size = %info.font_size, "font detected");
        self.publish(&info);
        self.last_detected = Some(info);
        if self.state == OverlayState::PanelOpen {
            self.render_panel();
            self.place_panel();
        }
    }

    fn publish(&mut self, info: &ComputedFontInfo) {
        let message = ExtensionMessage::FontDetected {
            font_info: info.clone(),
        };
        match message.to_json() {
            Ok(json) => {
                if let Err(err) = self.host.post_message(&json) {
                    tracing::warn!(error = %err, "font detection not published");
                }
            }
            Err(err) => tracing::warn!(error = %err, "font detection not encoded"),
        }
    }

    fn on_runtime_message(&mut self, payload: Option<&str>) -> EventOutcome {
        let Some(json) = payload else {
            return EventOutcome::default();
        };
        match parse_control_request(json) {
            Ok(Some(ControlRequest::Cleanup)) => {
                self.destroy();
                match (ControlResponse { success: true }).to_json() {
                    Ok(reply) => EventOutcome::respond(reply),
                    Err(err) => {
                        tracing::warn!(error = %err, "cleanup reply not encoded");
                        EventOutcome::default()
                    }
                }
            }
            Ok(None) => {
                tracing::debug!("runtime message not addressed to overlay");
                EventOutcome::default()
            }
            Err(err) => {
                tracing::debug!(error = %err, "malformed runtime message ignored");
                EventOutcome::default()
            }
        }
    }

    fn place_button(&mut self, button: &H::Node) {
        self.host.set_style(button, "left", &px(self.button_origin.left));
        self.host.set_style(button, "top", &px(self.button_origin.top));
    }

    fn show_button(&mut self, selection: Rect) {
        let Some(button) = self.widgets.as_ref().map(|w| w.button.node.clone()) else {
            return;
        };
        self.button_origin = position_button(selection, self.host.viewport(), &self.config);
        self.place_button(&button);
        self.host.set_style(&button, "display", "flex");
        match self.state {
            OverlayState::Idle => self.transition(OverlayState::ButtonShown),
            OverlayState::PanelOpen => self.place_panel(),
            OverlayState::ButtonShown | OverlayState::Destroyed => {}
        }
    }

    fn place_panel(&mut self) {
        let Some(panel) = self.widgets.as_ref().map(|w| w.panel.panel.clone()) else {
            return;
        };
        let measured = self.host.measure(&panel);
        let placement = position_panel(
            self.button_origin,
            measured,
            self.host.viewport(),
            &self.config,
        );
        self.host.set_style(&panel, "left", &px(placement.origin.left));
        self.host.set_style(&panel, "top", &px(placement.origin.top));
        tracing::debug!(side = ?placement.side, "panel placed");
    }

    fn render_panel(&mut self) {
        let (Some(widgets), Some(info)) = (self.widgets.as_ref(), self.last_detected.as_ref())
        else {
            return;
        };
        if let Err(err) = self.renderer.render(
            &mut self.host,
            &mut self.registry,
            &widgets.panel,
            info,
            &self.config,
        ) {
            tracing::warn!(error = %err, "panel render skipped");
        }
    }

    fn open_panel(&mut self) {
        let Some(panel) = self.widgets.as_ref().map(|w| w.panel.panel.clone()) else {
            return;
        };
        if let Some(id) = self.hide_timer.take() {
            self.timers.cancel(id);
        }
        self.host.set_style(&panel, "display", "block");
        self.host.add_class(&panel, SHOW_CLASS);
        self.transition(OverlayState::PanelOpen);
        self.render_panel();
        self.place_panel();
        self.add_outside_click();
    }

    /// Start the hide transition. Content is drained when it completes.
    fn hide_panel(&mut self) {
        let Some(panel) = self.widgets.as_ref().map(|w| w.panel.panel.clone()) else {
            return;
        };
        self.host.remove_class(&panel, SHOW_CLASS);
        if let Some(id) = self.hide_timer.take() {
            self.timers.cancel(id);
        }
        let delay = self.config.hide_delay;
        self.hide_timer = Some(self.schedule(delay, TimerTask::PanelHideFinish));
        self.remove_outside_click();
    }

    fn finish_panel_hide(&mut self) {
        let Some((panel, content)) = self
            .widgets
            .as_ref()
            .map(|w| (w.panel.panel.clone(), w.panel.content.clone()))
        else {
            return;
        };
        self.host.set_style(&panel, "display", "none");
        self.renderer
            .clear(&mut self.host, &mut self.registry, &content);
    }

    fn toggle_panel(&mut self) {
        match self.state {
            OverlayState::PanelOpen => {
                self.hide_panel();
                self.transition(OverlayState::ButtonShown);
            }
            OverlayState::ButtonShown => self.open_panel(),
            OverlayState::Idle | OverlayState::Destroyed => {
                tracing::debug!(state = ?self.state, "button click ignored");
            }
        }
    }

    /// Close button or outside click: hide both widgets and return to Idle.
    fn dismiss(&mut self) {
        if !self.state.button_visible() {
            return;
        }
        let Some(button) = self.widgets.as_ref().map(|w| w.button.node.clone()) else {
            return;
        };
        if self.state == OverlayState::PanelOpen {
            self.hide_panel();
        }
        self.host.set_style(&button, "display", "none");
        let delay = self.config.selection_clear_delay;
        self.schedule(delay, TimerTask::ClearSelection);
        self.transition(OverlayState::Idle);
    }

    fn on_document_click(&mut self, target: Option<&H::Node>) {
        if self.state != OverlayState::PanelOpen {
            return;
        }
        if target.is_some_and(|node| self.is_guarded(node)) {
            return;
        }
        self.dismiss();
    }

    /// Selection went empty: hide everything at once and drain the panel.
    fn collapse(&mut self) {
        let Some(widgets) = self.widgets.as_ref() else {
            return;
        };
        let (button, panel, content) = (
            widgets.button.node.clone(),
            widgets.panel.panel.clone(),
            widgets.panel.content.clone(),
        );
        self.host.set_style(&button, "display", "none");
        self.host.remove_class(&panel, SHOW_CLASS);
        self.host.set_style(&panel, "display", "none");
        if let Some(id) = self.hide_timer.take() {
            self.timers.cancel(id);
        }
        self.remove_outside_click();
        self.renderer
            .clear(&mut self.host, &mut self.registry, &content);
        self.transition(OverlayState::Idle);
    }

    fn reposition(&mut self) {
        if !self.state.button_visible() {
            return;
        }
        let Some(button) = self.widgets.as_ref().map(|w| w.button.node.clone()) else {
            return;
        };
        self.button_origin = clamp_button(self.button_origin, self.host.viewport(), &self.config);
        self.place_button(&button);
        if self.state == OverlayState::PanelOpen {
            self.place_panel();
        }
    }

    fn add_outside_click(&mut self) {
        if self.outside_click.is_some() {
            return;
        }
        self.outside_click = Some(self.registry.add(
            &mut self.host,
            EventTarget::Document,
            EventKind::Click,
            ListenerOptions::empty(),
            Action::OutsideClick,
        ));
    }

    fn remove_outside_click(&mut self) {
        if let Some(disposer) = self.outside_click.take() {
            disposer.dispose(&mut self.registry, &mut self.host);
        }
    }

    fn copy(&mut self, button: &H::Node, text: &str) {
        self.host.write_clipboard(text);
        self.host.add_class(button, COPIED_CLASS);
        let delay = self.config.copied_feedback;
        self.schedule(
            delay,
            TimerTask::ClearCopied {
                button: button.clone(),
            },
        );
    }
}
