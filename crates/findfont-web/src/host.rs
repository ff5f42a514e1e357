#![forbid(unsafe_code)]

//! [`Host`] over the live page via `web-sys`.
//!
//! DOM listeners are `gloo` [`EventListener`]s keyed by [`ListenerId`];
//! dropping one detaches it. Extension runtime listeners go through
//! `chrome.runtime.onMessage` / `onSuspend`, looked up with `Reflect` so
//! pages without an extension context report [`HostError::Unavailable`].
//!
//! Callbacks hold a [`Weak`] handle to the controller and borrow it only
//! for the duration of one dispatch. An event that arrives while the
//! controller is already borrowed is dropped; a wake-up is retried on the
//! next turn.
//!
//! # Failure Modes
//! - Wake-ups cannot be cancelled. Spurious ones find no due timer and do
//!   nothing.
//! - Clipboard and runtime promise rejections are logged at debug and
//!   otherwise ignored.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use findfont_core::font::FONT_PROPERTIES;
use findfont_core::host::{ComputedStyle, SelectionSnapshot};
use findfont_core::{
    DomEvent, EventKind, EventOutcome, EventTarget, Host, HostError, ListenerId, ListenerOptions,
    OverlayConfig, OverlayController, Rect, Size,
};
use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use js_sys::{Array, Function, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CssStyleDeclaration, Document, Element, Event, HtmlElement, Node, Window};
use web_time::Instant;

pub type SharedController = Rc<RefCell<OverlayController<WebHost>>>;
type WeakController = Weak<RefCell<OverlayController<WebHost>>>;

fn js_error(value: JsValue) -> HostError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .and_then(|err| err.message().as_string())
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    HostError::Js(message)
}

/// Call `target[name](...args)`.
fn call_method(target: &JsValue, name: &str, args: &[&JsValue]) -> Result<JsValue, HostError> {
    let method = Reflect::get(target, &JsValue::from_str(name)).map_err(js_error)?;
    let method: Function = method
        .dyn_into()
        .map_err(|_| HostError::Unavailable("script method"))?;
    let args: Array = args.iter().copied().collect();
    Reflect::apply(&method, target, &args).map_err(js_error)
}

/// Let a returned promise settle in the background, logging rejections.
fn settle_quietly(value: JsValue, what: &'static str) {
    if let Ok(promise) = value.dyn_into::<js_sys::Promise>() {
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = wasm_bindgen_futures::JsFuture::from(promise).await {
                tracing::debug!(what, error = %js_error(err), "async call rejected");
            }
        });
    }
}

/// `chrome.runtime`, if this page runs inside a live extension context.
fn chrome_runtime() -> Result<JsValue, HostError> {
    const MISSING: HostError = HostError::Unavailable("extension runtime");
    let chrome = Reflect::get(&js_sys::global(), &JsValue::from_str("chrome"))
        .ok()
        .filter(JsValue::is_object)
        .ok_or(MISSING)?;
    let runtime = Reflect::get(&chrome, &JsValue::from_str("runtime"))
        .ok()
        .filter(JsValue::is_object)
        .ok_or(MISSING)?;
    // An invalidated context keeps the object but loses its id.
    let live = Reflect::get(&runtime, &JsValue::from_str("id"))
        .map(|id| !id.is_undefined())
        .unwrap_or(false);
    if live { Ok(runtime) } else { Err(MISSING) }
}

/// The element itself, or the parent element of a text node.
fn element_of(node: Node) -> Option<Element> {
    match node.dyn_into::<Element>() {
        Ok(element) => Some(element),
        Err(node) => node.parent_element(),
    }
}

fn inline_style(node: &Element) -> Option<CssStyleDeclaration> {
    node.dyn_ref::<HtmlElement>().map(HtmlElement::style)
}

/// Hand one event to the controller.
fn dispatch(controller: &WeakController, event: DomEvent<Element>) -> Option<EventOutcome> {
    let shared = controller.upgrade()?;
    match shared.try_borrow_mut() {
        Ok(mut overlay) => Some(overlay.handle_event(event)),
        Err(_) => {
            tracing::debug!(kind = ?event.kind, "event dropped while the overlay is busy");
            None
        }
    }
}

fn schedule_wakeup(
    window: &Window,
    controller: WeakController,
    delay: Duration,
) -> Result<(), HostError> {
    let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let retry_on = window.clone();
    let callback = Closure::once_into_js(move || {
        let Some(shared) = controller.upgrade() else {
            return;
        };
        let busy = match shared.try_borrow_mut() {
            Ok(mut overlay) => {
                overlay.on_wakeup();
                false
            }
            Err(_) => true,
        };
        if busy && let Err(err) = schedule_wakeup(&retry_on, controller, Duration::ZERO) {
            tracing::warn!(error = %err, "wake-up retry failed");
        }
    });
    window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        .map(drop)
        .map_err(js_error)
}

fn dom_listener(
    target: &web_sys::EventTarget,
    controller: WeakController,
    id: ListenerId,
    kind: EventKind,
    options: ListenerOptions,
) -> EventListener {
    let phase = if options.contains(ListenerOptions::CAPTURE) {
        EventListenerPhase::Capture
    } else {
        EventListenerPhase::Bubble
    };
    let listener_options = EventListenerOptions {
        phase,
        passive: options.contains(ListenerOptions::PASSIVE),
    };
    let callback = move |event: &Event| {
        let dom_event = DomEvent {
            listener: id,
            kind,
            target: event.target().and_then(|t| t.dyn_into::<Element>().ok()),
            payload: None,
        };
        if let Some(outcome) = dispatch(&controller, dom_event)
            && outcome.stop_propagation
        {
            event.stop_propagation();
        }
    };
    if options.contains(ListenerOptions::ONCE) {
        EventListener::once_with_options(target, kind.dom_name(), listener_options, callback)
    } else {
        EventListener::new_with_options(target, kind.dom_name(), listener_options, callback)
    }
}

type RuntimeCallback = Closure<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>;

/// A callback added to a `chrome.runtime` event; removed on drop.
struct RuntimeListener {
    event: JsValue,
    callback: RuntimeCallback,
}

impl RuntimeListener {
    fn attach(
        controller: WeakController,
        id: ListenerId,
        kind: EventKind,
    ) -> Result<Self, HostError> {
        let name = match kind {
            EventKind::Message => "onMessage",
            EventKind::Suspend => "onSuspend",
            _ => return Err(HostError::Unavailable("runtime event")),
        };
        let event = Reflect::get(&chrome_runtime()?, &JsValue::from_str(name))
            .ok()
            .filter(JsValue::is_object)
            .ok_or(HostError::Unavailable("runtime event"))?;

        let callback: RuntimeCallback = Closure::new(
            move |message: JsValue, _sender: JsValue, send_response: JsValue| {
                let payload = (kind == EventKind::Message)
                    .then(|| js_sys::JSON::stringify(&message).ok())
                    .flatten()
                    .and_then(|json| json.as_string());
                let dom_event = DomEvent {
                    listener: id,
                    kind,
                    target: None,
                    payload,
                };
                if let Some(EventOutcome {
                    response: Some(json),
                    ..
                }) = dispatch(&controller, dom_event)
                    && let Some(reply) = send_response.dyn_ref::<Function>()
                {
                    let body =
                        js_sys::JSON::parse(&json).unwrap_or_else(|_| JsValue::from_str(&json));
                    if let Err(err) = reply.call1(&JsValue::NULL, &body) {
                        tracing::debug!(error = %js_error(err), "runtime reply failed");
                    }
                }
                JsValue::FALSE
            },
        );
        call_method(&event, "addListener", &[callback.as_ref()])?;
        Ok(Self { event, callback })
    }
}

impl Drop for RuntimeListener {
    fn drop(&mut self) {
        if let Err(err) = call_method(&self.event, "removeListener", &[self.callback.as_ref()]) {
            tracing::debug!(error = %err, "runtime listener removal failed");
        }
    }
}

/// The browser page as seen by the overlay controller.
pub struct WebHost {
    window: Window,
    document: Document,
    body: Element,
    /// Stand-in returned when element creation fails.
    spare: Element,
    controller: WeakController,
    dom_listeners: HashMap<ListenerId, EventListener>,
    runtime_listeners: HashMap<ListenerId, RuntimeListener>,
    epoch: Instant,
}

impl fmt::Debug for WebHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHost")
            .field("dom_listeners", &self.dom_listeners.len())
            .field("runtime_listeners", &self.runtime_listeners.len())
            .finish_non_exhaustive()
    }
}

/// Build a controller bound to the current page.
pub fn mount(config: OverlayConfig) -> Result<SharedController, HostError> {
    let mut host = WebHost::new()?;
    Ok(Rc::new_cyclic(move |weak| {
        host.controller = weak.clone();
        RefCell::new(OverlayController::new(host, config))
    }))
}

impl WebHost {
    fn new() -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::Unavailable("window"))?;
        let document = window.document().ok_or(HostError::Unavailable("document"))?;
        let body: Element = document
            .body()
            .ok_or(HostError::Unavailable("document.body"))?
            .into();
        let spare = document.create_element("div").map_err(js_error)?;
        Ok(Self {
            window,
            document,
            body,
            spare,
            controller: Weak::new(),
            dom_listeners: HashMap::new(),
            runtime_listeners: HashMap::new(),
            epoch: Instant::now(),
        })
    }
}

impl Host for WebHost {
    type Node = Element;

    fn body(&self) -> Element {
        self.body.clone()
    }

    fn create_element(&mut self, tag: &str) -> Element {
        match self.document.create_element(tag) {
            Ok(element) => element,
            Err(err) => {
                tracing::warn!(tag, error = %js_error(err), "element creation failed");
                self.spare.clone()
            }
        }
    }

    fn append_child(&mut self, parent: &Element, child: &Element) {
        if let Err(err) = parent.append_child(child) {
            tracing::warn!(error = %js_error(err), "append failed");
        }
    }

    fn remove(&mut self, node: &Element) {
        node.remove();
    }

    fn clear_children(&mut self, node: &Element) {
        node.set_text_content(None);
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn is_attached(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        if let Err(err) = node.set_attribute(name, value) {
            tracing::warn!(name, error = %js_error(err), "set attribute failed");
        }
    }

    fn set_id(&mut self, node: &Element, id: &str) {
        node.set_id(id);
    }

    fn set_class_name(&mut self, node: &Element, class: &str) {
        node.set_class_name(class);
    }

    fn add_class(&mut self, node: &Element, class: &str) {
        if let Err(err) = node.class_list().add_1(class) {
            tracing::warn!(class, error = %js_error(err), "add class failed");
        }
    }

    fn remove_class(&mut self, node: &Element, class: &str) {
        if let Err(err) = node.class_list().remove_1(class) {
            tracing::warn!(class, error = %js_error(err), "remove class failed");
        }
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn set_text(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_markup(&mut self, node: &Element, markup: &'static str) {
        node.set_inner_html(markup);
    }

    fn set_style(&mut self, node: &Element, property: &str, value: &str) {
        let Some(style) = inline_style(node) else {
            return;
        };
        if let Err(err) = style.set_property(property, value) {
            tracing::warn!(property, error = %js_error(err), "set style failed");
        }
    }

    fn style(&self, node: &Element, property: &str) -> Option<String> {
        inline_style(node)
            .and_then(|style| style.get_property_value(property).ok())
            .filter(|value| !value.is_empty())
    }

    fn viewport(&self) -> Size {
        let read = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
        };
        Size::new(
            read(self.window.inner_width()),
            read(self.window.inner_height()),
        )
    }

    fn measure(&self, node: &Element) -> Size {
        node.dyn_ref::<HtmlElement>()
            .map(|el| Size::new(f64::from(el.offset_width()), f64::from(el.offset_height())))
            .unwrap_or_default()
    }

    fn selection(&self) -> Option<SelectionSnapshot<Element>> {
        let selection = self.window.get_selection().ok().flatten()?;
        let text = selection.to_string().as_string().unwrap_or_default();
        let range = if selection.range_count() > 0 {
            selection.get_range_at(0).ok()
        } else {
            None
        };
        let (rect, common_ancestor) = match range {
            Some(range) => {
                let bounds = range.get_bounding_client_rect();
                (
                    Rect::new(bounds.left(), bounds.top(), bounds.width(), bounds.height()),
                    range.common_ancestor_container().ok().and_then(element_of),
                )
            }
            None => (Rect::default(), None),
        };
        Some(SelectionSnapshot {
            text,
            rect,
            common_ancestor,
            focus_parent: selection.focus_node().and_then(|node| node.parent_element()),
        })
    }

    fn clear_selection(&mut self) {
        if let Ok(Some(selection)) = self.window.get_selection()
            && let Err(err) = selection.remove_all_ranges()
        {
            tracing::debug!(error = %js_error(err), "clearing selection failed");
        }
    }

    fn is_document_hidden(&self) -> bool {
        self.document.hidden()
    }

    fn computed_style(&self, node: &Element) -> Result<ComputedStyle, HostError> {
        if !node.is_connected() {
            return Err(HostError::Detached);
        }
        let declaration = self
            .window
            .get_computed_style(node)
            .map_err(js_error)?
            .ok_or(HostError::Unavailable("computed style"))?;
        let mut style = ComputedStyle::new();
        for property in FONT_PROPERTIES {
            let value = declaration.get_property_value(property).map_err(js_error)?;
            style.set(property, value);
        }
        Ok(style)
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn listen(
        &mut self,
        id: ListenerId,
        target: &EventTarget<Element>,
        kind: EventKind,
        options: ListenerOptions,
    ) -> Result<(), HostError> {
        let controller = self.controller.clone();
        let dom_target: &web_sys::EventTarget = match target {
            EventTarget::Runtime => {
                let listener = RuntimeListener::attach(controller, id, kind)?;
                self.runtime_listeners.insert(id, listener);
                return Ok(());
            }
            EventTarget::Window => &self.window,
            EventTarget::Document => &self.document,
            EventTarget::Element(element) => element,
        };
        let listener = dom_listener(dom_target, controller, id, kind, options);
        self.dom_listeners.insert(id, listener);
        Ok(())
    }

    fn unlisten(&mut self, id: ListenerId) {
        self.dom_listeners.remove(&id);
        self.runtime_listeners.remove(&id);
    }

    fn write_clipboard(&mut self, text: &str) {
        let written = Reflect::get(&self.window.navigator(), &JsValue::from_str("clipboard"))
            .map_err(js_error)
            .and_then(|clipboard| {
                call_method(&clipboard, "writeText", &[&JsValue::from_str(text)])
            });
        match written {
            Ok(pending) => settle_quietly(pending, "clipboard write"),
            Err(err) => tracing::warn!(error = %err, "clipboard unavailable"),
        }
    }

    fn post_message(&mut self, json: &str) -> Result<(), HostError> {
        let runtime = chrome_runtime()?;
        let body = js_sys::JSON::parse(json).map_err(js_error)?;
        let pending = call_method(&runtime, "sendMessage", &[&body])?;
        settle_quietly(pending, "runtime message");
        Ok(())
    }

    fn request_wakeup(&mut self, delay: Duration) {
        if let Err(err) = schedule_wakeup(&self.window, self.controller.clone(), delay) {
            tracing::warn!(error = %err, "wake-up scheduling failed");
        }
    }
}
