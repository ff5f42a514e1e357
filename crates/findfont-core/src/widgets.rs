#![forbid(unsafe_code)]

//! Construction of the floating button, the info panel and its sections.
//!
//! Every builder that wires event handlers returns a [`Built`] value pairing
//! the constructed node(s) with a [`Disposer`] for exactly those handlers.
//! Nothing is attached to the nodes themselves; whoever keeps the widget keeps
//! its disposer.

use crate::config::OverlayConfig;
use crate::controller::Action;
use crate::font::{ComputedFontInfo, property_line};
use crate::host::{EventKind, EventTarget, Host};
use crate::registry::{Disposer, ListenerOptions, ListenerRegistry};

pub const BUTTON_CLASS: &str = "findfont-floating-button";
pub const PANEL_CLASS: &str = "findfont-info-panel";
pub const CONTENT_ID: &str = "fontInfoContent";
pub const SHOW_CLASS: &str = "show";
pub const COPIED_CLASS: &str = "copied";

const COPY_ICON: &str = r##"<svg width="16" height="16" viewBox="0 0 16 16" fill="none" xmlns="http://www.w3.org/2000/svg"><rect x="3" y="3" width="9" height="9" rx="1" stroke="#888" stroke-width="1.2"/><rect x="5" y="5" width="9" height="9" rx="1" stroke="#888" stroke-width="1.2" fill="#fff"/></svg>"##;

const PREVIEW_SAMPLE: &str = "The quick brown fox jumps over the lazy dog";

/// Registry type used by every overlay widget.
pub type OverlayRegistry<N> = ListenerRegistry<N, Action<N>>;

/// A widget plus the disposer for the handlers it registered.
#[derive(Debug)]
pub struct Built<W> {
    pub widget: W,
    pub disposer: Disposer,
}

/// The floating "ff" button.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingButton<N> {
    pub node: N,
}

/// The info panel skeleton: header (title, copy-all, close) and content.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoPanel<N> {
    pub panel: N,
    pub header: N,
    pub title: N,
    pub copy_all: N,
    pub close: N,
    pub content: N,
}

/// A titled panel section with an optional copy button.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoSection<N> {
    pub node: N,
    /// Container the section body lives in.
    pub body: N,
    pub copy_button: Option<N>,
}

fn element<H: Host>(host: &mut H, tag: &str, class: &str) -> H::Node {
    let node = host.create_element(tag);
    host.set_class_name(&node, class);
    node
}

fn conceal<H: Host>(host: &mut H, node: &H::Node) {
    host.set_style(node, "opacity", "0");
    host.set_style(node, "pointer-events", "none");
}

/// Show or hide a copy button (hover affordance).
pub fn set_copy_visible<H: Host>(host: &mut H, button: &H::Node, visible: bool) {
    if visible {
        host.set_style(button, "opacity", "1");
        host.set_style(button, "pointer-events", "auto");
    } else {
        conceal(host, button);
    }
}

pub fn create_floating_button<H: Host>(host: &mut H) -> FloatingButton<H::Node> {
    let node = element(host, "div", BUTTON_CLASS);
    host.set_text(&node, "ff");
    FloatingButton { node }
}

/// Build the panel skeleton. The disposer covers the header hover handlers.
pub fn create_info_panel<H: Host>(
    host: &mut H,
    registry: &mut OverlayRegistry<H::Node>,
) -> Built<InfoPanel<H::Node>> {
    let panel = element(host, "div", PANEL_CLASS);
    let header = element(host, "div", "findfont-panel-header");
    let title = element(host, "span", "findfont-panel-title");
    host.set_text(&title, "🧾 Find Font");

    let copy_all = element(host, "button", "findfont-copy-button findfont-copy-all-button");
    host.set_attribute(&copy_all, "title", "Copy All Font Properties");
    host.set_markup(&copy_all, COPY_ICON);
    conceal(host, &copy_all);
    host.append_child(&title, &copy_all);

    let close = element(host, "button", "findfont-close-button");
    host.set_text(&close, "×");

    let content = element(host, "div", "findfont-panel-content");
    host.set_id(&content, CONTENT_ID);

    host.append_child(&header, &title);
    host.append_child(&header, &close);
    host.append_child(&panel, &header);
    host.append_child(&panel, &content);

    let enter = registry.add(
        host,
        EventTarget::Element(header.clone()),
        EventKind::MouseEnter,
        ListenerOptions::empty(),
        Action::RevealCopy {
            button: copy_all.clone(),
            visible: true,
            keep_while_copied: false,
        },
    );
    let leave = registry.add(
        host,
        EventTarget::Element(header.clone()),
        EventKind::MouseLeave,
        ListenerOptions::empty(),
        Action::RevealCopy {
            button: copy_all.clone(),
            visible: false,
            keep_while_copied: true,
        },
    );

    Built {
        widget: InfoPanel {
            panel,
            header,
            title,
            copy_all,
            close,
            content,
        },
        disposer: enter.merge(leave),
    }
}

/// Build a titled section around `body`.
///
/// A copy button is added only when `copy` names a non-empty key and value;
/// it copies `key: value` and is revealed while the section is hovered.
pub fn create_info_section<H: Host>(
    host: &mut H,
    registry: &mut OverlayRegistry<H::Node>,
    title: &str,
    body: &H::Node,
    copy: Option<(&str, &str)>,
) -> Built<InfoSection<H::Node>> {
    let node = element(host, "div", "findfont-info-section");
    let title_node = element(host, "div", "findfont-section-title");
    host.set_text(&title_node, title);

    let mut disposer = Disposer::empty();
    let mut copy_button = None;
    if let Some((key, value)) = copy.filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
        let button = element(host, "button", "findfont-copy-button");
        host.set_attribute(&button, "title", &format!("Copy {key}"));
        host.set_markup(&button, COPY_ICON);
        conceal(host, &button);
        host.append_child(&title_node, &button);

        disposer.absorb(registry.add(
            host,
            EventTarget::Element(button.clone()),
            EventKind::Click,
            ListenerOptions::empty(),
            Action::CopyProperty {
                button: button.clone(),
                text: property_line(key, value),
            },
        ));
        disposer.absorb(registry.add(
            host,
            EventTarget::Element(node.clone()),
            EventKind::MouseEnter,
            ListenerOptions::empty(),
            Action::RevealCopy {
                button: button.clone(),
                visible: true,
                keep_while_copied: false,
            },
        ));
        disposer.absorb(registry.add(
            host,
            EventTarget::Element(node.clone()),
            EventKind::MouseLeave,
            ListenerOptions::empty(),
            Action::RevealCopy {
                button: button.clone(),
                visible: false,
                keep_while_copied: false,
            },
        ));
        copy_button = Some(button);
    }

    let section_body = element(host, "div", "findfont-section-content");
    host.append_child(&section_body, body);
    host.append_child(&node, &title_node);
    host.append_child(&node, &section_body);

    Built {
        widget: InfoSection {
            node,
            body: section_body,
            copy_button,
        },
        disposer,
    }
}

/// Plain text node wrapper.
pub fn create_text<H: Host>(host: &mut H, text: &str) -> H::Node {
    let node = host.create_element("span");
    host.set_text(&node, text);
    node
}

/// Colour swatch followed by the colour value.
pub fn create_color_display<H: Host>(host: &mut H, color: &str) -> H::Node {
    let container = element(host, "div", "findfont-color-display");
    let swatch = element(host, "span", "findfont-color-box");
    host.set_style(&swatch, "background-color", color);
    let text = create_text(host, color);
    host.append_child(&container, &swatch);
    host.append_child(&container, &text);
    container
}

/// Fallback font list with an expand/collapse toggle.
///
/// The expanded flag lives here, with the widget, and dies with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackFonts<N> {
    pub node: N,
    text: N,
    toggle: Option<N>,
    fonts: Vec<String>,
    visible: usize,
    expanded: bool,
}

impl<N: Clone> FallbackFonts<N> {
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.fonts.len() - self.visible
    }

    #[must_use]
    pub fn toggle_node(&self) -> Option<&N> {
        self.toggle.as_ref()
    }

    /// Text currently shown for the list.
    #[must_use]
    pub fn display_text(&self) -> String {
        if self.expanded {
            self.fonts.join(", ")
        } else {
            self.fonts[..self.visible].join(", ")
        }
    }

    fn toggle_label(&self) -> String {
        if self.expanded {
            "less".to_owned()
        } else {
            format!("+{}", self.hidden_count())
        }
    }

    /// Flip between the short and the full list. No-op without a toggle.
    pub fn toggle<H: Host<Node = N>>(&mut self, host: &mut H) {
        let Some(toggle) = self.toggle.clone() else {
            return;
        };
        self.expanded = !self.expanded;
        host.set_text(&self.text, &self.display_text());
        host.set_text(&toggle, &self.toggle_label());
    }
}

/// Build the fallback list, or `None` when there are no fallbacks.
pub fn create_fallback_fonts_display<H: Host>(
    host: &mut H,
    registry: &mut OverlayRegistry<H::Node>,
    fallbacks: &[String],
    max_visible: usize,
) -> Option<Built<FallbackFonts<H::Node>>> {
    if fallbacks.is_empty() {
        return None;
    }

    let container = element(host, "div", "findfont-fallback-fonts");
    let header = element(host, "div", "findfont-fallback-header");
    host.set_text(&header, "Fallback Fonts");
    host.append_child(&container, &header);

    let wrapper = element(host, "div", "findfont-fallback-wrapper");
    let text = element(host, "div", "findfont-fallback-text");
    host.append_child(&wrapper, &text);

    let mut widget = FallbackFonts {
        node: container.clone(),
        text: text.clone(),
        toggle: None,
        fonts: fallbacks.to_vec(),
        visible: fallbacks.len().min(max_visible),
        expanded: false,
    };
    host.set_text(&text, &widget.display_text());

    let mut disposer = Disposer::empty();
    if widget.hidden_count() > 0 {
        let toggle = element(host, "button", "findfont-fallback-toggle");
        host.set_text(&toggle, &widget.toggle_label());
        host.append_child(&wrapper, &toggle);
        disposer = registry.add(
            host,
            EventTarget::Element(toggle.clone()),
            EventKind::Click,
            ListenerOptions::empty(),
            Action::ToggleFallbacks,
        );
        widget.toggle = Some(toggle);
    }
    host.append_child(&container, &wrapper);

    Some(Built { widget, disposer })
}

/// Preview font size after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSize {
    pub px: u32,
    /// The preview differs from the computed size.
    pub scaled: bool,
}

/// Leading integer of a CSS length, like `parseInt("16.5px") == 16`.
fn leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Overlong digit runs saturate.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * magnitude)
}

/// Clamp the computed font size into `[min_px, max_px]`.
///
/// Unparsable sizes preview at `min_px` and count as scaled.
#[must_use]
pub fn preview_size(font_size: &str, min_px: u32, max_px: u32) -> PreviewSize {
    let (min_px, max_px) = (min_px.min(max_px), min_px.max(max_px));
    match leading_int(font_size) {
        Some(computed) => {
            let clamped = computed.clamp(i64::from(min_px), i64::from(max_px));
            PreviewSize {
                px: u32::try_from(clamped).unwrap_or(min_px),
                scaled: clamped != computed,
            }
        }
        None => PreviewSize {
            px: min_px,
            scaled: true,
        },
    }
}

/// `Preview`, or `Preview (scaled from 48px)` when the size was clamped.
#[must_use]
pub fn preview_label(font_size: &str, size: PreviewSize) -> String {
    if size.scaled {
        format!("Preview (scaled from {font_size})")
    } else {
        "Preview".to_owned()
    }
}

/// Sample text rendered in the inspected font.
pub fn create_font_preview<H: Host>(
    host: &mut H,
    info: &ComputedFontInfo,
    config: &OverlayConfig,
) -> H::Node {
    let container = element(host, "div", "findfont-font-preview");
    let size = preview_size(&info.font_size, config.preview_min_px, config.preview_max_px);

    let text = element(host, "div", "findfont-preview-text");
    host.set_style(&text, "font-family", &info.font_family);
    host.set_style(&text, "font-size", &format!("{}px", size.px));
    host.set_style(&text, "font-weight", &info.font_weight);
    host.set_style(&text, "font-style", &info.font_style);
    host.set_style(&text, "color", &info.color);
    host.set_style(&text, "line-height", "1.3");
    host.set_style(&text, "text-align", "center");
    host.set_style(&text, "margin-bottom", "6px");

    let sample = host.create_element("div");
    host.set_style(&sample, "font-size", "0.85em");
    host.set_text(&sample, PREVIEW_SAMPLE);
    host.append_child(&text, &sample);

    let label = element(host, "div", "findfont-preview-label");
    host.set_text(&label, &preview_label(&info.font_size, size));

    host.append_child(&container, &text);
    host.append_child(&container, &label);
    container
}
