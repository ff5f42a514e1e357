#![forbid(unsafe_code)]

//! Rebuilds the info panel content for a detected font.
//!
//! # Invariants
//!
//! 1. Before new sections are built, the previous content and every handler
//!    it registered are gone. No stale node or handler survives a render.
//! 2. Sections are built in a fixed order: family (with fallbacks), size and
//!    weight side by side, colour, style, preview.
//! 3. The header copy-all handler is re-bound on every render; it copies the
//!    controller's current record, not a snapshot taken here.

use std::fmt;

use crate::config::OverlayConfig;
use crate::controller::Action;
use crate::font::{
    ComputedFontInfo, describe_style, format_font_family, parse_font_family, rgb_to_hex,
};
use crate::host::{EventKind, EventTarget, Host};
use crate::registry::{Disposer, ListenerOptions};
use crate::widgets::{
    FallbackFonts, InfoPanel, OverlayRegistry, create_color_display,
    create_fallback_fonts_display, create_font_preview, create_info_section, create_text,
};

/// Reasons a render pass was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The panel's content container is not in the document.
    ContentMissing,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentMissing => write!(f, "info panel content is not attached"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Owns the dynamic part of the panel and its cleanup list.
#[derive(Debug)]
pub struct PanelRenderer<N> {
    /// One disposer per dynamically created section.
    cleanup: Vec<Disposer>,
    fallback: Option<FallbackFonts<N>>,
    copy_all: Option<Disposer>,
}

impl<N> Default for PanelRenderer<N> {
    fn default() -> Self {
        Self {
            cleanup: Vec::new(),
            fallback: None,
            copy_all: None,
        }
    }
}

impl<N: Clone + PartialEq> PanelRenderer<N> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending section disposers.
    #[must_use]
    pub fn cleanup_len(&self) -> usize {
        self.cleanup.len()
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&FallbackFonts<N>> {
        self.fallback.as_ref()
    }

    /// Replace the panel content with sections describing `info`.
    pub fn render<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        registry: &mut OverlayRegistry<N>,
        panel: &InfoPanel<N>,
        info: &ComputedFontInfo,
        config: &OverlayConfig,
    ) -> Result<(), RenderError> {
        let _span = tracing::debug_span!("panel_render").entered();
        let content = panel.content.clone();
        if !host.is_attached(&content) {
            return Err(RenderError::ContentMissing);
        }

        self.clear(host, registry, &content);

        let color = rgb_to_hex(&info.color);
        let family = parse_font_family(&info.font_family);

        // Font family, with the fallback list inside the same section.
        let family_text = create_text(host, &format_font_family(&info.font_family));
        let family_section = create_info_section(
            host,
            registry,
            "Font Family",
            &family_text,
            Some(("font-family", &info.font_family)),
        );
        if let Some(fallback) = create_fallback_fonts_display(
            host,
            registry,
            &family.fallbacks,
            config.max_visible_fallbacks,
        ) {
            host.append_child(&family_section.widget.body, &fallback.widget.node);
            self.cleanup.push(fallback.disposer);
            self.fallback = Some(fallback.widget);
        }
        host.append_child(&content, &family_section.widget.node);
        self.cleanup.push(family_section.disposer);

        // Size and weight, side by side.
        let row = host.create_element("div");
        host.set_class_name(&row, "findfont-size-weight-container");
        let size_text = create_text(host, &info.font_size);
        let size = create_info_section(
            host,
            registry,
            "Size",
            &size_text,
            Some(("font-size", &info.font_size)),
        );
        let weight_text = create_text(host, &info.font_weight);
        let weight = create_info_section(
            host,
            registry,
            "Weight",
            &weight_text,
            Some(("font-weight", &info.font_weight)),
        );
        host.append_child(&row, &size.widget.node);
        host.append_child(&row, &weight.widget.node);
        host.append_child(&content, &row);
        self.cleanup.push(size.disposer);
        self.cleanup.push(weight.disposer);

        let swatch = create_color_display(host, &color);
        let color_section =
            create_info_section(host, registry, "Color", &swatch, Some(("color", &color)));
        host.append_child(&content, &color_section.widget.node);
        self.cleanup.push(color_section.disposer);

        let style_text = create_text(host, &describe_style(info));
        let style_section = create_info_section(
            host,
            registry,
            "Style",
            &style_text,
            Some(("font-style", &info.font_style)),
        );
        host.append_child(&content, &style_section.widget.node);
        self.cleanup.push(style_section.disposer);

        let preview = create_font_preview(host, info, config);
        host.append_child(&content, &preview);

        self.bind_copy_all(host, registry, panel);
        tracing::debug!(sections = self.cleanup.len(), "panel rendered");
        Ok(())
    }

    fn bind_copy_all<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        registry: &mut OverlayRegistry<N>,
        panel: &InfoPanel<N>,
    ) {
        if let Some(previous) = self.copy_all.take() {
            previous.dispose(registry, host);
        }
        self.copy_all = Some(registry.add(
            host,
            EventTarget::Element(panel.copy_all.clone()),
            EventKind::Click,
            ListenerOptions::empty(),
            Action::CopyAll {
                button: panel.copy_all.clone(),
            },
        ));
    }

    /// Drain the cleanup list and empty `content`.
    pub fn clear<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        registry: &mut OverlayRegistry<N>,
        content: &N,
    ) {
        for disposer in self.cleanup.drain(..) {
            disposer.dispose(registry, host);
        }
        self.fallback = None;
        host.clear_children(content);
    }

    /// Drain everything, including the copy-all binding.
    pub fn teardown<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        registry: &mut OverlayRegistry<N>,
        content: &N,
    ) {
        self.clear(host, registry, content);
        if let Some(binding) = self.copy_all.take() {
            binding.dispose(registry, host);
        }
    }

    /// Flip the fallback list, if one is rendered.
    pub fn toggle_fallbacks<H: Host<Node = N>>(&mut self, host: &mut H) {
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.toggle(host);
        }
    }
}
