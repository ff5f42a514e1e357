#![forbid(unsafe_code)]

//! End-to-end lifecycle tests for the selection overlay.
//!
//! Every test drives `OverlayController<HeadlessPage>` through browser-like
//! event dispatch and a manual clock; nothing sleeps.

use std::time::Duration;

use findfont_core::headless::{HeadlessPage, NodeId};
use findfont_core::host::Host;
use findfont_core::message::ExtensionMessage;
use findfont_core::widgets::{BUTTON_CLASS, CONTENT_ID, COPIED_CLASS, PANEL_CLASS, SHOW_CLASS};
use findfont_core::{
    EventKind, EventTarget, OverlayConfig, OverlayController, OverlayState, Rect, Size,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

const DEBOUNCE: Duration = Duration::from_millis(150);
const HIDE: Duration = Duration::from_millis(250);
const CLEAR: Duration = Duration::from_millis(50);
const COPIED: Duration = Duration::from_millis(1000);

/// Lifecycle bindings plus the panel header hover pair.
const BASELINE_LISTENERS: usize = 10;

const FAMILY: &str = "Arial, \"Helvetica Neue\", Helvetica, Roboto, sans-serif";

struct Fixture {
    overlay: OverlayController<HeadlessPage>,
    para: NodeId,
}

fn fixture_with(page: HeadlessPage) -> Fixture {
    let mut overlay = OverlayController::new(page, OverlayConfig::default());
    overlay.initialize();
    let page = overlay.host_mut();
    let body = page.body();
    let para = page.create_element("p");
    page.append_child(&body, &para);
    page.set_declared_style(&para, "font-family", FAMILY);
    page.set_declared_style(&para, "color", "rgb(255, 0, 0)");
    Fixture { overlay, para }
}

fn fixture() -> Fixture {
    fixture_with(HeadlessPage::new(Size::new(1024.0, 768.0)))
}

fn selection_rect() -> Rect {
    Rect::new(100.0, 200.0, 120.0, 18.0)
}

impl Fixture {
    fn select(&mut self, node: NodeId, text: &str) {
        self.overlay.host_mut().select(&node, text, selection_rect());
        self.overlay.mouse_up(node);
        self.overlay.advance_time(DEBOUNCE);
    }

    fn select_para(&mut self) {
        self.select(self.para, "sample text");
    }

    fn button(&self) -> NodeId {
        *self.overlay.button_node().expect("overlay initialized")
    }

    fn panel(&self) -> NodeId {
        self.overlay.panel().expect("overlay initialized").panel
    }

    fn content(&self) -> NodeId {
        self.overlay.panel().expect("overlay initialized").content
    }

    fn page(&self) -> &HeadlessPage {
        self.overlay.host()
    }

    fn open_panel(&mut self) {
        self.select_para();
        let button = self.button();
        self.overlay.click(button);
        assert_eq!(self.overlay.state(), OverlayState::PanelOpen);
    }

    fn first_by_class(&self, class: &str) -> NodeId {
        self.page()
            .find_by_class(class)
            .first()
            .copied()
            .unwrap_or_else(|| panic!("no element with class {class}"))
    }
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn selection_shows_button_within_one_debounce() {
    let mut f = fixture();
    let para = f.para;
    f.overlay
        .host_mut()
        .select(&para, "sample text", selection_rect());
    f.overlay.mouse_up(para);

    f.overlay.advance_time(DEBOUNCE - Duration::from_millis(1));
    assert_eq!(f.overlay.state(), OverlayState::Idle);

    f.overlay.advance_time(Duration::from_millis(1));
    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);

    let button = f.button();
    assert!(f.page().is_displayed(&button));
    assert_eq!(f.page().style(&button, "left").as_deref(), Some("230px"));
    assert_eq!(f.page().style(&button, "top").as_deref(), Some("158px"));
}

#[test]
fn detection_records_and_publishes_font() {
    let mut f = fixture();
    f.select_para();

    let info = f.overlay.last_detected().expect("font detected");
    assert_eq!(info.font_family, FAMILY);
    assert_eq!(info.font_size, "16px");
    assert_eq!(info.color, "rgb(255, 0, 0)");

    let messages = f.page().posted_messages();
    assert_eq!(messages.len(), 1);
    match ExtensionMessage::from_json(&messages[0]).unwrap() {
        ExtensionMessage::FontDetected { font_info } => assert_eq!(&font_info, info),
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn rapid_mouseups_coalesce_into_one_detection() {
    let mut f = fixture();
    let para = f.para;
    f.overlay
        .host_mut()
        .select(&para, "sample text", selection_rect());
    for _ in 0..4 {
        f.overlay.mouse_up(para);
        f.overlay.advance_time(Duration::from_millis(100));
    }
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    f.overlay.advance_time(DEBOUNCE);
    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);
    assert_eq!(f.page().posted_messages().len(), 1);
}

#[test]
fn whitespace_selection_is_empty() {
    let mut f = fixture();
    let para = f.para;
    f.select(para, "  \n\t ");
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert!(f.overlay.last_detected().is_none());
}

#[test]
fn textarea_selection_never_shows_button() {
    let mut f = fixture();
    let page = f.overlay.host_mut();
    let body = page.body();
    let area = page.create_element("textarea");
    page.append_child(&body, &area);

    f.select(area, "typed text");
    f.overlay.advance_time(Duration::from_secs(1));
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert!(f.page().posted_messages().is_empty());
}

#[test]
fn selection_ending_in_contenteditable_is_ignored() {
    let mut f = fixture();
    let page = f.overlay.host_mut();
    let body = page.body();
    let editor = page.create_element("div");
    page.set_attribute(&editor, "contenteditable", "true");
    let span = page.create_element("span");
    page.append_child(&body, &editor);
    page.append_child(&editor, &span);
    // Mouse released outside, but the range lives inside the editor.
    page.select(&span, "draft", selection_rect());
    let para = f.para;
    f.overlay.mouse_up(para);
    f.overlay.advance_time(DEBOUNCE);
    assert_eq!(f.overlay.state(), OverlayState::Idle);
}

#[test]
fn mouseup_on_overlay_does_not_redetect() {
    let mut f = fixture();
    f.open_panel();
    let content = f.content();
    f.overlay.mouse_up(content);
    f.overlay.advance_time(DEBOUNCE);
    assert_eq!(f.page().posted_messages().len(), 1);
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);
}

#[test]
fn empty_selection_returns_to_idle_and_drains_panel() {
    let mut f = fixture();
    f.open_panel();
    let para = f.para;
    f.overlay.host_mut().set_selection(None);
    f.overlay.mouse_up(para);
    f.overlay.advance_time(DEBOUNCE);

    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert!(!f.page().is_displayed(&f.button()));
    assert!(!f.page().is_displayed(&f.panel()));
    assert!(f.page().children(&f.content()).is_empty());
    assert!(!f.overlay.outside_click_active());
    assert_eq!(f.overlay.attached_listeners(), BASELINE_LISTENERS + 1);
}

#[traced_test]
#[test]
fn detached_focus_element_is_logged_not_fatal() {
    let mut f = fixture();
    let page = f.overlay.host_mut();
    let loose = page.create_element("span");
    let para = f.para;
    page.set_selection(Some(findfont_core::host::SelectionSnapshot {
        text: "ghost".to_owned(),
        rect: selection_rect(),
        common_ancestor: Some(para),
        focus_parent: Some(loose),
    }));
    f.overlay.mouse_up(para);
    f.overlay.advance_time(DEBOUNCE);

    assert!(f.overlay.last_detected().is_none());
    assert!(f.page().posted_messages().is_empty());
    assert!(logs_contain("failed to read computed font style"));
}

// ============================================================================
// Panel open / close
// ============================================================================

#[test]
fn button_click_opens_panel_with_rendered_sections() {
    let mut f = fixture();
    f.open_panel();

    let panel = f.panel();
    assert!(f.page().has_class(&panel, SHOW_CLASS));
    assert!(f.page().is_displayed(&panel));
    assert_eq!(f.page().style(&panel, "left").as_deref(), Some("272px"));
    assert_eq!(f.page().style(&panel, "top").as_deref(), Some("158px"));
    assert_eq!(f.page().children(&f.content()).len(), 5);
    assert!(f.overlay.outside_click_active());

    let text = f.page().text_content(&f.content());
    assert!(text.contains("Arial (Standard Font)"));
    assert!(text.contains("#ff0000"));
    assert!(text.contains("Helvetica Neue, Helvetica, Roboto"));
}

#[test]
fn page_element_sharing_content_id_is_left_alone() {
    let mut page = HeadlessPage::new(Size::new(1024.0, 768.0));
    let body = page.body();
    let article = page.create_element("div");
    page.set_id(&article, CONTENT_ID);
    let words = page.create_element("p");
    page.set_text(&words, "host page article");
    page.append_child(&article, &words);
    page.append_child(&body, &article);

    let mut f = fixture_with(page);
    f.open_panel();
    assert_eq!(f.page().children(&article), vec![words]);
    assert_eq!(f.page().text_content(&article), "host page article");
    assert_eq!(f.page().children(&f.content()).len(), 5);

    f.overlay.destroy();
    assert_eq!(f.page().children(&article), vec![words]);
    assert!(f.page().is_attached(&article));
    assert!(f.page().find_by_class(PANEL_CLASS).is_empty());
}

#[test]
fn panel_uses_measured_size_when_laid_out() {
    let mut f = fixture();
    let panel = f.panel();
    f.overlay
        .host_mut()
        .set_layout(&panel, Size::new(800.0, 300.0));
    f.open_panel();
    // Too wide for either side: below the button, pulled in from the right.
    assert_eq!(f.page().style(&panel, "left").as_deref(), Some("214px"));
    assert_eq!(f.page().style(&panel, "top").as_deref(), Some("200px"));
}

#[test]
fn second_button_click_hides_panel_but_keeps_button() {
    let mut f = fixture();
    f.open_panel();
    let button = f.button();
    f.overlay.click(button);

    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);
    assert!(f.page().is_displayed(&button));
    assert!(!f.page().has_class(&f.panel(), SHOW_CLASS));
    assert!(!f.overlay.outside_click_active());
    // Content survives until the hide transition is over.
    assert_eq!(f.page().children(&f.content()).len(), 5);

    f.overlay.advance_time(HIDE);
    assert!(!f.page().is_displayed(&f.panel()));
    assert!(f.page().children(&f.content()).is_empty());
    assert_eq!(f.overlay.panel_sections(), 0);
    assert_eq!(f.page().selection_clears(), 0);
}

#[test]
fn reopening_during_hide_window_cancels_drain() {
    let mut f = fixture();
    f.open_panel();
    let button = f.button();
    f.overlay.click(button);
    f.overlay.advance_time(Duration::from_millis(100));
    f.overlay.click(button);
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);

    f.overlay.advance_time(HIDE * 2);
    assert!(f.page().is_displayed(&f.panel()));
    assert_eq!(f.page().children(&f.content()).len(), 5);
}

#[test]
fn outside_click_closes_and_removes_listener() {
    let mut f = fixture();
    f.open_panel();
    assert_eq!(
        f.page()
            .listeners_on(&EventTarget::Document, EventKind::Click)
            .len(),
        1
    );

    let para = f.para;
    f.overlay.click(para);
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert!(!f.overlay.outside_click_active());
    assert!(
        f.page()
            .listeners_on(&EventTarget::Document, EventKind::Click)
            .is_empty()
    );
    assert!(!f.page().is_displayed(&f.button()));

    f.overlay.advance_time(CLEAR);
    assert_eq!(f.page().selection_clears(), 1);

    f.overlay.advance_time(HIDE);
    assert!(f.page().children(&f.content()).is_empty());
    // Copy-all stays bound until teardown.
    assert_eq!(f.overlay.attached_listeners(), BASELINE_LISTENERS + 1);
}

#[test]
fn click_inside_panel_keeps_it_open() {
    let mut f = fixture();
    f.open_panel();
    let content = f.content();
    f.overlay.click(content);
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);
}

#[test]
fn click_on_input_does_not_close_panel() {
    let mut f = fixture();
    f.open_panel();
    let page = f.overlay.host_mut();
    let body = page.body();
    let input = page.create_element("input");
    page.append_child(&body, &input);
    f.overlay.click(input);
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);
}

#[test]
fn close_button_returns_to_idle() {
    let mut f = fixture();
    f.open_panel();
    let close = f.overlay.panel().expect("panel").close;
    let outcomes = f.overlay.click(close);

    assert!(outcomes.iter().any(|o| o.stop_propagation));
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert!(!f.page().is_displayed(&f.button()));
    f.overlay.advance_time(HIDE);
    assert_eq!(f.page().selection_clears(), 1);
    assert!(f.page().children(&f.content()).is_empty());
}

#[test]
fn detection_while_open_rerenders() {
    let mut f = fixture();
    f.open_panel();
    let page = f.overlay.host_mut();
    let body = page.body();
    let heading = page.create_element("h1");
    page.append_child(&body, &heading);
    page.set_declared_style(&heading, "font-family", "\"Open Sans\", sans-serif");
    page.set_declared_style(&heading, "font-size", "48px");

    f.select(heading, "Title");
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);
    let text = f.page().text_content(&f.content());
    assert!(text.contains("Open Sans (Google Fonts)"));
    assert!(text.contains("Preview (scaled from 48px)"));
    assert!(!text.contains("Arial"));
    assert_eq!(f.page().children(&f.content()).len(), 5);
}

#[test]
fn repeated_cycles_do_not_leak_listeners_or_nodes() {
    let mut f = fixture();
    f.open_panel();
    let open_count = f.overlay.attached_listeners();
    let button = f.button();
    for _ in 0..20 {
        f.overlay.click(button);
        f.overlay.advance_time(HIDE);
        f.overlay.click(button);
        assert_eq!(f.overlay.attached_listeners(), open_count);
    }
    assert_eq!(f.page().children(&f.content()).len(), 5);
    assert_eq!(f.page().attached_listener_count(), open_count);
}

// ============================================================================
// Copy and hover affordances
// ============================================================================

#[test]
fn section_copy_button_copies_property_line() {
    let mut f = fixture();
    f.open_panel();
    let copy_buttons = f.page().find_by_class("findfont-copy-button");
    // Header copy-all first, then family, size, weight, color, style.
    assert_eq!(copy_buttons.len(), 6);
    let size_copy = copy_buttons[2];
    let section = f
        .page()
        .find_by_class("findfont-info-section")
        .into_iter()
        .find(|s| f.page().text_content(s).starts_with("Size"))
        .expect("size section");

    f.overlay.hover(section);
    assert_eq!(f.page().style(&size_copy, "opacity").as_deref(), Some("1"));

    f.overlay.click(size_copy);
    assert_eq!(f.page().clipboard_writes(), ["font-size: 16px"]);
    assert!(f.page().has_class(&size_copy, COPIED_CLASS));
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);

    f.overlay.unhover(section);
    assert_eq!(f.page().style(&size_copy, "opacity").as_deref(), Some("0"));

    f.overlay.advance_time(COPIED);
    assert!(!f.page().has_class(&size_copy, COPIED_CLASS));
}

#[test]
fn copy_all_writes_five_line_block() {
    let mut f = fixture();
    f.open_panel();
    let copy_all = f.overlay.panel().expect("panel").copy_all;
    f.overlay.click(copy_all);
    assert_eq!(
        f.page().clipboard_writes(),
        [format!(
            "font-family: {FAMILY};\nfont-size: 16px;\nfont-weight: 400;\ncolor: #ff0000;\nfont-style: normal;"
        )]
    );
}

#[test]
fn header_copy_all_stays_revealed_while_copied() {
    let mut f = fixture();
    f.open_panel();
    let panel = f.overlay.panel().expect("panel").clone();

    f.overlay.hover(panel.header);
    assert_eq!(f.page().style(&panel.copy_all, "opacity").as_deref(), Some("1"));
    f.overlay.click(panel.copy_all);
    f.overlay.unhover(panel.header);
    assert_eq!(f.page().style(&panel.copy_all, "opacity").as_deref(), Some("1"));

    f.overlay.advance_time(COPIED);
    f.overlay.hover(panel.header);
    f.overlay.unhover(panel.header);
    assert_eq!(f.page().style(&panel.copy_all, "opacity").as_deref(), Some("0"));
}

#[test]
fn header_hover_survives_hide_and_reopen() {
    let mut f = fixture();
    f.open_panel();
    let button = f.button();
    f.overlay.click(button);
    f.overlay.advance_time(HIDE);
    f.overlay.click(button);

    let panel = f.overlay.panel().expect("panel").clone();
    f.overlay.hover(panel.header);
    assert_eq!(f.page().style(&panel.copy_all, "opacity").as_deref(), Some("1"));
}

#[test]
fn fallback_toggle_expands_and_collapses() {
    let mut f = fixture();
    f.open_panel();
    let toggle = f.first_by_class("findfont-fallback-toggle");
    let text = f.first_by_class("findfont-fallback-text");
    assert_eq!(f.page().text(&toggle), "+1");
    assert_eq!(f.page().text(&text), "Helvetica Neue, Helvetica, Roboto");

    f.overlay.click(toggle);
    assert_eq!(f.page().text(&toggle), "less");
    assert_eq!(
        f.page().text(&text),
        "Helvetica Neue, Helvetica, Roboto, sans-serif"
    );
    assert_eq!(f.overlay.state(), OverlayState::PanelOpen);

    f.overlay.click(toggle);
    assert_eq!(f.page().text(&toggle), "+1");
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_reclamps_button_and_panel() {
    let mut f = fixture();
    f.open_panel();
    f.overlay.resize(Size::new(200.0, 768.0));

    let button = f.button();
    assert_eq!(f.page().style(&button, "left").as_deref(), Some("158px"));
    // Neither side fits: below the button, clamped to the left margin.
    assert_eq!(f.page().style(&f.panel(), "left").as_deref(), Some("10px"));
    assert_eq!(f.page().style(&f.panel(), "top").as_deref(), Some("200px"));
}

#[test]
fn resize_while_idle_does_nothing() {
    let mut f = fixture();
    f.overlay.resize(Size::new(300.0, 300.0));
    assert_eq!(f.page().style(&f.button(), "left"), None);
}

// ============================================================================
// Teardown and re-initialization
// ============================================================================

#[test]
fn reinitialize_never_duplicates_widgets() {
    let mut f = fixture();
    f.open_panel();
    f.overlay.initialize();
    f.overlay.initialize();

    assert_eq!(f.page().find_by_class(BUTTON_CLASS).len(), 1);
    assert_eq!(f.page().find_by_class(PANEL_CLASS).len(), 1);
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert_eq!(f.overlay.attached_listeners(), BASELINE_LISTENERS);
    assert_eq!(f.page().attached_listener_count(), BASELINE_LISTENERS);
}

#[test]
fn destroy_twice_leaves_nothing_attached() {
    let mut f = fixture();
    f.open_panel();
    f.overlay.destroy();
    assert_eq!(f.page().attached_listener_count(), 0);
    f.overlay.destroy();

    assert_eq!(f.overlay.state(), OverlayState::Destroyed);
    assert_eq!(f.page().attached_listener_count(), 0);
    assert_eq!(f.overlay.pending_timers(), 0);
    assert!(f.page().find_by_class(BUTTON_CLASS).is_empty());
    assert!(f.page().find_by_class(PANEL_CLASS).is_empty());
    assert!(f.overlay.last_detected().is_none());
}

#[test]
fn events_after_destroy_have_no_effect() {
    let mut f = fixture();
    f.overlay.destroy();
    let para = f.para;
    f.select(para, "late");
    assert_eq!(f.overlay.state(), OverlayState::Destroyed);
    assert!(f.page().posted_messages().is_empty());
}

#[test]
fn initialize_after_destroy_builds_fresh_instance() {
    let mut f = fixture();
    f.overlay.destroy();
    f.overlay.initialize();
    assert_eq!(f.overlay.state(), OverlayState::Idle);
    assert_eq!(f.page().find_by_class(BUTTON_CLASS).len(), 1);
    f.select_para();
    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);
}

#[test]
fn hidden_document_destroys() {
    let mut f = fixture();
    f.select_para();
    f.overlay.set_document_hidden(false);
    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);
    f.overlay.set_document_hidden(true);
    assert_eq!(f.overlay.state(), OverlayState::Destroyed);
    assert_eq!(f.page().attached_listener_count(), 0);
}

#[test]
fn beforeunload_destroys() {
    let mut f = fixture();
    f.open_panel();
    f.overlay.unload();
    assert_eq!(f.overlay.state(), OverlayState::Destroyed);
    assert_eq!(f.page().attached_listener_count(), 0);
}

#[test]
fn runtime_suspend_destroys() {
    let mut f = fixture();
    f.overlay.suspend_runtime();
    assert_eq!(f.overlay.state(), OverlayState::Destroyed);
}

#[test]
fn cleanup_message_destroys_and_replies() {
    let mut f = fixture();
    f.open_panel();
    let reply = f.overlay.send_runtime_message(r#"{"action":"cleanup"}"#);
    assert_eq!(reply.as_deref(), Some(r#"{"success":true}"#));
    assert_eq!(f.overlay.state(), OverlayState::Destroyed);
    assert_eq!(f.page().attached_listener_count(), 0);
}

#[test]
fn unrelated_runtime_messages_are_ignored() {
    let mut f = fixture();
    f.select_para();
    assert_eq!(f.overlay.send_runtime_message(r#"{"type":"GET_FONT_INFO"}"#), None);
    assert_eq!(f.overlay.send_runtime_message("not json"), None);
    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);
}

#[traced_test]
#[test]
fn missing_runtime_is_tolerated() {
    let mut f = fixture_with(HeadlessPage::new(Size::new(1024.0, 768.0)).without_runtime());
    // Runtime message and suspend listeners could not attach.
    assert_eq!(f.overlay.attached_listeners(), BASELINE_LISTENERS - 2);

    f.select_para();
    assert_eq!(f.overlay.state(), OverlayState::ButtonShown);
    assert!(f.overlay.last_detected().is_some());
    assert!(f.page().posted_messages().is_empty());
    assert!(logs_contain("font detection not published"));
    assert!(logs_contain("listener target unavailable"));
    assert!(!logs_contain("listener not attached"));

    f.overlay.destroy();
    assert_eq!(f.page().attached_listener_count(), 0);
}
