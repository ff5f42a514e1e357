#![forbid(unsafe_code)]

//! Computed-font extraction and analysis.
//!
//! Everything here except [`extract_font_info`] is a pure string function.
//! Source classification is a static heuristic table, checked in priority
//! order; the first matching rule wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::host::Host;

/// Resolved font properties of the element under a selection.
///
/// Values are copied verbatim from the computed style; nothing is
/// normalised.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedFontInfo {
    pub font_family: String,
    pub font_size: String,
    pub font_weight: String,
    pub font_style: String,
    pub text_decoration_line: String,
    pub text_decoration_style: String,
    pub text_decoration_thickness: String,
    pub color: String,
    pub line_height: String,
    pub letter_spacing: String,
}

/// A font-family list split into the primary face and its fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedFontFamily {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

/// Where a font family most likely comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontSource {
    System,
    WindowsSystem,
    AndroidSystem,
    GoogleFonts,
    AdobeFonts,
    Standard,
}

impl FontSource {
    /// Human readable label shown next to the family name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::System => "System Font",
            Self::WindowsSystem => "Windows System Font",
            Self::AndroidSystem => "Android System Font",
            Self::GoogleFonts => "Google Fonts",
            Self::AdobeFonts => "Adobe Fonts",
            Self::Standard => "Standard Font",
        }
    }
}

const GOOGLE_FONTS: &[&str] = &[
    "roboto",
    "open sans",
    "lato",
    "montserrat",
    "source sans pro",
    "raleway",
    "ubuntu",
    "lora",
    "merriweather",
    "nunito",
    "playfair display",
    "oswald",
    "poppins",
    "inter",
    "fira sans",
    "pt sans",
    "work sans",
];

const ADOBE_FONTS: &[&str] = &[
    "proxima nova",
    "minion pro",
    "myriad pro",
    "source serif pro",
    "acumin",
    "brandon grotesque",
    "futura pt",
    "trade gothic",
    "museo",
    "ff din",
    "adelle",
    "freight text",
];

const STANDARD_FONTS: &[&str] = &["helvetica", "times", "arial", "courier"];

/// Ordered classification rules. Android system fonts are checked before the
/// Google list, so "Roboto" resolves to [`FontSource::AndroidSystem`].
const SOURCE_RULES: &[(FontSource, &[&str])] = &[
    (FontSource::System, &["-apple-system", "system-ui"]),
    (FontSource::WindowsSystem, &["segoe ui"]),
    (FontSource::AndroidSystem, &["roboto", "noto"]),
    (FontSource::GoogleFonts, GOOGLE_FONTS),
    (FontSource::AdobeFonts, ADOBE_FONTS),
    (FontSource::Standard, STANDARD_FONTS),
];

/// CSS property names read from the computed style, in record order.
pub const FONT_PROPERTIES: [&str; 10] = [
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-decoration-line",
    "text-decoration-style",
    "text-decoration-thickness",
    "color",
    "line-height",
    "letter-spacing",
];

/// Read the resolved font properties of `node`.
///
/// Returns `None` (and logs) when the host cannot resolve a style, e.g. for a
/// detached element. Never panics.
pub fn extract_font_info<H: Host>(host: &H, node: &H::Node) -> Option<ComputedFontInfo> {
    match host.computed_style(node) {
        Ok(style) => {
            let get = |name: &str| style.get(name).unwrap_or_default().to_owned();
            Some(ComputedFontInfo {
                font_family: get("font-family"),
                font_size: get("font-size"),
                font_weight: get("font-weight"),
                font_style: get("font-style"),
                text_decoration_line: get("text-decoration-line"),
                text_decoration_style: get("text-decoration-style"),
                text_decoration_thickness: get("text-decoration-thickness"),
                color: get("color"),
                line_height: get("line-height"),
                letter_spacing: get("letter-spacing"),
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to read computed font style");
            None
        }
    }
}

fn unquote(token: &str) -> String {
    token.trim().chars().filter(|c| !matches!(c, '"' | '\'')).collect()
}

/// Split a CSS font-family list into primary face and fallbacks.
///
/// ```
/// use findfont_core::font::parse_font_family;
///
/// let parsed = parse_font_family(r#"Arial, "Helvetica Neue", sans-serif"#);
/// assert_eq!(parsed.primary, "Arial");
/// assert_eq!(parsed.fallbacks, ["Helvetica Neue", "sans-serif"]);
/// ```
#[must_use]
pub fn parse_font_family(family: &str) -> ParsedFontFamily {
    let mut fonts = family.split(',').map(unquote);
    let primary = fonts.next().unwrap_or_default();
    ParsedFontFamily {
        primary,
        fallbacks: fonts.collect(),
    }
}

/// Classify the primary family of `family` against the source table.
#[must_use]
pub fn classify_font_source(family: &str) -> Option<FontSource> {
    let primary = parse_font_family(family).primary.to_lowercase();
    SOURCE_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| primary.contains(needle)))
        .map(|(source, _)| *source)
}

/// Source label for `family`, or `""` when unrecognised.
#[must_use]
pub fn font_source_label(family: &str) -> &'static str {
    classify_font_source(family).map_or("", FontSource::label)
}

/// `Primary (Source)`, or just `Primary` when the source is unknown.
#[must_use]
pub fn format_font_family(family: &str) -> String {
    let primary = parse_font_family(family).primary;
    match classify_font_source(family) {
        Some(source) => format!("{primary} ({})", source.label()),
        None => primary,
    }
}

/// Describe the font style, flagging faces that are italic by design.
#[must_use]
pub fn describe_style(info: &ComputedFontInfo) -> String {
    if info.font_style != "normal" {
        return info.font_style.clone();
    }
    if info.font_family.to_lowercase().contains("italic") {
        return "normal (italic font)".to_owned();
    }
    "normal".to_owned()
}

static RGB_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^rgb\((\d+),\s*(\d+),\s*(\d+)\)$").ok());

/// Convert `rgb(r, g, b)` to `#rrggbb`; any other input is returned as is.
#[must_use]
pub fn rgb_to_hex(color: &str) -> String {
    let Some(pattern) = RGB_PATTERN.as_ref() else {
        return color.to_owned();
    };
    let Some(caps) = pattern.captures(color) else {
        return color.to_owned();
    };
    let mut hex = String::with_capacity(7);
    hex.push('#');
    for idx in 1..=3 {
        let Ok(component) = caps[idx].parse::<u64>() else {
            return color.to_owned();
        };
        let digits = format!("{component:02x}");
        hex.push_str(&digits[digits.len() - 2..]);
    }
    hex
}

/// `<key>: <value>` line copied by a per-property copy button.
#[must_use]
pub fn property_line(key: &str, value: &str) -> String {
    format!("{key}: {value}")
}

/// Five-line property block copied by the header "copy all" button.
#[must_use]
pub fn copy_all_text(info: &ComputedFontInfo) -> String {
    [
        format!("font-family: {};", info.font_family),
        format!("font-size: {};", info.font_size),
        format!("font-weight: {};", info.font_weight),
        format!("color: {};", rgb_to_hex(&info.color)),
        format!("font-style: {};", info.font_style),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(family: &str, style: &str) -> ComputedFontInfo {
        ComputedFontInfo {
            font_family: family.to_owned(),
            font_style: style.to_owned(),
            ..ComputedFontInfo::default()
        }
    }

    #[test]
    fn parse_splits_and_unquotes() {
        let parsed = parse_font_family(r#"Arial, "Helvetica Neue", sans-serif"#);
        assert_eq!(
            parsed,
            ParsedFontFamily {
                primary: "Arial".into(),
                fallbacks: vec!["Helvetica Neue".into(), "sans-serif".into()],
            }
        );
    }

    #[test]
    fn parse_single_quoted_primary() {
        let parsed = parse_font_family("'Fira Code'");
        assert_eq!(parsed.primary, "Fira Code");
        assert!(parsed.fallbacks.is_empty());
    }

    #[test]
    fn parse_empty_family() {
        let parsed = parse_font_family("");
        assert_eq!(parsed.primary, "");
        assert!(parsed.fallbacks.is_empty());
    }

    #[test]
    fn system_rules_shadow_google_list() {
        assert_eq!(font_source_label("Roboto"), "Android System Font");
        assert_eq!(font_source_label("Roboto, sans-serif"), "Android System Font");
        assert_eq!(font_source_label("Noto Sans"), "Android System Font");
        assert_eq!(font_source_label("Lato, sans-serif"), "Google Fonts");
    }

    #[test]
    fn classification_order() {
        assert_eq!(classify_font_source("-apple-system"), Some(FontSource::System));
        assert_eq!(classify_font_source("system-ui"), Some(FontSource::System));
        assert_eq!(
            classify_font_source("\"Segoe UI\", Tahoma"),
            Some(FontSource::WindowsSystem)
        );
        assert_eq!(classify_font_source("Proxima Nova"), Some(FontSource::AdobeFonts));
        assert_eq!(classify_font_source("Times New Roman"), Some(FontSource::Standard));
        assert_eq!(classify_font_source("Comic Sans MS"), None);
    }

    #[test]
    fn classification_uses_primary_only() {
        assert_eq!(classify_font_source("Comic Sans MS, Arial"), None);
    }

    #[test]
    fn format_family_with_and_without_source() {
        assert_eq!(format_font_family("Arial, sans-serif"), "Arial (Standard Font)");
        assert_eq!(format_font_family("\"Comic Sans MS\""), "Comic Sans MS");
    }

    #[test]
    fn describe_style_cases() {
        assert_eq!(describe_style(&info("Arial", "italic")), "italic");
        assert_eq!(describe_style(&info("Arial", "oblique 10deg")), "oblique 10deg");
        assert_eq!(describe_style(&info("Arial", "normal")), "normal");
        assert_eq!(
            describe_style(&info("Garamond Italic, serif", "normal")),
            "normal (italic font)"
        );
    }

    #[test]
    fn rgb_to_hex_cases() {
        assert_eq!(rgb_to_hex("rgb(255, 0, 0)"), "#ff0000");
        assert_eq!(rgb_to_hex("rgb(1,2,3)"), "#010203");
        assert_eq!(rgb_to_hex("transparent"), "transparent");
        assert_eq!(rgb_to_hex("rgba(0, 0, 0, 0.5)"), "rgba(0, 0, 0, 0.5)");
        // Out of range components keep their last two hex digits.
        assert_eq!(rgb_to_hex("rgb(300, 0, 0)"), "#2c0000");
    }

    #[test]
    fn copy_all_block_has_five_lines() {
        let info = ComputedFontInfo {
            font_family: "Arial".into(),
            font_size: "16px".into(),
            font_weight: "400".into(),
            font_style: "normal".into(),
            color: "rgb(0, 0, 255)".into(),
            ..ComputedFontInfo::default()
        };
        assert_eq!(
            copy_all_text(&info),
            "font-family: Arial;\nfont-size: 16px;\nfont-weight: 400;\ncolor: #0000ff;\nfont-style: normal;"
        );
    }

    #[test]
    fn font_info_serializes_camel_case() {
        let json = serde_json::to_value(info("Arial", "normal")).unwrap();
        assert_eq!(json["fontFamily"], "Arial");
        assert_eq!(json["textDecorationLine"], "");
    }
}
