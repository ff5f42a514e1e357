#![forbid(unsafe_code)]

//! JS options object → [`OverlayConfig`] plus log level.
//!
//! The page passes an optional plain object to the `FindFont` constructor.
//! It is serialized to JSON on the JS side of the boundary and decoded here,
//! so the mapping is testable natively.
//!
//! Keys are camelCase versions of the [`OverlayConfig`] fields. Durations
//! are milliseconds. Missing keys keep the defaults; unknown keys are
//! ignored.
//!
//! ```json
//! { "margin": 12, "debounce": 200, "defaultPanel": { "width": 300, "height": 220 },
//!   "previewMinPx": 10, "logLevel": "debug" }
//! ```

use std::fmt;
use std::time::Duration;

use findfont_core::{OverlayConfig, Size};
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

/// Errors from decoding the options object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// Malformed JSON or a value of the wrong type.
    Json(String),
    /// A numeric field outside its valid range.
    OutOfRange(&'static str),
    /// `logLevel` is not one of off/error/warn/info/debug/trace.
    UnknownLevel(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "options JSON error: {msg}"),
            Self::OutOfRange(field) => write!(f, "option out of range: {field}"),
            Self::UnknownLevel(level) => write!(f, "unknown log level: {level}"),
        }
    }
}

impl std::error::Error for OptionsError {}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawSize {
    width: f64,
    height: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptions {
    #[serde(default)]
    margin: Option<f64>,
    #[serde(default)]
    button_size: Option<f64>,
    #[serde(default)]
    default_panel: Option<RawSize>,
    #[serde(default)]
    debounce: Option<u64>,
    #[serde(default)]
    hide_delay: Option<u64>,
    #[serde(default)]
    selection_clear_delay: Option<u64>,
    #[serde(default)]
    copied_feedback: Option<u64>,
    #[serde(default)]
    preview_min_px: Option<u32>,
    #[serde(default)]
    preview_max_px: Option<u32>,
    #[serde(default)]
    max_visible_fallbacks: Option<usize>,
    #[serde(default)]
    log_level: Option<String>,
}

/// Decoded entry-point options.
#[derive(Debug, Clone, PartialEq)]
pub struct WebOptions {
    pub config: OverlayConfig,
    /// Most verbose level forwarded to the console (default: warn).
    pub log_level: LevelFilter,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            config: OverlayConfig::default(),
            log_level: LevelFilter::WARN,
        }
    }
}

fn non_negative(value: f64, field: &'static str) -> Result<f64, OptionsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(OptionsError::OutOfRange(field))
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, OptionsError> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::OFF),
        "error" => Ok(LevelFilter::ERROR),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        _ => Err(OptionsError::UnknownLevel(level.to_owned())),
    }
}

/// Decode an options object serialized as JSON.
///
/// `null` and an empty string yield the defaults.
pub fn parse_options(json: &str) -> Result<WebOptions, OptionsError> {
    let trimmed = json.trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
        return Ok(WebOptions::default());
    }
    let raw: RawOptions =
        serde_json::from_str(trimmed).map_err(|e| OptionsError::Json(e.to_string()))?;

    let mut config = OverlayConfig::default();
    if let Some(margin) = raw.margin {
        config = config.margin(non_negative(margin, "margin")?);
    }
    if let Some(size) = raw.button_size {
        config = config.button_size(non_negative(size, "buttonSize")?);
    }
    if let Some(RawSize { width, height }) = raw.default_panel {
        let width = non_negative(width, "defaultPanel.width")?;
        let height = non_negative(height, "defaultPanel.height")?;
        if width == 0.0 || height == 0.0 {
            return Err(OptionsError::OutOfRange("defaultPanel"));
        }
        config = config.default_panel(Size::new(width, height));
    }
    if let Some(ms) = raw.debounce {
        config = config.debounce(Duration::from_millis(ms));
    }
    if let Some(ms) = raw.hide_delay {
        config = config.hide_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = raw.selection_clear_delay {
        config = config.selection_clear_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = raw.copied_feedback {
        config = config.copied_feedback(Duration::from_millis(ms));
    }
    if raw.preview_min_px.is_some() || raw.preview_max_px.is_some() {
        let min = raw.preview_min_px.unwrap_or(config.preview_min_px);
        let max = raw.preview_max_px.unwrap_or(config.preview_max_px);
        if min > max {
            return Err(OptionsError::OutOfRange("previewMinPx"));
        }
        config = config.preview_bounds(min, max);
    }
    if let Some(count) = raw.max_visible_fallbacks {
        config = config.max_visible_fallbacks(count);
    }

    let log_level = match raw.log_level.as_deref() {
        Some(level) => parse_level(level)?,
        None => LevelFilter::WARN,
    };

    Ok(WebOptions { config, log_level })
}
