#![forbid(unsafe_code)]

//! Messages exchanged with the extension runtime.
//!
//! Outgoing traffic is a single fire-and-forget `FONT_DETECTED` notification.
//! Incoming traffic the overlay acts on is the `{"action":"cleanup"}` control
//! request; everything else belongs to the background collaborator and is
//! ignored here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::font::ComputedFontInfo;

/// Errors from encoding or decoding runtime messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    Json(String),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
        }
    }
}

impl std::error::Error for MessageError {}

/// Typed extension messages, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    FontDetected {
        #[serde(rename = "fontInfo")]
        font_info: ComputedFontInfo,
    },
    GetFontInfo,
}

impl ExtensionMessage {
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Json(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        serde_json::from_str(json).map_err(|e| MessageError::Json(e.to_string()))
    }
}

/// Control requests addressed to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Cleanup,
}

#[derive(Debug, Deserialize)]
struct RawControl {
    #[serde(default)]
    action: Option<String>,
}

/// Parse a runtime payload into a control request.
///
/// Returns `Ok(None)` for well-formed messages that are not addressed to the
/// overlay (typed extension messages, unknown actions).
pub fn parse_control_request(json: &str) -> Result<Option<ControlRequest>, MessageError> {
    let raw: RawControl =
        serde_json::from_str(json).map_err(|e| MessageError::Json(e.to_string()))?;
    Ok(match raw.action.as_deref() {
        Some("cleanup") => Some(ControlRequest::Cleanup),
        _ => None,
    })
}

/// Reply sent after a control request has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    pub success: bool,
}

impl ControlResponse {
    pub fn to_json(self) -> Result<String, MessageError> {
        serde_json::to_string(&self).map_err(|e| MessageError::Json(e.to_string()))
    }
}
