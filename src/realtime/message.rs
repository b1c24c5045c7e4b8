//! Inbound frame payloads.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// The most recent payload received on a channel.
///
/// Frames are expected to carry JSON. Anything that does not parse is kept
/// verbatim instead of being dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Json(Value),
    Raw(String),
}

impl ChannelMessage {
    /// Parse a text frame, falling back to the raw payload.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => ChannelMessage::Json(value),
            Err(_) => ChannelMessage::Raw(text.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ChannelMessage::Json(value) => Some(value),
            ChannelMessage::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            ChannelMessage::Raw(text) => Some(text),
            ChannelMessage::Json(_) => None,
        }
    }

    /// Deserialize a JSON payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.as_json()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelMessage::Json(_) => "json",
            ChannelMessage::Raw(_) => "raw",
        }
    }
}
