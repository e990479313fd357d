//! Canonical response form

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cookie::Cookie;

/// A captured HTTP response.
///
/// The body is persisted as structured JSON when the captured text parses
/// as JSON, and as a plain string otherwise. That distinction exists only
/// in the cassette file; [`MockResponse::body_text`] always yields the
/// replayable text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Reason phrase as received
    pub status_description: String,
    /// Body, absent when the response had none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Flattened headers in first-seen order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<IndexMap<String, String>>,
    /// Response cookies, absent when the response set none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Cookie>>,
}

impl MockResponse {
    /// Store captured body text, embedding it as structured JSON when it
    /// parses as JSON.
    pub fn set_content(&mut self, text: String) {
        self.content = Some(match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) => Value::String(text),
        });
    }

    /// The body text to put back on the wire during replay.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        match &self.content {
            None => None,
            Some(Value::String(text)) => Some(text.clone()),
            // Embedded JSON is re-serialized; compact form, as recorded.
            Some(value) => Some(value.to_string()),
        }
    }
}
