//! Canonical request form and the replay matching predicate

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::cookie::Cookie;

/// A captured HTTP request in canonical form.
///
/// The `uri` is always fully qualified against the upstream base, never the
/// listener's address, so a recorded request can be re-issued against the
/// real service while recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockRequest {
    /// Uppercase HTTP verb
    pub method: String,
    /// Fully-qualified URL: upstream base + incoming path and query
    pub uri: String,
    /// Body decoded to text, absent when the request had no body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Flattened headers in first-seen order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<IndexMap<String, String>>,
    /// Request cookies, absent when the request carried none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Cookie>>,
}

impl MockRequest {
    /// Decide whether a live request matches this recorded one.
    ///
    /// Methods, URIs and bodies compare as exact strings. Headers must agree
    /// in presence, count and per-key value; cookies in presence, count and
    /// per-name identity. One tolerance applies: a recorded
    /// `Connection: Keep-Alive` is ignored when the live request carries no
    /// `Connection` header at all, because clients do not reliably emit it.
    #[must_use]
    pub fn matches(&self, live: &MockRequest) -> bool {
        if self.method != live.method {
            return false;
        }
        if self.uri != live.uri {
            return false;
        }
        if self.content != live.content {
            return false;
        }
        if !headers_match(self.headers.as_ref(), live.headers.as_ref()) {
            return false;
        }
        cookies_match(self.cookies.as_ref(), live.cookies.as_ref())
    }
}

/// Case-insensitive header lookup.
fn header_get<'a>(headers: &'a IndexMap<String, String>, name: &str) -> Option<&'a String> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn headers_match(
    recorded: Option<&IndexMap<String, String>>,
    live: Option<&IndexMap<String, String>>,
) -> bool {
    let (Some(recorded), Some(live)) = (recorded, live) else {
        return recorded.is_none() && live.is_none();
    };

    // A recorded Keep-Alive with no live Connection header is dropped from
    // the recorded side before comparing.
    let keep_alive_tolerated = header_get(live, "connection").is_none()
        && header_get(recorded, "connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("keep-alive"));

    let mut expected = recorded.len();
    if keep_alive_tolerated {
        expected -= 1;
    }
    if expected != live.len() {
        return false;
    }

    recorded.iter().all(|(name, value)| {
        if keep_alive_tolerated && name.eq_ignore_ascii_case("connection") {
            return true;
        }
        header_get(live, name) == Some(value)
    })
}

fn cookies_match(recorded: Option<&Vec<Cookie>>, live: Option<&Vec<Cookie>>) -> bool {
    let (Some(recorded), Some(live)) = (recorded, live) else {
        return recorded.is_none() && live.is_none();
    };
    if recorded.len() != live.len() {
        return false;
    }
    recorded.iter().all(|cookie| {
        live.iter()
            .find(|candidate| candidate.name == cookie.name)
            .is_some_and(|candidate| candidate.same_cookie(cookie))
    })
}
