//! Cookie capture and persistence
//!
//! Cookies are stored with PascalCase keys and only the fields that are
//! actually set; unset attributes stay out of the cassette instead of
//! appearing as nulls.

use serde::{Deserialize, Serialize};

/// A captured cookie.
///
/// `name`, `value` and `domain` are always present; everything else is
/// omitted from the serialized form when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie applies to
    pub domain: String,
    /// Comment attribute, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// CommentURL attribute, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_uri: Option<String>,
    /// Discard flag (serialized only when true)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub discard: bool,
    /// Expired flag (serialized only when true)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub expired: bool,
    /// Expires attribute, kept verbatim as recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Path attribute, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Port attribute, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Secure flag (serialized only when true)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub secure: bool,
}

impl Cookie {
    /// Create a cookie with just name, value and domain set.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Identity comparison used by request matching: name, value, path and
    /// domain decide whether two cookies are the same.
    #[must_use]
    pub fn same_cookie(&self, other: &Cookie) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.path == other.path
            && self.domain == other.domain
    }

    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_set_cookie(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if !self.domain.is_empty() {
            out.push_str("; Domain=");
            out.push_str(&self.domain);
        }
        if let Some(expires) = &self.expires {
            out.push_str("; Expires=");
            out.push_str(expires);
        }
        if let Some(port) = &self.port {
            out.push_str("; Port=");
            out.push_str(port);
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.discard {
            out.push_str("; Discard");
        }
        out
    }
}

/// Parse a request-side `Cookie` header (`a=1; b=2`) into cookies bound to
/// the given domain.
#[must_use]
pub fn parse_cookie_header(value: &str, domain: &str) -> Vec<Cookie> {
    value
        .split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie::new(name, value.trim(), domain))
        })
        .collect()
}

/// Parse a single `Set-Cookie` header value.
///
/// Returns `None` when the value has no `name=value` prefix.
#[must_use]
pub fn parse_set_cookie(value: &str) -> Option<Cookie> {
    let mut parts = value.split(';');
    let first = parts.next()?.trim();
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::new(name, value.trim(), String::new());
    for attr in parts {
        let attr = attr.trim();
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (attr, None),
        };
        match key.to_ascii_lowercase().as_str() {
            "path" => cookie.path = val.map(str::to_string),
            "domain" => cookie.domain = val.unwrap_or_default().to_string(),
            "expires" => cookie.expires = val.map(str::to_string),
            "port" => cookie.port = val.map(str::to_string),
            "comment" => cookie.comment = val.map(str::to_string),
            "commenturl" => cookie.comment_uri = val.map(str::to_string),
            "secure" => cookie.secure = true,
            "discard" => cookie.discard = true,
            // Max-Age, HttpOnly, SameSite carry no replay meaning here
            _ => {}
        }
    }
    Some(cookie)
}
