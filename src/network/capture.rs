//! Canonicalization of live HTTP traffic into mock form
//!
//! Everything the matcher later compares is decided here: URI rebasing onto
//! the upstream, header flattening, Host rewriting, body decoding. Capture
//! must behave identically on the record and replay paths or nothing will
//! ever match.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::HeaderMap;
use hyper::ext::ReasonPhrase;
use indexmap::IndexMap;

use crate::mock::{cookie, Cookie, MockRequest, MockResponse};

use super::Upstream;

/// Build the canonical form of an incoming listener request.
///
/// The listener's scheme and authority are discarded; the URI becomes the
/// upstream's configured address plus the incoming path and query. A `Host`
/// header, when present, is rewritten to the upstream authority, and cookie
/// domains are forced to the upstream host.
#[must_use]
pub fn request_to_mock(
    parts: &http::request::Parts,
    body: &Bytes,
    upstream: &Upstream,
) -> MockRequest {
    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let uri = format!("{}{}", upstream.original(), path_and_query);

    let mut headers = flatten_headers(&parts.headers);
    if let Some(map) = headers.as_mut() {
        for (name, value) in map.iter_mut() {
            if name.eq_ignore_ascii_case("host") {
                *value = upstream.authority().to_string();
            }
        }
    }

    let cookies = headers
        .as_ref()
        .and_then(|map| {
            map.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("cookie"))
                .map(|(_, value)| cookie::parse_cookie_header(value, upstream.host()))
        })
        .filter(|cookies| !cookies.is_empty());

    let content_type = header_str(&parts.headers, CONTENT_TYPE.as_str());
    let content = (!body.is_empty()).then(|| decode_body(body, content_type));

    MockRequest {
        method: parts.method.to_string(),
        uri,
        content,
        headers,
        cookies,
    }
}

/// Build the canonical form of an upstream response.
#[must_use]
pub fn response_to_mock(parts: &http::response::Parts, body: &Bytes) -> MockResponse {
    let status_description = parts
        .extensions
        .get::<ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| parts.status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    let cookies: Vec<Cookie> = parts
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(cookie::parse_set_cookie)
        .collect();

    let mut mock = MockResponse {
        status_code: parts.status.as_u16(),
        status_description,
        headers: flatten_headers(&parts.headers),
        cookies: (!cookies.is_empty()).then_some(cookies),
        ..MockResponse::default()
    };

    if !body.is_empty() {
        let content_type = header_str(&parts.headers, CONTENT_TYPE.as_str());
        mock.set_content(decode_body(body, content_type));
    }
    mock
}

/// Flatten a header map into an ordered name → value mapping.
///
/// Multi-valued headers collapse to one comma-joined entry; order is the
/// first occurrence of each name. Returns `None` for an empty map so the
/// serialized object omits the field entirely.
#[must_use]
pub fn flatten_headers(headers: &HeaderMap) -> Option<IndexMap<String, String>> {
    if headers.is_empty() {
        return None;
    }
    let mut map = IndexMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_string(), joined);
    }
    Some(map)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Decode body bytes using the declared `Content-Type` charset.
///
/// `iso-8859-1`/`latin1` are decoded exactly; `utf-8`, `us-ascii`, an
/// unknown charset, or no declaration at all fall back to lossy UTF-8
/// rather than any platform-default encoding.
#[must_use]
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    match declared_charset(content_type).as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1") => bytes.iter().map(|&b| b as char).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn declared_charset(content_type: Option<&str>) -> Option<String> {
    content_type?.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}
