//! Turning canonical responses back into wire responses

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use http::{Response, StatusCode};
use http_body_util::Full;
use hyper::ext::ReasonPhrase;
use tracing::warn;

use crate::mock::MockResponse;

/// Build the listener response for a captured exchange.
///
/// Used on both paths: replay sends the recorded response, recording echoes
/// the upstream's. `Connection` and `Transfer-Encoding` are connection
/// concerns of the live listener and are not replayed; `Content-Length` is
/// regenerated from the re-serialized body.
#[must_use]
pub fn mock_to_response(mock: &MockResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(mock.status_code).unwrap_or_else(|_| {
        warn!("Recorded status {} is unusable, replaying 500", mock.status_code);
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);
    let mut saw_set_cookie = false;

    if let Some(headers) = &mock.headers {
        for (name, value) in headers {
            match name.to_ascii_lowercase().as_str() {
                "connection" | "transfer-encoding" | "content-length" => continue,
                "set-cookie" => saw_set_cookie = true,
                _ => {}
            }
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!("Skipping unusable recorded header name '{name}'");
                continue;
            };
            let Ok(header_value) = HeaderValue::from_str(value) else {
                warn!("Skipping unusable recorded value for header '{name}'");
                continue;
            };
            builder = builder.header(header_name, header_value);
        }
    }

    if !saw_set_cookie {
        if let Some(cookies) = &mock.cookies {
            for cookie in cookies {
                if let Ok(value) = HeaderValue::from_str(&cookie.to_set_cookie()) {
                    builder = builder.header(SET_COOKIE, value);
                }
            }
        }
    }

    let body = mock.body_text().unwrap_or_default();
    let mut response = builder
        .body(Full::new(Bytes::from(body.into_bytes())))
        .expect("response parts are pre-validated");

    set_reason(&mut response, &mock.status_description);
    response
}

/// Synthesize a player-error response for the test client.
///
/// These surface internal conditions (mismatch, exhausted record, dispatch
/// failures) as distinctive status codes rather than in-process errors.
#[must_use]
pub fn player_error(code: u16, reason: &str, detail: String) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(code).expect("player-error codes are in range");
    let mut response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(detail.into_bytes())))
        .expect("response parts are pre-validated");

    set_reason(&mut response, reason);
    response
}

/// Attach a non-canonical reason phrase when the recorded description
/// differs from the status line hyper would emit on its own.
fn set_reason(response: &mut Response<Full<Bytes>>, description: &str) {
    if description.is_empty() || Some(description) == response.status().canonical_reason() {
        return;
    }
    match ReasonPhrase::try_from(description.as_bytes()) {
        Ok(reason) => {
            response.extensions_mut().insert(reason);
        }
        Err(_) => warn!("Reason phrase '{description}' is not emittable"),
    }
}
