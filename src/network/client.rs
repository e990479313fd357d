//! Outbound HTTP client used while recording

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, COOKIE};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::mock::{MockRequest, MockResponse};
use crate::{PlaybackError, Result};

use super::capture;

/// Client that re-issues captured requests against the real upstream.
///
/// Built once per player and reused, so recording a long session does not
/// open a TLS connection per request.
pub struct UpstreamClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl UpstreamClient {
    /// Create a client able to reach http and https upstreams.
    #[must_use]
    pub fn new() -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build(https);

        Self { client }
    }

    /// Forward a captured request to the upstream and capture the reply.
    ///
    /// Any response — error statuses included — is a reply worth
    /// recording and comes back as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Upstream`] only when no response exists at
    /// all: the request could not be built, the connection failed, or the
    /// body could not be read.
    pub async fn forward(&self, mock: &MockRequest) -> Result<MockResponse> {
        let request = build_outbound(mock)?;
        debug!("Forwarding {} {}", mock.method, mock.uri);

        let response = self.client.request(request).await.map_err(|e| {
            warn!("Upstream request failed: {e}");
            PlaybackError::Upstream(e.to_string())
        })?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| PlaybackError::Upstream(format!("failed to read upstream body: {e}")))?
            .to_bytes();

        Ok(capture::response_to_mock(&parts, &body))
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuild the wire request from its canonical form.
///
/// Transport-managed headers are not copied verbatim: `Connection`,
/// `Content-Length`, `Transfer-Encoding` and `Proxy-Connection` are left to
/// the client stack, the `100-continue` token is stripped from `Expect`,
/// and `Content-Length` is regenerated from the re-encoded body. The
/// captured `Host` value is applied as-is.
fn build_outbound(mock: &MockRequest) -> Result<Request<Full<Bytes>>> {
    let uri: Uri = mock.uri.parse().map_err(|e| {
        PlaybackError::Upstream(format!("recorded uri '{}' is not sendable: {e}", mock.uri))
    })?;
    let method: Method = mock.method.parse().map_err(|e| {
        PlaybackError::Upstream(format!("recorded method '{}' is invalid: {e}", mock.method))
    })?;

    let body = Bytes::from(mock.content.clone().unwrap_or_default().into_bytes());

    let mut builder = Request::builder().method(method).uri(uri);
    let mut saw_cookie_header = false;

    if let Some(headers) = &mock.headers {
        for (name, value) in headers {
            match name.to_ascii_lowercase().as_str() {
                "connection" | "content-length" | "transfer-encoding" | "proxy-connection" => {}
                "expect" => {
                    let rest = value
                        .split(',')
                        .map(str::trim)
                        .filter(|token| !token.eq_ignore_ascii_case("100-continue"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    if !rest.is_empty() {
                        builder = builder.header(name.as_str(), rest);
                    }
                }
                "cookie" => {
                    saw_cookie_header = true;
                    builder = builder.header(name.as_str(), value.as_str());
                }
                _ => builder = builder.header(name.as_str(), value.as_str()),
            }
        }
    }

    // Cookies recorded without a Cookie header (hand-written cassettes)
    // still have to reach the upstream.
    if !saw_cookie_header {
        if let Some(cookies) = mock.cookies.as_ref().filter(|c| !c.is_empty()) {
            let header = cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE, header);
        }
    }

    if mock.content.is_some() {
        builder = builder.header(CONTENT_LENGTH, body.len());
    }

    builder
        .body(Full::new(body))
        .map_err(|e| PlaybackError::Upstream(format!("failed to build outbound request: {e}")))
}
