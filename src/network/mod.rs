//! HTTP plumbing between the wire and the canonical exchange form

pub mod capture;
pub mod client;
pub mod respond;

pub use client::UpstreamClient;

use http::Uri;

use crate::{PlaybackError, Result};

/// The real service being recorded against.
///
/// Keeps the address exactly as configured: replay URIs are built by
/// concatenating `original` with the incoming path and query, so the
/// configured string form must survive untouched.
#[derive(Debug, Clone)]
pub struct Upstream {
    original: String,
    authority: String,
    host: String,
}

impl Upstream {
    /// Parse an upstream base address.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidArgument`] when the address is empty,
    /// unparseable, or not http(s).
    pub fn parse(address: &str) -> Result<Self> {
        let original = address.trim().to_string();
        if original.is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "remote address is required".to_string(),
            ));
        }

        let uri: Uri = original.parse().map_err(|e| {
            PlaybackError::InvalidArgument(format!("remote address '{original}': {e}"))
        })?;

        match uri.scheme_str() {
            Some("http" | "https") => {}
            _ => {
                return Err(PlaybackError::InvalidArgument(format!(
                    "remote address '{original}' must be http or https"
                )))
            }
        }

        let authority = uri
            .authority()
            .ok_or_else(|| {
                PlaybackError::InvalidArgument(format!(
                    "remote address '{original}' has no host"
                ))
            })?
            .to_string();
        let host = uri.host().unwrap_or_default().to_string();

        Ok(Self {
            original,
            authority,
            host,
        })
    }

    /// The address exactly as configured.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// `host[:port]` of the upstream, used for Host rewriting.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Bare host, used as the cookie domain.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}
