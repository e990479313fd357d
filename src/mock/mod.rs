//! Canonical in-memory form of a captured HTTP exchange
//!
//! Everything the proxy records or replays passes through these types;
//! their JSON shape is the cassette file format.

pub mod cookie;
pub mod request;
pub mod response;

pub use cookie::Cookie;
pub use request::MockRequest;
pub use response::MockResponse;

use serde::{Deserialize, Serialize};

/// One captured request/response pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// The request as seen by the listener, rebased onto the upstream
    pub request: MockRequest,
    /// The upstream's response
    pub response: MockResponse,
}

impl Exchange {
    /// Pair a request with its response.
    #[must_use]
    pub fn new(request: MockRequest, response: MockResponse) -> Self {
        Self { request, response }
    }
}
