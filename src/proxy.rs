//! Per-request dispatch for the proxy loop
//!
//! Failures in here never propagate: whatever goes wrong becomes a
//! player-error response to the test client, coded by the mode that was
//! active when it happened.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::mock::Exchange;
use crate::network::{capture, respond, Upstream, UpstreamClient};
use crate::player::{Mode, PlayerState};
use crate::{PlaybackError, Result};

/// Replay request did not match the recorded one.
pub const REQUEST_NOT_FOUND: u16 = 454;
/// Generic failure outside play/record.
pub const EXCEPTION: u16 = 550;
/// Failure during replay dispatch.
pub const PLAY_EXCEPTION: u16 = 551;
/// Failure during record dispatch.
pub const RECORD_EXCEPTION: u16 = 552;

/// Shared state the listener loop dispatches against.
pub(crate) struct ProxyContext {
    pub(crate) state: Mutex<PlayerState>,
    pub(crate) upstream: Upstream,
    pub(crate) client: UpstreamClient,
}

/// Serve one incoming request according to the current mode.
///
/// The statelock is taken before the mode is inspected and held until the
/// response is built, the outbound upstream call included. Control calls
/// therefore never observe a half-processed request, and the record cursor
/// advances atomically with the exchange it describes.
pub(crate) async fn dispatch(
    ctx: &ProxyContext,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let path = req
        .uri()
        .path_and_query()
        .map_or_else(|| "/".to_string(), ToString::to_string);

    let mut state = ctx.state.lock().await;
    match state.mode {
        Mode::Playing => match replay_one(&mut state, ctx, req).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Replay dispatch failed for {path}: {e}");
                respond::player_error(
                    PLAY_EXCEPTION,
                    "Player play exception",
                    format!("Replay failed for {path}: {e}"),
                )
            }
        },
        Mode::Recording => match record_one(&mut state, ctx, req).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Record dispatch failed for {path}: {e}");
                respond::player_error(
                    RECORD_EXCEPTION,
                    "Player record exception",
                    format!("Recording failed for {path}: {e}"),
                )
            }
        },
        Mode::Idle | Mode::Off => respond::player_error(
            EXCEPTION,
            "Player exception",
            format!("Player is not playing or recording; cannot serve {path}"),
        ),
    }
}

/// Pop the next recorded exchange and replay it if the live request matches.
async fn replay_one(
    state: &mut PlayerState,
    ctx: &ProxyContext,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let body = read_body(body).await?;
    let live = capture::request_to_mock(&parts, &body, &ctx.upstream);

    let record = state
        .record
        .as_mut()
        .ok_or_else(|| PlaybackError::invalid_state("replay a request", "idle"))?;
    let exchange = record.read()?;

    if exchange.request.matches(&live) {
        debug!("Replayed {} {}", live.method, live.uri);
        Ok(respond::mock_to_response(&exchange.response))
    } else {
        info!(
            "Request mismatch: recorded {} {}, live {} {}",
            exchange.request.method, exchange.request.uri, live.method, live.uri
        );
        Ok(respond::player_error(
            REQUEST_NOT_FOUND,
            "Player request mismatch",
            format!(
                "Unexpected request {} {}; the record expected {} {}",
                live.method, live.uri, exchange.request.method, exchange.request.uri
            ),
        ))
    }
}

/// Forward the live request upstream and append the exchange to the record.
async fn record_one(
    state: &mut PlayerState,
    ctx: &ProxyContext,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let body = read_body(body).await?;
    let live = capture::request_to_mock(&parts, &body, &ctx.upstream);

    // Deliberately blocking under the statelock: exchanges land in the
    // record in exactly the order their requests were received.
    let response = ctx.client.forward(&live).await?;

    let record = state
        .record
        .as_mut()
        .ok_or_else(|| PlaybackError::invalid_state("record a request", "idle"))?;
    debug!(
        "Recorded {} {} -> {} ({} exchange(s) in '{}')",
        live.method,
        live.uri,
        response.status_code,
        record.len() + 1,
        record.name()
    );

    let wire = respond::mock_to_response(&response);
    record.write(Exchange::new(live, response));
    Ok(wire)
}

async fn read_body(body: Incoming) -> Result<Bytes> {
    Ok(body
        .collect()
        .await
        .map_err(|e| PlaybackError::Io(std::io::Error::other(e)))?
        .to_bytes())
}
