//! The player: state machine, control API and listener lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use http::Uri;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cassette::{Cassette, Record};
use crate::network::{Upstream, UpstreamClient};
use crate::proxy::{self, ProxyContext};
use crate::{PlaybackError, Result};

/// Player modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Listener not running
    Off,
    /// Listening but neither playing nor recording
    Idle,
    /// Serving exchanges from a record
    Playing,
    /// Forwarding upstream and appending to a record
    Recording,
}

impl Mode {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Mode::Off => "off",
            Mode::Idle => "idle",
            Mode::Playing => "playing",
            Mode::Recording => "recording",
        }
    }
}

/// Everything guarded by the statelock.
pub(crate) struct PlayerState {
    pub(crate) mode: Mode,
    pub(crate) cassette: Option<Cassette>,
    pub(crate) record: Option<Record>,
}

/// Record/replay proxy bound to a local address.
///
/// Control calls drive the `Off -> Idle -> Playing/Recording` state
/// machine; a background accept loop dispatches incoming requests against
/// the same state. One mutex guards both, so a request in flight always
/// completes before a mode change is observed.
pub struct Player {
    listen_host: String,
    listen_port: u16,
    base_address: String,
    local_addr: Option<SocketAddr>,
    ctx: Arc<ProxyContext>,
    shutdown_tx: broadcast::Sender<()>,
    listener_task: Option<JoinHandle<()>>,
}

impl Player {
    /// Create a player listening on `base_address` and recording against
    /// `remote_address`. The listener is not started.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidArgument`] when either address is
    /// empty or unusable. The listener side must be plain http; terminating
    /// TLS towards the test client is out of scope.
    pub fn new(base_address: &str, remote_address: &str) -> Result<Self> {
        let mut base_address = base_address.trim().to_string();
        if base_address.is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "base address is required".to_string(),
            ));
        }
        if !base_address.ends_with('/') {
            base_address.push('/');
        }

        let base: Uri = base_address.parse().map_err(|e| {
            PlaybackError::InvalidArgument(format!("base address '{base_address}': {e}"))
        })?;
        if base.scheme_str() != Some("http") {
            return Err(PlaybackError::InvalidArgument(format!(
                "base address '{base_address}' must be http"
            )));
        }
        let listen_host = base
            .host()
            .ok_or_else(|| {
                PlaybackError::InvalidArgument(format!(
                    "base address '{base_address}' has no host"
                ))
            })?
            .to_string();
        let listen_port = base.port_u16().unwrap_or(80);

        let upstream = Upstream::parse(remote_address)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listen_host,
            listen_port,
            base_address,
            local_addr: None,
            ctx: Arc::new(ProxyContext {
                state: Mutex::new(PlayerState {
                    mode: Mode::Off,
                    cassette: None,
                    record: None,
                }),
                upstream,
                client: UpstreamClient::new(),
            }),
            shutdown_tx,
            listener_task: None,
        })
    }

    /// Load the cassette subsequent `play`/`record` calls resolve against.
    /// Legal in any state.
    pub async fn load(&self, cassette: Cassette) {
        let mut state = self.ctx.state.lock().await;
        debug!("Loaded cassette {}", cassette.path().display());
        state.cassette = Some(cassette);
    }

    /// Bind the listener and launch the proxy loop.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` unless the player is `Off`, or with an I/O
    /// error when the address cannot be bound.
    pub async fn start(&mut self) -> Result<()> {
        let mut state = self.ctx.state.lock().await;
        if state.mode != Mode::Off {
            return Err(PlaybackError::invalid_state("start", state.mode.name()));
        }

        let listener =
            TcpListener::bind((self.listen_host.as_str(), self.listen_port)).await?;
        let local_addr = listener.local_addr()?;
        state.mode = Mode::Idle;
        drop(state);

        info!("Player listening on {local_addr}");
        self.local_addr = Some(local_addr);
        let ctx = Arc::clone(&self.ctx);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.listener_task = Some(tokio::spawn(accept_loop(listener, ctx, shutdown_rx)));
        Ok(())
    }

    /// Switch to playing back the named record.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless `Idle`; `CassetteNotLoaded` without a
    /// cassette; `RecordNotFound` when the cassette has no such record.
    pub async fn play(&self, name: &str) -> Result<()> {
        let mut state = self.ctx.state.lock().await;
        if state.mode != Mode::Idle {
            return Err(PlaybackError::invalid_state("play", state.mode.name()));
        }
        let cassette = state
            .cassette
            .as_ref()
            .ok_or(PlaybackError::CassetteNotLoaded)?;
        let record = cassette
            .find(name)
            .ok_or_else(|| PlaybackError::RecordNotFound(name.to_string()))?;

        info!("Playing record '{name}' ({} exchange(s))", record.len());
        state.record = Some(record);
        state.mode = Mode::Playing;
        Ok(())
    }

    /// Switch to recording into a fresh record with the given name.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless `Idle`; `CassetteNotLoaded` without a
    /// cassette.
    pub async fn record(&self, name: &str) -> Result<()> {
        let mut state = self.ctx.state.lock().await;
        if state.mode != Mode::Idle {
            return Err(PlaybackError::invalid_state("record", state.mode.name()));
        }
        if state.cassette.is_none() {
            return Err(PlaybackError::CassetteNotLoaded);
        }

        info!("Recording into record '{name}'");
        state.record = Some(Record::new(name));
        state.mode = Mode::Recording;
        Ok(())
    }

    /// Leave playing or recording mode; a recording is committed to the
    /// cassette and the cassette rewritten to disk.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the player is `Off`; I/O errors from the
    /// cassette rewrite.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.ctx.state.lock().await;
        if state.mode == Mode::Off {
            return Err(PlaybackError::invalid_state("stop", state.mode.name()));
        }
        Self::wind_down(&mut state)?;
        state.mode = Mode::Idle;
        Ok(())
    }

    /// Stop whatever is in progress and shut the listener down.
    /// A no-op when already `Off`.
    ///
    /// # Errors
    ///
    /// I/O errors from committing an in-progress recording.
    pub async fn close(&mut self) -> Result<()> {
        {
            let mut state = self.ctx.state.lock().await;
            if state.mode == Mode::Off {
                return Ok(());
            }
            Self::wind_down(&mut state)?;
            state.mode = Mode::Off;
        }

        self.shutdown_tx.send(()).ok();
        if let Some(task) = self.listener_task.take() {
            let _ = task.await;
        }
        self.local_addr = None;
        info!("Player closed");
        Ok(())
    }

    /// Rewind and release the current record, saving it first when it was
    /// being recorded.
    fn wind_down(state: &mut PlayerState) -> Result<()> {
        let recording = state.mode == Mode::Recording;
        if let Some(mut record) = state.record.take() {
            record.rewind();
            if recording {
                state
                    .cassette
                    .as_mut()
                    .ok_or(PlaybackError::CassetteNotLoaded)?
                    .save(&record)?;
            }
        }
        Ok(())
    }

    /// The configured listen prefix, always slash-terminated.
    #[must_use]
    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Bound listener address; `None` until started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Current state name, for diagnostics.
    pub async fn state(&self) -> &'static str {
        self.ctx.state.lock().await.mode.name()
    }
}

/// Accept connections until shutdown. Connections are served on their own
/// tasks; the statelock inside `dispatch` keeps request processing serial.
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ProxyContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {peer}");
                        let io = TokioIo::new(stream);
                        let ctx = Arc::clone(&ctx);
                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let ctx = Arc::clone(&ctx);
                                async move {
                                    Ok::<_, std::convert::Infallible>(
                                        proxy::dispatch(&ctx, req).await,
                                    )
                                }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection ended: {e}");
                            }
                        });
                    }
                    Err(e) => error!("Accept error: {e}"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Listener shutting down");
                break;
            }
        }
    }
}
