//! One client connection from accept to close.
//!
//! # State Machine
//! ```text
//! Parsing ──head ok──▶ Connecting ──upstream ok──▶ Tunneling ──EOF/error──▶ Closed
//!    │                     │
//!    └──── 400 ────────────┴──── 502 ────────────────────────────────────▶ Closed
//! ```
//!
//! The session owns both sockets. They are dropped together when the session
//! is, which makes "closed exactly once" a property of ownership.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::http::request::{read_request, ParsedRequest, RequestHead};
use crate::http::response;
use crate::net::{Connector, SessionId, SessionState};
use crate::observability::metrics;
use crate::proxy::ProxyError;
use crate::relay::{self, RelayStats, Termination};
use crate::resilience::with_timeout;

/// Per-server settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub connector: Connector,
    pub header_timeout: Duration,
    pub max_header_bytes: usize,
    pub buffer_size: usize,
}

impl SessionContext {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            connector: Connector::new(config.timeouts.connect()),
            header_timeout: config.timeouts.header_read(),
            max_header_bytes: config.limits.max_header_bytes,
            buffer_size: config.relay.buffer_size,
        }
    }
}

/// State for one accepted client connection.
pub struct Session<C = TcpStream> {
    id: SessionId,
    peer_addr: SocketAddr,
    client: C,
    remote: Option<TcpStream>,
    request: Option<ParsedRequest>,
    state: SessionState,
}

impl<C> Session<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: SessionId, peer_addr: SocketAddr, client: C) -> Self {
        Self {
            id,
            peer_addr,
            client,
            remote: None,
            request: None,
            state: SessionState::Parsing,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to `Closed`.
    ///
    /// Errors are already logged and answered (400/502) when this returns;
    /// callers only need the value for tests and diagnostics.
    pub async fn run(mut self, ctx: &SessionContext) -> Result<RelayStats, ProxyError> {
        let result = match self.establish(ctx).await {
            Ok(()) => {
                self.transition(SessionState::Tunneling);
                self.tunnel(ctx.buffer_size).await
            }
            Err(e) => {
                if let Some(status) = e.response() {
                    response::send_best_effort(&mut self.client, status).await;
                }
                Err(e)
            }
        };

        match &result {
            Ok(stats) => {
                tracing::info!(
                    bytes_up = stats.client_to_remote,
                    bytes_down = stats.remote_to_client,
                    closed_by = stats.termination.side().as_str(),
                    "Session closed"
                );
                if let Termination::Error(side, e) = &stats.termination {
                    tracing::debug!(side = side.as_str(), error = %e, "Relay ended on I/O error");
                }
            }
            Err(e) => {
                metrics::record_session_error(e.kind());
                if e.is_quiet() {
                    tracing::debug!(error = %e, state = %self.state, "Session ended");
                } else {
                    tracing::warn!(error = %e, state = %self.state, "Session failed");
                }
            }
        }

        self.close();
        result
    }

    /// Parsing and Connecting phases, including the handshake bytes each
    /// mode sends before the relay starts.
    async fn establish(&mut self, ctx: &SessionContext) -> Result<(), ProxyError> {
        let RequestHead {
            request,
            early_data,
        } = with_timeout(
            ctx.header_timeout,
            "request head",
            read_request(&mut self.client, ctx.max_header_bytes),
        )
        .await
        .map_err(|_| ProxyError::HeaderTimeout)??;

        metrics::record_session(request.kind().as_str());
        tracing::Span::current().record("target", tracing::field::display(request.authority()));
        tracing::info!(
            method = %request.method,
            target = %request.authority(),
            path = %request.path,
            "Request parsed"
        );

        self.transition(SessionState::Connecting);
        let request = self.request.insert(request);
        let mut remote = ctx.connector.connect(&request.host, request.port).await?;

        if request.is_connect {
            self.client
                .write_all(response::CONNECTION_ESTABLISHED)
                .await
                .map_err(ProxyError::RelayIo)?;
        } else {
            remote
                .write_all(&request.outbound_head())
                .await
                .map_err(|source| upstream_failed(request, source))?;
        }
        if !early_data.is_empty() {
            remote
                .write_all(&early_data)
                .await
                .map_err(|source| upstream_failed(request, source))?;
        }

        self.remote = Some(remote);
        Ok(())
    }

    async fn tunnel(&mut self, buffer_size: usize) -> Result<RelayStats, ProxyError> {
        let remote = self.remote.as_mut().ok_or_else(|| {
            ProxyError::RelayIo(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no upstream connection",
            ))
        })?;
        Ok(relay::relay(&mut self.client, remote, buffer_size).await)
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Ignoring illegal session transition");
            return;
        }
        tracing::trace!(from = %self.state, to = %next, "Session state changed");
        self.state = next;
    }

    /// Release the upstream socket and enter `Closed`. Idempotent.
    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.remote = None;
        self.transition(SessionState::Closed);
        tracing::trace!(peer_addr = %self.peer_addr, "Session torn down");
    }
}

fn upstream_failed(request: &ParsedRequest, source: std::io::Error) -> ProxyError {
    ProxyError::UpstreamUnreachable {
        target: request.authority(),
        source,
    }
}
