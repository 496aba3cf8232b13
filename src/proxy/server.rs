//! Accept loop and per-connection dispatch.
//!
//! # Responsibilities
//! - Pull connections off the bounded listener
//! - Spawn one task per connection, each owning its own session
//! - Keep accepting after transient accept errors
//! - Stop accepting when the shutdown signal fires
//!
//! # Design Decisions
//! - Session failures never reach this loop; a panicking session task is
//!   isolated by `tokio::spawn` and its permit and guard are released on unwind
//! - Nothing here waits on a session

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::proxy::session::{Session, SessionContext};
use crate::resilience::Backoff;

/// Forward proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    context: Arc<SessionContext>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let context = Arc::new(SessionContext::from_config(&config));
        Self {
            config,
            context,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle for observing live sessions.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Accept connections until `shutdown` fires (or its sender is dropped).
    ///
    /// The listener is dropped on return, releasing the port.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "Proxy server accepting connections");

        let mut backoff = Backoff::default();
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        backoff.reset();
                        self.dispatch(stream, peer_addr, permit);
                    }
                    Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                    Err(e) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            error = %e,
                            consecutive_failures = backoff.attempts(),
                            retry_in_ms = delay.as_millis() as u64,
                            "Accept failed"
                        );
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        tracing::info!(
            active_sessions = self.tracker.active_count(),
            "Proxy server stopped"
        );
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer_addr: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let context = Arc::clone(&self.context);
        let span = tracing::info_span!(
            "session",
            session_id = %guard.id(),
            peer_addr = %peer_addr,
            target = tracing::field::Empty,
        );

        tokio::spawn(
            async move {
                // Held until the session ends.
                let _permit = permit;

                if let Err(e) = stream.set_nodelay(true) {
                    tracing::trace!(error = %e, "Failed to set TCP_NODELAY on client socket");
                }
                let session = Session::new(guard.id(), peer_addr, stream);
                let _ = session.run(&context).await;
                drop(guard);
            }
            .instrument(span),
        );
    }
}
