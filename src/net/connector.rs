//! Outbound connections to the requested origin.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use crate::observability::metrics;
use crate::proxy::ProxyError;
use crate::resilience::with_timeout;

/// Opens upstream TCP connections under a connect deadline.
///
/// The deadline covers name resolution as well as the handshake.
#[derive(Debug, Clone, Copy)]
pub struct Connector {
    connect_timeout: Duration,
}

impl Connector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Connect to `host:port`, mapping every failure to `UpstreamUnreachable`.
    pub async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ProxyError> {
        let started = Instant::now();
        let attempt = with_timeout(
            self.connect_timeout,
            "upstream connect",
            TcpStream::connect((host, port)),
        )
        .await;

        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(unreachable(host, port, source)),
            Err(elapsed) => return Err(unreachable(host, port, elapsed.into())),
        };
        metrics::record_upstream_connect(started.elapsed());

        if let Err(e) = stream.set_nodelay(true) {
            tracing::trace!(error = %e, "Failed to set TCP_NODELAY on upstream socket");
        }
        tracing::debug!(
            host = %host,
            port,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream connected"
        );
        Ok(stream)
    }
}

fn unreachable(host: &str, port: u16, source: std::io::Error) -> ProxyError {
    ProxyError::UpstreamUnreachable {
        target: format!("{}:{}", host, port),
        source,
    }
}
