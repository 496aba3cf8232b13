//! Startup orchestration.
//!
//! Ordered startup: metrics exporter (optional), then the listener, then the
//! accept loop. Traffic is only accepted once everything before it is ready.

use std::net::SocketAddr;

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::ProxyServer;

/// Bind and serve until `shutdown` fires.
///
/// The listening socket is created here and released when this returns.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), ListenerError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        connect_timeout_secs = config.timeouts.connect_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = ProxyServer::new(config);
    server.run(listener, shutdown.subscribe()).await
}
