//! Forward proxy (v1)
//!
//! A minimal HTTP/1.x forward proxy built on Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                    FORWARD PROXY                      │
//!                        │                                                       │
//!   CONNECT host:443     │  ┌──────────┐   ┌──────────┐   ┌───────────┐         │
//!   GET http://host/p    │  │   net    │──▶│  http    │──▶│    net    │         │
//!   ─────────────────────┼─▶│ listener │   │ request  │   │ connector │─────────┼──▶ Origin
//!                        │  └──────────┘   └──────────┘   └─────┬─────┘         │
//!                        │       │ one task per connection      │               │
//!                        │       ▼                              ▼               │
//!   ◀────────────────────┼── proxy::session ◀──────────────── relay ◀───────────┼─── Origin
//!                        │                                                       │
//!                        │  config · observability · resilience · lifecycle      │
//!                        └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Resource limits
//!
//! Sessions are bounded by `listener.max_connections`. A tunnel holds its
//! permit for as long as both peers keep it open, so long-lived tunnels can
//! still exhaust the pool; excess clients then wait in the kernel backlog.

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::loader;
use forward_proxy::config::validation::validate_config;
use forward_proxy::config::ConfigError;
use forward_proxy::lifecycle::{signals, startup, Shutdown};
use forward_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Minimal HTTP/1.x forward proxy with CONNECT tunneling", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address (e.g. 127.0.0.1:3128).
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = loader::resolve(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    if cli.check {
        println!("configuration OK (listening on {})", config.listener.bind_address);
        return Ok(());
    }

    logging::init_logging(&config.observability)
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;
    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
