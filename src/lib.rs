//! Minimal HTTP/1.x forward proxy: CONNECT tunnels and absolute-URI forwarding.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod relay;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyError, ProxyServer};
