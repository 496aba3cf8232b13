//! Forward proxy core.
//!
//! # Data Flow
//! ```text
//! server.rs (accept, spawn)
//!     → session.rs
//!         → http::request (parse head)          Parsing
//!         → net::connector (open upstream)      Connecting
//!         → relay (bidirectional copy)          Tunneling
//!     → sockets dropped                         Closed
//! ```

pub mod error;
pub mod server;
pub mod session;

pub use error::ProxyError;
pub use server::ProxyServer;
pub use session::{Session, SessionContext};
