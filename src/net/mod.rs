//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (session id, state machine, live-session tracking)
//!     → Hand off to proxy::session
//!
//! Outgoing TCP connection
//!     → connector.rs (resolve + connect under deadline)
//!
//! Session States:
//!     Parsing → Connecting → Tunneling → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents unbounded task fan-out
//! - Each session tracked so tests and metrics can observe teardown

pub mod connection;
pub mod connector;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker, SessionId, SessionState};
pub use connector::Connector;
pub use listener::{ConnectionPermit, Listener, ListenerError};
