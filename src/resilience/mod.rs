//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream connect / request-head read:
//!     → timeouts.rs (deadline on every phase before the relay)
//! Accept loop:
//!     → backoff.rs (pause between consecutive accept failures)
//! ```
//!
//! # Design Decisions
//! - Every external call before the relay has a deadline
//! - Nothing is retried: a failed upstream connect is answered with 502

pub mod backoff;
pub mod timeouts;

pub use backoff::Backoff;
pub use timeouts::{with_timeout, Elapsed};
