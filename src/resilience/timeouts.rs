//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the upstream connect phase (DNS + TCP handshake)
//! - Bound the request-head read phase
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - The relay loop is never wrapped in a timeout

use std::future::Future;
use std::time::Duration;

/// An operation did not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub operation: &'static str,
    pub after: Duration,
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} timed out after {:?}", self.operation, self.after)
    }
}

impl std::error::Error for Elapsed {}

impl From<Elapsed> for std::io::Error {
    fn from(e: Elapsed) -> Self {
        std::io::Error::new(std::io::ErrorKind::TimedOut, e)
    }
}

/// Run `fut` with a deadline.
pub async fn with_timeout<F, T>(after: Duration, operation: &'static str, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Elapsed { operation, after })
}
