//! Session identity, state machine, and lifetime tracking.
//!
//! # Responsibilities
//! - Track session state (Parsing → Connecting → Tunneling → Closed)
//! - Generate unique session IDs for tracing
//! - Count live sessions per server instance

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::observability::metrics;

/// Unique identifier for a session.
///
/// Random rather than counter-based so no process-wide state is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form keeps log lines readable; collisions only matter within a log window.
        write!(f, "sess-{}", &self.0.simple().to_string()[..12])
    }
}

/// Session state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reading and parsing the request head.
    Parsing,
    /// Opening the upstream connection.
    Connecting,
    /// Relaying bytes between client and upstream.
    Tunneling,
    /// Both sockets released. Terminal.
    Closed,
}

impl SessionState {
    /// Whether `self → next` is a legal transition.
    ///
    /// Forward steps only, plus `Closed` from anywhere except `Closed`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Parsing, Connecting)
                | (Connecting, Tunneling)
                | (Parsing, Closed)
                | (Connecting, Closed)
                | (Tunneling, Closed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Parsing => "parsing",
            SessionState::Connecting => "connecting",
            SessionState::Tunneling => "tunneling",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts live sessions for one server instance.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::session_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: SessionId::new(),
        }
    }

    /// Get current live session count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every session has ended or `limit` elapses.
    /// Returns whether the count reached zero.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while self.active_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

/// Guard that tracks a session's lifetime.
/// Decrements active count when dropped, including on panic unwind.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: SessionId,
}

impl ConnectionGuard {
    /// Get this session's ID.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::session_closed();
        tracing::trace!(session_id = %self.id, "Session released");
    }
}
