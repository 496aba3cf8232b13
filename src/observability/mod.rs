//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, listener, connector produce:
//!     → logging.rs (structured log events, one span per session)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
