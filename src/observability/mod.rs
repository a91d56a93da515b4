//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker transitions:
//!     → logging.rs (structured log events)
//!     → metrics.rs (hooks → counters + state gauge)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metrics observe transitions through hooks and never drive them
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use metrics::{BreakerMetrics, TransitionCounts};
