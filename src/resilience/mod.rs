//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller operation
//!     → circuit_breaker.rs (dispatch on current state)
//!         Closed   → run op, count consecutive failures
//!         Open     → reject immediately
//!         HalfOpen → strategy/ (admit or reject the probe)
//!     → state.rs (compare-and-swap transition)
//!     → hooks.rs (observers of the new state)
//! ```
//!
//! # Design Decisions
//! - No retries, backoff or rate limiting here; only admit/reject
//! - Rejections are distinct error variants, the operation's own error is
//!   never rewritten
//! - Recovery policy is pluggable through `RecoveryStrategy`

pub mod circuit_breaker;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod state;
pub mod strategy;

pub use circuit_breaker::{Builder, CircuitBreaker};
pub use error::Error;
pub use registry::BreakerRegistry;
pub use state::State;
pub use strategy::{RecoveryStrategy, TimerStrategy, Verdict};
