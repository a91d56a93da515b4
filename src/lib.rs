//! faultline: a circuit breaker for async operations.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller ──▶ CircuitBreaker::call(op)
//!                   │
//!                   ├─ Closed   ─▶ run op, count consecutive failures
//!                   ├─ Open     ─▶ Error::Open (op never runs)
//!                   └─ HalfOpen ─▶ RecoveryStrategy::process(probe)
//!                                    │
//!                                    └─▶ Verdict: Rejected / Stay / Reopen / Close
//!
//!     transitions ──▶ hooks ──▶ observability::metrics (counters + state gauge)
//!     http::transport wraps any tower Service (e.g. a hyper client) in a breaker
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use faultline::resilience::{CircuitBreaker, Error};
//!
//! # async fn fetch() -> Result<u32, std::io::Error> { Ok(1) }
//! # async fn run() {
//! let breaker = CircuitBreaker::builder("inventory")
//!     .failure_threshold(5)
//!     .open_duration(Duration::from_secs(3))
//!     .timer_strategy(Duration::from_secs(1), 3)
//!     .build();
//!
//! match breaker.call(|| fetch()).await {
//!     Ok(stock) => println!("stock: {stock}"),
//!     Err(Error::Open) | Err(Error::HalfOpen) => println!("dependency unavailable"),
//!     Err(Error::Inner(e)) => println!("fetch failed: {e}"),
//! }
//! # }
//! ```

pub mod config;
pub mod http;
pub mod observability;
pub mod resilience;

pub use config::AppConfig;
pub use resilience::{CircuitBreaker, Error, RecoveryStrategy, State, TimerStrategy};
