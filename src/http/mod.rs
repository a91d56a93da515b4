//! HTTP transport adapter.
//!
//! # Data Flow
//! ```text
//! Request
//!     → transport.rs (CircuitBreakerService::call)
//!     → CircuitBreaker::call (admit or reject)
//!     → inner service (hyper client or any tower Service)
//!     → Response, or the breaker's rejection verbatim
//! ```
//!
//! # Design Decisions
//! - Only transport errors count as failures; HTTP status codes are the
//!   caller's business
//! - Implemented as a tower Layer so it composes with other middleware

pub mod transport;

pub use transport::{CircuitBreakerLayer, CircuitBreakerService, HttpClient, HttpTransport};
