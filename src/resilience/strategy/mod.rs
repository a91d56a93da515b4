//! Recovery strategies used while a breaker is half-open.
//!
//! # Data Flow
//! ```text
//! Call while HalfOpen
//!     → RecoveryStrategy::process(probe)
//!     → strategy decides whether the probe runs
//!     → Verdict back to the breaker:
//!         Rejected / Stay → remain HalfOpen
//!         Reopen          → HalfOpen → Open
//!         Close           → HalfOpen → Closed
//! ```
//!
//! # Design Decisions
//! - The probe is handed over as a lazy future reporting only success or
//!   failure; the breaker keeps the operation's value and error to itself
//! - `reset` runs once per Open period, before the next HalfOpen transition

pub mod timer;

use std::fmt;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

pub use timer::TimerStrategy;

/// A probe handed to a strategy. Resolves to `true` when the wrapped
/// operation succeeded. Nothing runs until the future is polled.
pub type Probe<'a> = BoxFuture<'a, bool>;

/// How the breaker should react to a half-open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The probe was not executed.
    Rejected,
    /// The probe ran; keep probing.
    Stay,
    /// Recovery failed; reopen the circuit.
    Reopen,
    /// Recovery succeeded; close the circuit.
    Close,
}

/// Policy deciding admission and outcome while the circuit is half-open.
pub trait RecoveryStrategy: Send + Sync + fmt::Debug {
    /// Clear all probe bookkeeping and gate the next probe on `baseline`.
    fn reset(&self, baseline: Instant);

    /// Decide whether to run `probe` and interpret its outcome.
    fn process<'a>(&'a self, probe: Probe<'a>) -> BoxFuture<'a, Verdict>;
}
