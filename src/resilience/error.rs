//! Errors returned by a circuit breaker call.

use thiserror::Error;

/// Result of an operation executed through a circuit breaker.
///
/// The breaker adds two rejection kinds of its own and otherwise hands back
/// the operation's error untouched in [`Error::Inner`].
#[derive(Debug, Error)]
pub enum Error<E> {
    /// The circuit is open; the operation was not executed.
    #[error("circuit breaker is open")]
    Open,

    /// The circuit is probing and this call was not admitted as a probe.
    #[error("circuit breaker is half open")]
    HalfOpen,

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> Error<E> {
    /// True when the breaker refused the call without running it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Open | Error::HalfOpen)
    }

    pub fn inner(&self) -> Option<&E> {
        match self {
            Error::Inner(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Error::Inner(e) => Some(e),
            _ => None,
        }
    }
}
