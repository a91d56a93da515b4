//! Circuit state representation.
//!
//! # States
//! - Closed: operations execute, failures are counted
//! - Open: operations are rejected without executing
//! - HalfOpen: a gated subset of operations probe the dependency
//!
//! # Design Decisions
//! - Stored as `AtomicU8` so every transition is a single compare-and-swap
//! - Labels match the ones exported to metrics

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// State of a circuit breaker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Open = 0,
    Closed = 1,
    HalfOpen = 2,
}

impl State {
    /// Label used in logs and by external pollers.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Open => "open",
            State::Closed => "close",
            State::HalfOpen => "halfopen",
        }
    }

    /// Numeric value for the current-state gauge.
    pub fn as_gauge(&self) -> f64 {
        *self as u8 as f64
    }
}

impl From<u8> for State {
    fn from(val: u8) -> Self {
        match val {
            0 => State::Open,
            1 => State::Closed,
            _ => State::HalfOpen,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for State {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Atomic cell holding a [`State`].
///
/// The value only changes through [`AtomicState::transition`].
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: State) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> State {
        State::from(self.0.load(Ordering::Acquire))
    }

    /// Swap `from` for `to`. Returns false if the cell no longer held `from`.
    pub fn transition(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
