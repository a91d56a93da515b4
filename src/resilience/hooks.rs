//! State-change observers.
//!
//! # Responsibilities
//! - Keep one ordered hook list per target state
//! - Fire every hook of a list synchronously, in registration order
//!
//! # Design Decisions
//! - Lists live behind `ArcSwap` so registration never blocks a firing
//!   transition and firing never takes a lock
//! - Hooks are infallible `Fn()`; they must not block or call back into the
//!   breaker

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::resilience::state::State;

/// Callback invoked after a successful transition.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct HookList(ArcSwap<Vec<Hook>>);

impl HookList {
    fn push(&self, hook: Hook) {
        self.0.rcu(|hooks| {
            let mut hooks = Vec::clone(hooks);
            hooks.push(hook.clone());
            hooks
        });
    }

    fn fire(&self) {
        for hook in self.0.load().iter() {
            hook();
        }
    }

    fn len(&self) -> usize {
        self.0.load().len()
    }
}

/// Hooks registered against a breaker, grouped by the state they observe.
#[derive(Default)]
pub struct Hooks {
    open: HookList,
    half_open: HookList,
    close: HookList,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, state: State) -> &HookList {
        match state {
            State::Open => &self.open,
            State::HalfOpen => &self.half_open,
            State::Closed => &self.close,
        }
    }

    /// Append a hook run on every transition into `state`.
    pub fn register(&self, state: State, hook: Hook) {
        self.list(state).push(hook);
    }

    /// Run the hooks of `state` on the caller's context.
    pub fn fire(&self, state: State) {
        self.list(state).fire();
    }

    /// Number of hooks registered for `state`.
    pub fn count(&self, state: State) -> usize {
        self.list(state).len()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("open", &self.open.len())
            .field("half_open", &self.half_open.len())
            .field("close", &self.close.len())
            .finish()
    }
}
