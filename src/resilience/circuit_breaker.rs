//! Circuit breaker protecting a downstream dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through and failures are counted
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: the recovery strategy lets probes through
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures == threshold
//! Open → Half-Open: after open_duration (strategy reset first)
//! Half-Open → Closed: strategy says Close
//! Half-Open → Open: strategy says Reopen
//! ```
//!
//! # Design Decisions
//! - No lock around a call; each field is an atomic and each transition is a
//!   single compare-and-swap on the state
//! - Only the caller that wins the swap logs, schedules the timer and fires
//!   hooks
//! - The failure trigger compares for equality, not `>=`. Concurrent failures
//!   can in theory overshoot the threshold without anyone observing the exact
//!   value, in which case this path does not open the circuit.
//! - The open timer cannot be cancelled; a stale timer simply loses its swap

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::resilience::error::Error;
use crate::resilience::hooks::{Hook, Hooks};
use crate::resilience::state::{AtomicState, State};
use crate::resilience::strategy::{RecoveryStrategy, TimerStrategy, Verdict};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(3);

struct Shared {
    name: String,
    state: AtomicState,
    consecutive_failures: AtomicU32,
    failure_threshold: u32,
    open_duration: Duration,
    strategy: Arc<dyn RecoveryStrategy>,
    hooks: Hooks,
}

/// A circuit breaker. Cloning yields another handle to the same breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Create a breaker with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> Builder {
        Builder::new(name)
    }

    /// Create a breaker from its configuration section.
    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::builder(config.name.clone())
            .failure_threshold(config.failure_threshold)
            .open_duration(Duration::from_millis(config.open_duration_ms))
            .timer_strategy(
                Duration::from_millis(config.recovery.probe_interval_ms),
                config.recovery.success_threshold,
            )
            .build()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current state. Purely observational.
    pub fn current_state(&self) -> State {
        self.shared.state.load()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn failure_threshold(&self) -> u32 {
        self.shared.failure_threshold
    }

    pub fn open_duration(&self) -> Duration {
        self.shared.open_duration
    }

    /// Register a hook run on every transition into Open.
    /// A view of the state that does not keep the breaker alive, for hooks
    /// that need to read it.
    pub(crate) fn state_view(&self) -> StateView {
        StateView(Arc::downgrade(&self.shared))
    }

    pub fn on_open(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.shared.hooks.register(State::Open, Arc::new(hook));
    }

    /// Register a hook run on every transition into HalfOpen.
    pub fn on_half_open(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.shared.hooks.register(State::HalfOpen, Arc::new(hook));
    }

    /// Register a hook run on every transition into Closed.
    pub fn on_close(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.shared.hooks.register(State::Closed, Arc::new(hook));
    }

    /// Execute `op` according to the current state.
    ///
    /// `op` is only invoked when the breaker admits the call. Its error is
    /// returned unchanged inside [`Error::Inner`]; breaker rejections are
    /// [`Error::Open`] and [`Error::HalfOpen`].
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, Error<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send,
    {
        match self.current_state() {
            State::Closed => self.call_closed(op).await,
            State::Open => self.call_open(),
            State::HalfOpen => self.call_half_open(op).await,
        }
    }

    fn call_open<T, E>(&self) -> Result<T, Error<E>> {
        tracing::trace!(breaker = %self.shared.name, "Call rejected: circuit open");
        Err(Error::Open)
    }

    async fn call_closed<F, Fut, T, E>(&self, op: F) -> Result<T, Error<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match op().await {
            Ok(value) => {
                self.shared.consecutive_failures.store(0, Ordering::Release);
                Ok(value)
            }
            Err(e) => {
                let failures = self
                    .shared
                    .consecutive_failures
                    .fetch_add(1, Ordering::AcqRel)
                    .wrapping_add(1);
                if failures == self.shared.failure_threshold {
                    self.shared.try_open(State::Closed);
                }
                Err(Error::Inner(e))
            }
        }
    }

    async fn call_half_open<F, Fut, T, E>(&self, op: F) -> Result<T, Error<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send,
    {
        let mut outcome: Option<Result<T, E>> = None;
        let verdict = {
            let slot = &mut outcome;
            self.shared
                .strategy
                .process(Box::pin(async move {
                    let result = op().await;
                    let ok = result.is_ok();
                    *slot = Some(result);
                    ok
                }))
                .await
        };

        tracing::debug!(breaker = %self.shared.name, verdict = ?verdict, "Probe processed");

        match verdict {
            Verdict::Rejected | Verdict::Stay => {}
            Verdict::Reopen => self.shared.try_open(State::HalfOpen),
            Verdict::Close => self.shared.try_close(State::HalfOpen),
        }

        match outcome {
            Some(result) => result.map_err(Error::Inner),
            None => {
                tracing::trace!(breaker = %self.shared.name, "Call rejected: probe not admitted");
                Err(Error::HalfOpen)
            }
        }
    }
}

impl Shared {
    fn try_open(self: &Arc<Self>, from: State) {
        if !self.state.transition(from, State::Open) {
            return;
        }
        tracing::warn!(
            breaker = %self.name,
            from = %from,
            open_for = ?self.open_duration,
            "Circuit opened"
        );
        self.schedule_half_open();
        self.hooks.fire(State::Open);
    }

    fn try_half_open(&self, from: State) {
        if !self.state.transition(from, State::HalfOpen) {
            tracing::debug!(breaker = %self.name, "Open timer fired after state changed");
            return;
        }
        tracing::info!(breaker = %self.name, from = %from, "Circuit half-open");
        self.hooks.fire(State::HalfOpen);
    }

    fn try_close(&self, from: State) {
        if !self.state.transition(from, State::Closed) {
            return;
        }
        tracing::info!(breaker = %self.name, from = %from, "Circuit closed");
        self.hooks.fire(State::Closed);
    }

    /// Spawn the one-shot task ending this Open period.
    fn schedule_half_open(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let delay = self.open_duration;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    shared.end_open_period();
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    shared.end_open_period();
                });
            }
        }
    }

    fn end_open_period(&self) {
        self.strategy.reset(Instant::now());
        self.try_half_open(State::Open);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &self.current_state())
            .field("consecutive_failures", &self.consecutive_failures())
            .field("failure_threshold", &self.shared.failure_threshold)
            .field("open_duration", &self.shared.open_duration)
            .field("strategy", &self.shared.strategy)
            .field("hooks", &self.shared.hooks)
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct StateView(Weak<Shared>);

impl StateView {
    /// `None` once the breaker is gone.
    pub(crate) fn load(&self) -> Option<State> {
        self.0.upgrade().map(|shared| shared.state.load())
    }
}

impl fmt::Debug for StateView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateView").field(&self.load()).finish()
    }
}

/// Builder for [`CircuitBreaker`].
///
/// Thresholds of 0 are treated as 1.
pub struct Builder {
    name: String,
    failure_threshold: u32,
    open_duration: Duration,
    strategy: Option<Arc<dyn RecoveryStrategy>>,
    hooks: Vec<(State, Hook)>,
}

impl Builder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_duration: DEFAULT_OPEN_DURATION,
            strategy: None,
            hooks: Vec::new(),
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// Use a [`TimerStrategy`] with the given parameters.
    pub fn timer_strategy(mut self, probe_interval: Duration, success_threshold: u32) -> Self {
        self.strategy = Some(Arc::new(TimerStrategy::new(probe_interval, success_threshold)));
        self
    }

    /// Use a custom recovery strategy.
    pub fn strategy(mut self, strategy: Arc<dyn RecoveryStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.push((State::Open, Arc::new(hook)));
        self
    }

    pub fn on_half_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.push((State::HalfOpen, Arc::new(hook)));
        self
    }

    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.push((State::Closed, Arc::new(hook)));
        self
    }

    pub fn build(self) -> CircuitBreaker {
        let hooks = Hooks::new();
        for (state, hook) in self.hooks {
            hooks.register(state, hook);
        }

        CircuitBreaker {
            shared: Arc::new(Shared {
                name: self.name,
                state: AtomicState::new(State::Closed),
                consecutive_failures: AtomicU32::new(0),
                failure_threshold: self.failure_threshold,
                open_duration: self.open_duration,
                strategy: self
                    .strategy
                    .unwrap_or_else(|| Arc::new(TimerStrategy::default())),
                hooks,
            }),
        }
    }
}
