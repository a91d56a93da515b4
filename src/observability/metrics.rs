//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count transitions into each breaker state
//! - Export the current state of every observed breaker
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `circuit_breaker_open_state` (counter): transitions into Open
//! - `circuit_breaker_halfopen_state` (counter): transitions into HalfOpen
//! - `circuit_breaker_close_state` (counter): transitions into Closed
//! - `circuit_breaker_current_state` (gauge): 0=open, 1=closed, 2=half-open
//!
//! All series carry the `circuit_breaker_name` label.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

use crate::resilience::circuit_breaker::StateView;
use crate::resilience::{CircuitBreaker, State};

pub const LABEL_BREAKER_NAME: &str = "circuit_breaker_name";

const OPEN_COUNTER: &str = "circuit_breaker_open_state";
const HALF_OPEN_COUNTER: &str = "circuit_breaker_halfopen_state";
const CLOSE_COUNTER: &str = "circuit_breaker_close_state";
const STATE_GAUGE: &str = "circuit_breaker_current_state";

/// Initialize the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    metrics::describe_counter!(
        OPEN_COUNTER,
        "Number of times the circuit has entered the open state"
    );
    metrics::describe_counter!(
        HALF_OPEN_COUNTER,
        "Number of times the circuit has entered the half-open state"
    );
    metrics::describe_counter!(
        CLOSE_COUNTER,
        "Number of times the circuit has entered the close state"
    );
    metrics::describe_gauge!(STATE_GAUGE, "Current state of the circuit");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Cumulative transition counts of one breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransitionCounts {
    pub opened: u64,
    pub half_opened: u64,
    pub closed: u64,
}

/// Hook-side state shared by the three transition hooks.
#[derive(Debug)]
struct Recorder {
    name: String,
    view: StateView,
    opened: AtomicU64,
    half_opened: AtomicU64,
    closed: AtomicU64,
    /// Last value written to the state gauge.
    reported: AtomicU8,
}

impl Recorder {
    fn slot(&self, state: State) -> &AtomicU64 {
        match state {
            State::Open => &self.opened,
            State::HalfOpen => &self.half_opened,
            State::Closed => &self.closed,
        }
    }

    /// Count a transition into `entered` and export the breaker's live state.
    ///
    /// Hooks of consecutive transitions may run out of order, so the gauge
    /// follows the breaker rather than `entered`.
    fn record(&self, entered: State) {
        self.slot(entered).fetch_add(1, Ordering::Relaxed);

        let counter = match entered {
            State::Open => OPEN_COUNTER,
            State::HalfOpen => HALF_OPEN_COUNTER,
            State::Closed => CLOSE_COUNTER,
        };
        metrics::counter!(counter, LABEL_BREAKER_NAME => self.name.clone()).increment(1);

        let current = self.view.load().unwrap_or(entered);
        self.reported.store(current as u8, Ordering::Relaxed);
        metrics::gauge!(STATE_GAUGE, LABEL_BREAKER_NAME => self.name.clone())
            .set(current.as_gauge());
    }
}

/// Transition observer for a single breaker.
#[derive(Debug, Clone)]
pub struct BreakerMetrics {
    breaker: CircuitBreaker,
    recorder: Arc<Recorder>,
}

impl BreakerMetrics {
    /// Register hooks on `breaker` that record every transition.
    pub fn attach(breaker: &CircuitBreaker) -> Self {
        let initial = breaker.current_state();
        let recorder = Arc::new(Recorder {
            name: breaker.name().to_string(),
            view: breaker.state_view(),
            opened: AtomicU64::new(0),
            half_opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            reported: AtomicU8::new(initial as u8),
        });

        metrics::gauge!(STATE_GAUGE, LABEL_BREAKER_NAME => recorder.name.clone())
            .set(initial.as_gauge());

        for state in [State::Open, State::HalfOpen, State::Closed] {
            let recorder = recorder.clone();
            let hook = move || recorder.record(state);
            match state {
                State::Open => breaker.on_open(hook),
                State::HalfOpen => breaker.on_half_open(hook),
                State::Closed => breaker.on_close(hook),
            }
        }

        Self {
            breaker: breaker.clone(),
            recorder,
        }
    }

    pub fn breaker_name(&self) -> &str {
        self.breaker.name()
    }

    pub fn current_state(&self) -> State {
        self.breaker.current_state()
    }

    /// State most recently exported on the `circuit_breaker_current_state` gauge.
    pub fn reported_state(&self) -> State {
        State::from(self.recorder.reported.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> TransitionCounts {
        TransitionCounts {
            opened: self.recorder.opened.load(Ordering::Relaxed),
            half_opened: self.recorder.half_opened.load(Ordering::Relaxed),
            closed: self.recorder.closed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_counts_each_transition() {
        let cb = CircuitBreaker::builder("metered")
            .failure_threshold(1)
            .open_duration(Duration::from_millis(10))
            .timer_strategy(Duration::from_millis(1), 1)
            .build();
        let metrics = BreakerMetrics::attach(&cb);
        assert_eq!(metrics.snapshot(), TransitionCounts::default());

        let _ = cb.call(|| async { Err::<(), _>("down") }).await;
        tokio::time::sleep(Duration::from_millis(11)).await;
        cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap();

        assert_eq!(metrics.current_state(), State::Closed);
        assert_eq!(metrics.reported_state(), State::Closed);
        assert_eq!(
            metrics.snapshot(),
            TransitionCounts {
                opened: 1,
                half_opened: 1,
                closed: 1,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_open_hook_reports_live_state() {
        let cb = CircuitBreaker::builder("late")
            .failure_threshold(1)
            .open_duration(Duration::from_millis(10))
            .build();
        let metrics = BreakerMetrics::attach(&cb);

        let _ = cb.call(|| async { Err::<(), _>("down") }).await;
        tokio::time::sleep(Duration::from_millis(11)).await;
        assert_eq!(cb.current_state(), State::HalfOpen);
        assert_eq!(metrics.reported_state(), State::HalfOpen);

        // an open hook running after the half-open one
        metrics.recorder.record(State::Open);
        assert_eq!(metrics.reported_state(), State::HalfOpen);
        assert_eq!(metrics.snapshot().opened, 2);
    }

    #[test]
    fn test_serializes_counts() {
        let counts = TransitionCounts {
            opened: 2,
            half_opened: 2,
            closed: 1,
        };
        assert_eq!(
            serde_json::to_value(counts).unwrap(),
            serde_json::json!({"opened": 2, "half_opened": 2, "closed": 1})
        );
    }
}
