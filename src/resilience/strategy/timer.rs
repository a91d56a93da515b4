//! Timer-gated recovery.
//!
//! # Responsibilities
//! - Admit at most one probe per `probe_interval`
//! - Never run two probes concurrently
//! - Close after `success_threshold` consecutive probe successes
//! - Reopen on the first probe failure
//!
//! # Design Decisions
//! - `process` holds an internal async mutex for the whole call, including
//!   the probe itself
//! - Counters are atomics so `reset` can run without that mutex
//! - After a failed probe the in-flight slot stays claimed until `reset`
//! - A probe abandoned mid-flight (its future dropped) releases the slot,
//!   so the next caller is admitted without waiting for the interval

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::resilience::strategy::{Probe, RecoveryStrategy, Verdict};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;

/// Lets one probe through per interval and closes after enough successes.
#[derive(Debug)]
pub struct TimerStrategy {
    /// Reference point for `expire_at`.
    epoch: Instant,
    /// Microseconds after `epoch` before which probes are rejected.
    expire_at: AtomicU64,
    probe_interval: Duration,
    in_flight: AtomicBool,
    consecutive_success: AtomicU32,
    success_threshold: u32,
    lock: Mutex<()>,
}

impl TimerStrategy {
    /// A `success_threshold` of 0 is treated as 1.
    pub fn new(probe_interval: Duration, success_threshold: u32) -> Self {
        Self {
            epoch: Instant::now(),
            expire_at: AtomicU64::new(0),
            probe_interval,
            in_flight: AtomicBool::new(false),
            consecutive_success: AtomicU32::new(0),
            success_threshold: success_threshold.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn probe_interval(&self) -> Duration {
        self.probe_interval
    }

    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// Successful probes since the last reset.
    pub fn consecutive_success(&self) -> u32 {
        self.consecutive_success.load(Ordering::Acquire)
    }

    fn micros_since_epoch(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.epoch).as_micros() as u64
    }
}

impl Default for TimerStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_INTERVAL, DEFAULT_SUCCESS_THRESHOLD)
    }
}

impl RecoveryStrategy for TimerStrategy {
    fn reset(&self, baseline: Instant) {
        self.expire_at
            .store(self.micros_since_epoch(baseline), Ordering::Release);
        self.consecutive_success.store(0, Ordering::Release);
        self.in_flight.store(false, Ordering::Release);
    }

    fn process<'a>(&'a self, probe: Probe<'a>) -> BoxFuture<'a, Verdict> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;

            let now = self.micros_since_epoch(Instant::now());
            if now < self.expire_at.load(Ordering::Acquire) {
                return Verdict::Rejected;
            }

            // single probe at a time
            if self
                .in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Verdict::Rejected;
            }
            let slot = InFlightSlot(&self.in_flight);

            if !probe.await {
                slot.keep();
                return Verdict::Reopen;
            }

            let next = Instant::now() + self.probe_interval;
            self.expire_at
                .store(self.micros_since_epoch(next), Ordering::Release);
            drop(slot);

            let successes = self.consecutive_success.fetch_add(1, Ordering::AcqRel) + 1;
            if successes == self.success_threshold {
                Verdict::Close
            } else {
                Verdict::Stay
            }
        })
    }
}

/// Claimed in-flight flag, released on drop unless kept.
struct InFlightSlot<'a>(&'a AtomicBool);

impl InFlightSlot<'_> {
    /// Leave the slot claimed until the next `reset`.
    fn keep(self) {
        std::mem::forget(self);
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
