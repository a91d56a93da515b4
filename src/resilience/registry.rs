//! Named breaker registry.
//!
//! # Responsibilities
//! - Build one breaker per configured entry
//! - Hand out shared handles by name
//! - Snapshot the state of every breaker for polling

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::state::State;

/// Concurrent map of breaker name to breaker handle.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from configuration. Later entries win on duplicate
    /// names; validation rejects those before we get here.
    pub fn from_config(configs: &[BreakerConfig]) -> Self {
        let registry = Self::new();
        for config in configs {
            tracing::debug!(
                breaker = %config.name,
                failure_threshold = config.failure_threshold,
                open_duration_ms = config.open_duration_ms,
                "Registering circuit breaker"
            );
            registry.insert(CircuitBreaker::from_config(config));
        }
        registry
    }

    /// Add a breaker, replacing any existing one with the same name.
    pub fn insert(&self, breaker: CircuitBreaker) -> Option<CircuitBreaker> {
        self.breakers.insert(breaker.name().to_string(), breaker)
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Return the breaker called `name`, creating it with `make` if missing.
    pub fn get_or_insert_with<F>(&self, name: &str, make: F) -> CircuitBreaker
    where
        F: FnOnce() -> CircuitBreaker,
    {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(make)
            .value()
            .clone()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Current state of every breaker.
    pub fn states(&self) -> BTreeMap<String, State> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().current_state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
