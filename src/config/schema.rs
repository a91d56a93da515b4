//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so a minimal file only names its breakers.

use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_DURATION};
use crate::resilience::strategy::timer::{DEFAULT_PROBE_INTERVAL, DEFAULT_SUCCESS_THRESHOLD};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Circuit breaker definitions.
    pub breakers: Vec<BreakerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A single circuit breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Breaker identifier for logging/metrics.
    pub name: String,

    /// Consecutive failures while closed that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before probing, in milliseconds.
    pub open_duration_ms: u64,

    /// Half-open probing parameters.
    pub recovery: RecoveryConfig,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_duration_ms: DEFAULT_OPEN_DURATION.as_millis() as u64,
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Timer-gated recovery parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Minimum spacing between admitted probes, in milliseconds.
    pub probe_interval_ms: u64,

    /// Consecutive probe successes that close the circuit.
    pub success_threshold: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: DEFAULT_PROBE_INTERVAL.as_millis() as u64,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_breaker_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [[breakers]]
            name = "payments"
            "#,
        )
        .unwrap();

        let breaker = &config.breakers[0];
        assert_eq!(breaker.name, "payments");
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.open_duration_ms, 3000);
        assert_eq!(breaker.recovery.probe_interval_ms, 2000);
        assert_eq!(breaker.recovery.success_threshold, 3);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_full_document() {
        let config: AppConfig = toml::from_str(
            r#"
            [observability]
            log_level = "debug"
            metrics_enabled = true
            metrics_address = "127.0.0.1:9100"

            [[breakers]]
            name = "search"
            failure_threshold = 10
            open_duration_ms = 500

            [breakers.recovery]
            probe_interval_ms = 100
            success_threshold = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.breakers[0].failure_threshold, 10);
        assert_eq!(config.breakers[0].open_duration_ms, 500);
        assert_eq!(config.breakers[0].recovery.probe_interval_ms, 100);
        assert_eq!(config.breakers[0].recovery.success_threshold, 2);
    }
}
