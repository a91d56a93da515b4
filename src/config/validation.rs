//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1)
//! - Detect duplicate breaker names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("breaker #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("breaker name `{name}` is used more than once")]
    DuplicateName { name: String },

    #[error("breaker `{name}`: failure_threshold must be at least 1")]
    ZeroFailureThreshold { name: String },

    #[error("breaker `{name}`: recovery.success_threshold must be at least 1")]
    ZeroSuccessThreshold { name: String },

    #[error("invalid metrics_address `{address}`")]
    InvalidMetricsAddress { address: String },
}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, breaker) in config.breakers.iter().enumerate() {
        if breaker.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
        } else if !seen.insert(breaker.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                name: breaker.name.clone(),
            });
        }

        if breaker.failure_threshold == 0 {
            errors.push(ValidationError::ZeroFailureThreshold {
                name: breaker.name.clone(),
            });
        }
        if breaker.recovery.success_threshold == 0 {
            errors.push(ValidationError::ZeroSuccessThreshold {
                name: breaker.name.clone(),
            });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress {
            address: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
