//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, batch sizes consistent)
//! - Validate the listener address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Exporter endpoint checks live in the telemetry resolver, which runs at boot

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    let telemetry = &config.telemetry;
    let batch = &telemetry.batch;
    if batch.max_queue_size == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.max_queue_size",
            "must be greater than zero",
        ));
    }
    if batch.max_export_batch_size == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.max_export_batch_size",
            "must be greater than zero",
        ));
    } else if batch.max_export_batch_size > batch.max_queue_size {
        errors.push(ValidationError::new(
            "telemetry.batch.max_export_batch_size",
            format!("must not exceed max_queue_size ({})", batch.max_queue_size),
        ));
    }
    if batch.scheduled_delay_ms == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.scheduled_delay_ms",
            "must be greater than zero",
        ));
    }
    if telemetry.metrics.interval_ms == 0 {
        errors.push(ValidationError::new(
            "telemetry.metrics.interval_ms",
            "must be greater than zero",
        ));
    }
    if telemetry.drain_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "telemetry.drain_timeout_ms",
            "must be greater than zero",
        ));
    }

    let retry = &telemetry.exporter.retry;
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "telemetry.exporter.retry.base_delay_ms",
            format!("must not exceed max_delay_ms ({})", retry.max_delay_ms),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
