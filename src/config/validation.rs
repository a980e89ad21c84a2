//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals bounded, limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::protocol::TERMINATOR;

/// Longest sweep interval accepted: one day.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host `{0}` is not an IP address")]
    InvalidHost(String),

    #[error("listener.max_connections must be greater than 0")]
    ZeroConnections,

    #[error("monitor.interval_secs must be greater than 0")]
    ZeroInterval,

    #[error("monitor.interval_secs ({0}) must not exceed one day")]
    IntervalTooLarge(u64),

    #[error("monitor.jitter_secs ({jitter}) must be smaller than monitor.interval_secs ({interval})")]
    JitterTooLarge { jitter: u64, interval: u64 },

    #[error("monitor.idle_timeout_secs must be greater than 0")]
    ZeroIdleTimeout,

    #[error("limits.max_header_bytes must be larger than the terminator")]
    HeaderLimitTooSmall,

    #[error("limits.max_payload_bytes must be greater than 0")]
    ZeroPayloadLimit,

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    let monitor = &config.monitor;
    if monitor.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    } else if monitor.interval_secs > MAX_INTERVAL_SECS {
        errors.push(ValidationError::IntervalTooLarge(monitor.interval_secs));
    } else if monitor.jitter_secs >= monitor.interval_secs {
        errors.push(ValidationError::JitterTooLarge {
            jitter: monitor.jitter_secs,
            interval: monitor.interval_secs,
        });
    }
    if monitor.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }

    if config.limits.max_header_bytes <= TERMINATOR.len() {
        errors.push(ValidationError::HeaderLimitTooSmall);
    }
    if config.limits.max_payload_bytes == 0 {
        errors.push(ValidationError::ZeroPayloadLimit);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
