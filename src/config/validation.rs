//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and addresses
//! - Detect route files listed twice
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Route file contents are not checked here; a bad route file is a
//!   source error at runtime, not a startup failure

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RouterConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("routing.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("routing.route_files[{0}] is empty")]
    EmptyRouteFile(usize),

    #[error("routing.route_files lists {0:?} more than once")]
    DuplicateRouteFile(String),

    #[error("observability.log_level {0:?} is not a known level")]
    UnknownLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routing.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let mut seen = HashSet::new();
    for (i, path) in config.routing.route_files.iter().enumerate() {
        if path.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteFile(i));
        } else if !seen.insert(path.as_str()) {
            errors.push(ValidationError::DuplicateRouteFile(path.clone()));
        }
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
