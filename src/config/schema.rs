//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every field
//! has a default so that an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::RouteDefinition;

/// Root configuration for the routing service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Inspection listener.
    pub listener: ListenerConfig,

    /// Route sources and polling.
    pub routing: RoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9999").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
        }
    }
}

/// Routing controller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Interval between source polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Route files, each polled as an independent source.
    pub route_files: Vec<String>,

    /// Watch route files for changes instead of re-reading them on every poll.
    pub watch_files: bool,
}

impl RoutingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            route_files: Vec::new(),
            watch_files: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Contents of a route file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteFile {
    pub routes: Vec<RouteDefinition>,
}
