//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON format for production, plain format for development

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber was already installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "route_engine={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(config.log_json.then(|| fmt::layer().json()))
        .with((!config.log_json).then(fmt::layer))
        .try_init()
}
