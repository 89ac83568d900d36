//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!
//! route files (TOML), one source each:
//!     watcher.rs marks a file dirty on change
//!     → next poll re-reads it via loader.rs
//!     → diff against the last delivered set
//!     → upserts and deletes to the routing controller
//! ```
//!
//! # Design Decisions
//! - Service config is loaded once; route files are the dynamic part
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_routes, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, RouteFile, RouterConfig, RoutingConfig};
pub use watcher::FileSource;
