//! Route lookup engine with dynamically polled route sources.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{RouteMatch, Routing, RoutingOptions};
