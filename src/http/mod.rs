//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing layer)
//!     → routing table lookup on the latest snapshot
//!     → JSON description of the matched route, or 404
//! ```

pub mod server;

pub use server::{build_router, AppState, HttpServer, ROUTES_PATH};
