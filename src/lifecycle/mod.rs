//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Start routing controller → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Trigger shutdown → Server drains → Controller closes
//! ```
//!
//! # Design Decisions
//! - One broadcast signal shared by the server and every polling task
//! - Triggering twice is harmless

pub mod shutdown;

pub use shutdown::Shutdown;
