//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Data clients (source.rs)
//!     → controller.rs (per-source polling, merge in one aggregator)
//!     → compiler.rs (definitions → routes, bad definitions dropped)
//!     → matcher.rs (path tree over compiled routes)
//!     → table.rs (atomic snapshot swap)
//!
//! Incoming Request (method, host, path, headers)
//!     → table.rs (load current snapshot, no lock)
//!     → matcher.rs (backtracking tree search)
//!     → Return: RouteMatch or no match
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; every change rebuilds the tree
//! - Deterministic: the same route table always resolves a request the same way
//! - No match is an ordinary outcome, not an error

pub mod compiler;
pub mod controller;
pub mod definition;
pub mod filters;
pub mod matcher;
pub mod path;
pub mod predicates;
pub mod source;
pub mod table;

pub use compiler::{compile, CompileError, CompileErrorKind, Compiler, Route};
pub use controller::{Routing, RoutingEvent, RoutingOptions, DEFAULT_POLL_INTERVAL};
pub use definition::{Arg, Backend, FilterDef, PredicateDef, RouteDefinition};
pub use filters::{Filter, FilterRegistry, FilterSpec, RouteFilter};
pub use matcher::{Matcher, RouteMatch};
pub use path::{Params, PathPattern};
pub use predicates::{ArgError, Predicate, PredicateRegistry, PredicateSpec};
pub use source::{DataClient, MemorySource, SourceError, Update};
pub use table::{RouteTable, Snapshot};
