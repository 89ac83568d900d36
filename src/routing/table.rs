//! Published route table.
//!
//! Readers load the current snapshot with a single atomic pointer read and
//! never wait on the controller. The controller replaces the whole snapshot
//! on every rebuild; a snapshot stays alive as long as a reader holds it.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;

use crate::observability::metrics;
use crate::routing::matcher::{Matcher, RouteMatch};

/// One published, immutable lookup tree.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Incremented on every publish; 0 is the empty table before the first
    /// rebuild.
    pub generation: u64,
    pub matcher: Matcher,
}

/// Lock-free holder of the current snapshot.
#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<Snapshot>,
}

impl RouteTable {
    /// An empty table that matches nothing.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    /// Looks up the route for a request in the current snapshot.
    pub fn route(&self, req: &Request<Body>) -> Option<RouteMatch> {
        let found = self.current.load().matcher.lookup(req);
        metrics::record_lookup(found.is_some());
        found
    }

    /// The current snapshot, kept alive for as long as the caller holds it.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Atomically replaces the current snapshot.
    pub(crate) fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::compiler::compile;
    use crate::routing::definition::RouteDefinition;
    use crate::routing::filters::FilterRegistry;
    use crate::routing::predicates::PredicateRegistry;

    fn snapshot(generation: u64, definitions: &[RouteDefinition]) -> Snapshot {
        let (routes, _) = compile(
            definitions,
            &PredicateRegistry::new(),
            &FilterRegistry::new(),
        );
        Snapshot {
            generation,
            matcher: Matcher::from(routes),
        }
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let table = RouteTable::new();
        let req = Request::builder()
            .uri("/some-path")
            .body(Body::default())
            .unwrap();
        assert!(table.route(&req).is_none());
        assert_eq!(table.generation(), 0);

        let held = table.snapshot();
        table.publish(snapshot(
            1,
            &[RouteDefinition::new("r1", "https://www.example.org").with_path("/some-path")],
        ));

        assert_eq!(table.route(&req).unwrap().route.id, "r1");
        assert_eq!(table.generation(), 1);
        // Earlier snapshot is still usable by its holder.
        assert!(held.matcher.lookup(&req).is_none());
    }
}
