//! Shared utilities for integration testing.

#![allow(dead_code)]

pub mod pathgen;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::sync::mpsc;

use route_engine::routing::{
    Arg, ArgError, DataClient, Filter, FilterSpec, MemorySource, Predicate, PredicateSpec,
    RouteDefinition, Routing, RoutingEvent, RoutingOptions,
};

/// Poll interval short enough to keep tests fast.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound for any single wait in a test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub const BACKEND: &str = "https://www.example.org";

/// Definition with a path predicate and a network backend.
pub fn route(id: &str, path: &str) -> RouteDefinition {
    RouteDefinition::new(id, BACKEND).with_path(path)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn request_with_header(uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

/// Header checked by [`CustomPredicateSpec`].
pub const CUSTOM_PREDICATE_HEADER: &str = "X-Custom-Predicate";

/// Predicate accepting requests whose `X-Custom-Predicate` header equals
/// its single string argument.
pub struct CustomPredicateSpec;

#[derive(Debug)]
pub struct CustomPredicate {
    value: String,
}

impl Predicate for CustomPredicate {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(CUSTOM_PREDICATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == self.value)
            .unwrap_or(false)
    }
}

impl PredicateSpec for CustomPredicateSpec {
    fn name(&self) -> &str {
        "CustomPredicate"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgError> {
        let value = match args {
            [Arg::String(value)] => value.clone(),
            _ => return Err(ArgError::Invalid("expected one string".to_string())),
        };
        Ok(Box::new(CustomPredicate { value }))
    }
}

/// Filter that keeps its arguments for inspection.
pub struct TestFilterSpec;

#[derive(Debug)]
pub struct TestFilter {
    pub args: Vec<Arg>,
}

impl Filter for TestFilter {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FilterSpec for TestFilterSpec {
    fn name(&self) -> &str {
        "testFilter"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Filter>, ArgError> {
        Ok(Box::new(TestFilter {
            args: args.to_vec(),
        }))
    }
}

/// A started controller together with its event stream.
pub struct TestRouting {
    pub routing: Routing,
    pub events: mpsc::UnboundedReceiver<RoutingEvent>,
}

impl TestRouting {
    /// Waits for the next `Applied` event, skipping other events.
    pub async fn next_applied(&mut self) -> RoutingEvent {
        loop {
            let event = self.next_event().await;
            if matches!(event, RoutingEvent::Applied { .. }) {
                return event;
            }
        }
    }

    pub async fn next_event(&mut self) -> RoutingEvent {
        tokio::time::timeout(WAIT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for a routing event")
            .expect("event channel closed")
    }

    /// Asserts that no `Applied` event arrives within `window`.
    pub async fn assert_no_applied(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Err(_) => return,
                Ok(None) => return,
                Ok(Some(RoutingEvent::Applied { .. })) => {
                    panic!("unexpected routing rebuild")
                }
                Ok(Some(_)) => {}
            }
        }
    }

    /// Stops the controller and waits for its tasks.
    pub async fn shutdown(self) {
        self.routing.close();
        self.routing.join().await;
    }
}

/// Starts a controller over the given sources with the test poll interval.
pub fn start_routing(sources: Vec<Arc<dyn DataClient>>) -> TestRouting {
    start_routing_with(RoutingOptions {
        sources,
        ..RoutingOptions::default()
    })
}

pub fn start_routing_with(mut options: RoutingOptions) -> TestRouting {
    let (tx, events) = mpsc::unbounded_channel();
    options.poll_interval = POLL_INTERVAL;
    options.events = Some(tx);

    let routing = Routing::new(options);
    routing.start();
    TestRouting { routing, events }
}

pub fn memory_source(name: &str, routes: Vec<RouteDefinition>) -> Arc<MemorySource> {
    Arc::new(MemorySource::new(name, routes))
}

/// Polls `condition` until it holds or the wait times out.
pub async fn wait_for<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for condition"
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
