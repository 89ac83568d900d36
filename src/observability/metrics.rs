//! Metrics collection and exposition.
//!
//! # Metrics
//! - `routing_rebuilds_total` (counter): published snapshots
//! - `routing_compile_errors_total` (counter): definitions dropped
//! - `routing_source_errors_total` (counter): failed data client calls, by source
//! - `routing_routes` (gauge): routes in the current snapshot
//! - `routing_rebuild_duration_seconds` (histogram): compile + build time
//! - `routing_lookups_total` (counter): lookups, by result
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter installs a recorder
//! - Lookup recording is a single atomic increment

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed rebuild.
pub fn record_rebuild(routes: usize, errors: usize, started: Instant) {
    counter!("routing_rebuilds_total").increment(1);
    counter!("routing_compile_errors_total").increment(errors as u64);
    gauge!("routing_routes").set(routes as f64);
    histogram!("routing_rebuild_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record a failed data client call.
pub fn record_source_error(source: &str) {
    counter!("routing_source_errors_total", "source" => source.to_string()).increment(1);
}

/// Record the outcome of a lookup.
pub fn record_lookup(matched: bool) {
    let result = if matched { "matched" } else { "no_match" };
    counter!("routing_lookups_total", "result" => result).increment(1);
}
