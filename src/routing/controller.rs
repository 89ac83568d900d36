//! Routing controller.
//!
//! # Responsibilities
//! - Run one polling task per data client
//! - Merge per-source route sets in a single aggregator task
//! - Recompile and publish a new snapshot on every net change
//!
//! # Source States
//! ```text
//! Initializing: load_all, retried every poll interval until it succeeds
//!     → Polling: load_update every poll interval, failures retried
//!     → Closed: on shutdown, before the next wait elapses
//! ```
//!
//! # Design Decisions
//! - Only the aggregator mutates source state or publishes; no locks on
//!   the lookup path
//! - Messages that queue up while a rebuild runs are merged into one
//!   rebuild
//! - Route ids are scoped to their source: equal ids from two sources are
//!   two routes, ordered by source position

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use indexmap::IndexMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::compiler::{compile, Route};
use crate::routing::definition::RouteDefinition;
use crate::routing::filters::FilterRegistry;
use crate::routing::matcher::{Matcher, RouteMatch};
use crate::routing::predicates::{PredicateRegistry, PredicateSpec};
use crate::routing::source::{DataClient, SourceError, Update};
use crate::routing::table::{RouteTable, Snapshot};

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Notification about controller activity.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingEvent {
    /// A new snapshot was published.
    Applied {
        generation: u64,
        routes: usize,
        errors: usize,
    },
    /// A definition was dropped during a rebuild.
    CompileFailed { route_id: String, reason: String },
    /// A data client call failed; the source keeps its previous state.
    SourceFailed { source: String, error: String },
}

/// Controller settings.
pub struct RoutingOptions {
    /// Wait between data client calls.
    pub poll_interval: Duration,
    /// Custom predicates, registered on top of the built-ins.
    pub predicates: Vec<Arc<dyn PredicateSpec>>,
    pub filters: FilterRegistry,
    pub sources: Vec<Arc<dyn DataClient>>,
    /// Receives rebuild and error events, if set.
    pub events: Option<mpsc::UnboundedSender<RoutingEvent>>,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            predicates: Vec::new(),
            filters: FilterRegistry::with_builtins(),
            sources: Vec::new(),
            events: None,
        }
    }
}

#[derive(Clone)]
struct EventSink(Option<mpsc::UnboundedSender<RoutingEvent>>);

impl EventSink {
    fn emit(&self, event: RoutingEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

enum SourceMessage {
    Loaded {
        source: usize,
        routes: Vec<RouteDefinition>,
    },
    Updated {
        source: usize,
        update: Update,
    },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a route table in sync with a set of data clients.
pub struct Routing {
    table: Arc<RouteTable>,
    shutdown: Shutdown,
    pending: Mutex<Option<RoutingOptions>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Routing {
    /// Creates a controller with an empty table. Nothing runs until
    /// [`Routing::start`].
    pub fn new(options: RoutingOptions) -> Self {
        Self {
            table: Arc::new(RouteTable::new()),
            shutdown: Shutdown::new(),
            pending: Mutex::new(Some(options)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the polling and aggregator tasks on the current Tokio runtime.
    /// Calls after the first, or after close, do nothing.
    pub fn start(&self) {
        let Some(options) = lock(&self.pending).take() else {
            return;
        };
        if self.shutdown.is_triggered() {
            return;
        }

        let mut predicates = PredicateRegistry::with_builtins();
        for spec in options.predicates {
            predicates.register(spec);
        }

        let events = EventSink(options.events);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let names = options
            .sources
            .iter()
            .map(|s| s.name().to_string())
            .collect::<Vec<_>>();

        tracing::info!(
            sources = names.len(),
            poll_interval = ?options.poll_interval,
            "Routing controller starting"
        );

        let mut tasks = Vec::with_capacity(options.sources.len() + 1);
        for (index, client) in options.sources.into_iter().enumerate() {
            let poller = SourcePoller {
                index,
                client,
                interval: options.poll_interval,
                updates: updates_tx.clone(),
                events: events.clone(),
            };
            tasks.push(tokio::spawn(poller.run(self.shutdown.clone())));
        }
        drop(updates_tx);

        let aggregator = Aggregator {
            sources: names
                .into_iter()
                .map(|name| SourceState { name, routes: None })
                .collect(),
            predicates,
            filters: options.filters,
            table: self.table.clone(),
            events,
            shutdown: self.shutdown.clone(),
            generation: 0,
        };
        tasks.push(tokio::spawn(aggregator.run(updates_rx)));

        lock(&self.tasks).extend(tasks);
    }

    /// Looks up the route for a request in the latest published snapshot.
    pub fn route(&self, req: &Request<Body>) -> Option<RouteMatch> {
        self.table.route(req)
    }

    pub fn table(&self) -> Arc<RouteTable> {
        self.table.clone()
    }

    /// Routes of the latest published snapshot, in definition order.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.table.snapshot().matcher.routes().to_vec()
    }

    /// Generation of the latest published snapshot.
    pub fn generation(&self) -> u64 {
        self.table.generation()
    }

    /// Stops all polling. Idempotent; no snapshot is published afterwards.
    pub fn close(&self) {
        if !self.shutdown.is_triggered() {
            tracing::info!("Routing controller closing");
        }
        self.shutdown.trigger();
        lock(&self.pending).take();
    }

    /// Waits for the background tasks to finish. Call after [`Routing::close`].
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl Drop for Routing {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

struct SourcePoller {
    index: usize,
    client: Arc<dyn DataClient>,
    interval: Duration,
    updates: mpsc::UnboundedSender<SourceMessage>,
    events: EventSink,
}

impl SourcePoller {
    async fn run(self, shutdown: Shutdown) {
        let mut stop = shutdown.subscribe();
        if shutdown.is_triggered() {
            return;
        }

        // Calls start on a fixed cadence; a slow call does not push later
        // ones back by its own duration.
        let mut ticker = time::interval(self.interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let routes = loop {
            let result = tokio::select! {
                result = self.client.load_all() => result,
                _ = stop.recv() => return,
            };
            match result {
                Ok(routes) => break routes,
                Err(e) => self.report_failure(&e, "Initial route load failed, retrying"),
            }
            if !Self::wait(&mut ticker, &mut stop).await {
                return;
            }
        };

        tracing::debug!(
            source = %self.client.name(),
            routes = routes.len(),
            "Initial routes received"
        );
        let loaded = SourceMessage::Loaded {
            source: self.index,
            routes,
        };
        if self.updates.send(loaded).is_err() {
            return;
        }

        loop {
            if !Self::wait(&mut ticker, &mut stop).await {
                return;
            }

            let result = tokio::select! {
                result = self.client.load_update() => result,
                _ = stop.recv() => return,
            };
            match result {
                Ok(update) if update.is_empty() => {
                    tracing::trace!(source = %self.client.name(), "No route changes");
                }
                Ok(update) => {
                    tracing::debug!(
                        source = %self.client.name(),
                        upserted = update.upserted.len(),
                        deleted = update.deleted.len(),
                        "Route update received"
                    );
                    let updated = SourceMessage::Updated {
                        source: self.index,
                        update,
                    };
                    if self.updates.send(updated).is_err() {
                        return;
                    }
                }
                Err(e) => self.report_failure(&e, "Route update failed, keeping previous routes"),
            }
        }
    }

    /// Waits for the next tick. Returns false if shutdown came first.
    async fn wait(ticker: &mut Interval, stop: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = ticker.tick() => true,
            _ = stop.recv() => false,
        }
    }

    fn report_failure(&self, error: &SourceError, message: &str) {
        let source = self.client.name();
        tracing::warn!(source = %source, error = %error, "{}", message);
        metrics::record_source_error(source);
        self.events.emit(RoutingEvent::SourceFailed {
            source: source.to_string(),
            error: error.to_string(),
        });
    }
}

struct SourceState {
    name: String,
    /// `None` until the initial load succeeds.
    routes: Option<IndexMap<String, RouteDefinition>>,
}

struct Aggregator {
    sources: Vec<SourceState>,
    predicates: PredicateRegistry,
    filters: FilterRegistry,
    table: Arc<RouteTable>,
    events: EventSink,
    shutdown: Shutdown,
    generation: u64,
}

impl Aggregator {
    async fn run(mut self, mut updates: mpsc::UnboundedReceiver<SourceMessage>) {
        let mut stop = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return;
        }

        loop {
            let message = tokio::select! {
                message = updates.recv() => message,
                _ = stop.recv() => break,
            };
            let Some(message) = message else {
                break;
            };

            let mut changed = self.apply(message);
            while let Ok(message) = updates.try_recv() {
                changed |= self.apply(message);
            }

            if changed && !self.shutdown.is_triggered() {
                self.rebuild();
            }
        }

        tracing::debug!("Routing aggregator stopped");
    }

    /// Merges one message into the source state. Returns true on a net
    /// change.
    fn apply(&mut self, message: SourceMessage) -> bool {
        match message {
            SourceMessage::Loaded { source, routes } => {
                let Some(state) = self.sources.get_mut(source) else {
                    return false;
                };

                let mut merged = IndexMap::with_capacity(routes.len());
                for route in routes {
                    if let Some(previous) = merged.insert(route.id.clone(), route) {
                        tracing::warn!(
                            source = %state.name,
                            route_id = %previous.id,
                            "Duplicate route id in initial load, keeping the last one"
                        );
                    }
                }
                state.routes = Some(merged);
                true
            }
            SourceMessage::Updated { source, update } => {
                let Some(state) = self.sources.get_mut(source) else {
                    return false;
                };
                let Some(routes) = state.routes.as_mut() else {
                    return false;
                };

                let mut changed = false;
                for route in update.upserted {
                    if routes.get(&route.id) == Some(&route) {
                        continue;
                    }
                    routes.insert(route.id.clone(), route);
                    changed = true;
                }
                for id in update.deleted {
                    changed |= routes.shift_remove(&id).is_some();
                }

                if !changed {
                    tracing::trace!(source = %state.name, "Update carried no net change");
                }
                changed
            }
        }
    }

    /// Flattens all initialized sources, in source order.
    fn definitions(&self) -> Vec<RouteDefinition> {
        self.sources
            .iter()
            .filter_map(|s| s.routes.as_ref())
            .flat_map(|routes| routes.values().cloned())
            .collect()
    }

    fn rebuild(&mut self) {
        let started = Instant::now();
        let definitions = self.definitions();
        let (routes, errors) = compile(&definitions, &self.predicates, &self.filters);

        for error in &errors {
            tracing::warn!(route_id = %error.route_id, "Route dropped: {}", error.kind);
            self.events.emit(RoutingEvent::CompileFailed {
                route_id: error.route_id.clone(),
                reason: error.kind.to_string(),
            });
        }

        let matcher = Matcher::build(routes.into_iter().map(Arc::new));
        let route_count = matcher.len();
        if self.shutdown.is_triggered() {
            tracing::debug!("Routing closed during rebuild, snapshot discarded");
            return;
        }
        self.generation += 1;
        self.table.publish(Snapshot {
            generation: self.generation,
            matcher,
        });

        metrics::record_rebuild(route_count, errors.len(), started);
        tracing::info!(
            generation = self.generation,
            routes = route_count,
            errors = errors.len(),
            "route settings applied"
        );
        self.events.emit(RoutingEvent::Applied {
            generation: self.generation,
            routes: route_count,
            errors: errors.len(),
        });
    }
}
