//! Route file data client with optional change watching.
//!
//! Without a watcher the file is re-read on every poll. With one, a poll
//! only re-reads after the watcher reported a change, and an unchanged
//! poll costs one atomic load.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::parse_routes;
use crate::routing::{DataClient, RouteDefinition, SourceError, Update};

/// A TOML route file, polled as one data source.
pub struct FileSource {
    name: String,
    path: PathBuf,
    dirty: Arc<AtomicBool>,
    delivered: Mutex<IndexMap<String, RouteDefinition>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileSource {
    /// A source that re-reads the file on every poll.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            dirty: Arc::new(AtomicBool::new(true)),
            delivered: Mutex::new(IndexMap::new()),
            watcher: Mutex::new(None),
        }
    }

    /// A source that re-reads the file only after a change was detected.
    pub fn watched(path: impl Into<PathBuf>) -> Result<Self, notify::Error> {
        let source = Self::new(path);
        let watcher = source.start_watcher()?;
        *lock(&source.watcher) = Some(watcher);
        Ok(source)
    }

    fn is_watched(&self) -> bool {
        lock(&self.watcher).is_some()
    }

    /// Watches the parent directory so that editors replacing the file are
    /// noticed too.
    fn start_watcher(&self) -> Result<RecommendedWatcher, notify::Error> {
        let dirty = self.dirty.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if relevant
                        && (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
                    {
                        tracing::debug!(paths = ?event.paths, "Route file change detected");
                        dirty.store(true, Ordering::SeqCst);
                    }
                }
                Err(e) => {
                    tracing::error!("Watch error: {:?}", e);
                    dirty.store(true, Ordering::SeqCst);
                }
            },
            Config::default(),
        )?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route file watcher started");
        Ok(watcher)
    }

    async fn read(&self) -> Result<IndexMap<String, RouteDefinition>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut routes = IndexMap::new();
        for route in parse_routes(&content)? {
            if let Some(previous) = routes.insert(route.id.clone(), route) {
                tracing::warn!(
                    path = ?self.path,
                    route_id = %previous.id,
                    "Duplicate route id in route file, keeping the last one"
                );
            }
        }
        Ok(routes)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Changes that turn `previous` into `current`.
fn diff(
    previous: &IndexMap<String, RouteDefinition>,
    current: &IndexMap<String, RouteDefinition>,
) -> Update {
    Update {
        upserted: current
            .values()
            .filter(|route| previous.get(&route.id) != Some(*route))
            .cloned()
            .collect(),
        deleted: previous
            .keys()
            .filter(|id| !current.contains_key(*id))
            .cloned()
            .collect(),
    }
}

#[async_trait]
impl DataClient for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_all(&self) -> Result<Vec<RouteDefinition>, SourceError> {
        self.dirty.store(false, Ordering::SeqCst);
        let routes = match self.read().await {
            Ok(routes) => routes,
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };

        let all = routes.values().cloned().collect();
        *lock(&self.delivered) = routes;
        Ok(all)
    }

    async fn load_update(&self) -> Result<Update, SourceError> {
        if self.is_watched() && !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(Update::default());
        }

        let current = match self.read().await {
            Ok(routes) => routes,
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };

        let mut delivered = lock(&self.delivered);
        let update = diff(&delivered, &current);
        *delivered = current;
        Ok(update)
    }
}
