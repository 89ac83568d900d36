//! Route data sources.
//!
//! A data client delivers the full route set once and incremental changes
//! afterwards. The controller calls it from a dedicated task, so
//! implementations may block on I/O inside the returned futures.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

use crate::routing::definition::RouteDefinition;

/// Incremental change reported by a data client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// New or changed definitions, replacing any with the same id.
    pub upserted: Vec<RouteDefinition>,
    /// Ids of removed definitions.
    pub deleted: Vec<String>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }
}

/// Failure of a data client call. Never fatal to the controller.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Supplier of route definitions.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Name used in logs and events.
    fn name(&self) -> &str;

    /// Returns the complete current route set.
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, SourceError>;

    /// Returns the changes since the previous successful call.
    async fn load_update(&self) -> Result<Update, SourceError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    routes: IndexMap<String, RouteDefinition>,
    pending: Update,
    fail_next: usize,
}

/// In-memory data client, fed programmatically.
///
/// Changes made with [`MemorySource::update`] are handed out by the next
/// `load_update`; a `load_all` returns the current set and discards
/// anything pending.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, routes: Vec<RouteDefinition>) -> Self {
        let routes = routes.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                routes,
                ..MemoryState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies upserts, then deletes, to the current set and queues them for
    /// the next poll.
    pub fn update(&self, upserted: Vec<RouteDefinition>, deleted: Vec<String>) {
        let mut state = self.state();

        for route in upserted {
            state.pending.deleted.retain(|id| *id != route.id);
            state.pending.upserted.retain(|r| r.id != route.id);
            state.routes.insert(route.id.clone(), route.clone());
            state.pending.upserted.push(route);
        }

        for id in deleted {
            state.pending.upserted.retain(|r| r.id != id);
            state.routes.shift_remove(&id);
            if !state.pending.deleted.contains(&id) {
                state.pending.deleted.push(id);
            }
        }
    }

    /// Makes the next call, of either kind, fail.
    pub fn fail_next(&self) {
        self.state().fail_next += 1;
    }

    /// Snapshot of the current route set.
    pub fn routes(&self) -> Vec<RouteDefinition> {
        self.state().routes.values().cloned().collect()
    }

    fn take_failure(state: &mut MemoryState) -> Result<(), SourceError> {
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(SourceError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataClient for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_all(&self) -> Result<Vec<RouteDefinition>, SourceError> {
        let mut state = self.state();
        Self::take_failure(&mut state)?;
        state.pending = Update::default();
        Ok(state.routes.values().cloned().collect())
    }

    async fn load_update(&self) -> Result<Update, SourceError> {
        let mut state = self.state();
        Self::take_failure(&mut state)?;
        Ok(std::mem::take(&mut state.pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, path: &str) -> RouteDefinition {
        RouteDefinition::new(id, "https://www.example.org").with_path(path)
    }

    #[tokio::test]
    async fn test_load_all_then_updates() {
        let source = MemorySource::new("memory", vec![route("r1", "/a")]);

        let all = source.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(source.load_update().await.unwrap().is_empty());

        source.update(vec![route("r2", "/b")], vec!["r1".into()]);
        let update = source.load_update().await.unwrap();
        assert_eq!(update.upserted, vec![route("r2", "/b")]);
        assert_eq!(update.deleted, vec!["r1".to_string()]);
        assert!(source.load_update().await.unwrap().is_empty());
        assert_eq!(source.routes(), vec![route("r2", "/b")]);
    }

    #[tokio::test]
    async fn test_injected_failures_keep_pending_changes() {
        let source = MemorySource::new("memory", vec![]);
        source.fail_next();
        source.fail_next();
        assert!(source.load_all().await.is_err());
        assert!(source.load_all().await.is_err());
        assert!(source.load_all().await.is_ok());

        source.fail_next();
        source.update(vec![route("r1", "/a")], vec![]);
        assert!(matches!(
            source.load_update().await,
            Err(SourceError::Unavailable(_))
        ));
        assert_eq!(source.load_update().await.unwrap().upserted.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cancels_pending_upsert() {
        let source = MemorySource::new("memory", vec![]);
        source.update(vec![route("r1", "/a")], vec![]);
        source.update(vec![], vec!["r1".into()]);

        let update = source.load_update().await.unwrap();
        assert!(update.upserted.is_empty());
        assert_eq!(update.deleted, vec!["r1".to_string()]);
    }
}
