use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::argocd::{AppListing, WatchEvent};
use crate::error::ApiError;
use crate::model::{AppIndex, Application, ResourceNode};
use crate::tree::ResourceForest;

/// Why a burst stopped early.
#[derive(Debug)]
pub enum StreamEnd {
    Closed,
    Failed(ApiError),
    Cancelled,
}

/// Events gathered in one quiescence window.
#[derive(Debug)]
pub struct Burst {
    pub events: Vec<WatchEvent>,
    /// Set when the stream ended or the engine was cancelled inside the window.
    pub end: Option<StreamEnd>,
}

/// Gather `first` plus everything else the stream yields within `window`.
pub async fn collect_burst<S>(first: WatchEvent, stream: &mut S, window: Duration, cancel: &CancellationToken) -> Burst
where
    S: Stream<Item = Result<WatchEvent, ApiError>> + Unpin,
{
    let mut events = vec![first];
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Burst { events, end: Some(StreamEnd::Cancelled) };
            }
            _ = &mut deadline => {
                return Burst { events, end: None };
            }
            item = stream.next() => match item {
                Some(Ok(event)) => events.push(event),
                Some(Err(e)) => return Burst { events, end: Some(StreamEnd::Failed(e)) },
                None => return Burst { events, end: Some(StreamEnd::Closed) },
            },
        }
    }
}

/// What one applied batch changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub upserts: usize,
    pub deletes: usize,
    /// Applications removed by this batch.
    pub removed: Vec<String>,
}

/// The engine's working copy of everything it publishes.
///
/// `apps` is kept sorted by name. It and `index` are shared with published
/// snapshots and copied on write.
#[derive(Clone, Debug, Default)]
pub struct SyncState {
    pub apps: Arc<Vec<Application>>,
    pub index: Arc<AppIndex>,
    pub forest: ResourceForest,
    pub cursor: String,
}

impl SyncState {
    /// State after a full list. Duplicate names keep the last entry.
    pub fn from_listing(listing: AppListing) -> Self {
        let mut apps = listing.applications;
        apps.reverse();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        apps.dedup_by(|a, b| a.name == b.name);
        let index = AppIndex::build(&apps);
        Self {
            apps: Arc::new(apps),
            index: Arc::new(index),
            forest: ResourceForest::new(),
            cursor: listing.resource_version,
        }
    }

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.index.index_of(name).and_then(|pos| self.apps.get(pos))
    }

    /// Apply events in order, then rebuild the index once.
    pub fn apply_batch(&mut self, events: Vec<WatchEvent>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let apps = Arc::make_mut(&mut self.apps);

        for event in events {
            if let Some(rv) = event.resource_version().filter(|rv| !rv.is_empty()) {
                self.cursor = rv.to_string();
            }
            match event {
                WatchEvent::Upsert(app) => {
                    summary.upserts += 1;
                    self.forest.set_app_meta(&app.name, Some(app.health), Some(app.sync));
                    if !app.resources.is_empty() {
                        self.forest.set_resource_statuses(&app.name, &app.resources);
                    }
                    match apps.binary_search_by(|a| a.name.as_str().cmp(&app.name)) {
                        Ok(pos) => apps[pos] = app,
                        Err(pos) => apps.insert(pos, app),
                    }
                }
                WatchEvent::Delete { name, .. } => {
                    summary.deletes += 1;
                    if let Ok(pos) = apps.binary_search_by(|a| a.name.as_str().cmp(&name)) {
                        apps.remove(pos);
                    }
                    self.forest.remove(&name);
                    summary.removed.push(name);
                }
            }
        }

        // A later upsert may have re-added a deleted name.
        summary.removed.retain(|name| apps.binary_search_by(|a| a.name.as_str().cmp(name)).is_err());
        summary.removed.dedup();

        self.index = Arc::new(AppIndex::build(apps));
        summary
    }

    /// Adopt a fresh listing, keeping trees of applications still present
    /// with their root and statuses refreshed. Returns applications whose
    /// trees were dropped.
    pub fn reseed(&mut self, listing: AppListing) -> Vec<String> {
        let fresh = SyncState::from_listing(listing);
        let mut forest = std::mem::take(&mut self.forest);
        let dropped = forest.retain_apps(|name| fresh.index.index_of(name).is_some());
        for app in fresh.apps.iter() {
            forest.set_app_meta(&app.name, Some(app.health), Some(app.sync));
            forest.set_resource_statuses(&app.name, &app.resources);
        }
        *self = SyncState { forest, ..fresh };
        dropped
    }

    /// Replace the resource tree of a known application, seeding the root and
    /// node statuses from the application. Unknown applications are ignored.
    pub fn apply_tree(&mut self, app_name: &str, nodes: Vec<ResourceNode>) -> bool {
        let Some(pos) = self.index.index_of(app_name) else {
            return false;
        };
        let Some(app) = self.apps.get(pos) else {
            return false;
        };
        self.forest.upsert(app_name, nodes);
        self.forest.set_app_meta(app_name, Some(app.health), Some(app.sync));
        self.forest.set_resource_statuses(app_name, &app.resources);
        true
    }
}
