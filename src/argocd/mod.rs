//! Argo CD API access: the [`ApplicationSource`] seam the sync engine reads
//! from, and its HTTP implementation.

mod client;
pub mod sse;
pub mod wire;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::ApiError;
use crate::model::{Application, ResourceNode};

pub use client::{ArgoClient, ClientOptions};

/// Full application snapshot plus the cursor to resume watching from.
#[derive(Clone, Debug, Default)]
pub struct AppListing {
    pub resource_version: String,
    pub applications: Vec<Application>,
}

/// One incremental change to the application collection.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    Upsert(Application),
    Delete {
        name: String,
        resource_version: Option<String>,
    },
}

impl WatchEvent {
    pub fn name(&self) -> &str {
        match self {
            WatchEvent::Upsert(app) => &app.name,
            WatchEvent::Delete { name, .. } => name,
        }
    }

    pub fn resource_version(&self) -> Option<&str> {
        match self {
            WatchEvent::Upsert(app) => app.resource_version.as_deref(),
            WatchEvent::Delete { resource_version, .. } => resource_version.as_deref(),
        }
    }
}

/// Server-side narrowing of the application watch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchFilter {
    pub projects: Vec<String>,
}

impl WatchFilter {
    pub fn for_projects<I, S>(projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut projects: Vec<String> = projects.into_iter().map(Into::into).collect();
        projects.sort();
        projects.dedup();
        Self { projects }
    }

    /// Whether switching from `previous` to this filter lets through
    /// applications `previous` hid. Events for those were never delivered, so
    /// the old cursor cannot cover them.
    pub fn widens(&self, previous: &WatchFilter) -> bool {
        if previous.projects.is_empty() {
            return false;
        }
        self.projects.is_empty() || self.projects.iter().any(|p| !previous.projects.contains(p))
    }
}

/// Operations a user can trigger on one application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppAction {
    Sync,
    Refresh,
}

impl AppAction {
    pub fn verb(&self) -> &'static str {
        match self {
            AppAction::Sync => "sync",
            AppAction::Refresh => "refresh",
        }
    }

    /// Status line shown while the request is in flight.
    pub fn pending_message(&self, app: &str) -> String {
        match self {
            AppAction::Sync => format!("Syncing {}...", app),
            AppAction::Refresh => format!("Refreshing {}...", app),
        }
    }

    pub fn done_message(&self, app: &str) -> String {
        match self {
            AppAction::Sync => format!("Sync started for {}", app),
            AppAction::Refresh => format!("Refreshed {}", app),
        }
    }
}

/// Application events until the connection ends. An `Err` item ends the stream.
pub type EventStream = BoxStream<'static, Result<WatchEvent, ApiError>>;

/// Successive full resource trees of one application.
pub type TreeStream = BoxStream<'static, Result<Vec<ResourceNode>, ApiError>>;

/// Where applications and resource trees come from.
#[async_trait]
pub trait ApplicationSource: Send + Sync {
    async fn list_applications(&self) -> Result<AppListing, ApiError>;

    async fn watch_applications(&self, cursor: &str, filter: &WatchFilter) -> Result<EventStream, ApiError>;

    async fn get_resource_tree(&self, app: &str) -> Result<Vec<ResourceNode>, ApiError>;

    async fn watch_resource_tree(&self, app: &str) -> Result<TreeStream, ApiError>;

    /// Ask the server to sync `app` to its target revision. Returns once the
    /// operation is accepted, not when it finishes.
    async fn sync_application(&self, app: &str, app_namespace: Option<&str>) -> Result<(), ApiError>;

    /// Ask the server to compare `app` against git again.
    async fn refresh_application(&self, app: &str, app_namespace: Option<&str>) -> Result<(), ApiError>;

    async fn run_action(&self, action: AppAction, app: &str, app_namespace: Option<&str>) -> Result<(), ApiError> {
        match action {
            AppAction::Sync => self.sync_application(app, app_namespace).await,
            AppAction::Refresh => self.refresh_application(app, app_namespace).await,
        }
    }
}
