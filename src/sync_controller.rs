use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::argocd::{AppAction, ApplicationSource, WatchFilter};
use crate::error::ApiError;
use crate::sync::{Snapshot, StreamSync, SyncOptions};

/// Receiver for the background bootstrap result.
type BootstrapReceiver = std::sync::mpsc::Receiver<Result<StreamSync, ApiError>>;

/// Receiver for the result of a sync or refresh request.
type ActionReceiver = std::sync::mpsc::Receiver<Result<String, String>>;

/// Owns the sync engine on behalf of the UI thread: starts it in the
/// background, hands out the latest snapshot and forwards scope and tree
/// requests.
pub struct SyncMonitor {
    rt: Arc<tokio::runtime::Runtime>,
    source: Arc<dyn ApplicationSource>,
    options: SyncOptions,
    sync: Option<StreamSync>,
    bootstrap_receiver: Option<BootstrapReceiver>,
    pub snapshot: Arc<Snapshot>,
    pub status_message: Option<String>,
    pub bootstrap_failed: bool,
    projects: BTreeSet<String>,
    watched_tree: Option<String>,
    action_receiver: Option<ActionReceiver>,
    pub action_in_progress: bool,
}

impl SyncMonitor {
    pub fn new(rt: Arc<tokio::runtime::Runtime>, source: Arc<dyn ApplicationSource>, options: SyncOptions) -> Self {
        let projects = options.filter.projects.iter().cloned().collect();
        Self {
            rt,
            source,
            options,
            sync: None,
            bootstrap_receiver: None,
            snapshot: Arc::new(Snapshot::empty()),
            status_message: None,
            bootstrap_failed: false,
            projects,
            watched_tree: None,
            action_receiver: None,
            action_in_progress: false,
        }
    }

    /// Start the initial list in the background. No-op while one is running
    /// or the engine is already up.
    pub fn start(&mut self) {
        if self.sync.is_some() || self.bootstrap_receiver.is_some() {
            return;
        }
        let (tx, rx) = std::sync::mpsc::channel();
        self.bootstrap_receiver = Some(rx);
        self.bootstrap_failed = false;
        self.status_message = Some("Loading applications...".to_string());

        let source = Arc::clone(&self.source);
        let mut options = self.options.clone();
        options.filter = WatchFilter::for_projects(self.projects.iter().cloned());
        self.rt.spawn(async move {
            let result = StreamSync::start(source, options).await;
            let _ = tx.send(result);
        });
    }

    /// Retry after a failed bootstrap.
    pub fn retry(&mut self) -> bool {
        if !self.bootstrap_failed {
            return false;
        }
        info!("retrying bootstrap");
        self.start();
        true
    }

    pub fn is_ready(&self) -> bool {
        self.sync.is_some()
    }

    /// Pick up a finished bootstrap and the newest snapshot. Returns true if
    /// anything visible changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = self.poll_bootstrap();
        if let Some(ref mut sync) = self.sync {
            if sync.has_changed() {
                self.snapshot = sync.latest();
                changed = true;
            }
        }
        changed
    }

    fn poll_bootstrap(&mut self) -> bool {
        let Some(ref rx) = self.bootstrap_receiver else { return false };
        match rx.try_recv() {
            Ok(Ok(mut sync)) => {
                self.snapshot = sync.latest();
                if let Some(ref app) = self.watched_tree {
                    sync.watch_tree(app);
                }
                self.sync = Some(sync);
                self.status_message = None;
                self.bootstrap_receiver = None;
                true
            }
            Ok(Err(e)) => {
                error!(error = %e, "bootstrap failed");
                self.status_message = Some(bootstrap_message(&e));
                self.bootstrap_failed = true;
                self.bootstrap_receiver = None;
                true
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => false,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.status_message = Some("Bootstrap stopped unexpectedly (r to retry)".to_string());
                self.bootstrap_failed = true;
                self.bootstrap_receiver = None;
                true
            }
        }
    }

    /// Narrow the watch to `projects` (all when empty).
    pub fn set_projects(&mut self, projects: &BTreeSet<String>) {
        if *projects == self.projects {
            return;
        }
        self.projects = projects.clone();
        if let Some(ref sync) = self.sync {
            sync.set_scope(WatchFilter::for_projects(projects.iter().cloned()));
        }
    }

    /// Follow the resource tree of `app`, releasing the previous one.
    pub fn open_tree(&mut self, app: &str) {
        if self.watched_tree.as_deref() == Some(app) {
            return;
        }
        self.close_tree();
        debug!(app, "opening resource tree");
        if let Some(ref sync) = self.sync {
            sync.watch_tree(app);
        }
        self.watched_tree = Some(app.to_string());
    }

    pub fn close_tree(&mut self) {
        if let Some(app) = self.watched_tree.take() {
            debug!(app = %app, "closing resource tree");
            if let Some(ref sync) = self.sync {
                sync.unwatch_tree(&app);
            }
        }
    }

    /// Send `action` for `app` in the background. Returns the status line to
    /// show; the outcome arrives through [`SyncMonitor::poll_action`].
    pub fn run_action(&mut self, action: AppAction, app: &str) -> String {
        if self.action_in_progress {
            return "An action is already in progress...".to_string();
        }
        let app_namespace = self.snapshot.app(app).and_then(|a| a.app_namespace.clone());
        let (tx, rx) = std::sync::mpsc::channel();
        self.action_receiver = Some(rx);
        self.action_in_progress = true;
        info!(app, action = action.verb(), "requesting action");

        let source = Arc::clone(&self.source);
        let app = app.to_string();
        let pending = action.pending_message(&app);
        self.rt.spawn(async move {
            let result = match source.run_action(action, &app, app_namespace.as_deref()).await {
                Ok(()) => Ok(action.done_message(&app)),
                Err(e) => {
                    error!(app = %app, action = action.verb(), error = %e, "action failed");
                    Err(e.to_string())
                }
            };
            let _ = tx.send(result);
        });
        pending
    }

    /// Outcome of a finished action, if one just finished.
    pub fn poll_action(&mut self) -> Option<String> {
        let rx = self.action_receiver.as_ref()?;
        let message = match rx.try_recv() {
            Ok(Ok(msg)) => msg,
            Ok(Err(msg)) => format!("Error: {}", msg),
            Err(std::sync::mpsc::TryRecvError::Empty) => return None,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => "Action failed unexpectedly".to_string(),
        };
        self.action_in_progress = false;
        self.action_receiver = None;
        Some(message)
    }

    /// Stop the engine and wait for it to finish.
    pub fn shutdown(&mut self) {
        if let Some(sync) = self.sync.take() {
            self.rt.block_on(sync.shutdown());
        }
    }
}

fn bootstrap_message(e: &ApiError) -> String {
    if e.is_unauthorized() {
        format!("Not authorized, check the auth token: {} (r to retry)", e)
    } else {
        format!("Error: {} (r to retry)", e)
    }
}
