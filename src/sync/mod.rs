//! Keeps an in-memory copy of the application collection current.
//!
//! A full list seeds the state and yields a cursor; a watch from that cursor
//! streams changes, which are grouped into bursts and applied as one batch.
//! Every batch produces a new immutable [`Snapshot`] that readers pick up
//! through a `watch` channel without ever seeing a half-applied state.

pub mod backoff;
pub mod batch;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::argocd::{AppListing, ApplicationSource, EventStream, WatchEvent, WatchFilter};
use crate::error::ApiError;
use crate::model::{AppIndex, Application, ResourceNode};
use crate::tree::{ResourceForest, ResourceTree};

use backoff::Backoff;
use batch::{collect_burst, StreamEnd, SyncState};

pub const BATCH_WINDOW: Duration = Duration::from_millis(500);
pub const SCOPE_DEBOUNCE: Duration = Duration::from_millis(500);

/// State of the application watch as shown in the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Live,
    Reconnecting { attempt: u32, delay: Duration },
    Stopped,
}

impl ConnectionState {
    pub fn label(&self) -> String {
        match self {
            ConnectionState::Connecting => "connecting".into(),
            ConnectionState::Live => "live".into(),
            ConnectionState::Reconnecting { attempt, delay } => {
                format!("reconnecting (attempt {}, {}s)", attempt, delay.as_secs())
            }
            ConnectionState::Stopped => "stopped".into(),
        }
    }
}

/// Immutable view of the collection after some number of batches.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Sorted by name.
    pub apps: Arc<Vec<Application>>,
    pub index: Arc<AppIndex>,
    pub forest: ResourceForest,
    pub cursor: String,
    pub connection: ConnectionState,
    pub updated_at: DateTime<Local>,
    pub batches: u64,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            apps: Arc::new(Vec::new()),
            index: Arc::new(AppIndex::default()),
            forest: ResourceForest::new(),
            cursor: String::new(),
            connection: ConnectionState::Connecting,
            updated_at: Local::now(),
            batches: 0,
        }
    }

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.index.index_of(name).and_then(|pos| self.apps.get(pos))
    }

    pub fn tree(&self, name: &str) -> Option<&ResourceTree> {
        self.forest.get(name)
    }
}

/// Tuning for [`StreamSync`].
#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub batch_window: Duration,
    pub scope_debounce: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// Filter the first watch is opened with.
    pub filter: WatchFilter,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_window: BATCH_WINDOW,
            scope_debounce: SCOPE_DEBOUNCE,
            backoff_initial: backoff::INITIAL_DELAY,
            backoff_max: backoff::MAX_DELAY,
            filter: WatchFilter::default(),
        }
    }
}

impl SyncOptions {
    fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_initial, self.backoff_max)
    }
}

#[derive(Debug)]
enum Command {
    SetScope(WatchFilter),
    WatchTree(String),
    UnwatchTree(String),
}

#[derive(Debug)]
struct TreeUpdate {
    app: String,
    nodes: Vec<ResourceNode>,
}

/// Handle to a running sync engine.
///
/// Dropping the handle stops the engine; [`StreamSync::shutdown`] also waits
/// for it to finish.
pub struct StreamSync {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamSync {
    /// List applications, then start watching from the listing's cursor.
    /// A failed list is returned to the caller and nothing is spawned.
    pub async fn start(source: Arc<dyn ApplicationSource>, options: SyncOptions) -> Result<Self, ApiError> {
        let listing = source.list_applications().await?;
        Ok(Self::spawn(source, listing, options))
    }

    /// Start the engine from an existing listing. Must run inside a tokio runtime.
    pub fn spawn(source: Arc<dyn ApplicationSource>, listing: AppListing, options: SyncOptions) -> Self {
        let state = SyncState::from_listing(listing);
        info!(apps = state.apps.len(), cursor = %state.cursor, "bootstrap complete");

        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (tree_tx, tree_rx) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(Arc::new(Snapshot::empty()));

        let engine = Engine {
            source,
            filter: options.filter.clone(),
            backoff: options.backoff(),
            options,
            state,
            pending_scope: None,
            connection: ConnectionState::Connecting,
            batches: 0,
            publisher,
            commands: command_rx,
            tree_tx,
            tree_rx,
            tree_watches: HashMap::new(),
            wanted_trees: BTreeSet::new(),
            relist: false,
            cancel: cancel.clone(),
        };
        engine.publish();
        let task = tokio::spawn(engine.run());

        Self {
            commands: command_tx,
            snapshots,
            cancel,
            task: Some(task),
        }
    }

    /// Most recent snapshot, marking it seen.
    pub fn latest(&mut self) -> Arc<Snapshot> {
        self.snapshots.borrow_and_update().clone()
    }

    /// Whether a snapshot newer than the last `latest` call exists.
    pub fn has_changed(&self) -> bool {
        self.snapshots.has_changed().unwrap_or(false)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// Narrow the watch. Rapid calls coalesce; only the last one within the
    /// debounce window takes effect.
    pub fn set_scope(&self, filter: WatchFilter) {
        self.send(Command::SetScope(filter));
    }

    /// Keep the resource tree of `app` loaded and current. The request
    /// outlives a delete: the tree reloads if the application comes back.
    pub fn watch_tree(&self, app: &str) {
        self.send(Command::WatchTree(app.to_string()));
    }

    pub fn unwatch_tree(&self, app: &str) {
        self.send(Command::UnwatchTree(app.to_string()));
    }

    /// Stop the engine and wait for it. A batch being collected is discarded.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "sync engine task failed");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("sync engine already stopped");
        }
    }
}

impl Drop for StreamSync {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Phase {
    Connect,
    Stream(EventStream),
    Wait(Instant),
}

enum Wake {
    Cancelled,
    Command(Option<Command>),
    Tree(TreeUpdate),
    ScopeDue,
    RetryDue,
    Event(Option<Result<WatchEvent, ApiError>>),
}

struct Engine {
    source: Arc<dyn ApplicationSource>,
    options: SyncOptions,
    state: SyncState,
    filter: WatchFilter,
    pending_scope: Option<(WatchFilter, Instant)>,
    backoff: Backoff,
    connection: ConnectionState,
    batches: u64,
    publisher: watch::Sender<Arc<Snapshot>>,
    commands: mpsc::UnboundedReceiver<Command>,
    tree_tx: mpsc::UnboundedSender<TreeUpdate>,
    tree_rx: mpsc::UnboundedReceiver<TreeUpdate>,
    /// Running tree followers.
    tree_watches: HashMap<String, CancellationToken>,
    /// Trees the UI asked for, including ones whose application is gone.
    wanted_trees: BTreeSet<String>,
    /// The scope widened; list again before watching.
    relist: bool,
    cancel: CancellationToken,
}

impl Engine {
    async fn run(mut self) {
        let mut phase = Phase::Connect;

        loop {
            if let Phase::Connect = phase {
                match self.connect().await {
                    Some(next) => phase = next,
                    None => break,
                }
                continue;
            }

            let scope_due = self.pending_scope.as_ref().map(|(_, at)| *at);
            let wake = tokio::select! {
                _ = self.cancel.cancelled() => Wake::Cancelled,
                cmd = self.commands.recv() => Wake::Command(cmd),
                Some(update) = self.tree_rx.recv() => Wake::Tree(update),
                _ = sleep_until_opt(scope_due) => Wake::ScopeDue,
                wake = next_in_phase(&mut phase) => wake,
            };

            match wake {
                Wake::Cancelled | Wake::Command(None) => break,
                Wake::Command(Some(cmd)) => self.handle_command(cmd),
                Wake::Tree(update) => {
                    if self.tree_watches.contains_key(&update.app) && self.state.apply_tree(&update.app, update.nodes) {
                        debug!(app = %update.app, "resource tree updated");
                        self.publish();
                    }
                }
                Wake::ScopeDue => {
                    if self.take_scope() {
                        phase = Phase::Connect;
                    }
                }
                Wake::RetryDue => phase = Phase::Connect,
                Wake::Event(Some(Ok(first))) => {
                    let Phase::Stream(stream) = &mut phase else {
                        continue;
                    };
                    let burst = collect_burst(first, stream, self.options.batch_window, &self.cancel).await;
                    if let Some(StreamEnd::Cancelled) = burst.end {
                        debug!(events = burst.events.len(), "discarding unapplied batch");
                        break;
                    }
                    self.apply(burst.events);
                    if let Some(end) = burst.end {
                        phase = self.lost(end);
                    }
                }
                Wake::Event(Some(Err(e))) => phase = self.lost(StreamEnd::Failed(e)),
                Wake::Event(None) => phase = self.lost(StreamEnd::Closed),
            }
        }

        for (_, token) in self.tree_watches.drain() {
            token.cancel();
        }
        self.set_connection(ConnectionState::Stopped);
        info!("sync engine stopped");
    }

    /// Open the application watch from the current cursor. `None` when
    /// cancelled.
    async fn connect(&mut self) -> Option<Phase> {
        if self.backoff.attempt() == 0 {
            self.set_connection(ConnectionState::Connecting);
        }
        if self.relist {
            let listed = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                res = self.source.list_applications() => res,
            };
            match listed {
                Ok(listing) => self.reseed(listing),
                Err(e) => return Some(self.lost(StreamEnd::Failed(e))),
            }
        }
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            res = self.source.watch_applications(&self.state.cursor, &self.filter) => res,
        };
        match opened {
            Ok(stream) => {
                self.backoff.reset();
                self.set_connection(ConnectionState::Live);
                Some(Phase::Stream(stream))
            }
            Err(e) => Some(self.lost(StreamEnd::Failed(e))),
        }
    }

    /// Schedule a reconnect after the stream ended or failed to open.
    fn lost(&mut self, end: StreamEnd) -> Phase {
        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempt();
        match &end {
            StreamEnd::Failed(e) => {
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "application watch failed")
            }
            _ => info!(attempt, delay_ms = delay.as_millis() as u64, "application watch closed"),
        }
        self.set_connection(ConnectionState::Reconnecting { attempt, delay });
        Phase::Wait(Instant::now() + delay)
    }

    fn apply(&mut self, events: Vec<WatchEvent>) {
        let count = events.len();
        let summary = self.state.apply_batch(events);
        self.stop_trees(&summary.removed);
        self.resume_trees();
        self.batches += 1;
        debug!(
            events = count,
            upserts = summary.upserts,
            deletes = summary.deletes,
            cursor = %self.state.cursor,
            "applied batch"
        );
        self.publish();
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetScope(filter) => {
                self.pending_scope = Some((filter, Instant::now() + self.options.scope_debounce));
            }
            Command::WatchTree(app) => {
                self.wanted_trees.insert(app);
                self.resume_trees();
            }
            Command::UnwatchTree(app) => {
                self.wanted_trees.remove(&app);
                self.stop_trees(&[app]);
            }
        }
    }

    /// Start a follower for every wanted tree whose application exists.
    fn resume_trees(&mut self) {
        for app in &self.wanted_trees {
            if self.tree_watches.contains_key(app) || self.state.index.index_of(app).is_none() {
                continue;
            }
            debug!(app = %app, "following resource tree");
            let token = self.cancel.child_token();
            tokio::spawn(follow_tree(
                Arc::clone(&self.source),
                app.clone(),
                self.tree_tx.clone(),
                token.clone(),
                self.options.backoff(),
            ));
            self.tree_watches.insert(app.clone(), token);
        }
    }

    fn stop_trees(&mut self, apps: &[String]) {
        for app in apps {
            if let Some(token) = self.tree_watches.remove(app) {
                debug!(app = %app, "stopped following resource tree");
                token.cancel();
            }
        }
    }

    /// Replace the collection with a fresh listing after the scope widened.
    fn reseed(&mut self, listing: AppListing) {
        let removed = self.state.reseed(listing);
        self.relist = false;
        self.stop_trees(&removed);
        self.resume_trees();
        self.batches += 1;
        info!(apps = self.state.apps.len(), cursor = %self.state.cursor, removed = removed.len(), "relisted applications");
        self.publish();
    }

    /// Adopt the pending scope. Returns true when the watch must restart.
    fn take_scope(&mut self) -> bool {
        let Some((filter, _)) = self.pending_scope.take() else {
            return false;
        };
        if filter == self.filter {
            return false;
        }
        info!(projects = ?filter.projects, "watch scope changed, restarting stream");
        if filter.widens(&self.filter) {
            self.relist = true;
        }
        self.filter = filter;
        self.backoff.reset();
        true
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            self.connection = state;
            self.publish();
        }
    }

    fn publish(&self) {
        let snapshot = Snapshot {
            apps: Arc::clone(&self.state.apps),
            index: Arc::clone(&self.state.index),
            forest: self.state.forest.clone(),
            cursor: self.state.cursor.clone(),
            connection: self.connection.clone(),
            updated_at: Local::now(),
            batches: self.batches,
        };
        self.publisher.send_replace(Arc::new(snapshot));
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_in_phase(phase: &mut Phase) -> Wake {
    match phase {
        Phase::Stream(stream) => Wake::Event(stream.next().await),
        Phase::Wait(at) => {
            sleep_until(*at).await;
            Wake::RetryDue
        }
        Phase::Connect => std::future::pending().await,
    }
}

/// Fetch and follow one application's resource tree until cancelled,
/// reconnecting with backoff.
async fn follow_tree(
    source: Arc<dyn ApplicationSource>,
    app: String,
    updates: mpsc::UnboundedSender<TreeUpdate>,
    cancel: CancellationToken,
    mut backoff: Backoff,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            res = stream_tree(source.as_ref(), &app, &updates, &mut backoff) => res,
        };
        if updates.is_closed() {
            return;
        }
        let delay = backoff.next_delay();
        match result {
            Ok(()) => debug!(app = %app, "resource tree stream closed"),
            Err(e) => warn!(app = %app, error = %e, delay_ms = delay.as_millis() as u64, "resource tree watch failed"),
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}

async fn stream_tree(
    source: &dyn ApplicationSource,
    app: &str,
    updates: &mpsc::UnboundedSender<TreeUpdate>,
    backoff: &mut Backoff,
) -> Result<(), ApiError> {
    let nodes = source.get_resource_tree(app).await?;
    if send_tree(updates, app, nodes).is_err() {
        return Ok(());
    }
    let mut stream = source.watch_resource_tree(app).await?;
    backoff.reset();
    while let Some(item) = stream.next().await {
        if send_tree(updates, app, item?).is_err() {
            return Ok(());
        }
    }
    Ok(())
}

fn send_tree(
    updates: &mpsc::UnboundedSender<TreeUpdate>,
    app: &str,
    nodes: Vec<ResourceNode>,
) -> Result<(), mpsc::error::SendError<TreeUpdate>> {
    updates.send(TreeUpdate {
        app: app.to_string(),
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argocd::TreeStream;
    use crate::model::{HealthStatus, ResourceStatus, SyncStatus};
    use async_trait::async_trait;
    use futures_util::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type EventTx = mpsc::UnboundedSender<Result<WatchEvent, ApiError>>;

    #[derive(Default)]
    struct ScriptedSource {
        listing: Mutex<Option<AppListing>>,
        watches: Mutex<VecDeque<EventStream>>,
        calls: Mutex<Vec<(String, WatchFilter)>>,
        trees: Mutex<HashMap<String, Vec<ResourceNode>>>,
    }

    impl ScriptedSource {
        fn with_apps(cursor: &str, names: &[&str]) -> Self {
            let source = Self::default();
            *source.listing.lock().unwrap() = Some(AppListing {
                resource_version: cursor.into(),
                applications: names.iter().map(|n| app(n, cursor)).collect(),
            });
            source
        }

        fn push_watch(&self) -> EventTx {
            let (tx, rx) = mpsc::unbounded_channel();
            let events = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) }).boxed();
            self.watches.lock().unwrap().push_back(events);
            tx
        }

        fn calls(&self) -> Vec<(String, WatchFilter)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApplicationSource for ScriptedSource {
        async fn list_applications(&self) -> Result<AppListing, ApiError> {
            self.listing
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ApiError::Stream("list refused".into()))
        }

        async fn watch_applications(&self, cursor: &str, filter: &WatchFilter) -> Result<EventStream, ApiError> {
            self.calls.lock().unwrap().push((cursor.to_string(), filter.clone()));
            self.watches
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Stream("no watch scripted".into()))
        }

        async fn get_resource_tree(&self, app: &str) -> Result<Vec<ResourceNode>, ApiError> {
            self.trees
                .lock()
                .unwrap()
                .get(app)
                .cloned()
                .ok_or_else(|| ApiError::Stream(format!("no tree for {}", app)))
        }

        async fn watch_resource_tree(&self, _app: &str) -> Result<TreeStream, ApiError> {
            Ok(stream::pending().boxed())
        }

        async fn sync_application(&self, _app: &str, _ns: Option<&str>) -> Result<(), ApiError> {
            Ok(())
        }

        async fn refresh_application(&self, _app: &str, _ns: Option<&str>) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn app(name: &str, rv: &str) -> Application {
        Application {
            name: name.into(),
            project: "default".into(),
            cluster: "in-cluster".into(),
            namespace: "default".into(),
            resource_version: Some(rv.into()),
            ..Default::default()
        }
    }

    async fn start(source: &Arc<ScriptedSource>) -> StreamSync {
        let dynamic: Arc<dyn ApplicationSource> = source.clone();
        StreamSync::start(dynamic, SyncOptions::default()).await.unwrap()
    }

    async fn wait_for<F>(sync: &StreamSync, mut done: F) -> Arc<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut rx = sync.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if done(current.as_ref()) {
                return current;
            }
            rx.changed().await.unwrap();
        }
    }

    async fn wait_calls(source: &ScriptedSource, n: usize) {
        while source.calls().len() < n {
            sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_failure_is_returned() {
        let source: Arc<dyn ApplicationSource> = Arc::new(ScriptedSource::default());
        assert!(StreamSync::start(source, SyncOptions::default()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn initial_snapshot_holds_listing() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["b", "a"]));
        let _tx = source.push_watch();
        let mut sync = start(&source).await;
        let snap = sync.latest();
        assert_eq!(snap.apps.len(), 2);
        assert_eq!(snap.app("a").unwrap().name, "a");
        assert_eq!(snap.cursor, "10");
        assert_eq!(snap.batches, 0);

        let live = wait_for(&sync, |s| s.connection == ConnectionState::Live).await;
        assert_eq!(live.apps.len(), 2);
        assert_eq!(source.calls()[0].0, "10");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_published_as_one_batch() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a", "b"]));
        let tx = source.push_watch();
        let sync = start(&source).await;
        wait_for(&sync, |s| s.connection == ConnectionState::Live).await;

        tx.send(Ok(WatchEvent::Upsert(app("c", "11")))).unwrap();
        tx.send(Ok(WatchEvent::Delete {
            name: "a".into(),
            resource_version: Some("12".into()),
        }))
        .unwrap();

        let snap = wait_for(&sync, |s| s.batches >= 1).await;
        assert_eq!(snap.batches, 1);
        let names: Vec<&str> = snap.apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
        assert_eq!(snap.index.index_of("c"), Some(1));
        assert_eq!(snap.index.index_of("a"), None);
        assert_eq!(snap.cursor, "12");

        sleep(Duration::from_secs(2)).await;
        let mut sync = sync;
        assert_eq!(sync.latest().batches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resumes_from_last_cursor() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        let first = source.push_watch();
        let _second = source.push_watch();
        let sync = start(&source).await;

        first.send(Ok(WatchEvent::Upsert(app("b", "11")))).unwrap();
        wait_for(&sync, |s| s.batches >= 1).await;
        drop(first);

        let retrying = wait_for(&sync, |s| matches!(s.connection, ConnectionState::Reconnecting { .. })).await;
        assert_eq!(
            retrying.connection,
            ConnectionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );

        wait_calls(&source, 2).await;
        assert_eq!(source.calls()[1].0, "11");
        let live = wait_for(&sync, |s| s.connection == ConnectionState::Live).await;
        assert_eq!(live.apps.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_opens_back_off() {
        let source = Arc::new(ScriptedSource::with_apps("10", &[]));
        let sync = start(&source).await;
        let snap = wait_for(&sync, |s| matches!(s.connection, ConnectionState::Reconnecting { attempt: 3, .. })).await;
        assert_eq!(
            snap.connection,
            ConnectionState::Reconnecting {
                attempt: 3,
                delay: Duration::from_secs(4)
            }
        );
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_changes_are_debounced() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        let _first = source.push_watch();
        let _second = source.push_watch();
        let _third = source.push_watch();
        let sync = start(&source).await;
        wait_for(&sync, |s| s.connection == ConnectionState::Live).await;

        sync.set_scope(WatchFilter::for_projects(["team-a"]));
        sleep(Duration::from_millis(100)).await;
        sync.set_scope(WatchFilter::for_projects(["team-b"]));

        wait_calls(&source, 2).await;
        sleep(Duration::from_secs(2)).await;
        let calls = source.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, WatchFilter::for_projects(["team-b"]));
        assert_eq!(calls[1].0, "10");
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_scope_keeps_stream() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        let _first = source.push_watch();
        let sync = start(&source).await;
        wait_for(&sync, |s| s.connection == ConnectionState::Live).await;

        sync.set_scope(WatchFilter::default());
        sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_open_batch() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        let tx = source.push_watch();
        let sync = start(&source).await;
        wait_for(&sync, |s| s.connection == ConnectionState::Live).await;
        let rx = sync.subscribe();

        tx.send(Ok(WatchEvent::Upsert(app("b", "11")))).unwrap();
        sync.shutdown().await;

        let last = rx.borrow().clone();
        assert_eq!(last.batches, 0);
        assert_eq!(last.apps.len(), 1);
        assert_eq!(last.connection, ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn tree_watch_loads_and_follows_statuses() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["guestbook"]));
        source.trees.lock().unwrap().insert(
            "guestbook".into(),
            vec![
                ResourceNode::new("d", "Deployment", "web")
                    .with_group("apps")
                    .with_namespace("default"),
                ResourceNode::new("self", "Application", "guestbook"),
            ],
        );
        let tx = source.push_watch();
        let sync = start(&source).await;

        sync.watch_tree("guestbook");
        let snap = wait_for(&sync, |s| s.forest.contains("guestbook")).await;
        assert_eq!(snap.tree("guestbook").unwrap().len(), 1);

        let mut updated = app("guestbook", "11");
        updated.health = HealthStatus::Degraded;
        updated.resources = vec![ResourceStatus {
            group: "apps".into(),
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
            sync: SyncStatus::OutOfSync,
        }];
        tx.send(Ok(WatchEvent::Upsert(updated))).unwrap();

        let snap = wait_for(&sync, |s| s.batches >= 1).await;
        let tree = snap.tree("guestbook").unwrap();
        assert_eq!(tree.node(0).sync, Some(SyncStatus::OutOfSync));
        assert_eq!(tree.meta().health, Some(HealthStatus::Degraded));
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_app_drops_its_tree() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        source
            .trees
            .lock()
            .unwrap()
            .insert("a".into(), vec![ResourceNode::new("p", "Pod", "p")]);
        let tx = source.push_watch();
        let sync = start(&source).await;
        sync.watch_tree("a");
        wait_for(&sync, |s| s.forest.contains("a")).await;

        tx.send(Ok(WatchEvent::Delete {
            name: "a".into(),
            resource_version: Some("11".into()),
        }))
        .unwrap();
        let snap = wait_for(&sync, |s| s.batches >= 1).await;
        assert!(snap.app("a").is_none());
        assert!(snap.tree("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn recreated_app_reloads_its_tree() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        source
            .trees
            .lock()
            .unwrap()
            .insert("a".into(), vec![ResourceNode::new("p", "Pod", "p")]);
        let tx = source.push_watch();
        let sync = start(&source).await;
        sync.watch_tree("a");
        wait_for(&sync, |s| s.forest.contains("a")).await;

        tx.send(Ok(WatchEvent::Delete {
            name: "a".into(),
            resource_version: Some("11".into()),
        }))
        .unwrap();
        let gone = wait_for(&sync, |s| s.batches >= 1).await;
        assert!(gone.tree("a").is_none());

        tx.send(Ok(WatchEvent::Upsert(app("a", "12")))).unwrap();
        let back = wait_for(&sync, |s| s.batches >= 2 && s.forest.contains("a")).await;
        assert_eq!(back.tree("a").unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unwatched_tree_is_not_reloaded_after_recreate() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        source
            .trees
            .lock()
            .unwrap()
            .insert("a".into(), vec![ResourceNode::new("p", "Pod", "p")]);
        let tx = source.push_watch();
        let sync = start(&source).await;
        sync.watch_tree("a");
        wait_for(&sync, |s| s.forest.contains("a")).await;
        sync.unwatch_tree("a");
        sleep(Duration::from_millis(10)).await;

        tx.send(Ok(WatchEvent::Delete {
            name: "a".into(),
            resource_version: Some("11".into()),
        }))
        .unwrap();
        wait_for(&sync, |s| s.batches >= 1).await;
        tx.send(Ok(WatchEvent::Upsert(app("a", "12")))).unwrap();
        let snap = wait_for(&sync, |s| s.batches >= 2).await;
        sleep(Duration::from_secs(1)).await;
        assert!(snap.app("a").is_some());
        let mut sync = sync;
        assert!(sync.latest().tree("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn widening_scope_lists_again_before_watching() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        let _first = source.push_watch();
        let _second = source.push_watch();
        let dynamic: Arc<dyn ApplicationSource> = source.clone();
        let options = SyncOptions {
            filter: WatchFilter::for_projects(["team-a"]),
            ..SyncOptions::default()
        };
        let sync = StreamSync::start(dynamic, options).await.unwrap();
        wait_for(&sync, |s| s.connection == ConnectionState::Live).await;

        *source.listing.lock().unwrap() = Some(AppListing {
            resource_version: "20".into(),
            applications: vec![app("a", "20"), app("b", "19")],
        });
        sync.set_scope(WatchFilter::default());

        wait_calls(&source, 2).await;
        let calls = source.calls();
        assert_eq!(calls[1], ("20".to_string(), WatchFilter::default()));
        let snap = wait_for(&sync, |s| s.connection == ConnectionState::Live && s.app("b").is_some()).await;
        assert_eq!(snap.cursor, "20");
        assert_eq!(snap.index.index_of("b"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn narrowing_scope_keeps_cursor_without_listing() {
        let source = Arc::new(ScriptedSource::with_apps("10", &["a"]));
        let _first = source.push_watch();
        let _second = source.push_watch();
        let sync = start(&source).await;
        wait_for(&sync, |s| s.connection == ConnectionState::Live).await;

        *source.listing.lock().unwrap() = None;
        sync.set_scope(WatchFilter::for_projects(["team-a"]));
        wait_calls(&source, 2).await;
        assert_eq!(source.calls()[1].0, "10");
        let mut sync = sync;
        assert_eq!(sync.latest().batches, 0);
    }
}
