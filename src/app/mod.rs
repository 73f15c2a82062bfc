mod state;
mod event_loop;
mod render;
mod input;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, Clear, ClearType},
};
use tracing::info;

use crate::argocd::ApplicationSource;
use crate::clipboard::{Clipboard, TerminalClipboard};
use crate::model::{AppView, SortConfig};
use crate::selection::Selection;
use crate::sync::SyncOptions;
use crate::sync_controller::SyncMonitor;
use crate::view::{Presenter, TreeLine, TreeView};

pub use input::{handle_key, handle_mouse, InputResult};
pub use state::{ListEntry, Navigation};

/// Restore the terminal to normal mode. Safe to call multiple times.
pub fn restore_terminal() {
    let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Main application state.
pub struct App {
    pub sync: SyncMonitor,
    pub nav: Navigation,
    pub prev_view: AppView,
    pub entries: Vec<ListEntry>,
    pub tree_view: TreeView,
    pub tree_lines: Vec<TreeLine>,
    pub selection: Selection,
    /// Plain text of the last drawn frame, what a mouse selection reads from.
    pub screen: Vec<String>,
    pub clipboard: Box<dyn Clipboard>,
    /// Query being typed after `/`.
    pub search: Option<String>,
    pub status_message: Option<String>,
    pub poll_interval: Duration,
}

impl App {
    pub fn new(sync: SyncMonitor, sort: SortConfig) -> Self {
        let mut nav = Navigation::new();
        nav.app_sort = sort;
        Self {
            sync,
            prev_view: nav.view.clone(),
            nav,
            entries: Vec::new(),
            tree_view: TreeView::new(sort),
            tree_lines: Vec::new(),
            selection: Selection::new(),
            screen: Vec::new(),
            clipboard: Box::new(TerminalClipboard::stdout()),
            search: None,
            status_message: None,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Recompute the rows of the current view from the latest snapshot.
    pub fn refresh(&mut self) {
        let snapshot = Arc::clone(&self.sync.snapshot);
        self.entries = self.nav.entries(&snapshot);
        self.nav.clamp(self.entries.len());
        self.tree_lines = match &self.nav.view {
            AppView::Tree(name) => match snapshot.tree(name) {
                Some(tree) => self.tree_view.render(&[tree]),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        self.tree_view.clamp(&self.tree_lines);
    }
}

/// Run the dashboard against `source` until the user quits or `should_quit`
/// is raised. Sets up the terminal and restores it on exit.
pub fn run(
    source: Arc<dyn ApplicationSource>,
    options: SyncOptions,
    sort: SortConfig,
    should_quit: Arc<AtomicBool>,
) -> io::Result<()> {
    let rt = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .thread_name("argonaut-sync")
            .build()?,
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, Clear(ClearType::All))?;

    let mut monitor = SyncMonitor::new(Arc::clone(&rt), source, options);
    monitor.start();
    let mut app = App::new(monitor, sort);
    let result = event_loop(&mut app, &should_quit);

    app.sync.shutdown();
    restore_terminal();
    info!("exiting");
    result
}

fn event_loop(app: &mut App, should_quit: &AtomicBool) -> io::Result<()> {
    let mut needs_render = true;

    loop {
        if should_quit.load(Ordering::Relaxed) {
            return Ok(());
        }

        if app.poll_sync() {
            needs_render = true;
        }
        if app.track_view_change() {
            needs_render = true;
        }

        if needs_render {
            if Presenter::render_size_guard()? {
                needs_render = false;
                if crossterm::event::poll(app.poll_interval)? {
                    if let Event::Resize(_, _) = crossterm::event::read()? {
                        needs_render = true;
                    }
                }
                continue;
            }
            render::render(app)?;
            needs_render = false;
        }

        if crossterm::event::poll(app.poll_interval)? {
            let result = match crossterm::event::read()? {
                Event::Key(key_event) => input::handle_key(app, key_event),
                Event::Mouse(mouse_event) => input::handle_mouse(app, mouse_event),
                Event::Resize(_, _) => Some(InputResult::Consumed),
                _ => None,
            };
            match result {
                Some(InputResult::Quit) => return Ok(()),
                Some(InputResult::Consumed) => needs_render = true,
                None => {}
            }
        }
    }
}
