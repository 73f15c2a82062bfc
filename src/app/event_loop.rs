use tracing::debug;

use crate::model::AppView;
use crate::view::TreeView;

use super::App;

impl App {
    /// Pick up new snapshots, bootstrap results and finished actions.
    pub fn poll_sync(&mut self) -> bool {
        let mut changed = false;
        if let Some(msg) = self.sync.poll_action() {
            self.status_message = Some(msg);
            changed = true;
        }
        if self.sync.poll() {
            self.refresh();
            changed = true;
        }
        changed
    }

    /// Forward view changes to the sync engine: project scope and which
    /// resource tree to follow.
    pub fn track_view_change(&mut self) -> bool {
        if self.nav.view == self.prev_view {
            return false;
        }
        debug!(from = ?self.prev_view, to = ?self.nav.view, "view changed");

        match &self.nav.view {
            AppView::Tree(name) => {
                let name = name.clone();
                self.sync.open_tree(&name);
                self.tree_view = TreeView::new(self.tree_view.sort());
            }
            _ => self.sync.close_tree(),
        }
        self.sync.set_projects(&self.nav.scope.projects);

        self.selection.clear();
        self.search = None;
        self.prev_view = self.nav.view.clone();
        self.refresh();
        true
    }
}
