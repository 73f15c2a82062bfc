use std::collections::BTreeSet;

use crate::model::{compare_apps, AppView, HealthStatus, Scope, SortConfig, SyncStatus};
use crate::sync::Snapshot;

/// One row of a list view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub label: String,
    /// Applications behind this label; `None` for application rows.
    pub count: Option<usize>,
    pub health: Option<HealthStatus>,
    pub sync: Option<SyncStatus>,
}

impl ListEntry {
    fn group(label: &str, count: usize) -> Self {
        Self {
            label: label.to_string(),
            count: Some(count),
            health: None,
            sync: None,
        }
    }
}

/// Where the user is in Clusters → Namespaces → Projects → Apps → Tree (or
/// ApplicationSets → Apps → Tree), and what each level narrowed the scope to.
#[derive(Clone, Debug)]
pub struct Navigation {
    pub view: AppView,
    pub scope: Scope,
    pub selected: usize,
    /// Order of the apps list.
    pub app_sort: SortConfig,
}

impl Default for Navigation {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigation {
    pub fn new() -> Self {
        Self {
            view: AppView::Clusters,
            scope: Scope::default(),
            selected: 0,
            app_sort: SortConfig::default(),
        }
    }

    /// Rows of the current list view. Empty for the tree view.
    pub fn entries(&self, snapshot: &Snapshot) -> Vec<ListEntry> {
        let apps = snapshot.apps.as_slice();
        let index = &snapshot.index;
        let count_in = |scope: Scope| index.scoped_apps(&scope).len();

        match &self.view {
            AppView::Clusters => index
                .clusters()
                .iter()
                .map(|c| ListEntry::group(c, index.by_cluster(c).len()))
                .collect(),
            AppView::Namespaces => index
                .scoped_namespaces(apps, &self.scope.clusters)
                .iter()
                .map(|ns| {
                    let scope = Scope {
                        clusters: self.scope.clusters.clone(),
                        namespaces: single(ns),
                        ..Default::default()
                    };
                    ListEntry::group(ns, count_in(scope))
                })
                .collect(),
            AppView::Projects => index
                .scoped_projects(apps, &self.scope.clusters, &self.scope.namespaces)
                .iter()
                .map(|p| {
                    let scope = Scope {
                        clusters: self.scope.clusters.clone(),
                        namespaces: self.scope.namespaces.clone(),
                        projects: single(p),
                        ..Default::default()
                    };
                    ListEntry::group(p, count_in(scope))
                })
                .collect(),
            AppView::ApplicationSets => index
                .application_sets()
                .iter()
                .map(|set| ListEntry::group(set, index.by_application_set(set).len()))
                .collect(),
            AppView::Apps => {
                let mut rows: Vec<_> = index
                    .scoped_apps(&self.scope)
                    .into_iter()
                    .filter_map(|pos| apps.get(pos))
                    .collect();
                rows.sort_by(|a, b| compare_apps(a, b, self.app_sort));
                rows.into_iter()
                    .map(|app| ListEntry {
                        label: app.name.clone(),
                        count: None,
                        health: Some(app.health),
                        sync: Some(app.sync),
                    })
                    .collect()
            }
            AppView::Tree(_) => Vec::new(),
        }
    }

    pub fn move_up(&mut self) -> bool {
        if self.selected > 0 {
            self.selected -= 1;
            return true;
        }
        false
    }

    pub fn move_down(&mut self, len: usize) -> bool {
        if self.selected + 1 < len {
            self.selected += 1;
            return true;
        }
        false
    }

    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Drill into the selected entry, narrowing the scope by it.
    pub fn enter(&mut self, entries: &[ListEntry]) -> bool {
        let Some(entry) = entries.get(self.selected) else { return false };
        let label = entry.label.clone();
        let next = match self.view {
            AppView::Clusters => {
                self.scope.clusters = single(&label);
                AppView::Namespaces
            }
            AppView::Namespaces => {
                self.scope.namespaces = single(&label);
                AppView::Projects
            }
            AppView::Projects => {
                self.scope.projects = single(&label);
                AppView::Apps
            }
            AppView::ApplicationSets => {
                self.scope.application_sets = single(&label);
                AppView::Apps
            }
            AppView::Apps => AppView::Tree(label),
            AppView::Tree(_) => return false,
        };
        self.view = next;
        self.selected = 0;
        true
    }

    /// Return to the parent view, clearing the scope chosen there.
    pub fn back(&mut self) -> bool {
        let Some(parent) = self.view.parent(&self.scope) else { return false };
        match parent {
            AppView::Clusters => self.scope.clusters.clear(),
            AppView::Namespaces => self.scope.namespaces.clear(),
            AppView::Projects => self.scope.projects.clear(),
            AppView::ApplicationSets => self.scope.application_sets.clear(),
            AppView::Apps | AppView::Tree(_) => {}
        }
        self.view = parent;
        self.selected = 0;
        true
    }

    /// Switch between the Clusters and ApplicationSets lists, starting over
    /// with an empty scope. Not available from the tree.
    pub fn toggle_top(&mut self) -> bool {
        let next = match self.view {
            AppView::Tree(_) => return false,
            AppView::ApplicationSets => AppView::Clusters,
            _ => AppView::ApplicationSets,
        };
        self.view = next;
        self.scope = Scope::default();
        self.selected = 0;
        true
    }

    /// Application the selection points at: the highlighted row of the apps
    /// list or the application whose tree is open.
    pub fn selected_app<'a>(&'a self, entries: &'a [ListEntry]) -> Option<&'a str> {
        match &self.view {
            AppView::Apps => entries.get(self.selected).map(|e| e.label.as_str()),
            AppView::Tree(name) => Some(name),
            _ => None,
        }
    }
}

fn single(label: &str) -> BTreeSet<String> {
    BTreeSet::from([label.to_string()])
}
