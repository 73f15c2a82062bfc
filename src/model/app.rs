use super::index::Scope;

/// Which screen the dashboard is showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppView {
    Clusters,
    Namespaces,
    Projects,
    ApplicationSets,
    Apps,
    Tree(String), // application name
}

impl AppView {
    pub fn title(&self) -> &str {
        match self {
            AppView::Clusters => "Clusters",
            AppView::Namespaces => "Namespaces",
            AppView::Projects => "Projects",
            AppView::ApplicationSets => "ApplicationSets",
            AppView::Apps => "Apps",
            AppView::Tree(name) => name,
        }
    }

    /// The screen Esc returns to, if any. Apps reached through an
    /// ApplicationSet go back to the ApplicationSets list.
    pub fn parent(&self, scope: &Scope) -> Option<AppView> {
        match self {
            AppView::Clusters | AppView::ApplicationSets => None,
            AppView::Namespaces => Some(AppView::Clusters),
            AppView::Projects => Some(AppView::Namespaces),
            AppView::Apps if !scope.application_sets.is_empty() => Some(AppView::ApplicationSets),
            AppView::Apps => Some(AppView::Projects),
            AppView::Tree(_) => Some(AppView::Apps),
        }
    }

    /// Breadcrumb from the top-level view down to this one.
    pub fn breadcrumb(&self, scope: &Scope) -> Vec<AppView> {
        let mut trail = vec![self.clone()];
        let mut cur = self.parent(scope);
        while let Some(v) = cur {
            cur = v.parent(scope);
            trail.push(v);
        }
        trail.reverse();
        trail
    }
}
