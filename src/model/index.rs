use std::collections::{BTreeSet, HashMap};

use super::application::Application;

/// User-selected filter over the application collection. An empty dimension
/// means "all".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub clusters: BTreeSet<String>,
    pub namespaces: BTreeSet<String>,
    pub projects: BTreeSet<String>,
    pub application_sets: BTreeSet<String>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
            && self.namespaces.is_empty()
            && self.projects.is_empty()
            && self.application_sets.is_empty()
    }
}

/// Secondary indexes over one application collection. Immutable once built;
/// positions refer to the slice passed to [`AppIndex::build`].
#[derive(Clone, Debug, Default)]
pub struct AppIndex {
    clusters: Vec<String>,
    namespaces: Vec<String>,
    projects: Vec<String>,
    application_sets: Vec<String>,
    by_cluster: HashMap<String, Vec<usize>>,
    by_namespace: HashMap<String, Vec<usize>>,
    by_project: HashMap<String, Vec<usize>>,
    by_application_set: HashMap<String, Vec<usize>>,
    by_name: HashMap<String, usize>,
    total: usize,
}

fn push_label(map: &mut HashMap<String, Vec<usize>>, label: &str, pos: usize) {
    if label.is_empty() {
        return;
    }
    map.entry(label.to_string()).or_default().push(pos);
}

fn sorted_labels(map: &HashMap<String, Vec<usize>>) -> Vec<String> {
    let mut labels: Vec<String> = map.keys().cloned().collect();
    labels.sort();
    labels
}

impl AppIndex {
    pub fn build(apps: &[Application]) -> Self {
        let mut idx = AppIndex {
            total: apps.len(),
            ..Default::default()
        };

        for (pos, app) in apps.iter().enumerate() {
            push_label(&mut idx.by_cluster, &app.cluster, pos);
            push_label(&mut idx.by_namespace, &app.namespace, pos);
            push_label(&mut idx.by_project, &app.project, pos);
            if let Some(ref set) = app.application_set {
                push_label(&mut idx.by_application_set, set, pos);
            }
            idx.by_name.insert(app.name.clone(), pos);
        }

        idx.clusters = sorted_labels(&idx.by_cluster);
        idx.namespaces = sorted_labels(&idx.by_namespace);
        idx.projects = sorted_labels(&idx.by_project);
        idx.application_sets = sorted_labels(&idx.by_application_set);
        idx
    }

    pub fn clusters(&self) -> &[String] {
        &self.clusters
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    pub fn application_sets(&self) -> &[String] {
        &self.application_sets
    }

    pub fn by_cluster(&self, label: &str) -> &[usize] {
        self.by_cluster.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_namespace(&self, label: &str) -> &[usize] {
        self.by_namespace.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_project(&self, label: &str) -> &[usize] {
        self.by_project.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_application_set(&self, label: &str) -> &[usize] {
        self.by_application_set.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Positions matching every non-empty scope dimension, in collection order.
    pub fn scoped_apps(&self, scope: &Scope) -> Vec<usize> {
        let mut keep = vec![true; self.total];
        self.intersect(&mut keep, &self.by_cluster, &scope.clusters);
        self.intersect(&mut keep, &self.by_namespace, &scope.namespaces);
        self.intersect(&mut keep, &self.by_project, &scope.projects);
        self.intersect(&mut keep, &self.by_application_set, &scope.application_sets);
        keep.iter()
            .enumerate()
            .filter_map(|(pos, &ok)| ok.then_some(pos))
            .collect()
    }

    /// Namespaces of applications on the given clusters (all when empty).
    pub fn scoped_namespaces(&self, apps: &[Application], clusters: &BTreeSet<String>) -> Vec<String> {
        if clusters.is_empty() {
            return self.namespaces.clone();
        }
        let scope = Scope {
            clusters: clusters.clone(),
            ..Default::default()
        };
        collect_labels(apps, &self.scoped_apps(&scope), |app| &app.namespace)
    }

    /// Projects of applications within the cluster and namespace scopes.
    pub fn scoped_projects(
        &self,
        apps: &[Application],
        clusters: &BTreeSet<String>,
        namespaces: &BTreeSet<String>,
    ) -> Vec<String> {
        if clusters.is_empty() && namespaces.is_empty() {
            return self.projects.clone();
        }
        let scope = Scope {
            clusters: clusters.clone(),
            namespaces: namespaces.clone(),
            ..Default::default()
        };
        collect_labels(apps, &self.scoped_apps(&scope), |app| &app.project)
    }

    fn intersect(&self, keep: &mut [bool], map: &HashMap<String, Vec<usize>>, wanted: &BTreeSet<String>) {
        if wanted.is_empty() {
            return;
        }
        let mut hit = vec![false; self.total];
        for label in wanted {
            for &pos in map.get(label).map(Vec::as_slice).unwrap_or(&[]) {
                hit[pos] = true;
            }
        }
        for (k, h) in keep.iter_mut().zip(hit) {
            *k = *k && h;
        }
    }
}

fn collect_labels<F>(apps: &[Application], positions: &[usize], label: F) -> Vec<String>
where
    F: Fn(&Application) -> &String,
{
    let set: BTreeSet<&String> = positions
        .iter()
        .filter_map(|&pos| apps.get(pos))
        .map(&label)
        .filter(|l| !l.is_empty())
        .collect();
    set.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, cluster: &str, ns: &str, project: &str, set: Option<&str>) -> Application {
        Application {
            name: name.into(),
            cluster: cluster.into(),
            namespace: ns.into(),
            project: project.into(),
            application_set: set.map(String::from),
            ..Default::default()
        }
    }

    fn fixture() -> Vec<Application> {
        vec![
            app("api", "prod", "backend", "core", Some("services")),
            app("web", "prod", "frontend", "core", Some("services")),
            app("jobs", "staging", "backend", "batch", None),
            app("orphan", "", "", "", None),
        ]
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn labels_are_sorted_unique_and_skip_empty() {
        let idx = AppIndex::build(&fixture());
        assert_eq!(idx.clusters(), ["prod", "staging"]);
        assert_eq!(idx.namespaces(), ["backend", "frontend"]);
        assert_eq!(idx.projects(), ["batch", "core"]);
        assert_eq!(idx.application_sets(), ["services"]);
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn by_label_lookups() {
        let idx = AppIndex::build(&fixture());
        assert_eq!(idx.by_cluster("prod"), [0, 1]);
        assert_eq!(idx.by_namespace("backend"), [0, 2]);
        assert_eq!(idx.by_project("batch"), [2]);
        assert_eq!(idx.by_application_set("services"), [0, 1]);
        assert!(idx.by_cluster("nope").is_empty());
    }

    #[test]
    fn index_of_resolves_names() {
        let idx = AppIndex::build(&fixture());
        assert_eq!(idx.index_of("jobs"), Some(2));
        assert_eq!(idx.index_of("orphan"), Some(3));
        assert_eq!(idx.index_of("missing"), None);
    }

    #[test]
    fn empty_collection() {
        let idx = AppIndex::build(&[]);
        assert!(idx.is_empty());
        assert!(idx.clusters().is_empty());
        assert!(idx.scoped_apps(&Scope::default()).is_empty());
    }

    #[test]
    fn scoped_apps_intersects_dimensions() {
        let idx = AppIndex::build(&fixture());
        assert_eq!(idx.scoped_apps(&Scope::default()), [0, 1, 2, 3]);

        let scope = Scope {
            namespaces: set(&["backend"]),
            ..Default::default()
        };
        assert_eq!(idx.scoped_apps(&scope), [0, 2]);

        let scope = Scope {
            clusters: set(&["prod"]),
            namespaces: set(&["backend"]),
            ..Default::default()
        };
        assert_eq!(idx.scoped_apps(&scope), [0]);

        let scope = Scope {
            application_sets: set(&["services"]),
            projects: set(&["batch"]),
            ..Default::default()
        };
        assert!(idx.scoped_apps(&scope).is_empty());
    }

    #[test]
    fn scoped_label_lists() {
        let apps = fixture();
        let idx = AppIndex::build(&apps);
        assert_eq!(idx.scoped_namespaces(&apps, &set(&["staging"])), ["backend"]);
        assert_eq!(idx.scoped_namespaces(&apps, &BTreeSet::new()), ["backend", "frontend"]);
        assert_eq!(
            idx.scoped_projects(&apps, &set(&["prod"]), &set(&["backend"])),
            ["core"]
        );
    }
}
