use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{HealthStatus, ResourceNode, ResourceStatus, SyncStatus};

/// Kind of the node that represents the application itself.
pub const APPLICATION_KIND: &str = "Application";

/// Health and sync shown on the synthetic root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RootMeta {
    pub health: Option<HealthStatus>,
    pub sync: Option<SyncStatus>,
}

/// Resource hierarchy of one application.
///
/// Nodes live in a flat arena; edges are arena indices resolved once at build
/// time. The application itself is the implicit root: `roots()` lists its
/// children and `parent()` returns `None` for them.
#[derive(Clone, Debug, Default)]
pub struct ResourceTree {
    app_name: String,
    meta: RootMeta,
    nodes: Vec<ResourceNode>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    by_id: HashMap<String, usize>,
}

/// Whether `node` is the upstream report of the application itself.
pub fn is_self_node(app_name: &str, node: &ResourceNode) -> bool {
    node.kind == APPLICATION_KIND && node.name == app_name
}

/// Resolve each node's parent to an arena index. A node whose references are
/// all absent, or only point at itself, hangs off the synthetic root.
pub fn resolve_parents(nodes: &[ResourceNode], by_id: &HashMap<String, usize>) -> Vec<Option<usize>> {
    nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            node.parents
                .iter()
                .filter_map(|pid| by_id.get(pid).copied())
                .find(|&p| p != idx)
        })
        .collect()
}

/// Detach nodes whose parent chain never reaches the synthetic root (cycles).
/// Returns the number of nodes re-attached.
pub fn break_cycles(parent: &mut [Option<usize>]) -> usize {
    let n = parent.len();
    // 0 = unvisited, 1 = on the current walk, 2 = known to reach the root
    let mut state = vec![0u8; n];
    let mut reattached = 0;

    for start in 0..n {
        let mut walk = Vec::new();
        let mut cur = Some(start);
        while let Some(idx) = cur {
            match state[idx] {
                2 => break,
                1 => {
                    parent[idx] = None;
                    reattached += 1;
                    break;
                }
                _ => {
                    state[idx] = 1;
                    walk.push(idx);
                    cur = parent[idx];
                }
            }
        }
        for idx in walk {
            state[idx] = 2;
        }
    }
    reattached
}

impl ResourceTree {
    /// Build the tree for `app_name` from a flat node list.
    pub fn build(app_name: &str, nodes: Vec<ResourceNode>) -> Self {
        let mut kept: Vec<ResourceNode> = Vec::with_capacity(nodes.len());
        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if is_self_node(app_name, &node) || by_id.contains_key(&node.id) {
                continue;
            }
            by_id.insert(node.id.clone(), kept.len());
            kept.push(node);
        }

        let mut parent = resolve_parents(&kept, &by_id);
        let reattached = break_cycles(&mut parent);
        if reattached > 0 {
            tracing::warn!(app = %app_name, reattached, "resource tree has parent cycles");
        }

        let mut children = vec![Vec::new(); kept.len()];
        let mut roots = Vec::new();
        for (idx, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[*p].push(idx),
                None => roots.push(idx),
            }
        }

        Self {
            app_name: app_name.to_string(),
            meta: RootMeta::default(),
            nodes: kept,
            parent,
            children,
            roots,
            by_id,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn meta(&self) -> RootMeta {
        self.meta
    }

    pub fn set_app_meta(&mut self, health: Option<HealthStatus>, sync: Option<SyncStatus>) {
        self.meta = RootMeta { health, sync };
    }

    /// Children of the synthetic root.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        self.children.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Arena index of the parent, `None` for children of the synthetic root.
    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parent.get(idx).copied().flatten()
    }

    pub fn node(&self, idx: usize) -> &ResourceNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn find(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Patch sync state by (group, kind, namespace, name). Structure is
    /// untouched; entries with no matching node are ignored. Returns the number
    /// of nodes patched.
    pub fn set_resource_statuses(&mut self, statuses: &[ResourceStatus]) -> usize {
        let mut patched = 0;
        for status in statuses {
            for node in self.nodes.iter_mut() {
                if node.matches_key(&status.group, &status.kind, &status.namespace, &status.name) {
                    node.sync = Some(status.sync);
                    patched += 1;
                }
            }
        }
        patched
    }
}

/// All resource trees currently held, keyed by application name. Trees are
/// shared copy-on-write so a published snapshot never sees a later patch.
#[derive(Clone, Debug, Default)]
pub struct ResourceForest {
    trees: HashMap<String, Arc<ResourceTree>>,
}

impl ResourceForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tree of `app_name`. Root meta carries over from the
    /// previous tree.
    pub fn upsert(&mut self, app_name: &str, nodes: Vec<ResourceNode>) {
        let mut tree = ResourceTree::build(app_name, nodes);
        if let Some(old) = self.trees.get(app_name) {
            tree.meta = old.meta;
        }
        self.trees.insert(app_name.to_string(), Arc::new(tree));
    }

    /// Patch node sync state within `app_name` only.
    pub fn set_resource_statuses(&mut self, app_name: &str, statuses: &[ResourceStatus]) -> usize {
        match self.trees.get_mut(app_name) {
            Some(tree) => Arc::make_mut(tree).set_resource_statuses(statuses),
            None => 0,
        }
    }

    pub fn set_app_meta(&mut self, app_name: &str, health: Option<HealthStatus>, sync: Option<SyncStatus>) {
        if let Some(tree) = self.trees.get_mut(app_name) {
            if tree.meta != (RootMeta { health, sync }) {
                Arc::make_mut(tree).set_app_meta(health, sync);
            }
        }
    }

    pub fn remove(&mut self, app_name: &str) -> bool {
        self.trees.remove(app_name).is_some()
    }

    /// Drop every tree whose application fails `keep`. Returns the dropped names.
    pub fn retain_apps<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let mut dropped = Vec::new();
        self.trees.retain(|name, _| {
            let kept = keep(name);
            if !kept {
                dropped.push(name.clone());
            }
            kept
        });
        dropped.sort();
        dropped
    }

    pub fn get(&self, app_name: &str) -> Option<&ResourceTree> {
        self.trees.get(app_name).map(Arc::as_ref)
    }

    pub fn contains(&self, app_name: &str) -> bool {
        self.trees.contains_key(app_name)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment_tree() -> Vec<ResourceNode> {
        vec![
            ResourceNode::new("app-uid", "Application", "guestbook").with_namespace("argocd"),
            ResourceNode::new("dep", "Deployment", "web")
                .with_group("apps")
                .with_namespace("default"),
            ResourceNode::new("rs", "ReplicaSet", "web-123")
                .with_group("apps")
                .with_namespace("default")
                .with_parent("dep"),
            ResourceNode::new("pod", "Pod", "web-123-x")
                .with_namespace("default")
                .with_parent("rs"),
        ]
    }

    #[test]
    fn self_application_node_is_suppressed() {
        let tree = ResourceTree::build("guestbook", deployment_tree());
        assert_eq!(tree.len(), 3);
        assert!(tree.find("app-uid").is_none());
        assert!(tree.nodes().iter().all(|n| n.kind != "Application"));
    }

    #[test]
    fn differently_named_application_is_kept() {
        let mut nodes = deployment_tree();
        nodes.push(ResourceNode::new("child", "Application", "guestbook-child").with_namespace("argocd"));
        let tree = ResourceTree::build("guestbook", nodes);
        let child = tree.find("child").expect("child app kept");
        assert!(tree.roots().contains(&child));
    }

    #[test]
    fn parents_link_and_siblings_group() {
        let tree = ResourceTree::build("guestbook", deployment_tree());
        let dep = tree.find("dep").unwrap();
        let rs = tree.find("rs").unwrap();
        let pod = tree.find("pod").unwrap();
        assert_eq!(tree.roots(), [dep]);
        assert_eq!(tree.children(dep), [rs]);
        assert_eq!(tree.children(rs), [pod]);
        assert_eq!(tree.parent(pod), Some(rs));
        assert_eq!(tree.parent(dep), None);
    }

    #[test]
    fn dangling_parent_attaches_to_root() {
        let nodes = vec![
            ResourceNode::new("cm", "ConfigMap", "settings").with_parent("gone"),
            ResourceNode::new("svc", "Service", "web"),
        ];
        let tree = ResourceTree::build("app", nodes);
        assert_eq!(tree.roots().len(), 2);
    }

    #[test]
    fn parent_pointing_at_self_application_attaches_to_root() {
        let nodes = vec![
            ResourceNode::new("self", "Application", "app"),
            ResourceNode::new("svc", "Service", "web").with_parent("self"),
        ];
        let tree = ResourceTree::build("app", nodes);
        assert_eq!(tree.roots(), [tree.find("svc").unwrap()]);
    }

    #[test]
    fn first_resolvable_parent_wins() {
        let nodes = vec![
            ResourceNode::new("a", "Deployment", "a"),
            ResourceNode::new("b", "Deployment", "b"),
            ResourceNode::new("c", "Pod", "c").with_parent("missing").with_parent("b").with_parent("a"),
        ];
        let tree = ResourceTree::build("app", nodes);
        assert_eq!(tree.parent(tree.find("c").unwrap()), tree.find("b"));
    }

    #[test]
    fn cycles_are_broken_onto_root() {
        let nodes = vec![
            ResourceNode::new("a", "X", "a").with_parent("b"),
            ResourceNode::new("b", "X", "b").with_parent("a"),
            ResourceNode::new("c", "X", "c").with_parent("c"),
        ];
        let tree = ResourceTree::build("app", nodes);
        // Every node is reachable from the root.
        let mut seen = 0;
        let mut stack: Vec<usize> = tree.roots().to_vec();
        while let Some(idx) = stack.pop() {
            seen += 1;
            stack.extend_from_slice(tree.children(idx));
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn break_cycles_leaves_acyclic_chains_alone() {
        let mut parent = vec![None, Some(0), Some(1)];
        assert_eq!(break_cycles(&mut parent), 0);
        assert_eq!(parent, vec![None, Some(0), Some(1)]);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let nodes = vec![
            ResourceNode::new("x", "Service", "first"),
            ResourceNode::new("x", "Service", "second"),
        ];
        let tree = ResourceTree::build("app", nodes);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(0).name, "first");
    }

    #[test]
    fn statuses_patch_matching_nodes_only() {
        let mut tree = ResourceTree::build("guestbook", deployment_tree());
        let patched = tree.set_resource_statuses(&[
            ResourceStatus {
                group: "apps".into(),
                kind: "Deployment".into(),
                namespace: "default".into(),
                name: "web".into(),
                sync: SyncStatus::OutOfSync,
            },
            ResourceStatus {
                group: "".into(),
                kind: "Event".into(),
                namespace: "default".into(),
                name: "untracked".into(),
                sync: SyncStatus::Synced,
            },
        ]);
        assert_eq!(patched, 1);
        let dep = tree.find("dep").unwrap();
        assert_eq!(tree.node(dep).sync, Some(SyncStatus::OutOfSync));
        let pod = tree.find("pod").unwrap();
        assert_eq!(tree.node(pod).sync, None);
        assert_eq!(tree.roots(), [dep]);
    }

    #[test]
    fn forest_patches_are_scoped_to_one_app() {
        let web = || {
            vec![ResourceNode::new("uid", "Deployment", "web")
                .with_group("apps")
                .with_namespace("default")]
        };
        let mut forest = ResourceForest::new();
        forest.upsert("A", web());
        forest.upsert("B", web());

        let status = ResourceStatus {
            group: "apps".into(),
            kind: "Deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
            sync: SyncStatus::OutOfSync,
        };
        assert_eq!(forest.set_resource_statuses("A", &[status]), 1);

        assert_eq!(forest.get("A").unwrap().node(0).sync, Some(SyncStatus::OutOfSync));
        assert_eq!(forest.get("B").unwrap().node(0).sync, None);
    }

    #[test]
    fn forest_copy_on_write_keeps_old_snapshot() {
        let mut forest = ResourceForest::new();
        forest.upsert("A", vec![ResourceNode::new("uid", "Service", "web")]);
        let published = forest.clone();

        let status = ResourceStatus {
            kind: "Service".into(),
            name: "web".into(),
            sync: SyncStatus::Synced,
            ..Default::default()
        };
        forest.set_resource_statuses("A", &[status]);

        assert_eq!(published.get("A").unwrap().node(0).sync, None);
        assert_eq!(forest.get("A").unwrap().node(0).sync, Some(SyncStatus::Synced));
    }

    #[test]
    fn forest_upsert_keeps_root_meta() {
        let mut forest = ResourceForest::new();
        forest.upsert("A", vec![]);
        forest.set_app_meta("A", Some(HealthStatus::Degraded), Some(SyncStatus::OutOfSync));
        forest.upsert("A", vec![ResourceNode::new("uid", "Service", "web")]);
        let meta = forest.get("A").unwrap().meta();
        assert_eq!(meta.health, Some(HealthStatus::Degraded));
        assert!(forest.remove("A"));
        assert!(forest.is_empty());
    }
}
