use super::application::{HealthStatus, SyncStatus};

const STATUS_REASON: &str = "Status Reason";

/// One Kubernetes object in an application's resource tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceNode {
    /// Stable id assigned upstream.
    pub id: String,
    pub group: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub health: Option<HealthStatus>,
    pub sync: Option<SyncStatus>,
    /// Ids of the owning nodes.
    pub parents: Vec<String>,
    /// Display key/value pairs (pod phase, restart count, ...).
    pub info: Vec<(String, String)>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parents.push(parent_id.into());
        self
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_info(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.push((name.into(), value.into()));
        self
    }

    /// Why the object is in its current state, e.g. a pod's `CrashLoopBackOff`.
    pub fn status_reason(&self) -> Option<&str> {
        self.info
            .iter()
            .find(|(name, _)| name == STATUS_REASON)
            .map(|(_, value)| value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Whether this node is identified by the given status key.
    pub fn matches_key(&self, group: &str, kind: &str, namespace: &str, name: &str) -> bool {
        self.group == group && self.kind == kind && self.namespace == namespace && self.name == name
    }

    /// `namespace/name`, or just the name for cluster-scoped objects.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }
}

/// Fallback id for nodes and parent refs the server reports without a uid.
pub fn synthetic_id(group: &str, kind: &str, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}/{}", group, kind, namespace, name)
}
