//! JSON shapes of the Argo CD REST API, limited to the fields the dashboard reads.

use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;
use crate::model::{synthetic_id, Application, HealthStatus, ResourceNode, ResourceStatus, SyncStatus};

use super::{AppListing, WatchEvent};

const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListMeta {
    #[serde(rename = "resourceVersion")]
    pub resource_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationList {
    pub metadata: ListMeta,
    pub items: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "resourceVersion")]
    pub resource_version: String,
    #[serde(rename = "ownerReferences")]
    pub owner_references: Vec<OwnerReference>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Destination {
    pub name: String,
    pub server: String,
    pub namespace: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationSpec {
    pub project: String,
    pub destination: Destination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusField {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireResourceStatus {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationStatus {
    pub sync: StatusField,
    pub health: StatusField,
    pub resources: Vec<WireResourceStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireApplication {
    pub metadata: ObjectMeta,
    pub spec: ApplicationSpec,
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct WireWatchEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub application: WireApplication,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StreamErrorBody {
    pub message: String,
    pub code: i64,
}

/// Envelope of one streamed message: either a result or an error.
#[derive(Debug, Deserialize)]
pub struct StreamEnvelope<T> {
    pub result: Option<T>,
    pub error: Option<StreamErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ParentRef {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InfoItem {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HealthField {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireResourceNode {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub health: Option<HealthField>,
    #[serde(rename = "parentRefs")]
    pub parent_refs: Vec<ParentRef>,
    pub info: Vec<InfoItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireResourceTree {
    pub nodes: Vec<WireResourceNode>,
}

/// Cluster label for a destination: its name, `in-cluster` for the local API
/// server, otherwise the server host.
pub fn cluster_label(dest: &Destination) -> String {
    if !dest.name.is_empty() {
        return dest.name.clone();
    }
    if dest.server.is_empty() {
        return String::new();
    }
    if dest.server.trim_end_matches('/') == IN_CLUSTER_SERVER {
        return "in-cluster".to_string();
    }
    reqwest::Url::parse(&dest.server)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| dest.server.clone())
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

impl From<WireApplication> for Application {
    fn from(w: WireApplication) -> Self {
        let application_set = w
            .metadata
            .owner_references
            .iter()
            .find(|o| o.kind == "ApplicationSet" && !o.name.is_empty())
            .map(|o| o.name.clone());

        Application {
            cluster: cluster_label(&w.spec.destination),
            name: w.metadata.name,
            app_namespace: non_empty(w.metadata.namespace),
            sync: SyncStatus::parse(&w.status.sync.status),
            health: HealthStatus::parse(&w.status.health.status),
            namespace: w.spec.destination.namespace,
            project: w.spec.project,
            application_set,
            resources: w
                .status
                .resources
                .into_iter()
                .map(|r| ResourceStatus {
                    sync: SyncStatus::parse(&r.status),
                    group: r.group,
                    kind: r.kind,
                    namespace: r.namespace,
                    name: r.name,
                })
                .collect(),
            resource_version: non_empty(w.metadata.resource_version),
        }
    }
}

impl From<WireResourceNode> for ResourceNode {
    fn from(w: WireResourceNode) -> Self {
        let id = if w.uid.is_empty() {
            synthetic_id(&w.group, &w.kind, &w.namespace, &w.name)
        } else {
            w.uid
        };
        let parents = w
            .parent_refs
            .into_iter()
            .map(|p| {
                if p.uid.is_empty() {
                    synthetic_id(&p.group, &p.kind, &p.namespace, &p.name)
                } else {
                    p.uid
                }
            })
            .collect();
        let health = w
            .health
            .filter(|h| !h.status.is_empty())
            .map(|h| HealthStatus::parse(&h.status));

        ResourceNode {
            id,
            group: w.group,
            kind: w.kind,
            name: w.name,
            namespace: w.namespace,
            health,
            sync: None,
            parents,
            info: w.info.into_iter().map(|i| (i.name, i.value)).collect(),
        }
    }
}

/// Decode a list response. Entries that fail to decode are skipped.
pub fn decode_listing(body: &[u8]) -> Result<AppListing, ApiError> {
    let list: ApplicationList = serde_json::from_slice(body)?;
    let mut apps = Vec::new();
    for item in list.items.unwrap_or_default() {
        match serde_json::from_value::<WireApplication>(item) {
            Ok(w) if !w.metadata.name.is_empty() => apps.push(Application::from(w)),
            Ok(_) => warn!("skipping application without a name"),
            Err(e) => warn!(error = %e, "skipping malformed application"),
        }
    }
    Ok(AppListing {
        resource_version: list.metadata.resource_version,
        applications: apps,
    })
}

/// Decode one application watch payload. `Ok(None)` for events that carry
/// nothing to apply.
pub fn decode_watch_event(payload: &str) -> Result<Option<WatchEvent>, ApiError> {
    let envelope: StreamEnvelope<WireWatchEvent> = serde_json::from_str(payload)?;
    if let Some(err) = envelope.error {
        return Err(ApiError::Stream(format!("{} (code {})", err.message, err.code)));
    }
    let Some(event) = envelope.result else {
        return Ok(None);
    };
    if event.application.metadata.name.is_empty() {
        return Err(ApiError::Malformed("watch event without application name".into()));
    }
    match event.kind.as_str() {
        "ADDED" | "MODIFIED" => Ok(Some(WatchEvent::Upsert(event.application.into()))),
        "DELETED" => {
            let meta = event.application.metadata;
            Ok(Some(WatchEvent::Delete {
                name: meta.name,
                resource_version: non_empty(meta.resource_version),
            }))
        }
        other => Err(ApiError::Malformed(format!("unknown watch event type {:?}", other))),
    }
}

/// Decode a resource tree response body.
pub fn decode_tree(body: &[u8]) -> Result<Vec<ResourceNode>, ApiError> {
    let tree: WireResourceTree = serde_json::from_slice(body)?;
    Ok(tree.nodes.into_iter().map(ResourceNode::from).collect())
}

/// Decode one streamed resource tree payload.
pub fn decode_tree_event(payload: &str) -> Result<Option<Vec<ResourceNode>>, ApiError> {
    let envelope: StreamEnvelope<WireResourceTree> = serde_json::from_str(payload)?;
    if let Some(err) = envelope.error {
        return Err(ApiError::Stream(format!("{} (code {})", err.message, err.code)));
    }
    Ok(envelope
        .result
        .map(|tree| tree.nodes.into_iter().map(ResourceNode::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_JSON: &str = r#"{
        "metadata": {
            "name": "guestbook",
            "namespace": "argocd",
            "resourceVersion": "4711",
            "ownerReferences": [{"kind": "ApplicationSet", "name": "guestbooks"}]
        },
        "spec": {
            "project": "demo",
            "destination": {"server": "https://10.0.0.1:6443", "namespace": "web"}
        },
        "status": {
            "sync": {"status": "OutOfSync"},
            "health": {"status": "Progressing"},
            "resources": [
                {"group": "apps", "kind": "Deployment", "namespace": "web", "name": "frontend", "status": "OutOfSync"}
            ]
        }
    }"#;

    #[test]
    fn converts_application() {
        let wire: WireApplication = serde_json::from_str(APP_JSON).unwrap();
        let app = Application::from(wire);
        assert_eq!(app.name, "guestbook");
        assert_eq!(app.app_namespace.as_deref(), Some("argocd"));
        assert_eq!(app.cluster, "10.0.0.1");
        assert_eq!(app.namespace, "web");
        assert_eq!(app.project, "demo");
        assert_eq!(app.application_set.as_deref(), Some("guestbooks"));
        assert_eq!(app.sync, SyncStatus::OutOfSync);
        assert_eq!(app.health, HealthStatus::Progressing);
        assert_eq!(app.resources.len(), 1);
        assert_eq!(app.resources[0].sync, SyncStatus::OutOfSync);
        assert_eq!(app.resource_version.as_deref(), Some("4711"));
    }

    #[test]
    fn cluster_label_rules() {
        let named = Destination {
            name: "prod".into(),
            server: "https://x".into(),
            ..Default::default()
        };
        assert_eq!(cluster_label(&named), "prod");
        let local = Destination {
            server: "https://kubernetes.default.svc".into(),
            ..Default::default()
        };
        assert_eq!(cluster_label(&local), "in-cluster");
        let raw = Destination {
            server: "not a url".into(),
            ..Default::default()
        };
        assert_eq!(cluster_label(&raw), "not a url");
        assert_eq!(cluster_label(&Destination::default()), "");
    }

    #[test]
    fn missing_status_is_unknown() {
        let wire: WireApplication = serde_json::from_str(r#"{"metadata":{"name":"bare"}}"#).unwrap();
        let app = Application::from(wire);
        assert_eq!(app.sync, SyncStatus::Unknown);
        assert_eq!(app.health, HealthStatus::Unknown);
        assert!(app.resource_version.is_none());
    }

    #[test]
    fn listing_skips_malformed_items() {
        let body = br#"{
            "metadata": {"resourceVersion": "99"},
            "items": [
                {"metadata": {"name": "a"}},
                {"metadata": "broken"},
                {"metadata": {"name": ""}}
            ]
        }"#;
        let listing = decode_listing(body).unwrap();
        assert_eq!(listing.resource_version, "99");
        assert_eq!(listing.applications.len(), 1);
        assert_eq!(listing.applications[0].name, "a");
    }

    #[test]
    fn listing_with_null_items() {
        let listing = decode_listing(br#"{"metadata":{},"items":null}"#).unwrap();
        assert!(listing.applications.is_empty());
        assert_eq!(listing.resource_version, "");
    }

    #[test]
    fn watch_event_types() {
        let added = r#"{"result":{"type":"ADDED","application":{"metadata":{"name":"a","resourceVersion":"5"}}}}"#;
        match decode_watch_event(added).unwrap() {
            Some(WatchEvent::Upsert(app)) => assert_eq!(app.name, "a"),
            other => panic!("unexpected {:?}", other),
        }

        let deleted = r#"{"result":{"type":"DELETED","application":{"metadata":{"name":"a","resourceVersion":"6"}}}}"#;
        match decode_watch_event(deleted).unwrap() {
            Some(WatchEvent::Delete { name, resource_version }) => {
                assert_eq!(name, "a");
                assert_eq!(resource_version.as_deref(), Some("6"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn watch_event_failures() {
        assert!(decode_watch_event("{not json").unwrap_err().is_malformed());
        let unknown = r#"{"result":{"type":"BOOKMARK","application":{"metadata":{"name":"a"}}}}"#;
        assert!(decode_watch_event(unknown).unwrap_err().is_malformed());
        let err = r#"{"error":{"message":"permission denied","code":7}}"#;
        let e = decode_watch_event(err).unwrap_err();
        assert!(!e.is_malformed());
        assert!(decode_watch_event(r#"{}"#).unwrap().is_none());
    }

    #[test]
    fn tree_nodes_convert_with_fallback_ids() {
        let body = br#"{"nodes":[
            {"group":"apps","kind":"Deployment","namespace":"web","name":"frontend","uid":"d1",
             "health":{"status":"Healthy"}},
            {"kind":"Pod","namespace":"web","name":"frontend-x","uid":"",
             "parentRefs":[{"group":"apps","kind":"ReplicaSet","namespace":"web","name":"frontend-1"}],
             "info":[{"name":"Status Reason","value":"Running"}]}
        ]}"#;
        let nodes = decode_tree(body).unwrap();
        assert_eq!(nodes[0].id, "d1");
        assert_eq!(nodes[0].health, Some(HealthStatus::Healthy));
        assert_eq!(nodes[1].id, "/Pod/web/frontend-x");
        assert_eq!(nodes[1].parents, vec!["apps/ReplicaSet/web/frontend-1".to_string()]);
        assert_eq!(nodes[1].info, vec![("Status Reason".to_string(), "Running".to_string())]);
        assert_eq!(nodes[1].health, None);
    }

    #[test]
    fn tree_stream_payload() {
        let payload = r#"{"result":{"nodes":[{"kind":"Service","name":"web","uid":"s"}]}}"#;
        let nodes = decode_tree_event(payload).unwrap().unwrap();
        assert_eq!(nodes.len(), 1);
    }
}
