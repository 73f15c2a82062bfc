use std::fmt;

/// Whether an application's live state matches its desired state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    Synced,
    OutOfSync,
    #[default]
    Unknown,
}

impl SyncStatus {
    /// Case-insensitive parse. Empty or unrecognized values are `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "synced" => SyncStatus::Synced,
            "outofsync" => SyncStatus::OutOfSync,
            _ => SyncStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "Synced",
            SyncStatus::OutOfSync => "OutOfSync",
            SyncStatus::Unknown => "Unknown",
        }
    }

    /// Attention rank, lowest first.
    pub fn rank(&self) -> u8 {
        match self {
            SyncStatus::OutOfSync => 0,
            SyncStatus::Unknown => 1,
            SyncStatus::Synced => 2,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational health of an application or resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Healthy,
    Progressing,
    Suspended,
    Degraded,
    Missing,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Case-insensitive parse. Empty or unrecognized values are `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "healthy" => HealthStatus::Healthy,
            "progressing" => HealthStatus::Progressing,
            "suspended" => HealthStatus::Suspended,
            "degraded" => HealthStatus::Degraded,
            "missing" => HealthStatus::Missing,
            _ => HealthStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Progressing => "Progressing",
            HealthStatus::Suspended => "Suspended",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Missing => "Missing",
            HealthStatus::Unknown => "Unknown",
        }
    }

    /// Attention rank, lowest first.
    pub fn rank(&self) -> u8 {
        match self {
            HealthStatus::Degraded => 0,
            HealthStatus::Missing => 1,
            HealthStatus::Progressing => 2,
            HealthStatus::Suspended => 3,
            HealthStatus::Unknown => 4,
            HealthStatus::Healthy => 5,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync state of one managed resource, as reported on the application.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub sync: SyncStatus,
}

/// A deployable unit tracked by Argo CD.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Application {
    pub name: String,
    /// Namespace the Application object itself lives in (for apps-in-any-namespace).
    pub app_namespace: Option<String>,
    pub sync: SyncStatus,
    pub health: HealthStatus,
    pub cluster: String,
    /// Destination namespace.
    pub namespace: String,
    pub project: String,
    pub application_set: Option<String>,
    pub resources: Vec<ResourceStatus>,
    pub resource_version: Option<String>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
