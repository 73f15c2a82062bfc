use std::cmp::Ordering;
use std::fmt;

use super::application::Application;

/// Field a sibling list is ordered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Name,
    Health,
    Sync,
}

impl SortField {
    /// Lenient parse: anything unrecognized falls back to `Name`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "health" => SortField::Health,
            "sync" => SortField::Sync,
            _ => SortField::Name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Health => "health",
            SortField::Sync => "sync",
        }
    }

    /// name → health → sync → name
    pub fn next(&self) -> Self {
        match self {
            SortField::Name => SortField::Health,
            SortField::Health => SortField::Sync,
            SortField::Sync => SortField::Name,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortConfig {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Header label, e.g. `health ▼`.
    pub fn label(&self) -> String {
        format!("{} {}", self.field, self.direction.indicator())
    }
}

fn app_name_order(a: &Application, b: &Application) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

/// Order two rows of the apps list. Direction flips the primary key only;
/// ties fall back to ascending name.
pub fn compare_apps(a: &Application, b: &Application, sort: SortConfig) -> Ordering {
    let primary = match sort.field {
        SortField::Name => app_name_order(a, b),
        SortField::Health => a.health.rank().cmp(&b.health.rank()),
        SortField::Sync => a.sync.rank().cmp(&b.sync.rank()),
    };
    let primary = match sort.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| app_name_order(a, b))
}
