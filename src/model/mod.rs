// Re-export all model types from submodules.

pub use app::AppView;
pub use application::{Application, HealthStatus, ResourceStatus, SyncStatus};
pub use index::{AppIndex, Scope};
pub use resource::{synthetic_id, ResourceNode};
pub use sort::{compare_apps, SortConfig, SortDirection, SortField};

mod app;
mod application;
mod index;
mod resource;
mod sort;
