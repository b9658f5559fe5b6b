//! Prefabs, external references, resources and file watching

pub mod extref;
pub mod prefab;
pub mod resources;
pub mod watcher;

pub use extref::{add_external_references, update_external_references, ExternalProjectsStore};
pub use prefab::{compact_prefab_instances, prefab_update_order, update_prefab_instances};
pub use resources::{FileResourceCache, ResourceCache, ResourceInfo, ResourceKind};
pub use watcher::NotifyWatcher;
