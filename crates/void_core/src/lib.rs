//! # void_core - Scene Data Model Core
//!
//! Small, dependency-light primitives shared by every crate of the scene
//! data model:
//! - **Ids**: stable string object ids with deterministic derivation
//! - **Errors**: the per-object error taxonomy
//! - **Hot-reload**: file change events marshalled onto the model thread

pub mod error;
pub mod hot_reload;
pub mod id;

pub use error::*;
pub use hot_reload::*;
pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ErrorCategory, ErrorLevel, IdError};
    pub use crate::hot_reload::{FileChange, FileChangeKind, FileChangeQueue, FileWatcher};
    pub use crate::id::{derive_object_id, ObjectId};
}
