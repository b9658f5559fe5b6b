//! # void_datamodel - Scene Data Model
//!
//! Projects of typed, reflectable objects connected by property links,
//! edited through a transactional context with undo/redo.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ CommandInterface   (one undo entry per command)               │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Context            validate ─► mutate ─► hooks ─► recorders   │
//! │   ├─ Project       object arena, link graph, external map     │
//! │   ├─ Errors        per-handle findings                        │
//! │   └─ ObjectFactory kinds, defaults, hooks                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ UndoStack          Arc-shared project snapshots               │
//! │ prefab / extref    instance sync, external project import     │
//! │ serializer         Project ⇄ IrDocument ⇄ JSON (void_ir)      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Handles**: a [`ValueHandle`] is an object id plus a property path,
//!   resolved against a [`Project`] on every use.
//! - **Links**: directed data flow from a start property to an end
//!   property. Strong links may not form loops; weak links may.
//! - **No globals**: the [`ObjectFactory`] and [`DataModelConfig`] are
//!   explicit values passed to each session.

pub mod assets;
pub mod commands;
pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod history;
pub mod scene;
pub mod types;

pub use assets::{ExternalProjectsStore, NotifyWatcher};
pub use commands::CommandInterface;
pub use config::DataModelConfig;
pub use context::{ChangeRecorder, ChangeRecorders, Context};
pub use crate::core::{EditorObject, ErrorItem, Errors, Link, Project, ProjectSnapshot, ValueHandle};
pub use engine::{EngineInterface, NullEngine};
pub use error::{ConfigError, ContextError, ExtrefError, LoadError, Result, SaveError, UndoError};
pub use history::UndoStack;
pub use scene::{load_project, save_project, LoadedDocument};
pub use types::{ObjectFactory, TypeDescriptor};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::CommandInterface;
    pub use crate::config::DataModelConfig;
    pub use crate::context::Context;
    pub use crate::core::{EditorObject, Link, Project, ValueHandle};
    pub use crate::error::{ContextError, LoadError, SaveError};
    pub use crate::history::UndoStack;
    pub use crate::types::ObjectFactory;
    pub use void_core::prelude::*;
    pub use void_reflection::prelude::*;
}
