//! # void_ir - Document Intermediate Representation
//!
//! The dynamically typed form of a scene document, used between reading a
//! file and building live objects.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  read_document  ┌────────────┐  migrate  ┌────────────┐
//! │  JSON text │ ──────────────► │ IrDocument │ ────────► │ IrDocument │ ──► live objects
//! └────────────┘                 │ (file v.N) │           │ (current)  │
//!        ▲                       └────────────┘           └────────────┘
//!        └──────────────────── write_document ◄───────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **IrObject**: kind name, id and a generic property table
//! - **PropertyTypeMap**: property types needed to decode bare values,
//!   embedded in every written document
//! - **MigrationPipeline**: ordered, version-gated pure transforms

pub mod codec;
pub mod document;
pub mod error;
pub mod migration;
pub mod type_map;

pub use codec::{read_document, write_document};
pub use document::*;
pub use error::*;
pub use migration::{migrate, MigrationPipeline, MigrationStep, CURRENT_FILE_VERSION};
pub use type_map::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::{read_document, write_document};
    pub use crate::document::{ExternalProjectInfo, GeneratedFile, IrDocument, IrLink, IrObject};
    pub use crate::error::{DocumentError, MigrationError};
    pub use crate::migration::{migrate, MigrationPipeline, CURRENT_FILE_VERSION};
    pub use crate::type_map::{legacy_type_map, PropertyTypeMap};
}
