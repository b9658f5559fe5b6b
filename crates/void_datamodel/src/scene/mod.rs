//! Documents: serialization, loading, saving and the clipboard

pub mod clipboard;
pub mod serializer;

pub use serializer::{
    deserialize_project, load_project, project_from_ir, project_to_ir, save_project, serialize_project,
    LoadedDocument,
};
