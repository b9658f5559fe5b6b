//! Objects, handles and the project arena

pub mod errors;
pub mod handle;
pub mod link;
pub mod link_graph;
pub mod object;
pub mod paths;
pub mod project;

pub use errors::{ErrorItem, Errors};
pub use handle::ValueHandle;
pub use link::Link;
pub use link_graph::LinkGraph;
pub use object::{EditorObject, CHILDREN_PROPERTY, NAME_PROPERTY};
pub use project::{Project, ProjectSnapshot, PROJECT_SETTINGS};
