//! # void_reflection - Reflection Value Model
//!
//! Typed property storage with runtime reflection and annotations.
//!
//! ## Architecture
//!
//! ```text
//! Property ── value: Value ─┬─ Bool / Int / Int64 / Double / String / Ref
//!          │                ├─ Struct(StructValue)   fixed fields
//!          │                ├─ Table(Table)          ordered, dynamic
//!          │                └─ Array(ArrayValue)     homogeneous
//!          └─ annotations: Vec<Annotation>
//! ```
//!
//! Objects, handles and the link graph live in `void_datamodel`; this crate
//! only knows about values.

pub mod annotation;
pub mod error;
pub mod path;
pub mod schema;
pub mod table;
pub mod value;
pub mod value_type;

pub use annotation::*;
pub use error::{Result, ValueError};
pub use path::*;
pub use schema::*;
pub use table::*;
pub use value::*;
pub use value_type::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::annotation::{Annotation, AnnotationKind, LinkCapability};
    pub use crate::path::PathSegment;
    pub use crate::schema::{StructRegistry, StructSchema};
    pub use crate::table::{ArrayValue, StructValue, Table};
    pub use crate::value::{Property, Value};
    pub use crate::value_type::ValueType;
}
