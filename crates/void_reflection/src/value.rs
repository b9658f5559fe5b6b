//! Dynamic values and annotated properties
//!
//! [`Value`] is a closed tagged union over every storable type. All
//! type-erased traversal (cloning with reference translation, reference
//! scanning, path resolution) is an exhaustive match over it.
//!
//! ## Key Concepts
//!
//! - **Property**: a value plus its annotations; the unit stored in tables,
//!   struct fields and array slots.
//! - **Missing children**: lookups by name or index return `None` instead of
//!   failing. Only typed accessors on an already-resolved value can report a
//!   type mismatch.

use std::collections::BTreeSet;

use void_core::ObjectId;

use crate::annotation::{Annotation, AnnotationKind, LinkCapability};
use crate::error::{Result, ValueError};
use crate::path::PathSegment;
use crate::schema::StructRegistry;
use crate::table::{ArrayValue, StructValue, Table};
use crate::value_type::ValueType;

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Int64(i64),
    Double(f64),
    String(String),
    /// Reference to another object by id; `None` is the null reference
    Ref(Option<ObjectId>),
    Struct(StructValue),
    Table(Table),
    Array(ArrayValue),
}

impl Value {
    /// Create the default value for a type.
    ///
    /// Returns `None` for struct types unknown to `structs`.
    pub fn default_for(ty: &ValueType, structs: &StructRegistry) -> Option<Value> {
        Some(match ty {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::Double => Value::Double(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Ref => Value::Ref(None),
            ValueType::Table => Value::Table(Table::new()),
            ValueType::Struct(name) => Value::Struct(structs.create(name)?),
            ValueType::Array(element) => Value::Array(ArrayValue::new((**element).clone())),
        })
    }

    /// Null reference
    pub fn null_ref() -> Self {
        Self::Ref(None)
    }

    /// Reference to an object
    pub fn reference(id: ObjectId) -> Self {
        Self::Ref(Some(id))
    }

    /// Get the runtime type
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Int64(_) => ValueType::Int64,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Ref(_) => ValueType::Ref,
            Self::Struct(s) => ValueType::Struct(s.type_name().to_string()),
            Self::Table(_) => ValueType::Table,
            Self::Array(a) => ValueType::Array(Box::new(a.element_type().clone())),
        }
    }

    /// Check for struct, table or array
    pub fn has_substructure(&self) -> bool {
        matches!(self, Self::Struct(_) | Self::Table(_) | Self::Array(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the referenced id; `None` for null references and non-references
    pub fn as_ref_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Ref(Some(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayValue> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Number of child properties (0 for scalars)
    pub fn child_count(&self) -> usize {
        match self {
            Self::Struct(s) => s.len(),
            Self::Table(t) => t.len(),
            Self::Array(a) => a.len(),
            _ => 0,
        }
    }

    /// Named child of a struct or table
    pub fn child(&self, name: &str) -> Option<&Property> {
        match self {
            Self::Struct(s) => s.get(name),
            Self::Table(t) => t.get(name),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Property> {
        match self {
            Self::Struct(s) => s.get_mut(name),
            Self::Table(t) => t.get_mut(name),
            _ => None,
        }
    }

    /// Child by position in any container
    pub fn child_at(&self, index: usize) -> Option<&Property> {
        match self {
            Self::Struct(s) => s.get_at(index),
            Self::Table(t) => t.get_at(index),
            Self::Array(a) => a.get(index),
            _ => None,
        }
    }

    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut Property> {
        match self {
            Self::Struct(s) => s.get_at_mut(index),
            Self::Table(t) => t.get_at_mut(index),
            Self::Array(a) => a.get_mut(index),
            _ => None,
        }
    }

    /// Name of the child at `index` (structs and tables only)
    pub fn child_name(&self, index: usize) -> Option<&str> {
        match self {
            Self::Struct(s) => s.name_at(index),
            Self::Table(t) => t.name_at(index),
            _ => None,
        }
    }

    /// Position of a named child
    pub fn child_index(&self, name: &str) -> Option<usize> {
        match self {
            Self::Struct(s) => s.index_of(name),
            Self::Table(t) => t.index_of(name),
            _ => None,
        }
    }

    /// Descend one path segment
    pub fn segment(&self, segment: &PathSegment) -> Option<&Property> {
        match segment {
            PathSegment::Name(name) => self.child(name),
            PathSegment::Index(index) => self.child_at(*index),
        }
    }

    pub fn segment_mut(&mut self, segment: &PathSegment) -> Option<&mut Property> {
        match segment {
            PathSegment::Name(name) => self.child_mut(name),
            PathSegment::Index(index) => self.child_at_mut(*index),
        }
    }

    /// Add a child property.
    ///
    /// Tables append a named entry; arrays append an element and ignore the
    /// name. Structs and scalars have a fixed shape.
    pub fn add_property(&mut self, name: &str, property: Property) -> Result<()> {
        match self {
            Self::Table(t) => t.insert(name, property),
            Self::Array(a) => a.push(property),
            Self::Struct(s) => Err(ValueError::FixedStructure(s.type_name().to_string())),
            other => Err(ValueError::NotContainer(other.value_type())),
        }
    }

    /// Remove a child property by segment (tables and arrays only)
    pub fn remove_property(&mut self, segment: &PathSegment) -> Result<Property> {
        match (self, segment) {
            (Self::Table(t), PathSegment::Name(name)) => t
                .remove(name)
                .ok_or_else(|| ValueError::NoSuchProperty(name.clone())),
            (Self::Table(t), PathSegment::Index(index)) => {
                let len = t.len();
                t.remove_at(*index)
                    .map(|(_, p)| p)
                    .ok_or(ValueError::IndexOutOfRange { index: *index, len })
            }
            (Self::Array(a), PathSegment::Index(index)) => {
                let len = a.len();
                a.remove(*index)
                    .ok_or(ValueError::IndexOutOfRange { index: *index, len })
            }
            (Self::Array(_), PathSegment::Name(name)) => Err(ValueError::NoSuchProperty(name.clone())),
            (Self::Struct(s), _) => Err(ValueError::FixedStructure(s.type_name().to_string())),
            (other, _) => Err(ValueError::NotContainer(other.value_type())),
        }
    }

    /// Replace this value with `other` if the types agree
    pub fn assign(&mut self, other: Value) -> Result<()> {
        let expected = self.value_type();
        let found = other.value_type();
        if expected != found {
            return Err(ValueError::TypeMismatch { expected, found });
        }
        *self = other;
        Ok(())
    }

    /// Deep clone, mapping every reference through `translate`.
    ///
    /// `translate` receives the old target and returns the new one; `None`
    /// produces a null reference.
    pub fn deep_clone_with(&self, translate: &dyn Fn(&ObjectId) -> Option<ObjectId>) -> Value {
        match self {
            Self::Ref(Some(id)) => Self::Ref(translate(id)),
            Self::Struct(s) => Self::Struct(StructValue::new(
                s.type_name(),
                s.iter()
                    .map(|(n, p)| (n.to_string(), p.deep_clone_with(translate)))
                    .collect(),
            )),
            Self::Table(t) => {
                let mut table = Table::new();
                for (name, property) in t.iter() {
                    table.set(name, property.deep_clone_with(translate));
                }
                Self::Table(table)
            }
            // translation maps a reference to a reference, so element types hold
            Self::Array(a) => Self::Array(a.map_elements(|element| element.deep_clone_with(translate))),
            other => other.clone(),
        }
    }

    /// Visit every non-null reference target, depth first
    pub fn for_each_ref(&self, f: &mut dyn FnMut(&ObjectId)) {
        match self {
            Self::Ref(Some(id)) => f(id),
            Self::Struct(s) => s.iter().for_each(|(_, p)| p.value.for_each_ref(f)),
            Self::Table(t) => t.iter().for_each(|(_, p)| p.value.for_each_ref(f)),
            Self::Array(a) => a.iter().for_each(|p| p.value.for_each_ref(f)),
            _ => {}
        }
    }

    /// Collect all reference targets
    pub fn referenced_ids(&self) -> BTreeSet<ObjectId> {
        let mut ids = BTreeSet::new();
        self.for_each_ref(&mut |id| {
            ids.insert(id.clone());
        });
        ids
    }

    /// Drop references to any of `targets`.
    ///
    /// References stored directly in an array are erased from the array;
    /// all other references are set to null. The paths (relative to this
    /// value) of every modified property are appended to `changed`.
    pub fn remove_references_to(
        &mut self,
        targets: &BTreeSet<ObjectId>,
        prefix: &mut Vec<PathSegment>,
        changed: &mut Vec<Vec<PathSegment>>,
    ) {
        let hits = |p: &Property| p.value.as_ref_id().is_some_and(|id| targets.contains(id));
        match self {
            Self::Ref(target) => {
                if target.as_ref().is_some_and(|id| targets.contains(id)) {
                    *target = None;
                    changed.push(prefix.clone());
                }
            }
            Self::Array(a) if *a.element_type() == ValueType::Ref => {
                if a.iter().any(hits) {
                    a.retain(|p| !hits(p));
                    changed.push(prefix.clone());
                }
            }
            Self::Array(a) => {
                for (index, element) in a.iter_mut().enumerate() {
                    prefix.push(PathSegment::Index(index));
                    element.value.remove_references_to(targets, prefix, changed);
                    prefix.pop();
                }
            }
            Self::Struct(s) => {
                for (name, field) in s.iter_mut() {
                    prefix.push(PathSegment::Name(name.to_string()));
                    field.value.remove_references_to(targets, prefix, changed);
                    prefix.pop();
                }
            }
            Self::Table(t) => {
                for (name, entry) in t.iter_mut() {
                    prefix.push(PathSegment::Name(name.to_string()));
                    entry.value.remove_references_to(targets, prefix, changed);
                    prefix.pop();
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Double(v as f64)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Self::Ref(Some(v))
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(v: Option<ObjectId>) -> Self {
        Self::Ref(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Self::Table(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Self::Struct(v)
    }
}

impl From<ArrayValue> for Value {
    fn from(v: ArrayValue) -> Self {
        Self::Array(v)
    }
}

/// A value together with its annotations
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value: Value,
    pub annotations: Vec<Annotation>,
}

impl Property {
    /// Create an unannotated property
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            annotations: Vec::new(),
        }
    }

    /// Add an annotation
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Add several annotations
    pub fn with_annotations(mut self, annotations: impl IntoIterator<Item = Annotation>) -> Self {
        self.annotations.extend(annotations);
        self
    }

    /// First annotation of the given kind
    pub fn annotation(&self, kind: AnnotationKind) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.kind() == kind)
    }

    pub fn has_annotation(&self, kind: AnnotationKind) -> bool {
        self.annotation(kind).is_some()
    }

    /// Add or replace the annotation of the same kind
    pub fn set_annotation(&mut self, annotation: Annotation) {
        let kind = annotation.kind();
        match self.annotations.iter_mut().find(|a| a.kind() == kind) {
            Some(existing) => *existing = annotation,
            None => self.annotations.push(annotation),
        }
    }

    /// Link capability declared on this property
    pub fn link_capability(&self) -> Option<LinkCapability> {
        match self.annotation(AnnotationKind::Link) {
            Some(Annotation::Link { capability }) => Some(*capability),
            _ => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.has_annotation(AnnotationKind::Hidden)
    }

    pub fn is_read_only(&self) -> bool {
        self.has_annotation(AnnotationKind::ReadOnly)
    }

    /// Display name, falling back to nothing
    pub fn display_name(&self) -> Option<&str> {
        match self.annotation(AnnotationKind::DisplayName) {
            Some(Annotation::DisplayName { name }) => Some(name),
            _ => None,
        }
    }

    /// Integer range bounds
    pub fn range_int(&self) -> Option<(i32, i32)> {
        match self.annotation(AnnotationKind::RangeInt) {
            Some(Annotation::RangeInt { min, max }) => Some((*min, *max)),
            _ => None,
        }
    }

    /// Floating point range bounds
    pub fn range_double(&self) -> Option<(f64, f64)> {
        match self.annotation(AnnotationKind::RangeDouble) {
            Some(Annotation::RangeDouble { min, max }) => Some((*min, *max)),
            _ => None,
        }
    }

    /// Resolve a path below this property
    pub fn resolve(&self, path: &[PathSegment]) -> Option<&Property> {
        let mut current = self;
        for segment in path {
            current = current.value.segment(segment)?;
        }
        Some(current)
    }

    pub fn resolve_mut(&mut self, path: &[PathSegment]) -> Option<&mut Property> {
        let mut current = self;
        for segment in path {
            current = current.value.segment_mut(segment)?;
        }
        Some(current)
    }

    /// Deep clone with reference translation; annotations are copied as-is
    pub fn deep_clone_with(&self, translate: &dyn Fn(&ObjectId) -> Option<ObjectId>) -> Property {
        Property {
            value: self.value.deep_clone_with(translate),
            annotations: self.annotations.clone(),
        }
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
