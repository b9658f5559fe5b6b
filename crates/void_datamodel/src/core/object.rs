//! Editor objects

use std::collections::BTreeSet;

use void_core::ObjectId;
use void_reflection::{Annotation, AnnotationKind, PathSegment, Property, Table, Value};

/// Name of the display name property every object has
pub const NAME_PROPERTY: &str = "objectName";
/// Name of the scene graph child list every object has
pub const CHILDREN_PROPERTY: &str = "children";

/// A typed, reflectable record in a project.
///
/// The property table always starts with `objectName` and `children`,
/// followed by the properties declared by the object's kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorObject {
    id: ObjectId,
    type_name: String,
    properties: Table,
    annotations: Vec<Annotation>,
}

impl EditorObject {
    pub(crate) fn new(id: ObjectId, type_name: impl Into<String>, properties: Table) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            properties,
            annotations: Vec::new(),
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_type(&self, kinds: &[&str]) -> bool {
        kinds.contains(&self.type_name.as_str())
    }

    pub fn name(&self) -> &str {
        self.value(NAME_PROPERTY).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn properties(&self) -> &Table {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.property(name).map(|p| &p.value)
    }

    /// Resolve a property path; the first segment must be a name
    pub fn resolve(&self, path: &[PathSegment]) -> Option<&Property> {
        let (first, rest) = path.split_first()?;
        self.properties.get(first.as_name()?)?.resolve(rest)
    }

    /// Mutable path resolution. Objects inside a project are only reachable
    /// mutably from object hooks.
    pub fn resolve_mut(&mut self, path: &[PathSegment]) -> Option<&mut Property> {
        let (first, rest) = path.split_first()?;
        self.properties.get_mut(first.as_name()?)?.resolve_mut(rest)
    }

    pub fn properties_mut(&mut self) -> &mut Table {
        &mut self.properties
    }

    /// Ordered scene graph children
    pub fn children(&self) -> Vec<ObjectId> {
        self.value(CHILDREN_PROPERTY)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|p| p.value.as_ref_id().cloned()).collect())
            .unwrap_or_default()
    }

    /// Every object referenced from any property, children included
    pub fn referenced_ids(&self) -> BTreeSet<ObjectId> {
        let mut ids = BTreeSet::new();
        for (_, property) in self.properties.iter() {
            property.value.for_each_ref(&mut |id| {
                ids.insert(id.clone());
            });
        }
        ids
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, kind: AnnotationKind) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.kind() == kind)
    }

    /// Replace an object annotation of the same kind, or add it
    pub(crate) fn set_annotation(&mut self, annotation: Annotation) {
        self.annotations.retain(|a| a.kind() != annotation.kind());
        self.annotations.push(annotation);
    }

    pub(crate) fn remove_annotation(&mut self, kind: AnnotationKind) {
        self.annotations.retain(|a| a.kind() != kind);
    }

    /// Id of the external project this object was imported from
    pub fn external_project_id(&self) -> Option<&str> {
        match self.annotation(AnnotationKind::ExternalReference) {
            Some(Annotation::ExternalReference { project_id }) => Some(project_id.as_str()),
            _ => None,
        }
    }

    pub fn is_external_reference(&self) -> bool {
        self.external_project_id().is_some()
    }

    /// Copy under a new id, translating references. A reference the
    /// function maps to `None` becomes null; such children are dropped.
    pub(crate) fn copy_as(&self, id: ObjectId, translate: &dyn Fn(&ObjectId) -> Option<ObjectId>) -> EditorObject {
        let mut properties = self
            .properties
            .iter()
            .map(|(name, property)| (name.to_string(), property.deep_clone_with(translate)))
            .fold(Table::new(), |table, (name, property)| table.with(name, property));
        if let Some(children) = properties.get_mut(CHILDREN_PROPERTY).and_then(|p| p.value.as_array_mut()) {
            children.retain(|p| p.value.as_ref_id().is_some());
        }
        EditorObject {
            id,
            type_name: self.type_name.clone(),
            properties,
            annotations: self.annotations.clone(),
        }
    }
}
