//! The migration intermediate representation
//!
//! An [`IrDocument`] mirrors the object and link graph of a document with
//! nothing but kind names and generic property tables. It exists only
//! between decoding and conversion to live objects, and is the structure
//! every migration step operates on.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use void_core::ObjectId;
use void_reflection::{starts_with, Annotation, PathSegment, Property, Table, Value};

/// An external project entry: path relative to the project folder and cached name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalProjectInfo {
    pub path: String,
    #[serde(default)]
    pub name: String,
}

impl ExternalProjectInfo {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// A file synthesised by a migration step, to be written next to the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Path relative to the project folder, with `/` separators
    pub relative_path: String,
    pub contents: String,
}

/// A dynamically typed object
#[derive(Debug, Clone, PartialEq)]
pub struct IrObject {
    pub id: ObjectId,
    pub type_name: String,
    pub properties: Table,
    /// Object-level annotations
    pub annotations: Vec<Annotation>,
}

impl IrObject {
    /// Create an object with only a name and an empty child list
    pub fn new(id: ObjectId, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        let properties = Table::new()
            .with("objectName", Property::new(name.into()))
            .with(
                "children",
                Property::new(void_reflection::ArrayValue::new(void_reflection::ValueType::Ref)),
            );
        Self {
            id,
            type_name: type_name.into(),
            properties,
            annotations: Vec::new(),
        }
    }

    pub fn is_type(&self, types: &[&str]) -> bool {
        types.contains(&self.type_name.as_str())
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|p| &p.value)
    }

    pub fn name(&self) -> &str {
        self.value("objectName").and_then(Value::as_str).unwrap_or_default()
    }

    /// Set or replace a property
    pub fn set(&mut self, name: &str, property: Property) {
        self.properties.set(name, property);
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    /// Rename a property if present; returns whether it was renamed
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        self.properties.rename(from, to).is_ok()
    }

    /// Ids listed in the `children` property
    pub fn children(&self) -> Vec<ObjectId> {
        self.value("children")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|p| p.value.as_ref_id().cloned()).collect())
            .unwrap_or_default()
    }
}

/// A link between two property paths
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IrLink {
    pub start_object: ObjectId,
    pub start_path: Vec<PathSegment>,
    pub end_object: ObjectId,
    pub end_path: Vec<PathSegment>,
    pub valid: bool,
    pub weak: bool,
}

impl IrLink {
    pub fn new(
        start_object: ObjectId,
        start_path: Vec<PathSegment>,
        end_object: ObjectId,
        end_path: Vec<PathSegment>,
    ) -> Self {
        Self {
            start_object,
            start_path,
            end_object,
            end_path,
            valid: true,
            weak: false,
        }
    }

    pub fn ends_at(&self, object: &ObjectId, prefix: &[PathSegment]) -> bool {
        &self.end_object == object && starts_with(&self.end_path, prefix)
    }

    pub fn starts_at(&self, object: &ObjectId, prefix: &[PathSegment]) -> bool {
        &self.start_object == object && starts_with(&self.start_path, prefix)
    }
}

/// The whole document in intermediate form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrDocument {
    pub file_version: u32,
    pub objects: Vec<IrObject>,
    pub links: Vec<IrLink>,
    pub external_projects: BTreeMap<String, ExternalProjectInfo>,
    /// Advisories produced by migration steps, per object
    pub migration_warnings: BTreeMap<ObjectId, Vec<String>>,
    /// Files synthesised by migration steps
    pub generated_files: Vec<GeneratedFile>,
}

impl IrDocument {
    /// Create an empty document at the given version
    pub fn new(file_version: u32) -> Self {
        Self {
            file_version,
            ..Default::default()
        }
    }

    pub fn object(&self, id: &ObjectId) -> Option<&IrObject> {
        self.objects.iter().find(|o| &o.id == id)
    }

    pub fn object_mut(&mut self, id: &ObjectId) -> Option<&mut IrObject> {
        self.objects.iter_mut().find(|o| &o.id == id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object(id).is_some()
    }

    /// Ids of objects of any of the given kinds, in document order
    pub fn ids_of_type(&self, types: &[&str]) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|o| o.is_type(types))
            .map(|o| o.id.clone())
            .collect()
    }

    /// Find the object listing `child` in its `children` property
    pub fn parent_of(&self, child: &ObjectId) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|o| o.children().contains(child))
            .map(|o| o.id.clone())
    }

    /// Attach a migration advisory to an object
    pub fn add_warning(&mut self, object: &ObjectId, message: impl Into<String>) {
        self.migration_warnings
            .entry(object.clone())
            .or_default()
            .push(message.into());
    }

    /// Rewrite the start and end paths of links touching `object`.
    ///
    /// `rewrite` returns the replacement path, or `None` to leave a path
    /// alone.
    pub fn rewrite_link_paths(
        &mut self,
        object: &ObjectId,
        rewrite: impl Fn(&[PathSegment]) -> Option<Vec<PathSegment>>,
    ) {
        for link in &mut self.links {
            if &link.start_object == object {
                if let Some(path) = rewrite(&link.start_path) {
                    link.start_path = path;
                }
            }
            if &link.end_object == object {
                if let Some(path) = rewrite(&link.end_path) {
                    link.end_path = path;
                }
            }
        }
    }

    /// Replace a leading path prefix on links touching `object`
    pub fn replace_link_prefix(&mut self, object: &ObjectId, from: &[PathSegment], to: &[PathSegment]) {
        self.rewrite_link_paths(object, |path| {
            if starts_with(path, from) {
                let mut replaced = to.to_vec();
                replaced.extend_from_slice(&path[from.len()..]);
                Some(replaced)
            } else {
                None
            }
        });
    }

    /// Remove links whose start or end lies at or below `prefix` on `object`.
    ///
    /// Returns the number of removed links.
    pub fn remove_links_at(&mut self, object: &ObjectId, prefix: &[PathSegment]) -> usize {
        let before = self.links.len();
        self.links
            .retain(|l| !l.ends_at(object, prefix) && !l.starts_at(object, prefix));
        before - self.links.len()
    }

    /// Check whether a link ends at or below `prefix` on `object`
    pub fn has_link_ending_at(&self, object: &ObjectId, prefix: &[PathSegment]) -> bool {
        self.links.iter().any(|l| l.ends_at(object, prefix))
    }

    /// Change an object's id, rewriting every reference and link endpoint
    pub fn rename_object_id(&mut self, from: &ObjectId, to: &ObjectId) {
        if from == to {
            return;
        }
        for object in &mut self.objects {
            if &object.id == from {
                object.id = to.clone();
            }
            let translate = |id: &ObjectId| Some(if id == from { to.clone() } else { id.clone() });
            let mut rewritten = Table::new();
            for (name, property) in object.properties.iter() {
                rewritten.set(name, property.deep_clone_with(&translate));
            }
            object.properties = rewritten;
        }
        for link in &mut self.links {
            if &link.start_object == from {
                link.start_object = to.clone();
            }
            if &link.end_object == from {
                link.end_object = to.clone();
            }
        }
        if let Some(warnings) = self.migration_warnings.remove(from) {
            self.migration_warnings.insert(to.clone(), warnings);
        }
    }

    /// All object ids, sorted
    pub fn sorted_ids(&self) -> BTreeSet<ObjectId> {
        self.objects.iter().map(|o| o.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_reflection::path_of;

    fn doc() -> IrDocument {
        let mut doc = IrDocument::new(1);
        let mut parent = IrObject::new(ObjectId::new("p"), "Node", "parent");
        parent.set(
            "children",
            Property::new(
                void_reflection::ArrayValue::with_elements(
                    void_reflection::ValueType::Ref,
                    vec![Property::new(ObjectId::new("c"))],
                )
                .unwrap(),
            ),
        );
        doc.objects.push(parent);
        doc.objects.push(IrObject::new(ObjectId::new("c"), "Node", "child"));
        doc.links.push(IrLink::new(
            ObjectId::new("p"),
            path_of(["translation", "x"]),
            ObjectId::new("c"),
            path_of(["scale", "y"]),
        ));
        doc
    }

    #[test]
    fn test_parent_lookup() {
        let doc = doc();
        assert_eq!(doc.parent_of(&ObjectId::new("c")), Some(ObjectId::new("p")));
        assert_eq!(doc.parent_of(&ObjectId::new("p")), None);
    }

    #[test]
    fn test_replace_link_prefix() {
        let mut doc = doc();
        doc.replace_link_prefix(&ObjectId::new("c"), &path_of(["scale"]), &path_of(["scaling"]));
        assert_eq!(doc.links[0].end_path, path_of(["scaling", "y"]));
        assert_eq!(doc.links[0].start_path, path_of(["translation", "x"]));
    }

    #[test]
    fn test_rename_object_id_rewrites_everything() {
        let mut doc = doc();
        doc.add_warning(&ObjectId::new("c"), "note");
        doc.rename_object_id(&ObjectId::new("c"), &ObjectId::new("c2"));

        assert!(doc.contains(&ObjectId::new("c2")));
        assert_eq!(doc.object(&ObjectId::new("p")).unwrap().children(), vec![ObjectId::new("c2")]);
        assert_eq!(doc.links[0].end_object, ObjectId::new("c2"));
        assert!(doc.migration_warnings.contains_key(&ObjectId::new("c2")));
    }

    #[test]
    fn test_remove_links_at() {
        let mut doc = doc();
        assert_eq!(doc.remove_links_at(&ObjectId::new("c"), &path_of(["translation"])), 0);
        assert_eq!(doc.remove_links_at(&ObjectId::new("c"), &path_of(["scale"])), 1);
        assert!(doc.links.is_empty());
    }
}
