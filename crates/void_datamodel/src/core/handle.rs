//! Property handles
//!
//! A [`ValueHandle`] names a property by object id and path. It never owns
//! or caches anything: every access walks the path again through the
//! project, so a handle becomes invalid as soon as any step along its path
//! disappears, without the handle value changing.

use std::fmt;

use void_core::ObjectId;
use void_reflection::{
    format_path, starts_with, Annotation, AnnotationKind, LinkCapability, PathSegment, Property, Value,
    ValueType,
};

use super::object::EditorObject;
use super::project::Project;

/// Object id plus property path. An empty path addresses the object itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueHandle {
    object: ObjectId,
    path: Vec<PathSegment>,
}

impl ValueHandle {
    pub fn new(object: ObjectId, path: Vec<PathSegment>) -> Self {
        Self { object, path }
    }

    /// Handle addressing a whole object
    pub fn for_object(object: ObjectId) -> Self {
        Self::new(object, Vec::new())
    }

    /// Handle addressing a top-level property
    pub fn property(object: ObjectId, name: &str) -> Self {
        Self::new(object, vec![PathSegment::from(name)])
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Descend by name
    pub fn get(&self, name: &str) -> Self {
        let mut path = self.path.clone();
        path.push(PathSegment::from(name));
        Self::new(self.object.clone(), path)
    }

    /// Descend by index
    pub fn at(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(PathSegment::Index(index));
        Self::new(self.object.clone(), path)
    }

    /// Ascend one level; object-level handles have no parent
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.path.split_last()?;
        Some(Self::new(self.object.clone(), parent.to_vec()))
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_object(&self) -> bool {
        self.path.is_empty()
    }

    /// Strict descendant test
    pub fn contains(&self, other: &ValueHandle) -> bool {
        self.object == other.object
            && other.path.len() > self.path.len()
            && starts_with(&other.path, &self.path)
    }

    /// Equal to or inside `self`
    pub fn contains_or_equals(&self, other: &ValueHandle) -> bool {
        self == other || self.contains(other)
    }

    /// Name of the top-level property, if any
    pub fn root_property(&self) -> Option<&str> {
        self.path.first().and_then(PathSegment::as_name)
    }

    pub fn resolve_object<'p>(&self, project: &'p Project) -> Option<&'p EditorObject> {
        project.get_instance_by_id(&self.object)
    }

    /// Resolve the addressed property; `None` for object-level handles
    pub fn resolve<'p>(&self, project: &'p Project) -> Option<&'p Property> {
        self.resolve_object(project)?.resolve(&self.path)
    }

    pub fn is_valid(&self, project: &Project) -> bool {
        if self.is_object() {
            self.resolve_object(project).is_some()
        } else {
            self.resolve(project).is_some()
        }
    }

    pub fn value<'p>(&self, project: &'p Project) -> Option<&'p Value> {
        self.resolve(project).map(|p| &p.value)
    }

    pub fn value_type(&self, project: &Project) -> Option<ValueType> {
        self.value(project).map(Value::value_type)
    }

    pub fn as_bool(&self, project: &Project) -> Option<bool> {
        self.value(project)?.as_bool()
    }

    pub fn as_int(&self, project: &Project) -> Option<i32> {
        self.value(project)?.as_int()
    }

    pub fn as_int64(&self, project: &Project) -> Option<i64> {
        self.value(project)?.as_int64()
    }

    pub fn as_double(&self, project: &Project) -> Option<f64> {
        self.value(project)?.as_double()
    }

    pub fn as_str<'p>(&self, project: &'p Project) -> Option<&'p str> {
        self.value(project)?.as_str()
    }

    pub fn as_ref_id<'p>(&self, project: &'p Project) -> Option<&'p ObjectId> {
        self.value(project)?.as_ref_id()
    }

    /// Annotation of the addressed property, or of the object for
    /// object-level handles
    pub fn query_annotation<'p>(&self, project: &'p Project, kind: AnnotationKind) -> Option<&'p Annotation> {
        if self.is_object() {
            self.resolve_object(project)?.annotation(kind)
        } else {
            self.resolve(project)?.annotation(kind)
        }
    }

    /// The same property spelled with names for struct and table children
    /// and indices for array elements. `None` if the path does not resolve.
    pub fn canonical(&self, project: &Project) -> Option<Self> {
        let object = self.resolve_object(project)?;
        let Some((first, rest)) = self.path.split_first() else {
            return Some(self.clone());
        };
        let mut property = object.property(first.as_name()?)?;
        let mut path = Vec::with_capacity(self.path.len());
        path.push(first.clone());
        for segment in rest {
            let canonical = match (&property.value, segment) {
                (Value::Array(_), PathSegment::Index(index)) => PathSegment::Index(*index),
                (Value::Array(_), PathSegment::Name(_)) => return None,
                (value, PathSegment::Index(index)) => PathSegment::from(value.child_name(*index)?),
                (_, PathSegment::Name(name)) => PathSegment::Name(name.clone()),
            };
            property = property.value.segment(&canonical)?;
            path.push(canonical);
        }
        Some(Self::new(self.object.clone(), path))
    }

    /// Link capability of the property or its nearest annotated ancestor
    pub fn link_capability(&self, project: &Project) -> Option<LinkCapability> {
        let object = self.resolve_object(project)?;
        (1..=self.path.len())
            .rev()
            .find_map(|depth| object.resolve(&self.path[..depth])?.link_capability())
    }
}

impl fmt::Display for ValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.object)
        } else {
            write!(f, "{}.{}", self.object, format_path(&self.path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ValueHandle {
        ValueHandle::property(ObjectId::new("n"), "translation").get("x")
    }

    #[test]
    fn test_navigation() {
        let h = handle();
        assert_eq!(h.depth(), 2);
        assert_eq!(h.root_property(), Some("translation"));
        let parent = h.parent().unwrap();
        assert_eq!(parent, ValueHandle::property(ObjectId::new("n"), "translation"));
        assert_eq!(parent.parent().unwrap(), ValueHandle::for_object(ObjectId::new("n")));
        assert!(ValueHandle::for_object(ObjectId::new("n")).parent().is_none());
        assert_eq!(h.to_string(), "n.translation.x");
    }

    #[test]
    fn test_contains_is_strict() {
        let h = handle();
        let parent = h.parent().unwrap();
        assert!(parent.contains(&h));
        assert!(!h.contains(&h));
        assert!(h.contains_or_equals(&h));
        assert!(!h.contains(&parent));
        let other = ValueHandle::property(ObjectId::new("m"), "translation").get("x");
        assert!(!parent.contains(&other));
    }

    #[test]
    fn test_canonical_spelling() {
        let mut project = Project::new();
        let properties = void_reflection::Table::new()
            .with("translation", Property::new(void_reflection::vec3f(1.0, 2.0, 3.0)));
        project.insert_object(EditorObject::new(ObjectId::new("n"), "Node", properties));

        let by_index = ValueHandle::property(ObjectId::new("n"), "translation").at(1);
        let canonical = by_index.canonical(&project).unwrap();
        assert_eq!(canonical, ValueHandle::property(ObjectId::new("n"), "translation").get("y"));
        assert_eq!(canonical.as_double(&project), Some(2.0));
        assert_eq!(canonical.canonical(&project), Some(canonical.clone()));
        assert!(ValueHandle::property(ObjectId::new("n"), "translation").at(3).canonical(&project).is_none());
    }

    #[test]
    fn test_ordering_usable_as_key() {
        let mut handles = vec![handle(), handle().parent().unwrap(), handle().parent().unwrap().at(0)];
        handles.sort();
        assert_eq!(handles[0], handle().parent().unwrap());
        assert_eq!(handles[1], handle());
    }
}
