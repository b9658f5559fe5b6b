//! Object factory
//!
//! The factory is an explicit value created once by the host and shared by
//! every context, loader and migration session that needs to build objects.
//! There is no global registry; two factories never see each other's kinds.

use std::collections::BTreeMap;
use std::sync::Arc;

use void_core::ObjectId;
use void_ir::PropertyTypeMap;
use void_reflection::{Annotation, Property, StructRegistry, StructSchema, Table};

use super::hooks::ObjectHooks;
use super::kinds::default_kinds;
use crate::core::object::{EditorObject, CHILDREN_PROPERTY, NAME_PROPERTY};
use crate::error::{ContextError, Result};

/// Declared layout of an object kind
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    properties: Vec<(String, Property)>,
    annotations: Vec<Annotation>,
    hooks: Option<Arc<dyn ObjectHooks>>,
}

impl TypeDescriptor {
    /// Kind with only the common `objectName` and `children` properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            annotations: Vec::new(),
            hooks: None,
        }
    }

    /// Declare a property with its default value and annotations
    pub fn with_property(mut self, name: impl Into<String>, default: Property) -> Self {
        self.properties.push((name.into(), default));
        self
    }

    /// Declare several properties at once
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = (String, Property)>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_hooks(mut self, hooks: impl ObjectHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared properties, excluding the common ones
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Declared default of a property, common ones included
    pub fn property(&self, name: &str) -> Option<Property> {
        match name {
            NAME_PROPERTY => Some(Property::new("")),
            CHILDREN_PROPERTY => Some(children_property()),
            _ => self.properties.iter().find(|(n, _)| n == name).map(|(_, p)| p.clone()),
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn hooks(&self) -> Option<&Arc<dyn ObjectHooks>> {
        self.hooks.as_ref()
    }

    fn default_table(&self, object_name: &str) -> Table {
        let mut table = Table::new()
            .with(NAME_PROPERTY, Property::new(object_name))
            .with(CHILDREN_PROPERTY, children_property());
        for (name, property) in &self.properties {
            table.set(name.clone(), property.clone());
        }
        table
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("properties", &self.properties.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

fn children_property() -> Property {
    Property::new(void_reflection::ArrayValue::new(void_reflection::ValueType::Ref))
        .with_annotation(Annotation::Hidden)
}

/// Registry of object kinds and struct layouts
#[derive(Debug, Clone)]
pub struct ObjectFactory {
    types: BTreeMap<String, TypeDescriptor>,
    structs: StructRegistry,
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFactory {
    /// Factory with the vector structs and no object kinds
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
            structs: StructRegistry::with_builtin_types(),
        }
    }

    /// Factory with every built-in kind
    pub fn with_default_types() -> Self {
        let mut factory = Self::new();
        let (structs, kinds) = default_kinds();
        for schema in structs {
            // built-in names are distinct
            let _ = factory.register_struct(schema);
        }
        for kind in kinds {
            factory.register_type(kind);
        }
        factory
    }

    /// Register or replace an object kind
    pub fn register_type(&mut self, descriptor: TypeDescriptor) {
        log::debug!("Registered object type {}", descriptor.name());
        self.types.insert(descriptor.name().to_string(), descriptor);
    }

    pub fn register_struct(&mut self, schema: StructSchema) -> Result<()> {
        Ok(self.structs.register(schema)?)
    }

    pub fn get_type(&self, kind: &str) -> Option<&TypeDescriptor> {
        self.types.get(kind)
    }

    pub fn has_type(&self, kind: &str) -> bool {
        self.types.contains_key(kind)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn structs(&self) -> &StructRegistry {
        &self.structs
    }

    pub fn hooks(&self, kind: &str) -> Option<Arc<dyn ObjectHooks>> {
        self.types.get(kind)?.hooks().cloned()
    }

    /// Build a default-valued object of a registered kind
    pub fn create(&self, kind: &str, id: ObjectId, name: &str) -> Result<EditorObject> {
        let descriptor = self
            .get_type(kind)
            .ok_or_else(|| ContextError::UnknownType(kind.to_string()))?;
        let mut object = EditorObject::new(id, kind, descriptor.default_table(name));
        for annotation in descriptor.annotations() {
            object.set_annotation(annotation.clone());
        }
        Ok(object)
    }

    /// Current property and struct field types, embedded in saved documents
    /// and used as the last fallback when reading
    pub fn property_type_map(&self) -> PropertyTypeMap {
        let mut map = PropertyTypeMap::new();
        for descriptor in self.types.values() {
            for (name, property) in descriptor.default_table("").iter() {
                map = map.with_property(descriptor.name(), name, property.value.value_type());
            }
        }
        map.structs = self.structs.type_map();
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_reflection::{vec3f, ValueType};

    #[test]
    fn test_create_declared_layout() {
        let factory = ObjectFactory::with_default_types();
        let node = factory.create("Node", ObjectId::new("n"), "node").unwrap();
        let names: Vec<_> = node.properties().names().collect();
        assert_eq!(&names[..2], &[NAME_PROPERTY, CHILDREN_PROPERTY]);
        assert!(names.contains(&"scaling"));
        assert_eq!(node.name(), "node");
        assert!(node.property(CHILDREN_PROPERTY).unwrap().is_hidden());
    }

    #[test]
    fn test_unknown_kind() {
        let factory = ObjectFactory::new();
        assert_eq!(
            factory.create("Node", ObjectId::new("n"), "n").unwrap_err(),
            ContextError::UnknownType("Node".into())
        );
    }

    #[test]
    fn test_host_kinds_are_per_factory() {
        let mut a = ObjectFactory::new();
        a.register_type(TypeDescriptor::new("Light").with_property("color", Property::new(vec3f(1.0, 1.0, 1.0))));
        let b = ObjectFactory::new();
        assert!(a.has_type("Light"));
        assert!(!b.has_type("Light"));
        assert_eq!(
            a.property_type_map().property_type("Light", "color"),
            Some(&ValueType::structure("Vec3f"))
        );
    }

    #[test]
    fn test_type_map_covers_frustum_structs() {
        let map = ObjectFactory::with_default_types().property_type_map();
        assert!(map.struct_fields("PerspectiveFrustum").unwrap().contains_key("fieldOfView"));
        assert_eq!(
            map.property_type("OrthographicCamera", "frustum"),
            Some(&ValueType::structure("OrthographicFrustum"))
        );
    }
}
