//! Struct schemas
//!
//! Struct layouts are declared once and registered in an explicit
//! [`StructRegistry`] value, which is passed to whoever needs to build
//! default struct values. There is no global registry.

use std::collections::BTreeMap;

use crate::error::{Result, ValueError};
use crate::table::StructValue;
use crate::value::{Property, Value};
use crate::value_type::ValueType;

/// Declared layout of a struct type with default field values
#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    type_name: String,
    fields: Vec<(String, Property)>,
}

impl StructSchema {
    /// Create an empty schema
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field with its default value
    pub fn with_field(mut self, name: impl Into<String>, default: Property) -> Self {
        self.fields.push((name.into(), default));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.fields.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Field name to type mapping
    pub fn field_types(&self) -> BTreeMap<String, ValueType> {
        self.fields
            .iter()
            .map(|(n, p)| (n.clone(), p.value.value_type()))
            .collect()
    }

    /// Build a struct value holding the default field values
    pub fn instantiate(&self) -> StructValue {
        StructValue::new(self.type_name.clone(), self.fields.clone())
    }
}

/// Registry of known struct layouts
#[derive(Debug, Clone, Default)]
pub struct StructRegistry {
    schemas: BTreeMap<String, StructSchema>,
}

impl StructRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the vector types
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            // names are distinct
            let _ = registry.register(schema);
        }
        registry
    }

    /// Register a schema; names must be unique
    pub fn register(&mut self, schema: StructSchema) -> Result<()> {
        if self.schemas.contains_key(schema.type_name()) {
            return Err(ValueError::DuplicateProperty(schema.type_name().to_string()));
        }
        log::debug!("Registered struct type {}", schema.type_name());
        self.schemas.insert(schema.type_name().to_string(), schema);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&StructSchema> {
        self.schemas.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    /// Build a default value for a registered struct
    pub fn create(&self, type_name: &str) -> Option<StructValue> {
        self.schemas.get(type_name).map(StructSchema::instantiate)
    }

    /// Default value for any type, failing on unknown struct types
    pub fn default_value(&self, ty: &ValueType) -> Result<Value> {
        Value::default_for(ty, self).ok_or_else(|| {
            ValueError::UnknownStruct(ty.struct_name().unwrap_or_default().to_string())
        })
    }

    /// Struct name to field types, for embedding in documents
    pub fn type_map(&self) -> BTreeMap<String, BTreeMap<String, ValueType>> {
        self.schemas
            .iter()
            .map(|(name, schema)| (name.clone(), schema.field_types()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructSchema> {
        self.schemas.values()
    }
}

fn vector_schema(name: &str, fields: &[&str], default: impl Fn() -> Value) -> StructSchema {
    fields.iter().fold(StructSchema::new(name), |schema, field| {
        schema.with_field(*field, Property::new(default()))
    })
}

fn builtin_schemas() -> Vec<StructSchema> {
    vec![
        vector_schema("Vec2f", &["x", "y"], || Value::Double(0.0)),
        vector_schema("Vec3f", &["x", "y", "z"], || Value::Double(0.0)),
        vector_schema("Vec4f", &["x", "y", "z", "w"], || Value::Double(0.0)),
        vector_schema("Vec2i", &["i1", "i2"], || Value::Int(0)),
        vector_schema("Vec3i", &["i1", "i2", "i3"], || Value::Int(0)),
        vector_schema("Vec4i", &["i1", "i2", "i3", "i4"], || Value::Int(0)),
    ]
}

/// Build a `Vec3f` value
pub fn vec3f(x: f64, y: f64, z: f64) -> StructValue {
    StructValue::new(
        "Vec3f",
        vec![
            ("x".into(), Property::new(x)),
            ("y".into(), Property::new(y)),
            ("z".into(), Property::new(z)),
        ],
    )
}

/// Build a `Vec4f` value
pub fn vec4f(x: f64, y: f64, z: f64, w: f64) -> StructValue {
    StructValue::new(
        "Vec4f",
        vec![
            ("x".into(), Property::new(x)),
            ("y".into(), Property::new(y)),
            ("z".into(), Property::new(z)),
            ("w".into(), Property::new(w)),
        ],
    )
}

/// Build a `Vec2i` value
pub fn vec2i(i1: i32, i2: i32) -> StructValue {
    StructValue::new(
        "Vec2i",
        vec![("i1".into(), Property::new(i1)), ("i2".into(), Property::new(i2))],
    )
}

/// Build a `Vec4i` value
pub fn vec4i(i1: i32, i2: i32, i3: i32, i4: i32) -> StructValue {
    StructValue::new(
        "Vec4i",
        vec![
            ("i1".into(), Property::new(i1)),
            ("i2".into(), Property::new(i2)),
            ("i3".into(), Property::new(i3)),
            ("i4".into(), Property::new(i4)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_vectors() {
        let registry = StructRegistry::with_builtin_types();
        let v = registry.create("Vec3f").unwrap();
        assert_eq!(v, vec3f(0.0, 0.0, 0.0));
        assert_eq!(registry.create("Vec4i").unwrap().len(), 4);
        assert!(registry.create("Quat").is_none());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = StructRegistry::with_builtin_types();
        assert!(registry.register(StructSchema::new("Vec2f")).is_err());
        registry
            .register(StructSchema::new("Frustum").with_field("near", Property::new(0.1)))
            .unwrap();
        assert_eq!(
            registry.type_map()["Frustum"]["near"],
            ValueType::Double
        );
    }

    #[test]
    fn test_default_value_unknown_struct() {
        let registry = StructRegistry::new();
        assert_eq!(
            registry.default_value(&ValueType::structure("Nope")),
            Err(ValueError::UnknownStruct("Nope".into()))
        );
        assert_eq!(registry.default_value(&ValueType::Int), Ok(Value::Int(0)));
    }
}
