//! Property type maps
//!
//! Decoding a value at a statically typed position needs its type. For
//! properties the live object kinds still declare, the current schema knows
//! it. For properties that only existed in older versions, the type comes
//! from a historical map: either the one embedded in the document by the
//! writer, or, for documents predating embedded maps, the built-in legacy
//! map below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use void_reflection::ValueType;

/// Kind or struct name -> property name -> type
pub type TypeTable = BTreeMap<String, BTreeMap<String, ValueType>>;

/// Property types of object kinds and struct fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyTypeMap {
    #[serde(default)]
    pub objects: TypeTable,
    #[serde(default)]
    pub structs: TypeTable,
}

impl PropertyTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property of an object kind
    pub fn with_property(mut self, kind: &str, name: &str, ty: ValueType) -> Self {
        self.objects
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), ty);
        self
    }

    /// Declare a struct field
    pub fn with_field(mut self, structure: &str, name: &str, ty: ValueType) -> Self {
        self.structs
            .entry(structure.to_string())
            .or_default()
            .insert(name.to_string(), ty);
        self
    }

    pub fn property_type(&self, kind: &str, name: &str) -> Option<&ValueType> {
        self.objects.get(kind)?.get(name)
    }

    pub fn struct_fields(&self, structure: &str) -> Option<&BTreeMap<String, ValueType>> {
        self.structs.get(structure)
    }
}

/// Looks types up in an ordered chain of maps; the first hit wins
#[derive(Debug, Clone)]
pub struct TypeResolver<'a> {
    maps: Vec<&'a PropertyTypeMap>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(maps: Vec<&'a PropertyTypeMap>) -> Self {
        Self { maps }
    }

    pub fn property_type(&self, kind: &str, name: &str) -> Option<&'a ValueType> {
        self.maps.iter().copied().find_map(|m| m.property_type(kind, name))
    }

    pub fn struct_fields(&self, structure: &str) -> Option<&'a BTreeMap<String, ValueType>> {
        self.maps.iter().copied().find_map(|m| m.struct_fields(structure))
    }
}

const NODE_KINDS: &[&str] = &[
    "Node",
    "MeshNode",
    "PerspectiveCamera",
    "OrthographicCamera",
    "PrefabInstance",
];

const ALL_KINDS: &[&str] = &[
    "ProjectSettings",
    "Node",
    "MeshNode",
    "PerspectiveCamera",
    "OrthographicCamera",
    "PrefabInstance",
    "Prefab",
    "Mesh",
    "Material",
    "Texture",
    "LuaScript",
    "Animation",
    "RenderLayer",
    "RenderPass",
];

/// Types of every property written by version 1 documents, which carry
/// no embedded map
pub fn legacy_type_map() -> PropertyTypeMap {
    let vec3f = || ValueType::structure("Vec3f");
    let mut map = PropertyTypeMap::new()
        .with_field("Vec2f", "x", ValueType::Double)
        .with_field("Vec2f", "y", ValueType::Double)
        .with_field("Vec3f", "x", ValueType::Double)
        .with_field("Vec3f", "y", ValueType::Double)
        .with_field("Vec3f", "z", ValueType::Double)
        .with_field("Vec4f", "x", ValueType::Double)
        .with_field("Vec4f", "y", ValueType::Double)
        .with_field("Vec4f", "z", ValueType::Double)
        .with_field("Vec4f", "w", ValueType::Double)
        .with_field("Vec2i", "i1", ValueType::Int)
        .with_field("Vec2i", "i2", ValueType::Int)
        .with_field("Vec4i", "i1", ValueType::Int)
        .with_field("Vec4i", "i2", ValueType::Int)
        .with_field("Vec4i", "i3", ValueType::Int)
        .with_field("Vec4i", "i4", ValueType::Int)
        .with_field("ObjectIdPair", "prefabObject", ValueType::Ref)
        .with_field("ObjectIdPair", "instanceObject", ValueType::Ref);

    for kind in ALL_KINDS {
        map = map
            .with_property(kind, "objectName", ValueType::String)
            .with_property(kind, "children", ValueType::array(ValueType::Ref));
    }
    for kind in NODE_KINDS {
        map = map
            .with_property(kind, "translation", vec3f())
            .with_property(kind, "rotation", vec3f())
            .with_property(kind, "scale", vec3f())
            .with_property(kind, "visible", ValueType::Bool);
    }
    for camera in ["PerspectiveCamera", "OrthographicCamera"] {
        map = map
            .with_property(camera, "viewport", ValueType::structure("Vec4i"))
            .with_property(camera, "near", ValueType::Double)
            .with_property(camera, "far", ValueType::Double);
    }
    for plane in ["left", "right", "bottom", "top"] {
        map = map.with_property("OrthographicCamera", plane, ValueType::Double);
    }

    map.with_property("PerspectiveCamera", "fov", ValueType::Double)
        .with_property("PerspectiveCamera", "aspect", ValueType::Double)
        .with_property("MeshNode", "mesh", ValueType::Ref)
        .with_property("MeshNode", "material", ValueType::Ref)
        .with_property("MeshNode", "instanceCount", ValueType::Int)
        .with_property("PrefabInstance", "template", ValueType::Ref)
        .with_property(
            "PrefabInstance",
            "mapToInstance",
            ValueType::array(ValueType::structure("ObjectIdPair")),
        )
        .with_property("Mesh", "uri", ValueType::String)
        .with_property("Mesh", "meshIndex", ValueType::Int)
        .with_property("Mesh", "bakeMeshes", ValueType::Bool)
        .with_property("Material", "uriVertex", ValueType::String)
        .with_property("Material", "uriFragment", ValueType::String)
        .with_property("Material", "uniforms", ValueType::Table)
        .with_property("Texture", "uri", ValueType::String)
        .with_property("Texture", "origin", ValueType::Int)
        .with_property("LuaScript", "uri", ValueType::String)
        .with_property("LuaScript", "luaInputs", ValueType::Table)
        .with_property("LuaScript", "luaOutputs", ValueType::Table)
        .with_property("Animation", "animationChannels", ValueType::array(ValueType::Ref))
        .with_property("Animation", "progress", ValueType::Double)
        .with_property("Animation", "play", ValueType::Bool)
        .with_property("Animation", "loop", ValueType::Bool)
        .with_property("Animation", "rewindOnStop", ValueType::Bool)
        .with_property("RenderLayer", "renderableTags", ValueType::Table)
        .with_property("RenderLayer", "sortOrder", ValueType::Int)
        .with_property("RenderPass", "camera", ValueType::Ref)
        .with_property("RenderPass", "layer0", ValueType::Ref)
        .with_property("RenderPass", "enabled", ValueType::Bool)
        .with_property("RenderPass", "order", ValueType::Int)
}
