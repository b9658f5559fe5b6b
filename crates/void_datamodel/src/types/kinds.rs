//! Built-in object kinds

use void_core::ObjectId;
use void_reflection::{
    vec3f, vec4f, Annotation, ArrayValue, Property, StructSchema, StructValue, Table, ValueType,
};

use super::factory::TypeDescriptor;
use super::hooks::{MaterialHooks, ResourceHooks, ScriptHooks};
use crate::assets::resources::ResourceKind;
use crate::core::project::PROJECT_SETTINGS;

/// Kinds carrying a node transform
pub const NODE_KINDS: &[&str] = &[
    "Node",
    "MeshNode",
    "PerspectiveCamera",
    "OrthographicCamera",
    "PrefabInstance",
];

const VIEWPORT_MAX: i32 = 7680;

fn linkable(value: impl Into<void_reflection::Value>) -> Property {
    Property::new(value).with_annotation(Annotation::link_end())
}

/// Transform and viewport values feed other objects as well as being fed
fn linkable_both(value: impl Into<void_reflection::Value>) -> Property {
    Property::new(value).with_annotation(Annotation::link_start_and_end())
}

fn uri(filter: &str) -> Property {
    Property::new("").with_annotation(Annotation::Uri { filter: filter.into() })
}

fn range_double(value: f64, min: f64, max: f64) -> Property {
    linkable(value).with_annotation(Annotation::RangeDouble { min, max })
}

fn node_properties() -> Vec<(String, Property)> {
    vec![
        ("translation".into(), linkable_both(vec3f(0.0, 0.0, 0.0))),
        ("rotation".into(), linkable_both(vec3f(0.0, 0.0, 0.0))),
        ("scaling".into(), linkable_both(vec3f(1.0, 1.0, 1.0))),
        ("visibility".into(), linkable_both(true)),
    ]
}

fn camera(kind: &str, frustum: &str) -> TypeDescriptor {
    let frustum = frustum_schemas()
        .into_iter()
        .find(|s| s.type_name() == frustum)
        .map(|s| s.instantiate())
        .unwrap_or_else(|| StructValue::new(frustum, Vec::new()));
    let viewport = |default: i32, min: i32| {
        linkable_both(default).with_annotation(Annotation::RangeInt {
            min,
            max: VIEWPORT_MAX,
        })
    };
    TypeDescriptor::new(kind)
        .with_properties(node_properties())
        .with_property("viewPortOffsetX", viewport(0, -VIEWPORT_MAX))
        .with_property("viewPortOffsetY", viewport(0, -VIEWPORT_MAX))
        .with_property("viewPortWidth", viewport(1440, 0))
        .with_property("viewPortHeight", viewport(720, 0))
        .with_property("frustum", linkable_both(frustum))
}

fn frustum_schemas() -> Vec<StructSchema> {
    let plane = |value: f64| Property::new(value);
    vec![
        StructSchema::new("PerspectiveFrustum")
            .with_field("nearPlane", plane(0.1))
            .with_field("farPlane", plane(1000.0))
            .with_field("fieldOfView", plane(35.0))
            .with_field("aspectRatio", plane(2.0)),
        StructSchema::new("OrthographicFrustum")
            .with_field("nearPlane", plane(0.1))
            .with_field("farPlane", plane(1000.0))
            .with_field("leftPlane", plane(-10.0))
            .with_field("rightPlane", plane(10.0))
            .with_field("bottomPlane", plane(-10.0))
            .with_field("topPlane", plane(10.0)),
    ]
}

/// Struct schemas and object kinds registered by
/// [`ObjectFactory::with_default_types`](super::ObjectFactory::with_default_types)
pub fn default_kinds() -> (Vec<StructSchema>, Vec<TypeDescriptor>) {
    let kinds = vec![
        TypeDescriptor::new(PROJECT_SETTINGS)
            .with_property("backgroundColor", Property::new(vec4f(0.0, 0.0, 0.0, 1.0))),
        TypeDescriptor::new("Node").with_properties(node_properties()),
        TypeDescriptor::new("MeshNode")
            .with_properties(node_properties())
            .with_property("mesh", Property::new(Option::<ObjectId>::None))
            .with_property("material", Property::new(Option::<ObjectId>::None))
            .with_property(
                "instanceCount",
                linkable(1).with_annotation(Annotation::RangeInt { min: 1, max: 20 }),
            ),
        camera("PerspectiveCamera", "PerspectiveFrustum"),
        camera("OrthographicCamera", "OrthographicFrustum"),
        TypeDescriptor::new("Mesh")
            .with_property("uri", uri("*.gltf *.glb"))
            .with_property("meshIndex", Property::new(0))
            .with_property("bakeMeshes", Property::new(true))
            .with_hooks(ResourceHooks::new(ResourceKind::Mesh)),
        TypeDescriptor::new("Material")
            .with_property("uriVertex", uri("*.vert *.glsl"))
            .with_property("uriFragment", uri("*.frag *.glsl"))
            .with_property("uniforms", Property::new(Table::new()))
            .with_hooks(MaterialHooks),
        TypeDescriptor::new("Texture")
            .with_property("uri", uri("*.png"))
            .with_property("flipTexture", Property::new(false))
            .with_property("generateMipmaps", Property::new(false))
            .with_hooks(ResourceHooks::new(ResourceKind::Image)),
        TypeDescriptor::new("LuaScript")
            .with_property("uri", uri("*.lua"))
            .with_property("inputs", Property::new(Table::new()))
            .with_property("outputs", Property::new(Table::new()))
            .with_hooks(ScriptHooks::script()),
        TypeDescriptor::new("LuaInterface")
            .with_property("uri", uri("*.interface"))
            .with_property("inputs", Property::new(Table::new()))
            .with_hooks(ScriptHooks::interface()),
        TypeDescriptor::new("Animation")
            .with_property("animationChannels", Property::new(ArrayValue::new(ValueType::Ref)))
            .with_property("progress", range_double(0.0, 0.0, 1.0)),
        TypeDescriptor::new("RenderLayer")
            .with_property("renderableTags", Property::new(Table::new()))
            .with_property(
                "sortOrder",
                Property::new(0).with_annotation(Annotation::Enumeration {
                    name: "RenderLayerOrder".into(),
                }),
            ),
        TypeDescriptor::new("RenderPass")
            .with_property("camera", Property::new(Option::<ObjectId>::None))
            .with_property("layer0", Property::new(Option::<ObjectId>::None))
            .with_property("enabled", linkable(true))
            .with_property("order", linkable(1)),
        TypeDescriptor::new("Prefab"),
        TypeDescriptor::new("PrefabInstance")
            .with_properties(node_properties())
            .with_property("template", Property::new(Option::<ObjectId>::None)),
    ];
    (frustum_schemas(), kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kind_names() {
        let (_, kinds) = default_kinds();
        let names: Vec<_> = kinds.iter().map(TypeDescriptor::name).collect();
        for expected in [
            "ProjectSettings",
            "Node",
            "MeshNode",
            "PerspectiveCamera",
            "OrthographicCamera",
            "Mesh",
            "Material",
            "Texture",
            "LuaScript",
            "LuaInterface",
            "Animation",
            "RenderLayer",
            "RenderPass",
            "Prefab",
            "PrefabInstance",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_camera_defaults() {
        let (_, kinds) = default_kinds();
        let camera = kinds.iter().find(|k| k.name() == "PerspectiveCamera").unwrap();
        assert_eq!(camera.property("viewPortWidth").unwrap().value.as_int(), Some(1440));
        let frustum = camera.property("frustum").unwrap();
        assert_eq!(
            frustum.value.as_struct().unwrap().get("farPlane").unwrap().value.as_double(),
            Some(1000.0)
        );
        assert!(frustum.link_capability().is_some());
    }

    #[test]
    fn test_node_transform_links_both_ways() {
        let (_, kinds) = default_kinds();
        let node = kinds.iter().find(|k| k.name() == "Node").unwrap();
        for name in ["translation", "rotation", "scaling", "visibility"] {
            let capability = node.property(name).unwrap().link_capability().unwrap();
            assert!(capability.can_start() && capability.can_end(), "{}", name);
        }
        let pass = kinds.iter().find(|k| k.name() == "RenderPass").unwrap();
        assert!(!pass.property("enabled").unwrap().link_capability().unwrap().can_start());
    }
}
