//! Integration tests for void_ir crate
//!
//! Reads legacy documents and runs them through the full migration chain.

use proptest::prelude::*;
use void_core::ObjectId;
use void_ir::*;
use void_reflection::{path_of, vec3f, vec4i, Annotation, Property, Table, Value};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const V1_CAMERA: &str = r#"{
    "fileVersion": 1,
    "instances": [
        {
            "typeName": "Node",
            "id": "9a1b2c3d-0000-4000-8000-000000000001",
            "properties": {
                "objectName": "root",
                "children": ["9a1b2c3d-0000-4000-8000-000000000002"],
                "scale": { "x": 1.0, "y": 1.0, "z": 1.0 },
                "visible": true
            }
        },
        {
            "typeName": "PerspectiveCamera",
            "id": "9a1b2c3d-0000-4000-8000-000000000002",
            "properties": {
                "objectName": "camera",
                "viewport": { "i1": 0, "i2": 0, "i3": 800, "i4": 600 },
                "near": 0.5,
                "far": 100,
                "fov": 40,
                "aspect": 1.5,
                "legacyOnly": "dropped"
            }
        }
    ],
    "links": [
        {
            "startObject": "9a1b2c3d-0000-4000-8000-000000000001",
            "startProp": ["translation", "x"],
            "endObject": "9a1b2c3d-0000-4000-8000-000000000002",
            "endProp": ["viewport", "i4"]
        }
    ]
}"#;

#[test]
fn test_v1_camera_viewport_migrates() {
    init_logging();
    let doc = read_document(V1_CAMERA, &PropertyTypeMap::new()).unwrap();
    assert_eq!(doc.file_version, 1);

    let doc = migrate(doc).unwrap();
    assert_eq!(doc.file_version, CURRENT_FILE_VERSION);

    let camera = doc
        .object(&ObjectId::new("9a1b2c3d-0000-4000-8000-000000000002"))
        .unwrap();
    assert!(camera.property("viewport").is_none());
    assert!(camera.property("legacyOnly").is_none());
    assert_eq!(camera.value("viewPortOffsetX").unwrap().as_int(), Some(0));
    assert_eq!(camera.value("viewPortOffsetY").unwrap().as_int(), Some(0));
    assert_eq!(camera.value("viewPortWidth").unwrap().as_int(), Some(800));
    assert_eq!(camera.value("viewPortHeight").unwrap().as_int(), Some(600));

    let frustum = camera.value("frustum").unwrap().as_struct().unwrap();
    assert_eq!(frustum.get("farPlane").unwrap().value.as_double(), Some(100.0));

    assert_eq!(doc.links[0].end_path, path_of(["viewPortHeight"]));
    assert_eq!(doc.objects[0].type_name, "ProjectSettings");
}

#[test]
fn test_v1_node_renames() {
    let doc = migrate(read_document(V1_CAMERA, &PropertyTypeMap::new()).unwrap()).unwrap();
    let root = doc
        .object(&ObjectId::new("9a1b2c3d-0000-4000-8000-000000000001"))
        .unwrap();
    assert!(root.property("scaling").is_some());
    assert_eq!(root.value("visibility"), Some(&Value::Bool(true)));
}

#[test]
fn test_future_document_rejected_before_decoding() {
    let text = V1_CAMERA.replace("\"fileVersion\": 1", "\"fileVersion\": 15");
    assert!(matches!(
        read_document(&text, &PropertyTypeMap::new()),
        Err(DocumentError::UnsupportedVersion { found: 15, .. })
    ));
}

#[test]
fn test_written_document_reads_back() {
    let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
    let mut script = IrObject::new(ObjectId::new("s"), "LuaScript", "script");
    script.set("uri", Property::new("a.lua"));
    script.set(
        "inputs",
        Property::new(Table::new().with("k", Property::new(3).with_annotation(Annotation::link_end()))),
    );
    doc.objects.push(script);
    doc.external_projects
        .insert("ext".into(), ExternalProjectInfo::new("../ext.vproj", "ext"));

    let map = PropertyTypeMap::new()
        .with_property("LuaScript", "objectName", void_reflection::ValueType::String)
        .with_property("LuaScript", "children", void_reflection::ValueType::array(void_reflection::ValueType::Ref))
        .with_property("LuaScript", "uri", void_reflection::ValueType::String)
        .with_property("LuaScript", "inputs", void_reflection::ValueType::Table);

    let text = write_document(&doc, &map).unwrap();
    let back = read_document(&text, &PropertyTypeMap::new()).unwrap();
    assert_eq!(back, doc);
}

fn legacy_object(index: usize) -> impl Strategy<Value = IrObject> {
    let id = move || ObjectId::new(format!("00000000-0000-4000-8000-{:012}", index + 1));
    prop_oneof![
        (0i32..4, -10i32..10, 1i32..2000, 1i32..2000).prop_map(move |(a, b, w, h)| {
            let mut camera = IrObject::new(id(), "PerspectiveCamera", "camera");
            camera.set("viewport", Property::new(vec4i(a, b, w, h)));
            camera.set("fov", Property::new(f64::from(w % 90)));
            camera
        }),
        (0i32..3).prop_map(move |origin| {
            let mut texture = IrObject::new(id(), "Texture", "texture");
            texture.set("origin", Property::new(origin));
            texture
        }),
        (0i32..3).prop_map(move |order| {
            let mut layer = IrObject::new(id(), "RenderLayer", "layer");
            layer.set("sortOrder", Property::new(order));
            layer
        }),
        (-4i32..4, 1i32..4).prop_map(move |(r, s)| {
            let mut node = IrObject::new(id(), "Node", "node");
            node.set("rotation", Property::new(vec3f(f64::from(r), 0.0, 0.0)));
            node.set("scale", Property::new(vec3f(f64::from(s), 1.0, 1.0)));
            node
        }),
        prop::collection::vec(-100i32..100, 0..4).prop_map(move |values| {
            let mut script = IrObject::new(id(), "LuaScript", "script");
            let mut inputs = Table::new();
            for (i, v) in values.into_iter().enumerate() {
                inputs.set(format!("in{}", i), Property::new(v).with_annotation(Annotation::link_end()));
            }
            script.set("luaInputs", Property::new(inputs));
            script.set("luaOutputs", Property::new(Table::new()));
            script
        }),
        any::<bool>().prop_map(move |play| {
            let mut animation = IrObject::new(id(), "Animation", "animation");
            animation.set("play", Property::new(play));
            animation
        }),
    ]
}

fn legacy_document() -> impl Strategy<Value = IrDocument> {
    (1u32..=CURRENT_FILE_VERSION, 0usize..6)
        .prop_flat_map(|(version, count)| {
            let objects: Vec<_> = (0..count).map(legacy_object).collect();
            (Just(version), objects)
        })
        .prop_map(|(version, objects)| {
            let mut doc = IrDocument::new(version);
            doc.objects = objects;
            doc
        })
}

proptest! {
    #[test]
    fn migration_is_idempotent(doc in legacy_document()) {
        let once = migrate(doc).unwrap();
        let twice = migrate(once.clone()).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn migration_is_deterministic(doc in legacy_document()) {
        prop_assert_eq!(migrate(doc.clone()).unwrap(), migrate(doc).unwrap());
    }
}
