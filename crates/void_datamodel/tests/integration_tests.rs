//! Integration tests for void_datamodel crate
//!
//! Exercises the public API end to end: context edits, links, undo,
//! persistence, prefabs, external project mappings and hot reload.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use void_core::{derive_object_id, ErrorCategory, ErrorLevel, FileChange, MemoryFileWatcher, ObjectId};
use void_datamodel::scene::{deserialize_project, project_from_ir, project_to_ir, serialize_project};
use void_datamodel::{
    load_project, CommandInterface, Context, ContextError, DataModelConfig, ExtrefError, Link, LoadError, ObjectFactory,
    Project, UndoStack, ValueHandle,
};
use void_reflection::{Annotation, ArrayValue, Property, Value, ValueType};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn factory() -> Arc<ObjectFactory> {
    Arc::new(ObjectFactory::with_default_types())
}

fn context() -> Context {
    Context::new(factory())
}

fn visibility(id: &ObjectId) -> ValueHandle {
    ValueHandle::property(id.clone(), "visibility")
}

#[test]
fn test_strong_link_loop_rejected_weak_allowed() {
    init_logging();
    let mut ctx = context();
    let a = ctx.create_object("Node", "a", None).unwrap();
    let b = ctx.create_object("Node", "b", None).unwrap();

    ctx.add_link(&visibility(&a), &visibility(&b), false).unwrap();
    assert!(matches!(
        ctx.add_link(&visibility(&b), &visibility(&a), false),
        Err(ContextError::LinkLoop { .. })
    ));
    assert_eq!(ctx.project().link_count(), 1);

    let weak = ctx.add_link(&visibility(&b), &visibility(&a), true).unwrap();
    assert!(weak.weak);
    assert_eq!(ctx.project().link_count(), 2);
}

#[test]
fn test_second_link_to_same_end_replaces_first() {
    init_logging();
    let mut ctx = context();
    let a = ctx.create_object("Node", "a", None).unwrap();
    let b = ctx.create_object("Node", "b", None).unwrap();
    let c = ctx.create_object("Node", "c", None).unwrap();

    ctx.add_link(&visibility(&a), &visibility(&c), false).unwrap();
    ctx.add_link(&visibility(&b), &visibility(&c), false).unwrap();
    assert_eq!(ctx.project().link_count(), 1);
    let link = ctx.project().link_ending_at(&visibility(&c)).unwrap();
    assert_eq!(link.start_object(), &b);
}

#[test]
fn test_link_end_spellings_address_one_property() {
    init_logging();
    let mut ctx = context();
    let a = ctx.create_object("Node", "a", None).unwrap();
    let b = ctx.create_object("Node", "b", None).unwrap();
    let c = ctx.create_object("Node", "c", None).unwrap();
    let x = |id: &ObjectId| ValueHandle::property(id.clone(), "translation").get("x");
    let first_field = ValueHandle::property(c.clone(), "translation").at(0);

    ctx.add_link(&x(&a), &x(&c), false).unwrap();
    let link = ctx.add_link(&x(&b), &first_field, false).unwrap();
    assert_eq!(link.end, x(&c));
    assert_eq!(ctx.project().link_count(), 1);
    assert_eq!(ctx.project().link_ending_at(&x(&c)).unwrap().start_object(), &b);

    assert!(ctx.remove_link(&first_field));
    assert_eq!(ctx.project().link_count(), 0);
}

#[test]
fn test_delete_removes_links_and_references() {
    init_logging();
    let mut ctx = context();
    let mesh = ctx.create_object("Mesh", "mesh", None).unwrap();
    let node = ctx.create_object("MeshNode", "node", None).unwrap();
    let other = ctx.create_object("MeshNode", "other", None).unwrap();
    let mesh_ref = ValueHandle::property(node.clone(), "mesh");
    ctx.set(&mesh_ref, mesh.clone()).unwrap();
    ctx.add_link(&visibility(&other), &visibility(&node), false).unwrap();

    assert_eq!(ctx.delete_objects(&[mesh.clone(), other.clone()]), 2);
    assert_eq!(mesh_ref.as_ref_id(ctx.project()), None);
    assert_eq!(ctx.project().link_count(), 0);
    assert!(ctx.project().referencing(&mesh).is_empty());

    let changes = ctx.take_live_changes();
    assert!(changes.deleted().contains(&mesh));
    assert!(changes.has_value_changed(&mesh_ref));
}

#[test]
fn test_stale_handle_reports_invalid() {
    init_logging();
    let mut ctx = context();
    let node = ctx.create_object("Node", "node", None).unwrap();
    let handle = visibility(&node);
    assert!(handle.is_valid(ctx.project()));

    ctx.delete_objects(&[node]);
    assert!(!handle.is_valid(ctx.project()));
    assert!(matches!(ctx.set(&handle, true), Err(ContextError::NoSuchObject(_))));
}

#[test]
fn test_scenegraph_move_below_descendant_rejected() {
    init_logging();
    let mut ctx = context();
    let parent = ctx.create_object("Node", "parent", None).unwrap();
    let child = ctx.create_object("Node", "child", None).unwrap();
    ctx.move_scenegraph_child(&child, Some(&parent), None).unwrap();

    assert!(matches!(
        ctx.move_scenegraph_child(&parent, Some(&child), None),
        Err(ContextError::SceneGraphLoop(_))
    ));
    assert_eq!(ctx.project().parent_of(&child), Some(&parent));
}

#[test]
fn test_set_index_is_idempotent() {
    init_logging();
    let mut ctx = context();
    let mut undo = UndoStack::new(&ctx, UndoStack::DEFAULT_LIMIT);
    let node = ctx.create_object("Node", "node", None).unwrap();
    undo.push(&mut ctx, "create", None);
    ctx.set(&visibility(&node), false).unwrap();
    undo.push(&mut ctx, "hide", None);

    undo.set_index(&mut ctx, 1, false).unwrap();
    let once = serialize_project(ctx.project(), ctx.factory()).unwrap();
    undo.set_index(&mut ctx, 1, false).unwrap();
    undo.set_index(&mut ctx, 1, true).unwrap();
    let twice = serialize_project(ctx.project(), ctx.factory()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(visibility(&node).as_bool(ctx.project()), Some(true));
}

#[test]
fn test_broken_link_warning_follows_validity() {
    init_logging();
    let mut source = context();
    let a = source.create_object("Node", "a", None).unwrap();
    let b = source.create_object("Node", "b", None).unwrap();
    let mut doc = project_to_ir(source.project(), source.factory());
    doc.links.push(void_ir::IrLink::new(
        a.clone(),
        void_reflection::path_of(["gone"]),
        b.clone(),
        void_reflection::path_of(["visibility"]),
    ));

    let loaded = project_from_ir(doc, source.factory());
    let mut ctx = context();
    ctx.adopt_project(loaded.project, &loaded.migration_warnings);

    let end = visibility(&b);
    let link = ctx.project().link_ending_at(&end).unwrap();
    assert!(!link.valid);
    let item = ctx.errors().get_error(&end).unwrap();
    assert_eq!(item.category, ErrorCategory::BrokenLink);
    assert_eq!(item.level, ErrorLevel::Warning);

    ctx.remove_link(&end);
    ctx.update_link_validity();
    assert!(ctx.errors().get_error(&end).is_none());
}

#[test]
fn test_migration_warning_clears_on_first_edit() {
    init_logging();
    let mut source = context();
    let node = source.create_object("Node", "node", None).unwrap();
    let mut doc = project_to_ir(source.project(), source.factory());
    doc.migration_warnings
        .insert(node.clone(), vec!["Transform order changed".to_string()]);

    let loaded = project_from_ir(doc, source.factory());
    let mut ctx = context();
    ctx.adopt_project(loaded.project, &loaded.migration_warnings);

    let handle = ValueHandle::for_object(node.clone());
    let item = ctx.errors().get_error(&handle).unwrap();
    assert_eq!(item.category, ErrorCategory::MigrationWarning);

    ctx.set(&visibility(&node), false).unwrap();
    assert!(ctx.errors().get_error(&handle).is_none());
}

const V1_CAMERA: &str = r#"{
    "fileVersion": 1,
    "instances": [
        {
            "typeName": "PerspectiveCamera",
            "id": "9a1b2c3d-0000-4000-8000-000000000002",
            "properties": {
                "objectName": "camera",
                "viewport": { "i1": 0, "i2": 0, "i3": 800, "i4": 600 },
                "near": 0.5,
                "far": 100,
                "fov": 40,
                "aspect": 1.5
            }
        }
    ],
    "links": []
}"#;

#[test]
fn test_v1_camera_loads_with_split_viewport() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.vproj");
    std::fs::write(&path, V1_CAMERA).unwrap();

    let mut cmd = CommandInterface::new(context(), DataModelConfig::default());
    cmd.load(&path).unwrap();

    let camera = ObjectId::new("9a1b2c3d-0000-4000-8000-000000000002");
    let int = |name: &str| ValueHandle::property(camera.clone(), name).as_int(cmd.project());
    assert_eq!(int("viewPortOffsetX"), Some(0));
    assert_eq!(int("viewPortOffsetY"), Some(0));
    assert_eq!(int("viewPortWidth"), Some(800));
    assert_eq!(int("viewPortHeight"), Some(600));
    assert!(cmd.project().project_id().is_some());
}

#[test]
fn test_load_rejects_wrong_extension_and_future_version() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = CommandInterface::new(context(), DataModelConfig::default());

    let json = dir.path().join("scene.json");
    std::fs::write(&json, V1_CAMERA).unwrap();
    assert!(matches!(cmd.load(&json), Err(LoadError::Extension { .. })));

    let future = dir.path().join("future.vproj");
    std::fs::write(&future, r#"{ "fileVersion": 9999, "instances": [], "links": [] }"#).unwrap();
    assert!(matches!(cmd.load(&future), Err(LoadError::Document(_))));
}

#[test]
fn test_external_project_mapping_rejections() {
    init_logging();
    let mut project = Project::new();
    project.set_current_path("/work/scene.vproj");
    let mut ctx = context();
    ctx.adopt_project(project, &BTreeMap::new());
    ctx.create_object("ProjectSettings", "scene", Some(ObjectId::new("own")))
        .unwrap();

    let reject = |ctx: &mut Context, id: &str, path: &str| match ctx.add_external_project_mapping(
        id,
        Path::new(path),
        "lib",
    ) {
        Err(ContextError::ExternalReference(e)) => e,
        other => panic!("expected rejection, got {:?}", other),
    };

    assert_eq!(reject(&mut ctx, "", "/work/lib.vproj"), ExtrefError::EmptyProjectId);
    assert_eq!(reject(&mut ctx, "own", "/work/lib.vproj"), ExtrefError::LoopById);
    assert_eq!(reject(&mut ctx, "lib", "/work/scene.vproj"), ExtrefError::LoopByPath);

    ctx.add_external_project_mapping("lib", Path::new("/work/lib.vproj"), "lib")
        .unwrap();
    assert_eq!(
        ctx.project().external_projects()["lib"].path,
        "lib.vproj".to_string()
    );
    assert_eq!(reject(&mut ctx, "lib", "/work/other.vproj"), ExtrefError::DuplicatePath);
    let changed = reject(&mut ctx, "lib2", "/work/lib.vproj");
    assert_eq!(
        changed.to_string(),
        "Project ID change for file '/work/lib.vproj' detected: 'lib' renamed to 'lib2'"
    );
}

#[test]
fn test_prefab_instance_follows_template_through_commands() {
    init_logging();
    let mut cmd = CommandInterface::new(context(), DataModelConfig::default());
    let prefab = cmd.create_object("Prefab", "prefab", None).unwrap();
    let node = cmd.create_object("Node", "node", Some(&prefab)).unwrap();
    let instance = cmd.create_object("PrefabInstance", "instance", None).unwrap();
    cmd.set(&ValueHandle::property(instance.clone(), "template"), prefab.clone())
        .unwrap();

    let copy = derive_object_id(&node, &instance);
    assert!(cmd.project().contains(&copy));

    cmd.set(&visibility(&node), false).unwrap();
    assert_eq!(visibility(&copy).as_bool(cmd.project()), Some(false));

    assert!(cmd.undo());
    assert_eq!(visibility(&copy).as_bool(cmd.project()), Some(true));
    assert!(cmd.undo());
    assert!(!cmd.project().contains(&copy));
}

#[test]
fn test_paste_into_other_project_clears_foreign_references() {
    init_logging();
    let mut source = context();
    let mesh = source.create_object("Mesh", "mesh", None).unwrap();
    let node = source.create_object("MeshNode", "node", None).unwrap();
    source
        .set(&ValueHandle::property(node.clone(), "mesh"), mesh.clone())
        .unwrap();
    let text = source.copy_objects(&[node], false).unwrap();

    let mut target = context();
    let pasted = target.paste_objects(&text, None).unwrap();
    assert_eq!(pasted.len(), 1);
    assert_eq!(
        ValueHandle::property(pasted[0].clone(), "mesh").as_ref_id(target.project()),
        None
    );
}

#[test]
fn test_file_change_reloads_resource() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("cube.gltf");

    let mut ctx = context().with_file_watcher(|sender| Box::new(MemoryFileWatcher::new(sender)));
    let mesh = ctx.create_object("Mesh", "mesh", None).unwrap();
    let uri = ValueHandle::property(mesh.clone(), "uri");
    ctx.set(&uri, file.to_string_lossy().to_string()).unwrap();
    assert_eq!(ctx.errors().get_error(&uri).unwrap().category, ErrorCategory::FileLoad);
    assert!(ctx.watched_paths().any(|p| p == file.as_path()));

    std::fs::write(&file, b"glTF").unwrap();
    assert!(ctx.file_change_sender().send(FileChange::modified(&file)));
    assert_eq!(ctx.process_file_changes(), 1);
    assert_eq!(
        ctx.errors().get_error(&uri).unwrap().category,
        ErrorCategory::ResourceInfo
    );
}

#[test]
fn test_load_with_missing_external_project_marks_objects() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let factory = factory();

    let mut library = Context::new(factory.clone());
    library
        .create_object("ProjectSettings", "library", Some(ObjectId::new("lib")))
        .unwrap();
    let node = library.create_object("Node", "shared", None).unwrap();
    let library_path = dir.path().join("library.vproj");
    std::fs::write(&library_path, serialize_project(library.project(), &factory).unwrap()).unwrap();

    let scene_path = dir.path().join("scene.vproj");
    let mut cmd = CommandInterface::new(Context::new(factory.clone()), DataModelConfig::default());
    cmd.add_external_references(&library_path, &[node.clone()]).unwrap();
    cmd.save(&scene_path).unwrap();

    std::fs::remove_file(&library_path).unwrap();
    let mut reloaded = CommandInterface::new(Context::new(factory), DataModelConfig::default());
    reloaded.load(&scene_path).unwrap();
    let item = reloaded
        .context()
        .errors()
        .get_error(&ValueHandle::for_object(node))
        .unwrap();
    assert_eq!(item.category, ErrorCategory::ExternalReference);
}

#[test]
fn test_save_as_keeps_external_paths_through_undo() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let factory = factory();

    let mut library = Context::new(factory.clone());
    library
        .create_object("ProjectSettings", "library", Some(ObjectId::new("lib")))
        .unwrap();
    let shared = library.create_object("Node", "shared", None).unwrap();
    let library_path = dir.path().join("library.vproj");
    std::fs::write(&library_path, serialize_project(library.project(), &factory).unwrap()).unwrap();

    let mut cmd = CommandInterface::new(Context::new(factory.clone()), DataModelConfig::default());
    cmd.add_external_references(&library_path, &[shared]).unwrap();
    let prefab = cmd.create_object("Prefab", "prefab", None).unwrap();
    cmd.create_object("Node", "content", Some(&prefab)).unwrap();
    let instance = cmd.create_object("PrefabInstance", "instance", None).unwrap();
    cmd.set(&ValueHandle::property(instance, "template"), prefab).unwrap();
    cmd.save(dir.path().join("main.vproj")).unwrap();
    assert_eq!(cmd.project().external_projects()["lib"].path, "library.vproj");

    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let moved = dir.path().join("sub").join("main.vproj");
    cmd.save(&moved).unwrap();
    assert_eq!(cmd.project().external_projects()["lib"].path, "../library.vproj");
    assert_eq!(cmd.project().lookup_external_project_path("lib"), Some(library_path.clone()));

    cmd.create_object("Node", "later", None).unwrap();
    assert!(cmd.undo());
    assert_eq!(cmd.project().lookup_external_project_path("lib"), Some(library_path.clone()));

    cmd.save(&moved).unwrap();
    let reloaded = load_project(&moved, &factory, &DataModelConfig::default()).unwrap();
    assert_eq!(reloaded.project.lookup_external_project_path("lib"), Some(library_path));
}

#[test]
fn test_nested_annotations_survive_save_and_load() {
    init_logging();
    let mut ctx = context();
    let layer = ctx.create_object("RenderLayer", "layer", None).unwrap();
    let tags = ValueHandle::property(layer.clone(), "renderableTags");
    let list = ctx
        .add_property(&tags, "list", Property::new(ArrayValue::new(ValueType::Int)))
        .unwrap();
    ctx.add_property(&list, "", Property::new(7).with_annotation(Annotation::Hidden))
        .unwrap();
    ctx.add_property(&list, "", Property::new(8)).unwrap();

    let text = serialize_project(ctx.project(), ctx.factory()).unwrap();
    let loaded = deserialize_project(&text, ctx.factory()).unwrap();
    let hidden = list.at(0).resolve(&loaded.project).unwrap();
    assert_eq!(hidden.value, Value::Int(7));
    assert_eq!(hidden.annotations, vec![Annotation::Hidden]);
    assert!(list.at(1).resolve(&loaded.project).unwrap().annotations.is_empty());
    assert_eq!(
        loaded.project.get_instance_by_id(&layer),
        ctx.project().get_instance_by_id(&layer)
    );
}

/// Per node: name, parent index, visibility, x translation in quarters,
/// and table entries as (value, annotated)
type NodeSpec = (String, Option<usize>, bool, i32, Vec<(i32, bool)>);

fn node_graph() -> impl Strategy<Value = (Vec<NodeSpec>, Vec<(usize, usize, bool, bool)>)> {
    (1usize..8).prop_flat_map(|n| {
        let nodes = (0..n)
            .map(|i| {
                (
                    "[a-z]{1,8}",
                    proptest::option::of(0..i.max(1)),
                    any::<bool>(),
                    -4000i32..4000,
                    proptest::collection::vec((-100i32..100, any::<bool>()), 0..4),
                )
            })
            .collect::<Vec<_>>();
        let links = proptest::collection::vec((0..n, 0..n, any::<bool>(), any::<bool>()), 0..6);
        (nodes, links)
    })
}

fn translation(id: &ObjectId) -> ValueHandle {
    ValueHandle::property(id.clone(), "translation")
}

/// Give a render layer table entries of several types, some annotated
fn fill_tags(ctx: &mut Context, layer: &ObjectId, entries: &[(i32, bool)]) {
    let tags = ValueHandle::property(layer.clone(), "renderableTags");
    let list = ctx
        .add_property(&tags, "list", Property::new(ArrayValue::new(ValueType::Int)))
        .unwrap();
    for (j, (value, annotated)) in entries.iter().enumerate() {
        let mut entry = if j % 2 == 0 {
            Property::new(*value)
        } else {
            Property::new(f64::from(*value) / 4.0)
        };
        let mut element = Property::new(*value);
        if *annotated {
            entry = entry.with_annotation(Annotation::display_name(format!("tag {}", j)));
            element = element.with_annotation(Annotation::Hidden);
        }
        ctx.add_property(&tags, &format!("t{}", j), entry).unwrap();
        ctx.add_property(&list, "", element).unwrap();
    }
}

proptest! {
    #[test]
    fn serialization_round_trip((nodes, links) in node_graph()) {
        let mut ctx = context();
        let ids: Vec<ObjectId> = nodes
            .iter()
            .enumerate()
            .map(|(i, (name, ..))| ctx.create_object("Node", name, Some(ObjectId::new(format!("n{}", i)))).unwrap())
            .collect();
        for (i, (name, parent, visible, x, entries)) in nodes.iter().enumerate() {
            if let Some(parent) = parent.filter(|p| *p < i) {
                ctx.move_scenegraph_child(&ids[i], Some(&ids[parent]), None).unwrap();
            }
            ctx.set(&visibility(&ids[i]), *visible).unwrap();
            ctx.set(&translation(&ids[i]).get("x"), f64::from(*x) / 4.0).unwrap();
            if !entries.is_empty() {
                let layer = ctx
                    .create_object("RenderLayer", name, Some(ObjectId::new(format!("l{}", i))))
                    .unwrap();
                fill_tags(&mut ctx, &layer, entries);
            }
        }

        let mut linked = 0;
        for (start, end, weak, whole_struct) in links {
            if start == end {
                continue;
            }
            let (start, end) = if whole_struct {
                (translation(&ids[start]), translation(&ids[end]))
            } else {
                (visibility(&ids[start]), visibility(&ids[end]))
            };
            match ctx.add_link(&start, &end, weak) {
                Ok(_) => linked += 1,
                Err(ContextError::LinkLoop { .. }) => prop_assert!(!weak),
                Err(e) => prop_assert!(false, "unexpected link failure: {}", e),
            }
        }
        prop_assert!(linked == 0 || ctx.project().link_count() > 0);

        let text = serialize_project(ctx.project(), ctx.factory()).unwrap();
        let loaded = deserialize_project(&text, ctx.factory()).unwrap();
        prop_assert_eq!(loaded.project.instance_ids(), ctx.project().instance_ids());
        for id in ctx.project().instance_ids() {
            prop_assert_eq!(loaded.project.get_instance_by_id(id), ctx.project().get_instance_by_id(id));
        }
        let before: Vec<&Link> = ctx.project().links().collect();
        let after: Vec<&Link> = loaded.project.links().collect();
        prop_assert_eq!(before, after);
    }
}
