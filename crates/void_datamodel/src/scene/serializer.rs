//! Conversion between live projects and documents
//!
//! ## Architecture
//!
//! ```text
//!   save:  Project ──project_to_ir──► IrDocument ──write_document──► JSON
//!   load:  JSON ──read_document──► IrDocument ──migrate──► IrDocument ──project_from_ir──► Project
//! ```
//!
//! ## Key Concepts
//!
//! - **Name matching**: an IR property is kept only if the live kind
//!   declares a property of that name and type. Everything else is
//!   dropped with a warning; this is where migration shims disappear.
//! - **Repair**: references to missing objects are cleared, links with a
//!   missing endpoint object are dropped and duplicate links are
//!   discarded. Loading continues.
//! - **Compaction**: saving may delete reconstructible prefab instance
//!   content first; the state is restored through the undo stack after
//!   the document is written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use void_core::ObjectId;
use void_ir::{
    migrate, read_document, write_document, DocumentError, GeneratedFile, IrDocument, IrObject,
    CURRENT_FILE_VERSION,
};
use void_reflection::{Annotation, PathSegment, Property, Table, Value};

use crate::assets::prefab::compact_prefab_instances;
use crate::config::DataModelConfig;
use crate::context::mutation::ModelAccess;
use crate::context::Context;
use crate::core::link::Link;
use crate::core::object::EditorObject;
use crate::core::project::Project;
use crate::error::{LoadError, SaveError};
use crate::history::UndoStack;
use crate::types::ObjectFactory;

/// A project read from a document, before it is adopted by a context
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub project: Project,
    /// Advisories from migration steps, by object
    pub migration_warnings: BTreeMap<ObjectId, Vec<String>>,
    /// Files synthesised by migration steps, relative to the project folder
    pub generated_files: Vec<GeneratedFile>,
}

/// IR form of an object. Property annotations declared by the object's
/// kind are left out; they are restored from the kind on load.
pub fn object_to_ir(object: &EditorObject, factory: &ObjectFactory) -> IrObject {
    let descriptor = factory.get_type(object.type_name());
    let mut properties = Table::new();
    for (name, property) in object.properties().iter() {
        let mut property = property.clone();
        if let Some(declared) = descriptor.and_then(|d| d.property(name)) {
            property.annotations.retain(|a| !declared.annotations.contains(a));
        }
        properties.set(name, property);
    }
    IrObject {
        id: object.id().clone(),
        type_name: object.type_name().to_string(),
        properties,
        annotations: object.annotations().to_vec(),
    }
}

/// IR form of a whole project at the current file version
pub fn project_to_ir(project: &Project, factory: &ObjectFactory) -> IrDocument {
    let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
    doc.objects = project.instances().map(|o| object_to_ir(o, factory)).collect();
    doc.links = project.links().map(Into::into).collect();
    doc.external_projects = project.external_projects().clone();
    doc
}

pub fn serialize_project(project: &Project, factory: &ObjectFactory) -> Result<String, DocumentError> {
    write_document(&project_to_ir(project, factory), &factory.property_type_map())
}

/// Copy a stored value into a live default. Structs are matched field by
/// field; everything else must have the same type. Returns whether the
/// stored value was used.
fn merge_value(live: &mut Value, stored: Value, context: &str) -> bool {
    if let (Value::Struct(live_struct), Value::Struct(stored_struct)) = (&mut *live, &stored) {
        if live_struct.type_name() == stored_struct.type_name() {
            for (name, field) in stored_struct.iter() {
                let merged = live_struct.get_mut(name).is_some_and(|l| {
                    let merged = merge_value(&mut l.value, field.value.clone(), context);
                    if merged {
                        merge_annotations(l, field.annotations.clone());
                    }
                    merged
                });
                if !merged {
                    log::warn!("Dropping unsupported or deprecated property '{}.{}'", context, name);
                }
            }
            return true;
        }
    }
    if live.value_type() == stored.value_type() {
        *live = stored;
        true
    } else {
        false
    }
}

/// Add stored annotations the live property does not declare already
fn merge_annotations(live: &mut Property, stored: Vec<Annotation>) {
    for annotation in stored {
        if !live.annotations.contains(&annotation) {
            live.annotations.push(annotation);
        }
    }
}

/// Build a live object by name-matching an IR object against its kind
pub fn object_from_ir(ir: IrObject, factory: &ObjectFactory) -> Option<EditorObject> {
    let name = ir.name().to_string();
    let mut object = match factory.create(&ir.type_name, ir.id.clone(), &name) {
        Ok(object) => object,
        Err(_) => {
            log::warn!("Dropping object of unknown type '{}' ({})", ir.type_name, ir.id);
            return None;
        }
    };

    for (property_name, stored) in ir.properties.into_entries() {
        let context = format!("{}.{}", ir.id, property_name);
        let merged = match object.properties_mut().get_mut(&property_name) {
            Some(live) => {
                let merged = merge_value(&mut live.value, stored.value, &context);
                if merged {
                    merge_annotations(live, stored.annotations);
                }
                merged
            }
            None => false,
        };
        if !merged {
            log::warn!(
                "Dropping unsupported or deprecated property '{}' of {} '{}'",
                property_name,
                ir.type_name,
                name
            );
        }
    }
    for annotation in ir.annotations {
        object.set_annotation(annotation);
    }
    Some(object)
}

/// Null out references to objects not in `known`
fn clear_missing_references(object: &mut EditorObject, known: &BTreeSet<ObjectId>) {
    let missing: BTreeSet<ObjectId> = object
        .referenced_ids()
        .into_iter()
        .filter(|id| !known.contains(id))
        .collect();
    if missing.is_empty() {
        return;
    }
    let id = object.id().clone();
    let mut changed = Vec::new();
    for (name, property) in object.properties_mut().iter_mut() {
        let mut prefix = vec![PathSegment::from(name)];
        property.value.remove_references_to(&missing, &mut prefix, &mut changed);
    }
    for path in changed {
        log::warn!(
            "Reference to missing object cleared: {}.{}",
            id,
            void_reflection::format_path(&path)
        );
    }
}

/// Build a live project from a migrated document
pub fn project_from_ir(mut doc: IrDocument, factory: &ObjectFactory) -> LoadedDocument {
    let migration_warnings = std::mem::take(&mut doc.migration_warnings);
    let generated_files = std::mem::take(&mut doc.generated_files);

    let mut objects: Vec<EditorObject> = doc
        .objects
        .into_iter()
        .filter_map(|o| object_from_ir(o, factory))
        .collect();
    let known: BTreeSet<ObjectId> = objects.iter().map(|o| o.id().clone()).collect();
    for object in &mut objects {
        clear_missing_references(object, &known);
    }

    let mut project = Project::new();
    for object in objects {
        let id = object.id().clone();
        if !project.insert_object(object) {
            log::warn!("Dropping object with duplicate id {}", id);
        }
    }

    let links: Vec<Link> = doc
        .links
        .iter()
        .filter(|l| {
            let keep = project.contains(&l.start_object) && project.contains(&l.end_object);
            if !keep {
                log::warn!(
                    "Dropping link with missing endpoint object: {} -> {}",
                    l.start_object,
                    l.end_object
                );
            }
            keep
        })
        .map(Link::from)
        .collect();
    for link in Project::deduplicate_links(links) {
        project.add_link(link);
    }
    project.set_external_projects(doc.external_projects);

    LoadedDocument {
        project,
        migration_warnings,
        generated_files,
    }
}

/// Read, migrate and convert a document
pub fn deserialize_project(text: &str, factory: &ObjectFactory) -> Result<LoadedDocument, LoadError> {
    let doc = read_document(text, &factory.property_type_map())?;
    let version = doc.file_version;
    let doc = migrate(doc)?;
    if version < CURRENT_FILE_VERSION {
        log::info!("Migrated document from file version {} to {}", version, CURRENT_FILE_VERSION);
    }
    Ok(project_from_ir(doc, factory))
}

/// Load a project file.
///
/// Files synthesised by migration are written next to the project when
/// the configuration asks for it; failing to write them is not fatal.
pub fn load_project(
    path: impl AsRef<Path>,
    factory: &ObjectFactory,
    config: &DataModelConfig,
) -> Result<LoadedDocument, LoadError> {
    let path = path.as_ref();
    if !config.is_project_file(path) {
        return Err(LoadError::Extension {
            path: path.to_path_buf(),
            expected: config.project_extension.clone(),
        });
    }
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut loaded = deserialize_project(&text, factory)?;
    loaded.project.set_current_path(path);

    if config.write_migration_files {
        let folder = loaded.project.current_folder().map(Path::to_path_buf).unwrap_or_default();
        for file in &loaded.generated_files {
            let target = folder.join(&file.relative_path);
            let written = target
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&target, &file.contents));
            match written {
                Ok(()) => log::info!("Wrote migration file {:?}", target),
                Err(e) => log::warn!("Cannot write migration file {:?}: {}", target, e),
            }
        }
    }
    log::info!("Loaded project {:?} ({} objects)", path, loaded.project.len());
    Ok(loaded)
}

/// Save the context's project.
///
/// With compaction enabled, reconstructible prefab instance content is
/// deleted before serializing and restored through `undo` afterwards.
pub fn save_project(
    context: &mut Context,
    undo: &mut UndoStack,
    path: impl AsRef<Path>,
    config: &DataModelConfig,
) -> Result<(), SaveError> {
    let path = path.as_ref();
    if !config.is_project_file(path) {
        return Err(SaveError::Extension {
            path: path.to_path_buf(),
            expected: config.project_extension.clone(),
        });
    }
    context.project_mut().set_current_path(path);

    let compacted = if config.compact_prefab_instances {
        compact_prefab_instances(context)
    } else {
        0
    };
    let text = serialize_project(context.project(), context.factory());
    if compacted > 0 {
        undo.set_index(context, undo.index(), true)?;
    }

    fs::write(path, text?).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved project {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_reflection::vec3f;

    fn factory() -> ObjectFactory {
        ObjectFactory::with_default_types()
    }

    #[test]
    fn test_declared_annotations_are_not_written() {
        let factory = factory();
        let node = factory.create("Node", ObjectId::new("n"), "n").unwrap();
        let ir = object_to_ir(&node, &factory);
        assert!(ir.property("translation").unwrap().annotations.is_empty());
        assert!(ir.property("children").unwrap().annotations.is_empty());
    }

    #[test]
    fn test_unknown_kinds_and_properties_are_dropped() {
        let factory = factory();
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        doc.objects.push(IrObject::new(ObjectId::new("x"), "Teapot", "x"));
        let mut node = IrObject::new(ObjectId::new("n"), "Node", "node");
        node.set("legacy", Property::new(3));
        node.set("visibility", Property::new(false));
        node.set("scaling", Property::new(7));
        doc.objects.push(node);

        let loaded = project_from_ir(doc, &factory);
        assert_eq!(loaded.project.len(), 1);
        let node = loaded.project.get_instance_by_id(&ObjectId::new("n")).unwrap();
        assert!(node.property("legacy").is_none());
        assert_eq!(node.value("visibility").unwrap().as_bool(), Some(false));
        assert_eq!(node.value("scaling").unwrap(), &Value::from(vec3f(1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_stored_annotations_are_merged() {
        let factory = factory();
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        let mut node = IrObject::new(ObjectId::new("n"), "Node", "node");
        node.set("visibility", Property::new(false).with_annotation(Annotation::Hidden));
        let mut translation = vec3f(1.0, 2.0, 3.0);
        if let Some(x) = translation.get_mut("x") {
            x.annotations.push(Annotation::RangeDouble { min: 0.0, max: 5.0 });
        }
        node.set("translation", Property::new(translation));
        doc.objects.push(node);

        let loaded = project_from_ir(doc, &factory);
        let node = loaded.project.get_instance_by_id(&ObjectId::new("n")).unwrap();
        let visibility = node.property("visibility").unwrap();
        assert_eq!(visibility.value.as_bool(), Some(false));
        assert!(visibility.is_hidden());
        assert!(visibility.link_capability().is_some());
        let x = node.resolve(&[PathSegment::from("translation"), PathSegment::from("x")]).unwrap();
        assert_eq!(x.value.as_double(), Some(1.0));
        assert_eq!(x.range_double(), Some((0.0, 5.0)));
    }

    #[test]
    fn test_missing_references_and_links_are_repaired() {
        let factory = factory();
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        let mut mesh_node = IrObject::new(ObjectId::new("m"), "MeshNode", "m");
        mesh_node.set("mesh", Property::new(ObjectId::new("gone")));
        doc.objects.push(mesh_node);
        doc.links.push(void_ir::IrLink::new(
            ObjectId::new("gone"),
            vec!["translation".into()],
            ObjectId::new("m"),
            vec!["translation".into()],
        ));

        let loaded = project_from_ir(doc, &factory);
        let node = loaded.project.get_instance_by_id(&ObjectId::new("m")).unwrap();
        assert_eq!(node.value("mesh"), Some(&Value::Ref(None)));
        assert_eq!(loaded.project.link_count(), 0);
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(&path, "{}").unwrap();
        let error = load_project(&path, &factory(), &DataModelConfig::default()).unwrap_err();
        assert!(matches!(error, LoadError::Extension { .. }));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let text = format!(r#"{{"fileVersion": {}, "instances": [], "links": []}}"#, CURRENT_FILE_VERSION + 1);
        let error = deserialize_project(&text, &factory()).unwrap_err();
        assert!(matches!(error, LoadError::Document(DocumentError::UnsupportedVersion { .. })));
    }
}
