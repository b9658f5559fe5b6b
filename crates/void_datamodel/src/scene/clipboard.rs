//! Copy and paste of object subsets
//!
//! Clipboard text is a regular document restricted to the copied objects
//! and the links ending on them. Pasting migrates it like a file, assigns
//! fresh ids and translates references: references into the copied set
//! follow the copies, references to objects present in the target project
//! are kept, everything else is cleared.

use std::collections::{BTreeMap, BTreeSet};

use void_core::ObjectId;
use void_ir::{migrate, read_document, write_document, IrDocument, CURRENT_FILE_VERSION};
use void_reflection::AnnotationKind;

use super::serializer::{object_from_ir, object_to_ir};
use crate::context::mutation::ModelAccess;
use crate::context::Context;
use crate::core::handle::ValueHandle;
use crate::core::project::Project;
use crate::error::{ContextError, Result};
use crate::types::ObjectFactory;

/// Serialize `ids`, and their scene graph descendants if `deep`
pub fn copy_objects(project: &Project, factory: &ObjectFactory, ids: &[ObjectId], deep: bool) -> Result<String> {
    let mut selected: BTreeSet<ObjectId> = BTreeSet::new();
    for id in ids {
        if !project.contains(id) {
            return Err(ContextError::NoSuchObject(id.clone()));
        }
        selected.insert(id.clone());
        if deep {
            selected.extend(project.descendants(id));
        }
    }

    let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
    doc.objects = project
        .instances()
        .filter(|o| selected.contains(o.id()))
        .map(|o| object_to_ir(o, factory))
        .collect();
    doc.links = selected
        .iter()
        .flat_map(|id| project.links_ending_at(id))
        .map(Into::into)
        .collect();
    log::debug!("Copied {} object(s)", doc.objects.len());
    write_document(&doc, &factory.property_type_map()).map_err(|e| ContextError::Clipboard(e.to_string()))
}

/// Insert clipboard content with fresh ids. Top-level pasted objects are
/// moved below `parent` if one is given. Returns the new ids.
pub fn paste_objects(context: &mut Context, text: &str, parent: Option<&ObjectId>) -> Result<Vec<ObjectId>> {
    if let Some(parent) = parent {
        if !context.project().contains(parent) {
            return Err(ContextError::NoSuchObject(parent.clone()));
        }
    }
    let factory = context.factory().clone();
    let doc = read_document(text, &factory.property_type_map())
        .map_err(|e| ContextError::Clipboard(e.to_string()))?;
    let doc = migrate(doc).map_err(|e| ContextError::Clipboard(e.to_string()))?;

    let objects: Vec<_> = doc
        .objects
        .into_iter()
        .filter_map(|o| object_from_ir(o, &factory))
        .collect();
    let fresh: BTreeMap<ObjectId, ObjectId> = objects
        .iter()
        .map(|o| (o.id().clone(), ObjectId::generate()))
        .collect();
    let project = context.project();
    let translate = |id: &ObjectId| match fresh.get(id) {
        Some(copy) => Some(copy.clone()),
        None => project.contains(id).then(|| id.clone()),
    };

    let pasted_children: BTreeSet<ObjectId> = objects.iter().flat_map(|o| o.children()).collect();
    let top_level: Vec<ObjectId> = objects
        .iter()
        .filter(|o| !pasted_children.contains(o.id()))
        .map(|o| fresh[o.id()].clone())
        .collect();
    let copies: Vec<_> = objects
        .iter()
        .map(|o| {
            let mut copy = o.copy_as(fresh[o.id()].clone(), &translate);
            copy.remove_annotation(AnnotationKind::ExternalReference);
            copy
        })
        .collect();
    let links: Vec<(ValueHandle, ValueHandle, bool)> = doc
        .links
        .iter()
        .filter_map(|l| {
            let start = translate(&l.start_object)?;
            let end = fresh.get(&l.end_object)?.clone();
            Some((
                ValueHandle::new(start, l.start_path.clone()),
                ValueHandle::new(end, l.end_path.clone()),
                l.weak,
            ))
        })
        .collect();

    let ids = context.insert_objects(copies)?;
    if let Some(parent) = parent {
        for id in &top_level {
            context.move_scenegraph_child(id, Some(parent), None)?;
        }
    }
    for (start, end, weak) in links {
        if let Err(e) = context.add_link(&start, &end, weak) {
            log::debug!("Pasted link skipped: {}", e);
        }
    }
    log::debug!("Pasted {} object(s)", ids.len());
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_paste_assigns_fresh_ids_and_translates_children() {
        let mut ctx = Context::new(Arc::new(ObjectFactory::with_default_types()));
        let parent = ctx.create_object("Node", "parent", None).unwrap();
        let child = ctx.create_object("Node", "child", None).unwrap();
        ctx.move_scenegraph_child(&child, Some(&parent), None).unwrap();

        let text = ctx.copy_objects(&[parent.clone()], true).unwrap();
        let pasted = ctx.paste_objects(&text, None).unwrap();
        assert_eq!(pasted.len(), 2);
        assert!(!pasted.contains(&parent) && !pasted.contains(&child));

        let copies: Vec<_> = pasted
            .iter()
            .filter(|id| ctx.project().parent_of(id).is_none())
            .collect();
        assert_eq!(copies.len(), 1);
        assert_eq!(ctx.project().children_of(copies[0]).len(), 1);
    }

    #[test]
    fn test_paste_keeps_references_to_existing_objects() {
        let mut ctx = Context::new(Arc::new(ObjectFactory::with_default_types()));
        let mesh = ctx.create_object("Mesh", "mesh", None).unwrap();
        let node = ctx.create_object("MeshNode", "node", None).unwrap();
        ctx.set(&ValueHandle::property(node.clone(), "mesh"), mesh.clone()).unwrap();

        let text = ctx.copy_objects(&[node], false).unwrap();
        let target = ctx.create_object("Node", "target", None).unwrap();
        let pasted = ctx.paste_objects(&text, Some(&target)).unwrap();

        let copy = ValueHandle::property(pasted[0].clone(), "mesh");
        assert_eq!(copy.as_ref_id(ctx.project()), Some(&mesh));
        assert_eq!(ctx.project().parent_of(&pasted[0]), Some(&target));
    }

    #[test]
    fn test_malformed_clipboard_is_rejected() {
        let mut ctx = Context::new(Arc::new(ObjectFactory::with_default_types()));
        assert!(matches!(
            ctx.paste_objects("not json", None),
            Err(ContextError::Clipboard(_))
        ));
    }
}
