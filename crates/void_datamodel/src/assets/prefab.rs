//! Prefab instancing
//!
//! ## Architecture
//!
//! ```text
//!   Prefab P                      PrefabInstance I (template = P)
//!   ├── c1                        ├── derive(c1, I)
//!   │   └── c2        ──sync──►   │   └── derive(c2, I)
//!   └── script                    └── derive(script, I)   inputs may diverge
//! ```
//!
//! ## Key Concepts
//!
//! - **Derived ids**: the copy of prefab object `c` inside instance `i` has
//!   id `derive(c, i)`, so instance content can be dropped on save and
//!   rebuilt on load with identical ids.
//! - **Order**: a prefab containing an instance of another prefab is synced
//!   after it.
//! - **Loops**: an instance nested inside its own template, directly or
//!   through other prefabs, gets an error and its template is cleared.
//! - **Overrides**: `inputs` of scripts directly below the instance and
//!   links ending on them belong to the instance and are never synced.

use std::collections::{BTreeMap, BTreeSet};

use void_core::{derive_object_id, ErrorCategory, ErrorLevel, ObjectId};
use void_reflection::Value;

use crate::context::mutation::ModelAccess;
use crate::context::Context;
use crate::core::handle::ValueHandle;
use crate::core::link::Link;
use crate::core::object::{EditorObject, CHILDREN_PROPERTY};
use crate::core::project::Project;

pub const PREFAB: &str = "Prefab";
pub const PREFAB_INSTANCE: &str = "PrefabInstance";
pub const TEMPLATE_PROPERTY: &str = "template";

const SCRIPT: &str = "LuaScript";
const OVERRIDABLE_PROPERTY: &str = "inputs";

fn find_ancestor_of_type(project: &Project, id: &ObjectId, kind: &str) -> Option<ObjectId> {
    let mut current = Some(id.clone());
    while let Some(candidate) = current {
        if project.get_instance_by_id(&candidate)?.type_name() == kind {
            return Some(candidate);
        }
        current = project.parent_of(&candidate).cloned();
    }
    None
}

/// The prefab containing `id`, the object itself included
pub fn find_containing_prefab(project: &Project, id: &ObjectId) -> Option<ObjectId> {
    find_ancestor_of_type(project, id, PREFAB)
}

/// The innermost prefab instance containing `id`, the object itself included
pub fn find_containing_prefab_instance(project: &Project, id: &ObjectId) -> Option<ObjectId> {
    find_ancestor_of_type(project, id, PREFAB_INSTANCE)
}

/// Template of an instance, if it points at a prefab
pub fn template_of(project: &Project, instance: &ObjectId) -> Option<ObjectId> {
    let template = project
        .get_instance_by_id(instance)?
        .value(TEMPLATE_PROPERTY)?
        .as_ref_id()?
        .clone();
    (project.get_instance_by_id(&template)?.type_name() == PREFAB).then_some(template)
}

/// Instances whose content is owned by the prefab update: not nested in
/// another instance and not imported from an external project
fn synced_instances(project: &Project) -> Vec<ObjectId> {
    project
        .instances()
        .filter(|o| o.type_name() == PREFAB_INSTANCE && !o.is_external_reference())
        .filter(|o| {
            project
                .parent_of(o.id())
                .and_then(|parent| find_containing_prefab_instance(project, parent))
                .is_none()
        })
        .map(|o| o.id().clone())
        .collect()
}

/// Prefabs instantiated somewhere inside `prefab`
fn dependencies(project: &Project, prefab: &ObjectId) -> BTreeSet<ObjectId> {
    project
        .descendants(prefab)
        .iter()
        .filter(|id| project.get_instance_by_id(id).is_some_and(|o| o.type_name() == PREFAB_INSTANCE))
        .filter_map(|id| template_of(project, id))
        .collect()
}

fn reaches(project: &Project, from: &ObjectId, target: &ObjectId, visited: &mut BTreeSet<ObjectId>) -> bool {
    if from == target {
        return true;
    }
    if !visited.insert(from.clone()) {
        return false;
    }
    dependencies(project, from)
        .iter()
        .any(|next| reaches(project, next, target, visited))
}

/// Whether giving `instance` the template `template` nests the instance
/// inside itself
pub fn creates_prefab_loop(project: &Project, instance: &ObjectId, template: &ObjectId) -> bool {
    match find_containing_prefab(project, instance) {
        Some(container) => reaches(project, template, &container, &mut BTreeSet::new()),
        None => false,
    }
}

fn order_visit(project: &Project, prefab: &ObjectId, visiting: &mut BTreeSet<ObjectId>, order: &mut Vec<ObjectId>) {
    if order.contains(prefab) || !visiting.insert(prefab.clone()) {
        return;
    }
    for dependency in dependencies(project, prefab) {
        order_visit(project, &dependency, visiting, order);
    }
    order.push(prefab.clone());
}

/// Prefabs ordered so that every prefab comes after the prefabs it
/// instantiates
pub fn prefab_update_order(project: &Project) -> Vec<ObjectId> {
    let mut order = Vec::new();
    let mut visiting = BTreeSet::new();
    for prefab in project.instances().filter(|o| o.type_name() == PREFAB) {
        order_visit(project, prefab.id(), &mut visiting, &mut order);
    }
    order
}

/// Content of `prefab` mapped to its copies inside `instance`
fn instance_mapping(project: &Project, prefab: &ObjectId, instance: &ObjectId) -> BTreeMap<ObjectId, ObjectId> {
    let mut mapping: BTreeMap<ObjectId, ObjectId> = project
        .descendants(prefab)
        .into_iter()
        .map(|c| {
            let derived = derive_object_id(&c, instance);
            (c, derived)
        })
        .collect();
    mapping.insert(prefab.clone(), instance.clone());
    mapping
}

fn translate_handle(handle: &ValueHandle, mapping: &BTreeMap<ObjectId, ObjectId>) -> ValueHandle {
    let object = mapping
        .get(handle.object_id())
        .unwrap_or(handle.object_id())
        .clone();
    ValueHandle::new(object, handle.path().to_vec())
}

fn is_overridable(project: &Project, object: &EditorObject, owner: &ObjectId) -> bool {
    object.type_name() == SCRIPT && project.parent_of(object.id()) == Some(owner)
}

/// Links inside the prefab content, translated into the instance
fn expected_links(project: &Project, mapping: &BTreeMap<ObjectId, ObjectId>, prefab: &ObjectId) -> Vec<Link> {
    mapping
        .keys()
        .filter(|id| *id != prefab)
        .flat_map(|id| project.links_ending_at(id))
        .map(|link| Link {
            start: translate_handle(&link.start, mapping),
            end: translate_handle(&link.end, mapping),
            valid: link.valid,
            weak: link.weak,
        })
        .collect()
}

/// Bring every prefab instance in line with its template.
///
/// Returns the number of instances that were synced.
pub fn update_prefab_instances(context: &mut Context) -> usize {
    let instances = synced_instances(context.project());

    for instance in &instances {
        let handle = ValueHandle::for_object(instance.clone());
        let template = template_of(context.project(), instance);
        match template {
            Some(template) if creates_prefab_loop(context.project(), instance, &template) => {
                log::warn!("Prefab loop detected for instance {}", instance);
                let template_handle = ValueHandle::property(instance.clone(), TEMPLATE_PROPERTY);
                if let Err(e) = context.assign_value(&template_handle, Value::Ref(None)) {
                    log::error!("Cannot clear template of {}: {}", instance, e);
                }
                context.add_error(
                    ErrorCategory::General,
                    ErrorLevel::Error,
                    handle,
                    "Prefab instance is nested inside its own template; template cleared.",
                );
            }
            _ => context.remove_error_of(&handle, ErrorCategory::General),
        }
    }

    let mut synced = 0;
    for prefab in prefab_update_order(context.project()) {
        let users: Vec<ObjectId> = instances
            .iter()
            .filter(|i| template_of(context.project(), i).as_ref() == Some(&prefab))
            .cloned()
            .collect();
        for instance in users {
            sync_instance(context, &prefab, &instance);
            synced += 1;
        }
    }

    for instance in &instances {
        if context.project().contains(instance) && template_of(context.project(), instance).is_none() {
            let content = context.project().descendants(instance);
            if !content.is_empty() {
                context.delete_objects_with(&content, false, false);
            }
        }
    }
    synced
}

fn sync_instance(context: &mut Context, prefab: &ObjectId, instance: &ObjectId) {
    let mapping = instance_mapping(context.project(), prefab, instance);
    let translate = |id: &ObjectId| Some(mapping.get(id).unwrap_or(id).clone());
    let wanted: BTreeSet<&ObjectId> = mapping.values().collect();

    let stale: Vec<ObjectId> = context
        .project()
        .descendants(instance)
        .into_iter()
        .filter(|id| !wanted.contains(id))
        .collect();
    if !stale.is_empty() {
        context.delete_objects_with(&stale, false, false);
    }

    // copies are built in prefab preorder so parents precede children
    let mut created = BTreeSet::new();
    let mut copies = Vec::new();
    for source in context.project().descendants(prefab) {
        let derived = mapping[&source].clone();
        if context.project().contains(&derived) {
            continue;
        }
        if let Some(object) = context.project().get_instance_by_id(&source) {
            copies.push(object.copy_as(derived.clone(), &translate));
            created.insert(derived);
        }
    }
    if !copies.is_empty() {
        if let Err(e) = context.insert_objects(copies) {
            log::error!("Cannot instantiate prefab {} into {}: {}", prefab, instance, e);
            return;
        }
    }

    let mut updates: Vec<(ValueHandle, Value)> = Vec::new();
    for (source, derived) in mapping.iter().filter(|(_, d)| !created.contains(*d)) {
        let project = context.project();
        let (Some(source_object), Some(derived_object)) =
            (project.get_instance_by_id(source), project.get_instance_by_id(derived))
        else {
            continue;
        };
        let owner = source == prefab;
        let overridable = is_overridable(project, source_object, prefab);
        for (name, property) in source_object.properties().iter() {
            if owner && name != CHILDREN_PROPERTY {
                continue;
            }
            if overridable && name == OVERRIDABLE_PROPERTY {
                continue;
            }
            let expected = property.value.deep_clone_with(&translate);
            if derived_object.value(name) != Some(&expected) {
                updates.push((ValueHandle::property(derived.clone(), name), expected));
            }
        }
    }
    for (handle, value) in updates {
        if let Err(e) = context.assign_value(&handle, value) {
            log::warn!("Cannot sync {} from prefab: {}", handle, e);
        }
    }

    sync_links(context, prefab, instance, &mapping, &created);
}

fn sync_links(
    context: &mut Context,
    prefab: &ObjectId,
    instance: &ObjectId,
    mapping: &BTreeMap<ObjectId, ObjectId>,
    created: &BTreeSet<ObjectId>,
) {
    let project = context.project();
    let expected: BTreeMap<ValueHandle, Link> = expected_links(project, mapping, prefab)
        .into_iter()
        .map(|l| (l.end.clone(), l))
        .collect();
    let owned_end = |end: &ObjectId| {
        project
            .get_instance_by_id(end)
            .is_some_and(|o| is_overridable(project, o, instance))
    };

    let stale: Vec<ValueHandle> = mapping
        .values()
        .filter(|id| *id != instance)
        .flat_map(|id| project.links_ending_at(id))
        .filter(|link| {
            let matches = expected
                .get(&link.end)
                .is_some_and(|e| e.start == link.start && e.weak == link.weak);
            !matches && !owned_end(link.end_object())
        })
        .map(|link| link.end.clone())
        .collect();
    let missing: Vec<Link> = expected
        .values()
        .filter(|link| {
            let present = project
                .link_ending_at(&link.end)
                .is_some_and(|l| l.start == link.start && l.weak == link.weak);
            !present && (created.contains(link.end_object()) || !owned_end(link.end_object()))
        })
        .cloned()
        .collect();

    for end in stale {
        context.remove_link(&end);
    }
    for link in missing {
        context.insert_link(link);
    }
}

/// Whether an instance's content can be deleted on save and rebuilt from
/// its prefab on load without loss
pub fn can_compact(project: &Project, instance: &ObjectId) -> bool {
    let Some(object) = project.get_instance_by_id(instance) else {
        return false;
    };
    if object.type_name() != PREFAB_INSTANCE || object.is_external_reference() {
        return false;
    }
    let Some(prefab) = template_of(project, instance) else {
        return false;
    };
    let content = project.descendants(instance);
    if content.is_empty() {
        return false;
    }
    let mapping = instance_mapping(project, &prefab, instance);
    let translate = |id: &ObjectId| Some(mapping.get(id).unwrap_or(id).clone());
    let expected: BTreeSet<&ObjectId> = mapping.values().filter(|id| *id != instance).collect();
    let actual: BTreeSet<&ObjectId> = content.iter().collect();
    if expected != actual {
        return false;
    }

    // no diverging values
    for (source, derived) in mapping.iter().filter(|(s, _)| *s != &prefab) {
        let (Some(source_object), Some(derived_object)) =
            (project.get_instance_by_id(source), project.get_instance_by_id(derived))
        else {
            return false;
        };
        for (name, property) in source_object.properties().iter() {
            if derived_object.value(name) != Some(&property.value.deep_clone_with(&translate)) {
                return false;
            }
        }
    }

    // only replicated links may touch the content
    let replicated: BTreeSet<Link> = expected_links(project, &mapping, &prefab)
        .into_iter()
        .map(|l| l.with_validity(true))
        .collect();
    for id in &content {
        for link in project.links_touching(id) {
            if !replicated.contains(&link.clone().with_validity(true)) {
                return false;
            }
        }
    }

    // no references into the content from outside
    content.iter().all(|id| {
        project
            .referencing(id)
            .iter()
            .all(|holder| holder == instance || actual.contains(holder))
    })
}

/// Delete the content of every compactable instance; returns the number of
/// instances compacted
pub fn compact_prefab_instances(context: &mut Context) -> usize {
    let compactable: Vec<ObjectId> = synced_instances(context.project())
        .into_iter()
        .filter(|i| can_compact(context.project(), i))
        .collect();
    for instance in &compactable {
        let content = context.project().descendants(instance);
        context.delete_objects_with(&content, false, false);
    }
    if !compactable.is_empty() {
        log::debug!("Compacted {} prefab instance(s)", compactable.len());
    }
    compactable.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectFactory;
    use std::sync::Arc;

    fn context() -> Context {
        Context::new(Arc::new(ObjectFactory::with_default_types()))
    }

    fn prefab_with_child(ctx: &mut Context) -> (ObjectId, ObjectId) {
        let prefab = ctx.create_object(PREFAB, "prefab", None).unwrap();
        let node = ctx.create_object("Node", "node", None).unwrap();
        ctx.move_scenegraph_child(&node, Some(&prefab), None).unwrap();
        (prefab, node)
    }

    fn instantiate(ctx: &mut Context, prefab: &ObjectId) -> ObjectId {
        let instance = ctx.create_object(PREFAB_INSTANCE, "instance", None).unwrap();
        ctx.set(&ValueHandle::property(instance.clone(), TEMPLATE_PROPERTY), prefab.clone())
            .unwrap();
        instance
    }

    #[test]
    fn test_instance_content_has_derived_ids() {
        let mut ctx = context();
        let (prefab, node) = prefab_with_child(&mut ctx);
        let instance = instantiate(&mut ctx, &prefab);
        assert_eq!(update_prefab_instances(&mut ctx), 1);

        let copy = derive_object_id(&node, &instance);
        assert!(ctx.project().contains(&copy));
        assert_eq!(ctx.project().children_of(&instance), vec![copy.clone()]);
        assert_eq!(ctx.project().get_instance_by_id(&copy).unwrap().name(), "node");
    }

    #[test]
    fn test_values_follow_prefab() {
        let mut ctx = context();
        let (prefab, node) = prefab_with_child(&mut ctx);
        let instance = instantiate(&mut ctx, &prefab);
        update_prefab_instances(&mut ctx);

        ctx.set(&ValueHandle::property(node.clone(), "visibility"), false).unwrap();
        update_prefab_instances(&mut ctx);
        let copy = ValueHandle::property(derive_object_id(&node, &instance), "visibility");
        assert_eq!(copy.as_bool(ctx.project()), Some(false));
    }

    #[test]
    fn test_removed_prefab_child_is_removed_from_instance() {
        let mut ctx = context();
        let (prefab, node) = prefab_with_child(&mut ctx);
        let instance = instantiate(&mut ctx, &prefab);
        update_prefab_instances(&mut ctx);

        ctx.delete_objects(&[node.clone()]);
        update_prefab_instances(&mut ctx);
        assert!(!ctx.project().contains(&derive_object_id(&node, &instance)));
        assert!(ctx.project().children_of(&instance).is_empty());
    }

    #[test]
    fn test_instance_inside_own_template_is_a_loop() {
        let mut ctx = context();
        let (prefab, _) = prefab_with_child(&mut ctx);
        let instance = instantiate(&mut ctx, &prefab);
        ctx.move_scenegraph_child(&instance, Some(&prefab), None).unwrap();
        assert!(creates_prefab_loop(ctx.project(), &instance, &prefab));

        update_prefab_instances(&mut ctx);
        assert_eq!(template_of(ctx.project(), &instance), None);
        let error = ctx.errors().get_error(&ValueHandle::for_object(instance)).unwrap();
        assert_eq!(error.level, ErrorLevel::Error);
    }

    #[test]
    fn test_nested_prefabs_update_in_dependency_order() {
        let mut ctx = context();
        let (inner, _) = prefab_with_child(&mut ctx);
        let outer = ctx.create_object(PREFAB, "outer", None).unwrap();
        let nested = instantiate(&mut ctx, &inner);
        ctx.move_scenegraph_child(&nested, Some(&outer), None).unwrap();

        let order = prefab_update_order(ctx.project());
        let position = |id: &ObjectId| order.iter().position(|p| p == id).unwrap();
        assert!(position(&inner) < position(&outer));

        let top = instantiate(&mut ctx, &outer);
        update_prefab_instances(&mut ctx);
        // outer content (nested instance + its content) is copied into top
        assert_eq!(ctx.project().descendants(&top).len(), 2);
    }

    #[test]
    fn test_compaction_round_trip() {
        let mut ctx = context();
        let (prefab, node) = prefab_with_child(&mut ctx);
        let instance = instantiate(&mut ctx, &prefab);
        update_prefab_instances(&mut ctx);
        assert!(can_compact(ctx.project(), &instance));

        assert_eq!(compact_prefab_instances(&mut ctx), 1);
        assert!(ctx.project().descendants(&instance).is_empty());
        update_prefab_instances(&mut ctx);
        assert!(ctx.project().contains(&derive_object_id(&node, &instance)));
    }

    #[test]
    fn test_outside_reference_prevents_compaction() {
        let mut ctx = context();
        let (prefab, node) = prefab_with_child(&mut ctx);
        let instance = instantiate(&mut ctx, &prefab);
        update_prefab_instances(&mut ctx);

        let pass = ctx.create_object("RenderPass", "pass", None).unwrap();
        ctx.set(
            &ValueHandle::property(pass, "camera"),
            derive_object_id(&node, &instance),
        )
        .unwrap();
        assert!(!can_compact(ctx.project(), &instance));
    }
}
