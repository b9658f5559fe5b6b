//! External references
//!
//! Objects can be imported read-only from other project files. An imported
//! object keeps its id and carries an `ExternalReference { project_id }`
//! annotation; the project map translates that id to a path relative to
//! the current project file.
//!
//! ## Architecture
//!
//! ```text
//!   Context ──annotation──► project_id ──mapping──► path
//!                                                    │
//!                          ExternalProjectsStore ◄───┘  (read-only, cached)
//!                                    │
//!            update_external_references: delete vanished, import missing,
//!                                        copy values, replicate links
//! ```
//!
//! ## Key Concepts
//!
//! - **Source of truth**: an imported object always mirrors its source
//!   project. Local edits are rejected as read-only.
//! - **Transitive imports**: an object the source itself imported keeps
//!   its original project id; the mapping for that project is registered
//!   locally, resolved from the source's folder.
//! - **Loops**: a project reachable from itself, by path or by id, fails
//!   with the matching loop error while loading.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use void_core::{ErrorCategory, ErrorLevel, ObjectId};
use void_reflection::Annotation;

use crate::config::DataModelConfig;
use crate::context::mutation::ModelAccess;
use crate::context::Context;
use crate::core::handle::ValueHandle;
use crate::core::link::Link;
use crate::core::object::EditorObject;
use crate::core::paths::{normalize, to_document_path};
use crate::core::project::{Project, PROJECT_SETTINGS};
use crate::error::{ContextError, ExtrefError, Result};
use crate::scene::serializer::load_project;
use crate::types::ObjectFactory;

/// Read-only cache of external projects, keyed by absolute path
#[derive(Debug)]
pub struct ExternalProjectsStore {
    factory: Arc<ObjectFactory>,
    config: DataModelConfig,
    projects: BTreeMap<PathBuf, Arc<Project>>,
    /// Paths currently being loaded, outermost first
    loading_paths: Vec<PathBuf>,
    loading_ids: Vec<ObjectId>,
}

impl ExternalProjectsStore {
    pub fn new(factory: Arc<ObjectFactory>, config: &DataModelConfig) -> Self {
        // external projects are never written back, not even migration output
        let config = DataModelConfig {
            write_migration_files: false,
            ..config.clone()
        };
        Self {
            factory,
            config,
            projects: BTreeMap::new(),
            loading_paths: Vec::new(),
            loading_ids: Vec::new(),
        }
    }

    /// Mark the project that imports everything else, so references back to
    /// it are detected as loops
    pub fn set_root(&mut self, path: Option<&Path>, project_id: Option<&ObjectId>) {
        self.loading_paths = path.map(normalize).into_iter().collect();
        self.loading_ids = project_id.cloned().into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.projects.contains_key(&normalize(path))
    }

    /// Drop a cached project, e.g. after its file changed
    pub fn forget(&mut self, path: &Path) -> bool {
        self.projects.remove(&normalize(path)).is_some()
    }

    pub fn clear(&mut self) {
        self.projects.clear();
    }

    /// Load a project and, recursively, the projects it references
    pub fn load(&mut self, path: &Path) -> std::result::Result<Arc<Project>, ExtrefError> {
        let path = normalize(path);
        if self.loading_paths.contains(&path) {
            return Err(ExtrefError::LoopByPath);
        }
        if let Some(project) = self.projects.get(&path) {
            return Ok(project.clone());
        }

        self.loading_paths.push(path.clone());
        let result = self.load_uncached(&path);
        self.loading_paths.pop();

        let project = Arc::new(result?);
        self.projects.insert(path.clone(), project.clone());
        log::debug!("Cached external project {:?}", path);
        Ok(project)
    }

    fn load_uncached(&mut self, path: &Path) -> std::result::Result<Project, ExtrefError> {
        let loaded = load_project(path, &self.factory, &self.config).map_err(|e| ExtrefError::LoadFailed {
            path: to_document_path(path),
            reason: e.to_string(),
        })?;
        let project = loaded.project;

        let Some(id) = project.project_id().cloned() else {
            return Ok(project);
        };
        if self.loading_ids.contains(&id) {
            return Err(ExtrefError::LoopById);
        }
        self.loading_ids.push(id);
        let nested: std::result::Result<(), ExtrefError> = project
            .external_projects()
            .keys()
            .filter_map(|nested_id| project.lookup_external_project_path(nested_id))
            .try_for_each(|nested_path| self.load(&nested_path).map(|_| ()));
        self.loading_ids.pop();
        nested?;
        Ok(project)
    }
}

/// Ids of local objects imported from `project_id`
fn imported_from(project: &Project, project_id: &str) -> Vec<ObjectId> {
    project
        .instances()
        .filter(|o| o.external_project_id() == Some(project_id))
        .map(|o| o.id().clone())
        .collect()
}

/// Record an external reference error on every object imported from
/// `project_id`
fn report(context: &mut Context, project_id: &str, error: &ExtrefError) {
    log::warn!("External project '{}': {}", project_id, error);
    for id in imported_from(context.project(), project_id) {
        context.add_error(
            ErrorCategory::ExternalReference,
            ErrorLevel::Error,
            ValueHandle::for_object(id),
            error.to_string(),
        );
    }
}

/// Project id an object copied from `source` belongs to
fn origin_of<'a>(object: &'a EditorObject, source_id: &'a str) -> &'a str {
    object.external_project_id().unwrap_or(source_id)
}

/// `roots` plus everything they reach through references in `source`,
/// excluding the project settings
fn reference_closure(source: &Project, roots: impl IntoIterator<Item = ObjectId>) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<ObjectId> = roots.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        let Some(object) = source.get_instance_by_id(&id) else {
            continue;
        };
        if object.type_name() == PROJECT_SETTINGS || !seen.insert(id) {
            continue;
        }
        queue.extend(object.referenced_ids());
    }
    seen
}

/// Register the mappings for objects the source itself imported
fn map_transitive_projects(
    context: &mut Context,
    source: &Project,
    source_id: &str,
    ids: &BTreeSet<ObjectId>,
) -> std::result::Result<(), ExtrefError> {
    let origins: BTreeSet<&str> = ids
        .iter()
        .filter_map(|id| source.get_instance_by_id(id))
        .filter_map(EditorObject::external_project_id)
        .filter(|origin| *origin != source_id)
        .collect();
    for origin in origins {
        let path = source
            .lookup_external_project_path(origin)
            .ok_or_else(|| ExtrefError::UnknownProject(origin.to_string()))?;
        let name = source.lookup_external_project_name(origin).unwrap_or_default().to_string();
        if context.project_mut().add_external_project_mapping(origin, &path, &name)? {
            context.recorders_mut().record_external_projects_changed();
        }
    }
    Ok(())
}

/// Annotated copies of `ids`. References resolve against the local project
/// and the copied set; anything else is cleared.
fn imported_copies(context: &Context, source: &Project, source_id: &str, ids: &BTreeSet<ObjectId>) -> Vec<EditorObject> {
    let local = context.project();
    let translate = |id: &ObjectId| (ids.contains(id) || local.contains(id)).then(|| id.clone());
    source
        .instances()
        .filter(|o| ids.contains(o.id()))
        .map(|o| {
            let mut copy = o.copy_as(o.id().clone(), &translate);
            copy.set_annotation(Annotation::ExternalReference {
                project_id: origin_of(o, source_id).to_string(),
            });
            copy
        })
        .collect()
}

/// Make the links ending on `synced` match the source. Returns the number
/// of links added or removed.
fn sync_links(context: &mut Context, source: &Project, synced: &BTreeSet<ObjectId>) -> usize {
    let wanted: BTreeSet<(ValueHandle, ValueHandle, bool)> = synced
        .iter()
        .flat_map(|id| source.links_ending_at(id))
        .filter(|l| context.project().contains(l.start_object()))
        .map(|l| (l.start.clone(), l.end.clone(), l.weak))
        .collect();
    let stale: Vec<ValueHandle> = synced
        .iter()
        .flat_map(|id| context.project().links_ending_at(id))
        .filter(|l| !wanted.contains(&(l.start.clone(), l.end.clone(), l.weak)))
        .map(|l| l.end.clone())
        .collect();

    let mut changed = 0;
    for end in stale {
        if context.remove_link(&end) {
            changed += 1;
        }
    }
    for (start, end, weak) in wanted {
        let link = if weak { Link::weak(start, end) } else { Link::new(start, end) };
        if context.insert_link(link) {
            changed += 1;
        }
    }
    changed
}

/// Bring the objects imported from one project in line with its source.
/// Returns the number of objects created, deleted or changed.
fn sync_project(context: &mut Context, source: &Project, project_id: &str) -> std::result::Result<usize, ContextError> {
    let local = imported_from(context.project(), project_id);
    let (present, vanished): (Vec<ObjectId>, Vec<ObjectId>) =
        local.into_iter().partition(|id| source.contains(id));
    let mut changed = context.delete_objects_with(&vanished, false, false);

    let closure = reference_closure(source, present.iter().cloned());
    let missing: BTreeSet<ObjectId> = closure
        .iter()
        .filter(|id| match context.project().get_instance_by_id(id) {
            Some(object) if !object.is_external_reference() => {
                log::warn!("Local object '{}' shadows an external object; not imported", id);
                false
            }
            Some(_) => false,
            None => true,
        })
        .cloned()
        .collect();
    map_transitive_projects(context, source, project_id, &missing)?;
    let copies = imported_copies(context, source, project_id, &missing);
    changed += context.insert_objects(copies)?.len();

    let synced: BTreeSet<ObjectId> = present.iter().chain(&missing).cloned().collect();
    let translate = |id: &ObjectId| context.project().contains(id).then(|| id.clone());
    let mut updates: Vec<(ValueHandle, void_reflection::Value)> = Vec::new();
    for id in &present {
        let (Some(theirs), Some(ours)) = (source.get_instance_by_id(id), context.project().get_instance_by_id(id))
        else {
            continue;
        };
        let copy = theirs.copy_as(id.clone(), &translate);
        for (name, property) in copy.properties().iter() {
            if ours.value(name) != Some(&property.value) {
                updates.push((ValueHandle::property(id.clone(), name), property.value.clone()));
            }
        }
    }
    let touched: BTreeSet<ObjectId> = updates.iter().map(|(h, _)| h.object_id().clone()).collect();
    for (handle, value) in updates {
        context.assign_value(&handle, value)?;
    }
    changed += touched.len();
    changed += sync_links(context, source, &synced);
    Ok(changed)
}

/// Re-sync every imported object from its source project.
///
/// Projects that fail to load or changed their id leave an error item on
/// the affected objects and are skipped. Loops abort the update. Returns
/// the number of objects and links that changed.
pub fn update_external_references(
    context: &mut Context,
    store: &mut ExternalProjectsStore,
) -> std::result::Result<usize, ContextError> {
    let project_ids: BTreeSet<String> = context
        .project()
        .instances()
        .filter_map(EditorObject::external_project_id)
        .map(str::to_string)
        .collect();
    store.set_root(context.project().current_path(), context.project().project_id());

    let mut changed = 0;
    for project_id in project_ids {
        let Some(path) = context.project().lookup_external_project_path(&project_id) else {
            report(context, &project_id, &ExtrefError::UnknownProject(project_id.clone()));
            continue;
        };
        let source = match store.load(&path) {
            Ok(source) => source,
            Err(e @ (ExtrefError::LoopById | ExtrefError::LoopByPath)) => return Err(e.into()),
            Err(e) => {
                report(context, &project_id, &e);
                continue;
            }
        };
        let source_id = source.project_id().map(ObjectId::as_str).unwrap_or_default();
        if source_id != project_id {
            let error = ExtrefError::ProjectIdChanged {
                path: to_document_path(&path),
                old: project_id.clone(),
                new: source_id.to_string(),
            };
            report(context, &project_id, &error);
            continue;
        }

        for id in imported_from(context.project(), &project_id) {
            context.remove_error_of(&ValueHandle::for_object(id), ErrorCategory::ExternalReference);
        }
        if context
            .project_mut()
            .update_external_project_name(&project_id, source.project_name())
        {
            context.recorders_mut().record_external_projects_changed();
        }
        changed += sync_project(context, &source, &project_id)?;
    }

    if !context.project_mut().gc_external_project_mapping().is_empty() {
        context.recorders_mut().record_external_projects_changed();
    }
    if changed > 0 {
        log::info!("External reference update changed {} item(s)", changed);
    }
    Ok(changed)
}

/// Import `ids` from the project at `path`, together with their scene graph
/// descendants and everything they reference. Returns the imported ids;
/// objects imported before are skipped.
pub fn add_external_references(
    context: &mut Context,
    store: &mut ExternalProjectsStore,
    path: &Path,
    ids: &[ObjectId],
) -> Result<Vec<ObjectId>> {
    store.set_root(context.project().current_path(), context.project().project_id());
    let source = store.load(path)?;
    let source_id = source.project_id().cloned().ok_or(ExtrefError::EmptyProjectId)?;

    let mut roots = Vec::new();
    for id in ids {
        if !source.contains(id) {
            return Err(ExtrefError::MissingObject {
                project: to_document_path(path),
                object: id.clone(),
            }
            .into());
        }
        roots.push(id.clone());
        roots.extend(source.descendants(id));
    }
    let closure = reference_closure(&source, roots);
    let mut wanted = BTreeSet::new();
    for id in closure {
        match context.project().get_instance_by_id(&id) {
            Some(object) if !object.is_external_reference() => return Err(ContextError::DuplicateId(id)),
            Some(_) => {}
            None => {
                wanted.insert(id);
            }
        }
    }

    context.add_external_project_mapping(source_id.as_str(), path, source.project_name())?;
    map_transitive_projects(context, &source, source_id.as_str(), &wanted)?;
    let copies = imported_copies(context, &source, source_id.as_str(), &wanted);
    let imported = context.insert_objects(copies)?;
    sync_links(context, &source, &wanted);
    log::info!(
        "Imported {} object(s) from external project '{}'",
        imported.len(),
        source.project_name()
    );
    Ok(imported)
}
