//! Project - the object arena and link index
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── Project ────────────────────────┐
//! │ order: [id, id, ...]          objects: id -> Arc<Object> │
//! │                                                          │
//! │ derived indexes (rebuilt from object contents):          │
//! │   parents      child -> parent                           │
//! │   referencing  target -> {objects holding a Ref to it}   │
//! │                                                          │
//! │ links: end handle -> Link      by_start / by_end: id -> ends │
//! │ link_graph: strong links only, used for loop detection   │
//! │ external_projects: id -> (relative path, name)           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Arena**: objects are owned here and addressed by id; nothing else
//!   holds them. Back references are indexes derived from the objects'
//!   reference values, never stored on the objects themselves.
//! - **Shared snapshots**: objects sit behind `Arc` and are copied on
//!   write, so an undo snapshot shares every unchanged object with the live
//!   project.
//! - **One link per end**: the link table is keyed by end property.
//!
//! Mutation is crate-internal; everything outside the crate edits a project
//! through [`Context`](crate::Context).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use void_core::ObjectId;
use void_ir::ExternalProjectInfo;

use super::handle::ValueHandle;
use super::link::Link;
use super::link_graph::LinkGraph;
use super::object::{EditorObject, NAME_PROPERTY};
use super::paths::{normalize, relative_to, resolve_in, to_document_path};
use crate::error::ExtrefError;

/// Kind name of the per-project settings object, whose id is the project id
pub const PROJECT_SETTINGS: &str = "ProjectSettings";

/// Frozen project state, sharing unchanged objects with its source
#[derive(Debug, Clone, Default)]
pub struct ProjectSnapshot {
    pub(crate) order: Vec<ObjectId>,
    pub(crate) objects: HashMap<ObjectId, Arc<EditorObject>>,
    pub(crate) links: Vec<Link>,
    pub(crate) external_projects: BTreeMap<String, ExternalProjectInfo>,
    pub(crate) code_controlled: BTreeSet<ObjectId>,
    /// Folder the relative external project paths were stored against
    pub(crate) folder: Option<PathBuf>,
}

impl ProjectSnapshot {
    pub fn object(&self, id: &ObjectId) -> Option<&EditorObject> {
        self.objects.get(id).map(Arc::as_ref)
    }

    pub fn object_ids(&self) -> &[ObjectId] {
        &self.order
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Whether both snapshots share the same allocation for `id`
    pub fn shares_object(&self, other: &ProjectSnapshot, id: &ObjectId) -> bool {
        match (self.objects.get(id), other.objects.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The object pool of one document
#[derive(Debug, Clone, Default)]
pub struct Project {
    current_path: Option<PathBuf>,
    order: Vec<ObjectId>,
    objects: HashMap<ObjectId, Arc<EditorObject>>,

    links: BTreeMap<ValueHandle, Link>,
    links_by_start: HashMap<ObjectId, BTreeSet<ValueHandle>>,
    links_by_end: HashMap<ObjectId, BTreeSet<ValueHandle>>,
    link_graph: LinkGraph,

    parents: HashMap<ObjectId, ObjectId>,
    outgoing: HashMap<ObjectId, BTreeSet<ObjectId>>,
    referencing: HashMap<ObjectId, BTreeSet<ObjectId>>,

    external_projects: BTreeMap<String, ExternalProjectInfo>,
    code_controlled: BTreeSet<ObjectId>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- paths ---------------------------------------------------------

    /// Absolute path of the project file, once saved or loaded
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn current_folder(&self) -> Option<&Path> {
        self.current_path.as_deref().and_then(Path::parent)
    }

    /// Move the project file, rebasing relative external project paths
    pub fn set_current_path(&mut self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let old_folder = self.current_folder().map(Path::to_path_buf);
        rebase_external_paths(&mut self.external_projects, old_folder.as_deref(), path.parent());
        self.current_path = Some(path);
    }

    // ---- objects -------------------------------------------------------

    /// Id of the settings object, which identifies the project
    pub fn project_id(&self) -> Option<&ObjectId> {
        self.instances()
            .find(|o| o.type_name() == PROJECT_SETTINGS)
            .map(EditorObject::id)
    }

    pub fn project_name(&self) -> &str {
        self.instances()
            .find(|o| o.type_name() == PROJECT_SETTINGS)
            .map(EditorObject::name)
            .unwrap_or_default()
    }

    /// Object ids in insertion order
    pub fn instance_ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// Objects in insertion order
    pub fn instances(&self) -> impl Iterator<Item = &EditorObject> {
        self.order.iter().filter_map(|id| self.objects.get(id).map(Arc::as_ref))
    }

    pub fn get_instance_by_id(&self, id: &ObjectId) -> Option<&EditorObject> {
        self.objects.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn parent_of(&self, id: &ObjectId) -> Option<&ObjectId> {
        self.parents.get(id)
    }

    pub fn children_of(&self, id: &ObjectId) -> Vec<ObjectId> {
        self.get_instance_by_id(id).map(EditorObject::children).unwrap_or_default()
    }

    /// Objects holding a reference to `id`, children lists included
    pub fn referencing(&self, id: &ObjectId) -> BTreeSet<ObjectId> {
        self.referencing.get(id).cloned().unwrap_or_default()
    }

    /// All scene graph descendants of `id`, depth first, excluding `id`
    pub fn descendants(&self, id: &ObjectId) -> Vec<ObjectId> {
        let mut result = Vec::new();
        let mut visited = BTreeSet::from([id.clone()]);
        let mut stack: Vec<ObjectId> = self.children_of(id).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            stack.extend(self.children_of(&current).into_iter().rev());
            result.push(current);
        }
        result
    }

    /// Whether `ancestor` is `id` or one of its scene graph ancestors
    pub fn is_in_subtree(&self, id: &ObjectId, ancestor: &ObjectId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(object) = current {
            if object == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.order.len() {
                break;
            }
            current = self.parents.get(object);
        }
        false
    }

    /// Objects without a scene graph parent, in insertion order
    pub fn top_level_ids(&self) -> Vec<ObjectId> {
        self.order
            .iter()
            .filter(|id| !self.parents.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Find an object by display name
    pub fn find_by_name(&self, name: &str) -> Option<&EditorObject> {
        self.instances()
            .find(|o| o.value(NAME_PROPERTY).and_then(|v| v.as_str()) == Some(name))
    }

    pub fn is_code_controlled(&self, id: &ObjectId) -> bool {
        self.code_controlled.contains(id)
    }

    pub fn code_controlled(&self) -> &BTreeSet<ObjectId> {
        &self.code_controlled
    }

    // ---- links ---------------------------------------------------------

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// The link ending exactly at `end`
    pub fn link_ending_at(&self, end: &ValueHandle) -> Option<&Link> {
        self.links.get(end)
    }

    pub fn links_starting_at(&self, object: &ObjectId) -> Vec<&Link> {
        self.indexed_links(&self.links_by_start, object)
    }

    pub fn links_ending_at(&self, object: &ObjectId) -> Vec<&Link> {
        self.indexed_links(&self.links_by_end, object)
    }

    /// Links with either endpoint on `object`
    pub fn links_touching(&self, object: &ObjectId) -> Vec<&Link> {
        let mut links = self.links_starting_at(object);
        for link in self.links_ending_at(object) {
            if link.start_object() != object {
                links.push(link);
            }
        }
        links
    }

    fn indexed_links(&self, index: &HashMap<ObjectId, BTreeSet<ValueHandle>>, object: &ObjectId) -> Vec<&Link> {
        index
            .get(object)
            .map(|ends| ends.iter().filter_map(|end| self.links.get(end)).collect())
            .unwrap_or_default()
    }

    /// Whether a strong link from `start` to `end` would close a cycle
    pub fn creates_loop(&self, start: &ValueHandle, end: &ValueHandle) -> bool {
        self.link_graph.creates_loop(start.object_id(), end.object_id())
    }

    /// Check a link list for two links on the same end property
    pub fn check_link_duplicates(links: &[Link]) -> bool {
        let mut ends = BTreeSet::new();
        links.iter().any(|l| !ends.insert(&l.end))
    }

    /// Keep the first link for every end property
    pub fn deduplicate_links(links: Vec<Link>) -> Vec<Link> {
        let mut ends = BTreeSet::new();
        links
            .into_iter()
            .filter(|link| {
                if ends.insert(link.end.clone()) {
                    true
                } else {
                    log::warn!("Duplicate link discarded: {} -> {}", link.start, link.end);
                    false
                }
            })
            .collect()
    }

    // ---- external projects ---------------------------------------------

    pub fn external_projects(&self) -> &BTreeMap<String, ExternalProjectInfo> {
        &self.external_projects
    }

    pub fn has_external_project_mapping(&self, project_id: &str) -> bool {
        self.external_projects.contains_key(project_id)
    }

    /// Absolute path of an external project
    pub fn lookup_external_project_path(&self, project_id: &str) -> Option<PathBuf> {
        let info = self.external_projects.get(project_id)?;
        Some(resolve_in(self.current_folder(), &info.path))
    }

    pub fn lookup_external_project_name(&self, project_id: &str) -> Option<&str> {
        self.external_projects.get(project_id).map(|i| i.name.as_str())
    }

    pub fn uses_external_project_by_path(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.external_projects
            .values()
            .any(|info| resolve_in(self.current_folder(), &info.path) == path)
    }

    // ---- snapshots -----------------------------------------------------

    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            order: self.order.clone(),
            objects: self.objects.clone(),
            links: self.links.values().cloned().collect(),
            external_projects: self.external_projects.clone(),
            code_controlled: self.code_controlled.clone(),
            folder: self.current_folder().map(Path::to_path_buf),
        }
    }

    // ---- crate-internal mutation ---------------------------------------

    pub(crate) fn insert_object(&mut self, object: EditorObject) -> bool {
        let id = object.id().clone();
        if self.objects.contains_key(&id) {
            return false;
        }
        self.objects.insert(id.clone(), Arc::new(object));
        self.order.push(id.clone());
        self.reindex(&id);
        true
    }

    pub(crate) fn remove_object(&mut self, id: &ObjectId) -> Option<Arc<EditorObject>> {
        let object = self.objects.remove(id)?;
        self.order.retain(|o| o != id);
        for target in self.outgoing.remove(id).unwrap_or_default() {
            self.unreference(&target, id);
            if self.parents.get(&target) == Some(id) {
                self.parents.remove(&target);
            }
        }
        self.parents.remove(id);
        self.referencing.remove(id);
        self.code_controlled.remove(id);
        Some(object)
    }

    /// Edit an object in place and refresh the derived indexes
    pub(crate) fn modify_object<R>(&mut self, id: &ObjectId, edit: impl FnOnce(&mut EditorObject) -> R) -> Option<R> {
        let object = self.objects.get_mut(id)?;
        let result = edit(Arc::make_mut(object));
        self.reindex(id);
        Some(result)
    }

    fn unreference(&mut self, target: &ObjectId, source: &ObjectId) {
        if let Some(sources) = self.referencing.get_mut(target) {
            sources.remove(source);
            if sources.is_empty() {
                self.referencing.remove(target);
            }
        }
    }

    fn reindex(&mut self, id: &ObjectId) {
        let Some(object) = self.objects.get(id).cloned() else {
            return;
        };
        let new_targets = object.referenced_ids();
        let old_targets = self.outgoing.remove(id).unwrap_or_default();
        for target in old_targets.difference(&new_targets) {
            self.unreference(target, id);
        }
        for target in new_targets.difference(&old_targets) {
            self.referencing.entry(target.clone()).or_default().insert(id.clone());
        }

        let children: BTreeSet<ObjectId> = object.children().into_iter().collect();
        for target in &old_targets {
            if !children.contains(target) && self.parents.get(target) == Some(id) {
                self.parents.remove(target);
            }
        }
        for child in children {
            self.parents.insert(child, id.clone());
        }
        self.outgoing.insert(id.clone(), new_targets);
    }

    /// Insert a link; fails if its end is already linked
    pub(crate) fn add_link(&mut self, link: Link) -> bool {
        if self.links.contains_key(&link.end) {
            return false;
        }
        if !link.weak {
            self.link_graph.add_edge(link.start_object(), link.end_object());
        }
        self.links_by_start
            .entry(link.start_object().clone())
            .or_default()
            .insert(link.end.clone());
        self.links_by_end
            .entry(link.end_object().clone())
            .or_default()
            .insert(link.end.clone());
        self.links.insert(link.end.clone(), link);
        true
    }

    pub(crate) fn remove_link(&mut self, end: &ValueHandle) -> Option<Link> {
        let link = self.links.remove(end)?;
        if !link.weak {
            self.link_graph.remove_edge(link.start_object(), link.end_object());
        }
        for (index, object) in [
            (&mut self.links_by_start, link.start_object()),
            (&mut self.links_by_end, link.end_object()),
        ] {
            if let Some(ends) = index.get_mut(object) {
                ends.remove(end);
                if ends.is_empty() {
                    index.remove(object);
                }
            }
        }
        Some(link)
    }

    /// Returns whether the validity flag changed
    pub(crate) fn set_link_validity(&mut self, end: &ValueHandle, valid: bool) -> bool {
        match self.links.get_mut(end) {
            Some(link) if link.valid != valid => {
                link.valid = valid;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_code_controlled(&mut self, id: &ObjectId, controlled: bool) -> bool {
        if controlled {
            self.contains(id) && self.code_controlled.insert(id.clone())
        } else {
            self.code_controlled.remove(id)
        }
    }

    /// Register an external project.
    ///
    /// Rejects empty ids, the project itself (by id or path) and mappings
    /// contradicting an existing entry. Indirect loops through other
    /// projects are detected when the external projects are loaded.
    pub(crate) fn add_external_project_mapping(
        &mut self,
        project_id: &str,
        path: &Path,
        name: &str,
    ) -> Result<bool, ExtrefError> {
        if project_id.is_empty() {
            return Err(ExtrefError::EmptyProjectId);
        }
        if self.project_id().is_some_and(|own| own.as_str() == project_id) {
            return Err(ExtrefError::LoopById);
        }
        let path = normalize(path);
        if self.current_path.as_deref() == Some(path.as_path()) {
            return Err(ExtrefError::LoopByPath);
        }
        if let Some(existing) = self.lookup_external_project_path(project_id) {
            if existing != path {
                return Err(ExtrefError::DuplicatePath);
            }
        }
        if let Some((other_id, _)) = self
            .external_projects
            .iter()
            .find(|(id, info)| id.as_str() != project_id && resolve_in(self.current_folder(), &info.path) == path)
        {
            return Err(ExtrefError::ProjectIdChanged {
                path: to_document_path(&path),
                old: other_id.clone(),
                new: project_id.to_string(),
            });
        }

        let stored = match self.current_folder() {
            Some(folder) => to_document_path(&relative_to(folder, &path)),
            None => to_document_path(&path),
        };
        let info = ExternalProjectInfo::new(stored, name);
        let changed = self.external_projects.get(project_id) != Some(&info);
        self.external_projects.insert(project_id.to_string(), info);
        Ok(changed)
    }

    pub(crate) fn update_external_project_name(&mut self, project_id: &str, name: &str) -> bool {
        match self.external_projects.get_mut(project_id) {
            Some(info) if info.name != name => {
                info.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove_external_project_mapping(&mut self, project_id: &str) -> bool {
        self.external_projects.remove(project_id).is_some()
    }

    /// Drop mappings no object refers to; returns the removed ids
    pub(crate) fn gc_external_project_mapping(&mut self) -> Vec<String> {
        let used: BTreeSet<&str> = self.instances().filter_map(EditorObject::external_project_id).collect();
        let unused: Vec<String> = self
            .external_projects
            .keys()
            .filter(|id| !used.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &unused {
            self.external_projects.remove(id);
        }
        unused
    }

    pub(crate) fn set_external_projects(&mut self, projects: BTreeMap<String, ExternalProjectInfo>) {
        self.external_projects = projects;
    }

    /// Replace the whole state with a snapshot and rebuild every index.
    ///
    /// The current path is kept. External project paths stored while the
    /// project lived in another folder are rebased onto the current one.
    pub(crate) fn restore(&mut self, snapshot: &ProjectSnapshot) {
        let current_path = self.current_path.take();
        let mut external_projects = snapshot.external_projects.clone();
        rebase_external_paths(
            &mut external_projects,
            snapshot.folder.as_deref(),
            current_path.as_deref().and_then(Path::parent),
        );
        *self = Project {
            current_path,
            order: snapshot.order.clone(),
            objects: snapshot.objects.clone(),
            external_projects,
            code_controlled: snapshot.code_controlled.clone(),
            ..Project::default()
        };
        for id in snapshot.order.iter() {
            self.reindex(id);
        }
        for link in &snapshot.links {
            self.add_link(link.clone());
        }
    }
}

/// Re-express relative external project paths stored against `from` so
/// they resolve to the same files from `to`
fn rebase_external_paths(
    projects: &mut BTreeMap<String, ExternalProjectInfo>,
    from: Option<&Path>,
    to: Option<&Path>,
) {
    if from == to {
        return;
    }
    for info in projects.values_mut() {
        let absolute = resolve_in(from, &info.path);
        info.path = match to {
            Some(folder) => to_document_path(&relative_to(folder, &absolute)),
            None => to_document_path(&absolute),
        };
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self
                .order
                .iter()
                .all(|id| self.get_instance_by_id(id) == other.get_instance_by_id(id))
            && self.links == other.links
            && self.external_projects == other.external_projects
            && self.code_controlled == other.code_controlled
    }
}
