//! Versioned migration pipeline
//!
//! Documents carry the file version they were written with. Loading runs
//! every step whose target version is above the document's version, in
//! order, before the IR is converted to live objects.
//!
//! ## Architecture
//!
//! ```text
//! IrDocument(v1) ──► step 2 ──► step 3 ──► ... ──► step 14 ──► IrDocument(v14)
//!                    │          │                  │
//!                    └──────────┴── fires only if file_version < step.version
//! ```
//!
//! ## Key Concepts
//!
//! - **Pure steps**: each step is `fn(IrDocument) -> Result<IrDocument, MigrationError>`
//!   with no access to anything but its input
//! - **Monotonic version**: after a step fires the document carries the
//!   step's version, so rerunning the pipeline is a no-op
//! - **Deterministic ids**: ids synthesised by steps are derived from ids
//!   already in the document, never generated

mod cameras;
mod prefabs;
mod renames;
mod scripts;
mod settings;
mod textures;

use crate::document::IrDocument;
use crate::error::MigrationError;

pub use cameras::{regroup_camera_frustum, split_camera_viewport};
pub use prefabs::{derive_prefab_instance_ids, drop_animation_controls};
pub use renames::rename_node_properties;
pub use scripts::{split_script_interfaces, INTERFACE_ID_SALT};
pub use settings::{
    add_background_color, add_project_settings, remap_layer_sort_order, warn_transform_order,
    widen_background_color,
};
pub use textures::{add_generate_mipmaps, convert_texture_origin};

/// The version written by this build
pub const CURRENT_FILE_VERSION: u32 = 14;

/// Signature of a single migration step
pub type StepFn = fn(IrDocument) -> Result<IrDocument, MigrationError>;

/// One version-gated transform
#[derive(Clone, Copy)]
pub struct MigrationStep {
    /// The version a document has after this step
    pub version: u32,
    pub description: &'static str,
    pub apply: StepFn,
}

impl MigrationStep {
    pub const fn new(version: u32, description: &'static str, apply: StepFn) -> Self {
        Self {
            version,
            description,
            apply,
        }
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish()
    }
}

/// An ordered list of migration steps
#[derive(Debug, Clone, Default)]
pub struct MigrationPipeline {
    steps: Vec<MigrationStep>,
}

impl MigrationPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// The full chain from version 1 to [`CURRENT_FILE_VERSION`]
    pub fn standard() -> Self {
        Self::new()
            .with_step(MigrationStep::new(2, "add project settings", add_project_settings))
            .with_step(MigrationStep::new(3, "split camera viewport", split_camera_viewport))
            .with_step(MigrationStep::new(4, "texture origin to flipTexture", convert_texture_origin))
            .with_step(MigrationStep::new(5, "add background color", add_background_color))
            .with_step(MigrationStep::new(6, "check transform order", warn_transform_order))
            .with_step(MigrationStep::new(7, "regroup camera frustum", regroup_camera_frustum))
            .with_step(MigrationStep::new(8, "remap render layer sort order", remap_layer_sort_order))
            .with_step(MigrationStep::new(9, "background color with alpha", widen_background_color))
            .with_step(MigrationStep::new(10, "add texture mipmap flag", add_generate_mipmaps))
            .with_step(MigrationStep::new(11, "derive prefab instance ids", derive_prefab_instance_ids))
            .with_step(MigrationStep::new(12, "drop animation controls", drop_animation_controls))
            .with_step(MigrationStep::new(13, "split script interfaces", split_script_interfaces))
            .with_step(MigrationStep::new(14, "rename node properties", rename_node_properties))
    }

    /// Append a step. Steps must be added in ascending version order.
    pub fn with_step(mut self, step: MigrationStep) -> Self {
        debug_assert!(
            self.steps.last().map_or(true, |last| last.version < step.version),
            "migration steps out of order"
        );
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// The version a document has after the whole pipeline
    pub fn current_version(&self) -> u32 {
        self.steps.last().map_or(1, |s| s.version)
    }

    /// Run every step above the document's version
    pub fn migrate(&self, mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
        let current = self.current_version();
        if doc.file_version > current {
            return Err(MigrationError::FutureVersion {
                found: doc.file_version,
                supported: current,
            });
        }

        for step in &self.steps {
            if doc.file_version >= step.version {
                continue;
            }
            log::info!(
                "Migrating file version {} -> {}: {}",
                doc.file_version,
                step.version,
                step.description
            );
            doc = (step.apply)(doc)?;
            doc.file_version = step.version;
        }
        Ok(doc)
    }
}

/// Migrate with the standard pipeline
pub fn migrate(doc: IrDocument) -> Result<IrDocument, MigrationError> {
    MigrationPipeline::standard().migrate(doc)
}

/// Kinds that carry a node transform
pub(crate) const NODE_KINDS: &[&str] = &[
    "Node",
    "MeshNode",
    "PerspectiveCamera",
    "OrthographicCamera",
    "PrefabInstance",
];

pub(crate) const CAMERA_KINDS: &[&str] = &["PerspectiveCamera", "OrthographicCamera"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IrObject;
    use void_core::ObjectId;

    fn bump(doc: IrDocument) -> Result<IrDocument, MigrationError> {
        let mut doc = doc;
        doc.objects.push(IrObject::new(ObjectId::new(format!("o{}", doc.objects.len())), "Node", "n"));
        Ok(doc)
    }

    #[test]
    fn test_steps_fire_only_below_their_version() {
        let pipeline = MigrationPipeline::new()
            .with_step(MigrationStep::new(2, "a", bump))
            .with_step(MigrationStep::new(3, "b", bump));

        let doc = pipeline.migrate(IrDocument::new(1)).unwrap();
        assert_eq!(doc.file_version, 3);
        assert_eq!(doc.objects.len(), 2);

        let doc = pipeline.migrate(IrDocument::new(2)).unwrap();
        assert_eq!(doc.objects.len(), 1);

        let again = pipeline.migrate(doc.clone()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_future_version_rejected() {
        let err = migrate(IrDocument::new(CURRENT_FILE_VERSION + 1)).unwrap_err();
        assert_eq!(
            err,
            MigrationError::FutureVersion {
                found: CURRENT_FILE_VERSION + 1,
                supported: CURRENT_FILE_VERSION
            }
        );
    }

    #[test]
    fn test_standard_chain_is_ordered_and_complete() {
        let pipeline = MigrationPipeline::standard();
        let versions: Vec<u32> = pipeline.steps().iter().map(|s| s.version).collect();
        assert_eq!(versions, (2..=CURRENT_FILE_VERSION).collect::<Vec<_>>());
        assert_eq!(pipeline.current_version(), CURRENT_FILE_VERSION);
    }

    #[test]
    fn test_current_document_untouched() {
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        doc.objects.push(IrObject::new(ObjectId::new("n"), "Node", "n"));
        assert_eq!(migrate(doc.clone()).unwrap(), doc);
    }
}
