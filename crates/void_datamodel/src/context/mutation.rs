//! Crate-internal mutation access
//!
//! Undo, prefab propagation, clipboard paste and external reference
//! updates need to write the model in ways the public [`Context`] API
//! rejects: inserting fully formed objects, replicating links without
//! capability checks, writing read-only values and swapping whole
//! snapshots. They do so through [`ModelAccess`], which is only nameable
//! inside this crate.
//!
//! [`Context`]: super::Context

use void_reflection::Value;

use super::recorder::ChangeRecorders;
use crate::core::handle::ValueHandle;
use crate::core::link::Link;
use crate::core::object::EditorObject;
use crate::core::project::{Project, ProjectSnapshot};
use crate::error::Result;
use void_core::ObjectId;

pub(crate) trait ModelAccess {
    fn project_mut(&mut self) -> &mut Project;

    fn recorders_mut(&mut self) -> &mut ChangeRecorders;

    /// Insert objects as a batch. References may point into the batch or
    /// at existing objects; nothing is inserted if any id is taken.
    fn insert_objects(&mut self, objects: Vec<EditorObject>) -> Result<Vec<ObjectId>>;

    /// Add or replace a link without capability checks. Links closing a
    /// strong cycle or touching missing objects are skipped.
    fn insert_link(&mut self, link: Link) -> bool;

    /// Overwrite a value, bypassing read-only and type checks
    fn assign_value(&mut self, handle: &ValueHandle, value: Value) -> Result<()>;

    /// Replace the project state with a snapshot, recording the difference
    fn restore_snapshot(&mut self, snapshot: &ProjectSnapshot);
}
