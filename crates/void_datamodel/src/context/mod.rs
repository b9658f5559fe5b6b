//! Transactional project access and change recording

#[allow(clippy::module_inception)]
mod context;
pub(crate) mod mutation;
pub mod recorder;

pub use context::Context;
pub use recorder::{ChangeRecorder, ChangeRecorders};
