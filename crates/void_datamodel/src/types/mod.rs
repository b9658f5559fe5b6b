//! Object kinds, the factory that builds them, and their side-effect hooks

pub mod factory;
pub mod hooks;
pub mod kinds;

pub use factory::{ObjectFactory, TypeDescriptor};
pub use hooks::{ErrorUpdate, HookEnv, MaterialHooks, ObjectHooks, ResourceHooks, ScriptHooks, SyncReason};
pub use kinds::{default_kinds, NODE_KINDS};
