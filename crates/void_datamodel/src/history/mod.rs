//! Undo/redo history

pub mod undo_stack;

pub use undo_stack::UndoStack;
