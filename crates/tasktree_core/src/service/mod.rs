//! Use-case layer over the task collection.
//!
//! # Responsibility
//! - Enforce parent/child invariants above the persistence boundary.
//! - Provide read-model helpers for the presentation layer.

pub mod integrity;
pub mod todo_store;
pub mod tree_view;
