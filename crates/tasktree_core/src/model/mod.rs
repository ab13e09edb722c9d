//! Domain model for the hierarchical task list.
//!
//! # Responsibility
//! - Define the canonical task record and its partial-update payload.
//! - Define the id-keyed collection shape shared by store and persistence.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Parent and child links are only rewritten by the todo store.

pub mod task;
