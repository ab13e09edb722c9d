//! Core data layer for the hierarchical todo list.
//! This crate is the single source of truth for parent/child invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{DeleteMode, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{Task, TaskCollection, TaskId, TaskPatch, TaskValidationError};
pub use repo::snapshot_repo::{
    RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository, DEFAULT_STORAGE_KEY,
};
pub use service::integrity::{check_integrity, IntegrityIssue, IntegrityReport};
pub use service::todo_store::{depth, TodoStore, TodoStoreError, TodoStoreResult};
pub use service::tree_view::{CollapseState, VisibleRow};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
