//! Store configuration.
//!
//! # Responsibility
//! - Hold the knobs a host application sets once when opening the store.
//!
//! # Invariants
//! - `StoreConfig::default()` reproduces the legacy behavior: `todos` slot,
//!   orphaning delete.

use crate::repo::snapshot_repo::DEFAULT_STORAGE_KEY;

/// What happens to the children of a deleted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Remove only the task. Children keep a dangling `parent_id`.
    #[default]
    Orphan,
    /// Remove the task and its whole subtree.
    Cascade,
    /// Remove the task and hand its children to its parent (or make them
    /// roots), keeping their position in the sibling order.
    Reparent,
}

/// Options for `TodoStore::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Key of the durable slot holding the collection.
    pub storage_key: String,
    /// Mode used by `TodoStore::delete`.
    pub delete_mode: DeleteMode,
    /// Reject blank titles with `TaskValidationError::EmptyTitle`.
    pub reject_blank_titles: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            delete_mode: DeleteMode::default(),
            reject_blank_titles: true,
        }
    }
}

impl StoreConfig {
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    pub fn with_blank_titles_allowed(mut self) -> Self {
        self.reject_blank_titles = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{DeleteMode, StoreConfig};

    #[test]
    fn default_config_uses_todos_slot_and_orphan_delete() {
        let config = StoreConfig::default();
        assert_eq!(config.storage_key, "todos");
        assert_eq!(config.delete_mode, DeleteMode::Orphan);
        assert!(config.reject_blank_titles);
    }

    #[test]
    fn builders_override_fields() {
        let config = StoreConfig::default()
            .with_storage_key("inbox")
            .with_delete_mode(DeleteMode::Cascade)
            .with_blank_titles_allowed();
        assert_eq!(config.storage_key, "inbox");
        assert_eq!(config.delete_mode, DeleteMode::Cascade);
        assert!(!config.reject_blank_titles);
    }
}
