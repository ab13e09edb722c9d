//! Task domain model.
//!
//! # Responsibility
//! - Define the task record persisted in the `todos` slot.
//! - Define `TaskPatch`, the partial-field merge payload for updates.
//!
//! # Invariants
//! - `id` is generated once at creation and never changes.
//! - `children_ids` never contains duplicates.
//! - `parent_id == None` means the task is root-level.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

/// Id-keyed task collection. Iteration follows insertion order so consumers
/// can render tasks in the order they were created.
pub type TaskCollection = IndexMap<TaskId, Task>;

/// Field-level validation failures for task input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Title is empty or whitespace only.
    EmptyTitle,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be blank"),
        }
    }
}

impl Error for TaskValidationError {}

/// One todo item, possibly nested under a parent task.
///
/// Serialized with camelCase field names; `parentId` and `childrenIds` are
/// omitted when empty so leaf and root records stay compact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_ids: Vec<TaskId>,
}

impl Task {
    /// Creates a new incomplete task with a generated id.
    pub(crate) fn new(title: impl Into<String>, parent_id: Option<TaskId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            completed: false,
            parent_id,
            children_ids: Vec::new(),
        }
    }

    /// Returns whether this task has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns whether this task has no children.
    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }

    /// Appends `child_id` unless it is already present.
    ///
    /// Returns `true` when the list changed.
    pub(crate) fn link_child(&mut self, child_id: TaskId) -> bool {
        if self.children_ids.contains(&child_id) {
            return false;
        }
        self.children_ids.push(child_id);
        true
    }

    /// Inserts `child_id` at `position` (clamped), removing any earlier entry.
    pub(crate) fn link_child_at(&mut self, child_id: TaskId, position: usize) {
        self.children_ids.retain(|id| *id != child_id);
        let index = position.min(self.children_ids.len());
        self.children_ids.insert(index, child_id);
    }

    /// Removes every occurrence of `child_id`.
    ///
    /// Returns the index of the first removed entry.
    pub(crate) fn unlink_child(&mut self, child_id: TaskId) -> Option<usize> {
        let index = self.children_ids.iter().position(|id| *id == child_id)?;
        self.children_ids.retain(|id| *id != child_id);
        Some(index)
    }
}

/// Partial update payload. `None` leaves the field unchanged.
///
/// `parent_id` is doubly optional: `Some(None)` moves the task to root level,
/// `Some(Some(id))` moves it under `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub parent_id: Option<Option<TaskId>>,
    pub children_ids: Option<Vec<TaskId>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn parent(parent_id: Option<TaskId>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.completed.is_none()
            && self.parent_id.is_none()
            && self.children_ids.is_none()
    }
}

/// Checks a title against the blank-title policy.
pub fn validate_title(title: &str) -> Result<(), TaskValidationError> {
    if title.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    Ok(())
}
