//! Todo store: the single writer of the task collection.
//!
//! # Responsibility
//! - Own the id-keyed task collection and its two-way parent/child links.
//! - Apply create, update, move and delete as one state transition each and
//!   persist the result to the durable slot.
//! - Answer depth and tree read-model queries.
//!
//! # Invariants
//! - A task's `parent_id` and its parent's `children_ids` are changed in the
//!   same transition; readers never observe one side without the other.
//! - `children_ids` never contains duplicates.
//! - Moves never create a cycle.
//! - All validation happens before the first mutation of an operation, so a
//!   failed call leaves the collection untouched.
//! - `DeleteMode::Orphan` leaves children with a dangling `parent_id`.

use crate::config::{DeleteMode, StoreConfig};
use crate::model::task::{
    validate_title, Task, TaskCollection, TaskId, TaskPatch, TaskValidationError,
};
use crate::repo::snapshot_repo::{RepoError, SnapshotRepository};
use crate::service::integrity::{check_integrity, IntegrityReport};
use crate::service::tree_view::{self, CollapseState, VisibleRow};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TodoStoreResult<T> = Result<T, TodoStoreError>;

/// Errors from todo store operations.
#[derive(Debug)]
pub enum TodoStoreError {
    /// Input failed field validation.
    Validation(TaskValidationError),
    /// Target task does not exist.
    NotFound(TaskId),
    /// Referenced parent task does not exist.
    ParentNotFound(TaskId),
    /// Ancestor walk reached a `parent_id` that does not resolve.
    DanglingParent { task_id: TaskId, parent_id: TaskId },
    /// Move would make a task its own ancestor.
    CycleDetected { task_id: TaskId, parent_id: TaskId },
    /// Ancestor walk exceeded the collection size; the data is cyclic.
    AncestorLimitExceeded { task_id: TaskId, limit: usize },
    /// `children_ids` patch is not a reordering of the current children.
    InvalidChildren(TaskId),
    /// Persistence failure.
    Repo(RepoError),
}

impl Display for TodoStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent task not found: {id}"),
            Self::DanglingParent { task_id, parent_id } => write!(
                f,
                "task {task_id} references missing parent {parent_id}"
            ),
            Self::CycleDetected { task_id, parent_id } => write!(
                f,
                "move would create cycle: task {task_id} under parent {parent_id}"
            ),
            Self::AncestorLimitExceeded { task_id, limit } => write!(
                f,
                "ancestor chain of task {task_id} exceeds {limit} hops; parent links are cyclic"
            ),
            Self::InvalidChildren(id) => write!(
                f,
                "children of task {id} may only be reordered, not added or removed"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TodoStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TodoStoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TodoStoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Counts ancestor hops from `task` to its root.
///
/// Returns `0` for root tasks.
///
/// # Errors
/// - `DanglingParent` when a `parent_id` on the chain does not resolve.
/// - `AncestorLimitExceeded` when the chain is longer than the collection,
///   which only happens with cyclic links.
pub fn depth(task: &Task, tasks: &TaskCollection) -> TodoStoreResult<usize> {
    let limit = tasks.len();
    let mut hops = 0;
    let mut current = task;
    while let Some(parent_id) = current.parent_id {
        let parent = tasks
            .get(&parent_id)
            .ok_or(TodoStoreError::DanglingParent {
                task_id: current.id,
                parent_id,
            })?;
        if hops >= limit {
            return Err(TodoStoreError::AncestorLimitExceeded {
                task_id: task.id,
                limit,
            });
        }
        current = parent;
        hops += 1;
    }
    Ok(hops)
}

/// Todo store facade over a snapshot repository.
///
/// Mutating methods take `&mut self`; share the store by reference to get a
/// single-writer discipline without locks.
pub struct TodoStore<R: SnapshotRepository> {
    repo: R,
    config: StoreConfig,
    tasks: TaskCollection,
    load_report: IntegrityReport,
    dirty: bool,
}

impl<R: SnapshotRepository> TodoStore<R> {
    /// Opens the store with default configuration.
    pub fn open(repo: R) -> TodoStoreResult<Self> {
        Self::open_with_config(repo, StoreConfig::default())
    }

    /// Loads the collection from the configured slot.
    ///
    /// A missing slot yields an empty store. Link violations in loaded data
    /// are logged and kept in `load_report`; data is never rewritten here.
    pub fn open_with_config(repo: R, config: StoreConfig) -> TodoStoreResult<Self> {
        let tasks = match repo.load(&config.storage_key) {
            Ok(tasks) => tasks.unwrap_or_default(),
            Err(err) => {
                error!(
                    "event=store_open module=store status=error key={} error={}",
                    config.storage_key, err
                );
                return Err(err.into());
            }
        };

        let load_report = check_integrity(&tasks);
        if load_report.is_clean() {
            info!(
                "event=store_open module=store status=ok key={} tasks={}",
                config.storage_key,
                tasks.len()
            );
        } else {
            warn!(
                "event=integrity_check module=store status=warn key={} tasks={} issues={}",
                config.storage_key,
                tasks.len(),
                load_report.issues.len()
            );
        }

        Ok(Self {
            repo,
            config,
            tasks,
            load_report,
            dirty: false,
        })
    }

    /// Creates a task, optionally nested under `parent_id`.
    ///
    /// The new id is appended to the parent's `children_ids` in the same
    /// transition.
    pub fn create(
        &mut self,
        title: impl Into<String>,
        parent_id: Option<TaskId>,
    ) -> TodoStoreResult<Task> {
        let title = title.into();
        self.validate_title(&title)?;
        if let Some(parent_id) = parent_id {
            if !self.tasks.contains_key(&parent_id) {
                return Err(TodoStoreError::ParentNotFound(parent_id));
            }
        }

        let task = Task::new(title, parent_id);
        let task_id = task.id;
        self.tasks.insert(task_id, task.clone());
        if let Some(parent) = parent_id.and_then(|id| self.tasks.get_mut(&id)) {
            parent.link_child(task_id);
        }

        info!(
            "event=task_create module=store status=ok task_id={} parent_id={}",
            task_id,
            display_opt(parent_id)
        );
        self.persist()?;
        Ok(task)
    }

    /// Merges `patch` into the task.
    ///
    /// - Unset fields keep their values.
    /// - A new `parent_id` moves the task: it leaves the old parent's
    ///   `children_ids` and joins the end of the new parent's.
    /// - `children_ids` may only reorder the existing children.
    /// - The parent link is re-affirmed afterwards.
    pub fn update(&mut self, task_id: TaskId, patch: TaskPatch) -> TodoStoreResult<Task> {
        let current = self
            .tasks
            .get(&task_id)
            .ok_or(TodoStoreError::NotFound(task_id))?;

        if let Some(title) = patch.title.as_deref() {
            self.validate_title(title)?;
        }
        if let Some(order) = patch.children_ids.as_deref() {
            if !is_reordering(&current.children_ids, order) {
                return Err(TodoStoreError::InvalidChildren(task_id));
            }
        }
        let reparent_to = patch
            .parent_id
            .filter(|new_parent| *new_parent != current.parent_id);
        if let Some(new_parent) = reparent_to {
            self.ensure_can_move(task_id, new_parent)?;
        }

        if let Some(new_parent) = reparent_to {
            self.relink(task_id, new_parent, None);
        }
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(TodoStoreError::NotFound(task_id))?;
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(order) = patch.children_ids {
            task.children_ids = order;
        }
        let parent_id = task.parent_id;
        if let Some(parent) = parent_id.and_then(|id| self.tasks.get_mut(&id)) {
            parent.link_child(task_id);
        }

        info!(
            "event=task_update module=store status=ok task_id={} moved={}",
            task_id,
            reparent_to.is_some()
        );
        self.persist()?;
        self.tasks
            .get(&task_id)
            .cloned()
            .ok_or(TodoStoreError::NotFound(task_id))
    }

    /// Sets the `completed` flag.
    pub fn set_completed(&mut self, task_id: TaskId, completed: bool) -> TodoStoreResult<Task> {
        self.update(task_id, TaskPatch::completed(completed))
    }

    /// Replaces the title.
    pub fn rename(&mut self, task_id: TaskId, title: impl Into<String>) -> TodoStoreResult<Task> {
        self.update(task_id, TaskPatch::title(title))
    }

    /// Moves a task under `new_parent` (or to root level with `None`).
    ///
    /// `position` is the index among the new siblings, clamped to the end.
    /// Root-level tasks keep insertion order, so `position` is ignored when
    /// `new_parent` is `None`. Moving within the same parent reorders.
    pub fn move_task(
        &mut self,
        task_id: TaskId,
        new_parent: Option<TaskId>,
        position: Option<usize>,
    ) -> TodoStoreResult<()> {
        if !self.tasks.contains_key(&task_id) {
            return Err(TodoStoreError::NotFound(task_id));
        }
        self.ensure_can_move(task_id, new_parent)?;

        self.relink(task_id, new_parent, position);

        info!(
            "event=task_move module=store status=ok task_id={} parent_id={}",
            task_id,
            display_opt(new_parent)
        );
        self.persist()
    }

    /// Deletes a task using the configured `DeleteMode`.
    ///
    /// Returns the ids removed from the collection.
    pub fn delete(&mut self, task_id: TaskId) -> TodoStoreResult<Vec<TaskId>> {
        self.delete_with_mode(task_id, self.config.delete_mode)
    }

    /// Deletes a task and detaches it from its parent in one transition.
    ///
    /// See `DeleteMode` for what happens to its children.
    pub fn delete_with_mode(
        &mut self,
        task_id: TaskId,
        mode: DeleteMode,
    ) -> TodoStoreResult<Vec<TaskId>> {
        let task = self
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(TodoStoreError::NotFound(task_id))?;

        let live_parent = task.parent_id.filter(|id| self.tasks.contains_key(id));
        let position = live_parent
            .and_then(|id| self.tasks.get_mut(&id))
            .and_then(|parent| parent.unlink_child(task_id));

        let removed = match mode {
            DeleteMode::Orphan => vec![task_id],
            DeleteMode::Cascade => tree_view::subtree_ids(&self.tasks, task_id),
            DeleteMode::Reparent => {
                self.hand_children_to(&task, live_parent, position);
                vec![task_id]
            }
        };
        for id in &removed {
            self.tasks.shift_remove(id);
        }

        info!(
            "event=task_delete module=store status=ok task_id={} mode={:?} removed={}",
            task_id,
            mode,
            removed.len()
        );
        self.persist()?;
        Ok(removed)
    }

    /// Ancestor hop count of a stored task.
    pub fn depth_of(&self, task_id: TaskId) -> TodoStoreResult<usize> {
        let task = self
            .tasks
            .get(&task_id)
            .ok_or(TodoStoreError::NotFound(task_id))?;
        depth(task, &self.tasks)
    }

    /// Read model: every task, in insertion order.
    pub fn tasks(&self) -> &TaskCollection {
        &self.tasks
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn roots(&self) -> Vec<&Task> {
        tree_view::roots(&self.tasks)
    }

    pub fn children(&self, task_id: TaskId) -> Vec<&Task> {
        tree_view::children(&self.tasks, task_id)
    }

    pub fn subtree(&self, task_id: TaskId) -> Vec<TaskId> {
        tree_view::subtree_ids(&self.tasks, task_id)
    }

    pub fn visible_rows(&self, collapse: &CollapseState) -> Vec<VisibleRow> {
        tree_view::visible_rows(&self.tasks, collapse)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Integrity report computed when the store was opened.
    pub fn load_report(&self) -> &IntegrityReport {
        &self.load_report
    }

    /// Checks the current in-memory collection.
    pub fn check_integrity(&self) -> IntegrityReport {
        check_integrity(&self.tasks)
    }

    /// Whether the last save failed and in-memory state is ahead of storage.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Retries a failed save. No-op when storage is current.
    pub fn flush(&mut self) -> TodoStoreResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.persist()
    }

    fn validate_title(&self, title: &str) -> TodoStoreResult<()> {
        if self.config.reject_blank_titles {
            validate_title(title)?;
        }
        Ok(())
    }

    fn ensure_can_move(
        &self,
        task_id: TaskId,
        new_parent: Option<TaskId>,
    ) -> TodoStoreResult<()> {
        let Some(parent_id) = new_parent else {
            return Ok(());
        };
        if parent_id == task_id {
            return Err(TodoStoreError::CycleDetected { task_id, parent_id });
        }
        if !self.tasks.contains_key(&parent_id) {
            return Err(TodoStoreError::ParentNotFound(parent_id));
        }

        let mut visited = HashSet::new();
        let mut cursor = Some(parent_id);
        while let Some(current) = cursor {
            if current == task_id || !visited.insert(current) {
                return Err(TodoStoreError::CycleDetected { task_id, parent_id });
            }
            cursor = self.tasks.get(&current).and_then(|task| task.parent_id);
        }
        Ok(())
    }

    /// Detaches `task_id` from its current parent and attaches it to
    /// `new_parent`. Callers must have run `ensure_can_move`.
    fn relink(&mut self, task_id: TaskId, new_parent: Option<TaskId>, position: Option<usize>) {
        let old_parent = self.tasks.get(&task_id).and_then(|task| task.parent_id);
        if let Some(parent) = old_parent.and_then(|id| self.tasks.get_mut(&id)) {
            parent.unlink_child(task_id);
        }
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.parent_id = new_parent;
        }
        if let Some(parent) = new_parent.and_then(|id| self.tasks.get_mut(&id)) {
            match position {
                Some(position) => parent.link_child_at(task_id, position),
                None => {
                    parent.link_child(task_id);
                }
            }
        }
    }

    /// Moves the children of a task being deleted to `grandparent`, spliced
    /// in at `position`. Without a live grandparent they become roots.
    fn hand_children_to(
        &mut self,
        task: &Task,
        grandparent: Option<TaskId>,
        position: Option<usize>,
    ) {
        let mut insert_at = position;
        for child_id in &task.children_ids {
            let Some(child) = self.tasks.get_mut(child_id) else {
                continue;
            };
            if child.parent_id != Some(task.id) {
                continue;
            }
            child.parent_id = grandparent;

            if let Some(parent) = grandparent.and_then(|id| self.tasks.get_mut(&id)) {
                let at = insert_at.unwrap_or(parent.children_ids.len());
                parent.link_child_at(*child_id, at);
                insert_at = Some(at + 1);
            }
        }
    }

    fn persist(&mut self) -> TodoStoreResult<()> {
        match self.repo.save(&self.config.storage_key, &self.tasks) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                error!(
                    "event=snapshot_save module=store status=error key={} tasks={} error={}",
                    self.config.storage_key,
                    self.tasks.len(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

fn is_reordering(current: &[TaskId], proposed: &[TaskId]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let current: HashSet<_> = current.iter().collect();
    let mut seen = HashSet::new();
    proposed
        .iter()
        .all(|id| current.contains(id) && seen.insert(*id))
}

fn display_opt(id: Option<TaskId>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::{depth, is_reordering, TodoStoreError};
    use crate::model::task::{Task, TaskCollection};
    use uuid::Uuid;

    fn chain(len: usize) -> (TaskCollection, Vec<Uuid>) {
        let ids: Vec<Uuid> = (0..len).map(|_| Uuid::new_v4()).collect();
        let mut tasks = TaskCollection::new();
        for (index, id) in ids.iter().enumerate() {
            tasks.insert(
                *id,
                Task {
                    id: *id,
                    title: format!("level {index}"),
                    completed: false,
                    parent_id: index.checked_sub(1).map(|parent| ids[parent]),
                    children_ids: ids.get(index + 1).copied().into_iter().collect(),
                },
            );
        }
        (tasks, ids)
    }

    #[test]
    fn depth_counts_ancestor_hops() {
        let (tasks, ids) = chain(4);
        assert_eq!(depth(&tasks[&ids[0]], &tasks).unwrap(), 0);
        assert_eq!(depth(&tasks[&ids[3]], &tasks).unwrap(), 3);
    }

    #[test]
    fn depth_reports_dangling_parent() {
        let (mut tasks, ids) = chain(3);
        tasks.shift_remove(&ids[0]);
        let err = depth(&tasks[&ids[2]], &tasks).unwrap_err();
        assert!(matches!(
            err,
            TodoStoreError::DanglingParent { task_id, parent_id }
                if task_id == ids[1] && parent_id == ids[0]
        ));
    }

    #[test]
    fn depth_of_task_outside_collection_reports_missing_parent() {
        let missing = Uuid::new_v4();
        let outsider = Task {
            id: Uuid::new_v4(),
            title: "outsider".to_string(),
            completed: false,
            parent_id: Some(missing),
            children_ids: Vec::new(),
        };

        let err = depth(&outsider, &TaskCollection::new()).unwrap_err();
        assert!(matches!(
            err,
            TodoStoreError::DanglingParent { task_id, parent_id }
                if task_id == outsider.id && parent_id == missing
        ));

        let (mut tasks, ids) = chain(1);
        tasks[&ids[0]].parent_id = Some(missing);
        let outsider = Task {
            parent_id: Some(ids[0]),
            ..outsider
        };
        let err = depth(&outsider, &tasks).unwrap_err();
        assert!(matches!(
            err,
            TodoStoreError::DanglingParent { task_id, parent_id }
                if task_id == ids[0] && parent_id == missing
        ));
    }

    #[test]
    fn depth_of_task_outside_collection_counts_full_chain() {
        let (tasks, ids) = chain(3);
        let outsider = Task {
            id: Uuid::new_v4(),
            title: "outsider".to_string(),
            completed: false,
            parent_id: Some(ids[2]),
            children_ids: Vec::new(),
        };
        assert_eq!(depth(&outsider, &tasks).unwrap(), 3);
    }

    #[test]
    fn depth_guard_trips_on_cycle() {
        let (mut tasks, ids) = chain(2);
        tasks[&ids[0]].parent_id = Some(ids[1]);
        let err = depth(&tasks[&ids[1]], &tasks).unwrap_err();
        assert!(matches!(
            err,
            TodoStoreError::AncestorLimitExceeded { limit: 2, .. }
        ));
    }

    #[test]
    fn reordering_requires_same_set_without_duplicates() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(is_reordering(&[a, b], &[b, a]));
        assert!(!is_reordering(&[a, b], &[a, a]));
        assert!(!is_reordering(&[a, b], &[a]));
        assert!(!is_reordering(&[a], &[Uuid::new_v4()]));
    }
}
