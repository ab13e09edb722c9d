//! Read-model helpers for rendering the task tree.
//!
//! # Responsibility
//! - Derive roots, children and subtrees from a task collection.
//! - Flatten the tree into display rows honoring collapsed subtrees.
//!
//! # Invariants
//! - Every traversal tracks visited ids, so corrupted (cyclic) data cannot
//!   loop forever.
//! - Ids that do not resolve are skipped, never reported as rows.
//! - Collapse state is view state only; it is never persisted.

use crate::model::task::{Task, TaskCollection, TaskId};
use std::collections::HashSet;

/// Root-level tasks in insertion order.
pub fn roots(tasks: &TaskCollection) -> Vec<&Task> {
    tasks.values().filter(|task| task.is_root()).collect()
}

/// Resolved direct children of `task_id`, in `children_ids` order.
pub fn children<'a>(tasks: &'a TaskCollection, task_id: TaskId) -> Vec<&'a Task> {
    tasks
        .get(&task_id)
        .map(|task| {
            task.children_ids
                .iter()
                .filter_map(|child_id| tasks.get(child_id))
                .collect()
        })
        .unwrap_or_default()
}

/// Pre-order ids of `task_id` and every task reachable through
/// `children_ids`. Empty when `task_id` does not exist.
///
/// A listed child whose `parent_id` points at another task belongs to that
/// task's subtree and is skipped.
pub fn subtree_ids(tasks: &TaskCollection, task_id: TaskId) -> Vec<TaskId> {
    let mut ordered = Vec::new();
    if !tasks.contains_key(&task_id) {
        return ordered;
    }

    let mut visited = HashSet::new();
    let mut stack = vec![task_id];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        let Some(task) = tasks.get(&current) else {
            continue;
        };
        ordered.push(current);
        stack.extend(task.children_ids.iter().rev().copied().filter(|child_id| {
            tasks
                .get(child_id)
                .is_some_and(|child| child.parent_id == Some(current))
        }));
    }
    ordered
}

/// Set of task ids whose children are hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseState {
    collapsed: HashSet<TaskId>,
}

impl CollapseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collapsed(&self, task_id: TaskId) -> bool {
        self.collapsed.contains(&task_id)
    }

    pub fn collapse(&mut self, task_id: TaskId) {
        self.collapsed.insert(task_id);
    }

    pub fn expand(&mut self, task_id: TaskId) {
        self.collapsed.remove(&task_id);
    }

    /// Flips the state of `task_id`. Returns `true` when it is now collapsed.
    pub fn toggle(&mut self, task_id: TaskId) -> bool {
        if self.collapsed.remove(&task_id) {
            return false;
        }
        self.collapsed.insert(task_id);
        true
    }

    /// Drops ids that no longer exist in `tasks`.
    pub fn retain_existing(&mut self, tasks: &TaskCollection) {
        self.collapsed.retain(|id| tasks.contains_key(id));
    }
}

/// One line of the flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRow {
    pub task_id: TaskId,
    /// Ancestor hops from the root the row was reached from.
    pub depth: usize,
    pub has_children: bool,
    pub collapsed: bool,
}

/// Flattens the tree in display order: roots in insertion order, each
/// followed by its children unless it is collapsed.
///
/// Tasks whose parent no longer exists are not reachable from any root and
/// are therefore not listed.
pub fn visible_rows(tasks: &TaskCollection, collapse: &CollapseState) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(TaskId, usize)> = roots(tasks)
        .into_iter()
        .rev()
        .map(|task| (task.id, 0))
        .collect();

    while let Some((task_id, depth)) = stack.pop() {
        if !visited.insert(task_id) {
            continue;
        }
        let Some(task) = tasks.get(&task_id) else {
            continue;
        };

        let collapsed = collapse.is_collapsed(task_id);
        rows.push(VisibleRow {
            task_id,
            depth,
            has_children: !task.children_ids.is_empty(),
            collapsed,
        });

        if !collapsed {
            stack.extend(
                task.children_ids
                    .iter()
                    .rev()
                    .map(|child_id| (*child_id, depth + 1)),
            );
        }
    }
    rows
}
