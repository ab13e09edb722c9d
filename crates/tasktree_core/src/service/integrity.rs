//! Read-only integrity check for a task collection.
//!
//! # Responsibility
//! - Detect parent/child link violations in loaded or in-memory state.
//! - Report them as structured issues; never repair.
//!
//! # Invariants
//! - The check is bounded: cycle walks stop after `tasks.len()` hops.

use crate::model::task::{TaskCollection, TaskId};
use serde::Serialize;
use std::collections::HashSet;

/// Structured result of `check_integrity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// One link violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// `parent_id` names a task that does not exist.
    DanglingParent { task_id: TaskId, parent_id: TaskId },
    /// `children_ids` names a task that does not exist.
    DanglingChild { task_id: TaskId, child_id: TaskId },
    /// Parent exists but does not list the task among its children.
    MissingChildLink { task_id: TaskId, parent_id: TaskId },
    /// Task lists a child whose `parent_id` points elsewhere.
    ForeignChild { task_id: TaskId, child_id: TaskId },
    /// Task lists the same child more than once.
    DuplicateChild { task_id: TaskId, child_id: TaskId },
    /// Task is its own ancestor.
    Cycle { task_id: TaskId },
}

/// Checks link symmetry, dangling references, duplicates and cycles.
pub fn check_integrity(tasks: &TaskCollection) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    for (task_id, task) in tasks {
        if let Some(parent_id) = task.parent_id {
            match tasks.get(&parent_id) {
                None => report.issues.push(IntegrityIssue::DanglingParent {
                    task_id: *task_id,
                    parent_id,
                }),
                Some(parent) if !parent.children_ids.contains(task_id) => {
                    report.issues.push(IntegrityIssue::MissingChildLink {
                        task_id: *task_id,
                        parent_id,
                    })
                }
                Some(_) => {}
            }
        }

        let mut seen = HashSet::new();
        for child_id in &task.children_ids {
            if !seen.insert(*child_id) {
                report.issues.push(IntegrityIssue::DuplicateChild {
                    task_id: *task_id,
                    child_id: *child_id,
                });
                continue;
            }
            match tasks.get(child_id) {
                None => report.issues.push(IntegrityIssue::DanglingChild {
                    task_id: *task_id,
                    child_id: *child_id,
                }),
                Some(child) if child.parent_id != Some(*task_id) => {
                    report.issues.push(IntegrityIssue::ForeignChild {
                        task_id: *task_id,
                        child_id: *child_id,
                    })
                }
                Some(_) => {}
            }
        }

        if is_on_cycle(tasks, *task_id) {
            report.issues.push(IntegrityIssue::Cycle { task_id: *task_id });
        }
    }

    report
}

fn is_on_cycle(tasks: &TaskCollection, task_id: TaskId) -> bool {
    let mut cursor = tasks.get(&task_id).and_then(|task| task.parent_id);
    let mut hops = 0;
    while let Some(current) = cursor {
        if current == task_id {
            return true;
        }
        hops += 1;
        if hops > tasks.len() {
            return false;
        }
        cursor = tasks.get(&current).and_then(|task| task.parent_id);
    }
    false
}
