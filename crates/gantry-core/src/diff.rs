use std::collections::{HashMap, HashSet};

use crate::types::{DiffResult, DiffSummary, NormalizedTask, TaskStatus};

/// Names of the tracked fields that differ between two versions of a task.
///
/// Identity fields (`task_key`, `task_key_full`, `project_id`, `task_name`)
/// are what matching is done on, and the storage id is not content.
pub fn changed_fields(prev: &NormalizedTask, next: &NormalizedTask) -> Vec<&'static str> {
    let mut out = Vec::new();
    if prev.start != next.start {
        out.push("start");
    }
    if prev.end != next.end {
        out.push("end");
    }
    if prev.note != next.note {
        out.push("note");
    }
    if prev.raw_date != next.raw_date {
        out.push("raw_date");
    }
    if prev.member_name != next.member_name {
        out.push("member_name");
    }
    if prev.project_group != next.project_group {
        out.push("project_group");
    }
    if prev.status != next.status {
        out.push("status");
    }
    if prev.assignees != next.assignees {
        out.push("assignees");
    }
    out
}

pub fn has_changes(prev: &NormalizedTask, next: &NormalizedTask) -> bool {
    !changed_fields(prev, next).is_empty()
}

/// Classify `next` against `prev` by full key.
///
/// Updated tasks are reported in their `next` form, archived ones in their
/// `prev` form. The invalid/unscheduled counts cover all of `next`.
pub fn diff_tasks(prev: &[NormalizedTask], next: &[NormalizedTask]) -> DiffResult {
    let prev_by_key: HashMap<&str, &NormalizedTask> = prev
        .iter()
        .map(|t| (t.task_key_full.as_str(), t))
        .collect();
    let next_keys: HashSet<&str> = next.iter().map(|t| t.task_key_full.as_str()).collect();

    let mut added = Vec::new();
    let mut updated = Vec::new();
    for task in next {
        match prev_by_key.get(task.task_key_full.as_str()) {
            None => added.push(task.clone()),
            Some(old) if has_changes(old, task) => updated.push(task.clone()),
            Some(_) => {}
        }
    }

    let archived: Vec<NormalizedTask> = prev
        .iter()
        .filter(|t| !next_keys.contains(t.task_key_full.as_str()))
        .cloned()
        .collect();

    let summary = DiffSummary {
        added: added.len(),
        updated: updated.len(),
        archived: archived.len(),
        invalid: next
            .iter()
            .filter(|t| t.status == TaskStatus::InvalidDate)
            .count(),
        unscheduled: next
            .iter()
            .filter(|t| t.status == TaskStatus::Unscheduled)
            .count(),
    };

    DiffResult {
        added,
        updated,
        archived,
        summary,
    }
}
