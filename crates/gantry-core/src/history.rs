//! Reversible single-task edits.
//!
//! An edit reads the current row, resolves its new full key, writes it and
//! records before/after snapshots, all in one transaction. Undo and redo
//! replay a snapshot onto the row with the snapshot's storage id; keys are
//! never used to find the row because an edit may have changed them.

use anyhow::Context;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::keys::{base_key, resolve_full_key};
use crate::normalize::{classify_dates, clean_assignees, derive_raw_date, non_blank};
use crate::store::TaskStore;
use crate::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Committed {
        task: NormalizedTask,
        history_id: i64,
    },
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    Applied {
        task: NormalizedTask,
        history_id: i64,
    },
    /// The entry exists but its snapshot could not be written back.
    NotApplied,
    /// No entry to undo/redo.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

fn now_rfc3339() -> anyhow::Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

/// Build the post-edit task from the current row and the requested values.
///
/// When the dates are untouched, status, dates and raw date text carry over
/// as stored; an `invalid_date` task has its dates cleared, so re-deriving
/// would misreport it as unscheduled. Changed dates are re-classified with
/// the normalizer's rules.
fn edited_task(current: &NormalizedTask, edit: &TaskEdit) -> NormalizedTask {
    let project_id = non_blank(&edit.project_id).unwrap_or(&current.project_id);
    let task_name = non_blank(&edit.task_name).unwrap_or(UNTITLED_TASK);
    let member_name = non_blank(&edit.member_name).unwrap_or(UNNAMED_MEMBER);
    let start = edit.start.as_deref().and_then(non_blank);
    let end = edit.end.as_deref().and_then(non_blank);

    let dates_unchanged = start == current.start.as_deref() && end == current.end.as_deref();
    let (status, start, end, raw_date) = if dates_unchanged {
        (
            current.status,
            current.start.clone(),
            current.end.clone(),
            current.raw_date.clone(),
        )
    } else {
        let check = classify_dates(start, end);
        (check.status, check.start, check.end, derive_raw_date("", start, end))
    };

    NormalizedTask {
        id: current.id,
        task_key: base_key(project_id, task_name),
        task_key_full: current.task_key_full.clone(),
        member_name: member_name.to_string(),
        project_id: project_id.to_string(),
        project_group: edit.project_group.as_deref().and_then(non_blank).map(str::to_string),
        task_name: task_name.to_string(),
        assignees: clean_assignees(&edit.assignees),
        start,
        end,
        raw_date,
        note: edit.note.as_deref().and_then(non_blank).map(str::to_string),
        status,
    }
}

/// Resolve a collision-free full key for `task` moving to `base`.
///
/// Keys held by tasks with a different base (a task literally named `X#2`)
/// are folded into the used set until a free slot is found.
fn allocate_key<S: TaskStore>(
    store: &S,
    import_id: &str,
    base: &str,
    task: &NormalizedTask,
) -> anyhow::Result<String> {
    let mut siblings = store.keys_sharing_base(import_id, base, &task.task_key_full)?;
    loop {
        let candidate = resolve_full_key(base, &task.task_key_full, &siblings);
        match store.task_by_key(import_id, &candidate)? {
            Some(holder) if holder.id != task.id => siblings.push(candidate),
            _ => return Ok(candidate),
        }
    }
}

/// Apply one edit and record it in history.
pub fn apply_edit<S: TaskStore>(store: &S, import_id: &str, edit: &TaskEdit) -> anyhow::Result<EditOutcome> {
    store.atomic(|s| {
        let Some(current) = s.task_by_key(import_id, &edit.current_full_key)? else {
            return Ok(EditOutcome::NotFound);
        };

        let mut next = edited_task(&current, edit);
        if next.task_key != current.task_key {
            next.task_key_full = allocate_key(s, import_id, &next.task_key, &current)?;
        }

        s.write_task(import_id, &current.task_key_full, &next)?;
        let committed = s
            .task_by_key(import_id, &next.task_key_full)?
            .with_context(|| format!("task {} missing after write", next.task_key_full))?;

        let dropped = s.discard_redo_tail(import_id)?;
        if dropped > 0 {
            tracing::debug!(dropped, "redo entries superseded by new edit");
        }

        let entry = CommandHistoryEntry {
            id: None,
            import_id: import_id.to_string(),
            command_type: CMD_UPDATE_TASK.to_string(),
            task_id: committed.id,
            before: Some(current),
            after: Some(committed.clone()),
            created_at: now_rfc3339()?,
            undone: false,
        };
        let history_id = s.append_history(&entry)?;

        tracing::info!(
            import_id,
            history_id,
            key = %committed.task_key_full,
            "task edit committed"
        );
        Ok(EditOutcome::Committed {
            task: committed,
            history_id,
        })
    })
}

/// Write `snapshot` back over its row, re-keying only if its old full key is
/// now held by a different task. Returns the row as committed, or `None` if
/// the row is gone or the write was refused.
pub fn replay_snapshot<S: TaskStore>(
    store: &S,
    import_id: &str,
    snapshot: &NormalizedTask,
) -> anyhow::Result<Option<NormalizedTask>> {
    let Some(id) = snapshot.id else {
        return Ok(None);
    };
    let Some(current) = store.task_by_id(import_id, id)? else {
        return Ok(None);
    };

    let mut target = snapshot.clone();
    if target.task_key_full != current.task_key_full {
        let occupied = store
            .task_by_key(import_id, &target.task_key_full)?
            .is_some_and(|holder| holder.id != Some(id));
        if occupied {
            target.task_key_full = allocate_key(store, import_id, &target.task_key, &current)?;
            tracing::debug!(key = %target.task_key_full, "snapshot key taken, re-allocated");
        }
    }

    let applied = match store.apply_snapshot(import_id, &target) {
        Ok(applied) => applied,
        Err(e) => {
            tracing::warn!(error = %e, id, "snapshot replay failed");
            false
        }
    };
    if !applied {
        return Ok(None);
    }
    store.task_by_id(import_id, id)
}

fn replay_entry<S: TaskStore>(
    store: &S,
    entry: &CommandHistoryEntry,
    direction: Direction,
) -> anyhow::Result<ReplayOutcome> {
    let Some(history_id) = entry.id else {
        return Ok(ReplayOutcome::NotApplied);
    };
    let snapshot = match direction {
        Direction::Undo => entry.before.as_ref(),
        Direction::Redo => entry.after.as_ref(),
    };
    let Some(snapshot) = snapshot else {
        return Ok(ReplayOutcome::NotApplied);
    };

    match replay_snapshot(store, &entry.import_id, snapshot)? {
        Some(task) => {
            store.set_history_undone(history_id, direction == Direction::Undo)?;
            tracing::info!(history_id, ?direction, key = %task.task_key_full, "history replayed");
            Ok(ReplayOutcome::Applied { task, history_id })
        }
        None => Ok(ReplayOutcome::NotApplied),
    }
}

/// Undo the newest edit of `import_id` that is not already undone.
pub fn undo<S: TaskStore>(store: &S, import_id: &str) -> anyhow::Result<ReplayOutcome> {
    store.atomic(|s| match s.latest_undoable(import_id)? {
        Some(entry) => replay_entry(s, &entry, Direction::Undo),
        None => Ok(ReplayOutcome::Empty),
    })
}

/// Redo the oldest undone edit of `import_id`.
pub fn redo<S: TaskStore>(store: &S, import_id: &str) -> anyhow::Result<ReplayOutcome> {
    store.atomic(|s| match s.next_redoable(import_id)? {
        Some(entry) => replay_entry(s, &entry, Direction::Redo),
        None => Ok(ReplayOutcome::Empty),
    })
}

/// Replay the `before` snapshot of a specific history entry.
pub fn undo_entry<S: TaskStore>(store: &S, history_id: i64) -> anyhow::Result<ReplayOutcome> {
    store.atomic(|s| match s.read_history(history_id)? {
        Some(entry) => replay_entry(s, &entry, Direction::Undo),
        None => Ok(ReplayOutcome::Empty),
    })
}

/// Replay the `after` snapshot of a specific history entry.
pub fn redo_entry<S: TaskStore>(store: &S, history_id: i64) -> anyhow::Result<ReplayOutcome> {
    store.atomic(|s| match s.read_history(history_id)? {
        Some(entry) => replay_entry(s, &entry, Direction::Redo),
        None => Ok(ReplayOutcome::Empty),
    })
}
