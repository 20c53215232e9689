use crate::output::{print_json, task_line};
use gantry_core::history::{EditOutcome, ReplayOutcome};
use gantry_core::{NormalizedTask, TaskEdit, TaskStore};
use gantry_ledger::Workspace;
use std::path::Path;

/// Field overrides for `gantry edit`. Unset flags keep the current value.
#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Current full key of the task (e.g. `P1::Design#2`)
    pub full_key: String,
    /// New task name
    #[arg(long)]
    pub name: Option<String>,
    /// New project id
    #[arg(long)]
    pub project: Option<String>,
    /// New project group
    #[arg(long, conflicts_with = "no_group")]
    pub group: Option<String>,
    /// Clear the project group
    #[arg(long)]
    pub no_group: bool,
    /// New member name
    #[arg(long)]
    pub member: Option<String>,
    /// New start date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "no_start")]
    pub start: Option<String>,
    /// Clear the start date
    #[arg(long)]
    pub no_start: bool,
    /// New end date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "no_end")]
    pub end: Option<String>,
    /// Clear the end date
    #[arg(long)]
    pub no_end: bool,
    /// New note
    #[arg(long, conflicts_with = "no_note")]
    pub note: Option<String>,
    /// Clear the note
    #[arg(long)]
    pub no_note: bool,
    /// Replace assignees (repeatable)
    #[arg(long = "assignee", conflicts_with = "no_assignees")]
    pub assignees: Vec<String>,
    /// Remove all assignees
    #[arg(long)]
    pub no_assignees: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn override_opt(current: &Option<String>, set: &Option<String>, clear: bool) -> Option<String> {
    if clear {
        None
    } else {
        set.clone().or_else(|| current.clone())
    }
}

/// Merge the flags over the task as currently stored.
pub fn build_edit(current: &NormalizedTask, args: &EditArgs) -> TaskEdit {
    let mut edit = TaskEdit::from_task(current);
    if let Some(name) = &args.name {
        edit.task_name = name.clone();
    }
    if let Some(project) = &args.project {
        edit.project_id = project.clone();
    }
    if let Some(member) = &args.member {
        edit.member_name = member.clone();
    }
    edit.project_group = override_opt(&current.project_group, &args.group, args.no_group);
    edit.start = override_opt(&current.start, &args.start, args.no_start);
    edit.end = override_opt(&current.end, &args.end, args.no_end);
    edit.note = override_opt(&current.note, &args.note, args.no_note);
    if args.no_assignees {
        edit.assignees.clear();
    } else if !args.assignees.is_empty() {
        edit.assignees = args.assignees.clone();
    }
    edit
}

/// `gantry edit <FULL_KEY> ...`
pub fn edit(root: &Path, args: &EditArgs) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let _lock = ws.lock()?;
    let latest = ws.resolve_import(None)?;
    let Some(current) = ws.store().task_by_key(&latest.import_id, &args.full_key)? else {
        anyhow::bail!("no task {} in import {}", args.full_key, latest.import_id);
    };

    match ws.edit(&build_edit(&current, args))? {
        EditOutcome::Committed { task, history_id } => {
            if args.json {
                return print_json(&task);
            }
            println!("Edited (history #{history_id}):");
            println!("  {}", task_line(&task));
        }
        EditOutcome::NotFound => anyhow::bail!("task {} disappeared during edit", args.full_key),
    }
    Ok(())
}

fn report_replay(verb: &str, outcome: ReplayOutcome) -> anyhow::Result<()> {
    match outcome {
        ReplayOutcome::Applied { task, history_id } => {
            println!("{verb} history #{history_id}:");
            println!("  {}", task_line(&task));
            Ok(())
        }
        ReplayOutcome::NotApplied => {
            anyhow::bail!(
                "could not {} the edit: its task is gone or the write failed \
                 (older edits stay reachable with --entry ID)",
                verb.to_lowercase()
            )
        }
        ReplayOutcome::Empty => {
            println!("Nothing to {}.", verb.to_lowercase());
            Ok(())
        }
    }
}

/// `gantry undo [--entry ID]`
pub fn undo(root: &Path, entry: Option<i64>) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let _lock = ws.lock()?;
    let outcome = match entry {
        Some(id) => ws.undo_entry(id)?,
        None => ws.undo()?,
    };
    report_replay("Undo", outcome)
}

/// `gantry redo [--entry ID]`
pub fn redo(root: &Path, entry: Option<i64>) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let _lock = ws.lock()?;
    let outcome = match entry {
        Some(id) => ws.redo_entry(id)?,
        None => ws.redo()?,
    };
    report_replay("Redo", outcome)
}

/// `gantry history [--limit N]`
pub fn history(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let latest = ws.resolve_import(None)?;
    let entries = ws.store().history_for_import(&latest.import_id, limit)?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No edits recorded for {}.", latest.import_id);
        return Ok(());
    }
    for e in &entries {
        let key = |t: &Option<NormalizedTask>| {
            t.as_ref()
                .map(|t| t.task_key_full.clone())
                .unwrap_or_else(|| "?".to_string())
        };
        let state = if e.undone { " (undone)" } else { "" };
        println!(
            "#{:<5} {}  {}  {} -> {}{state}",
            e.id.unwrap_or_default(),
            e.created_at,
            e.command_type,
            key(&e.before),
            key(&e.after)
        );
    }
    Ok(())
}
