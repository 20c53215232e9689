use gantry_core::{DiffResult, ImportSummary, ImportWarning, NormalizedTask};
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `P1::Design#2   scheduled     2024-01-01 ~ 2024-01-05  Ann  @Bo`
pub fn task_line(task: &NormalizedTask) -> String {
    let mut line = format!(
        "{:<32} {:<13} {:<24} {}",
        task.task_key_full,
        task.status.as_str(),
        task.raw_date,
        task.member_name
    );
    if let Some(group) = &task.project_group {
        line.push_str(&format!("  [{group}]"));
    }
    for a in &task.assignees {
        line.push_str(&format!("  @{a}"));
    }
    if let Some(note) = &task.note {
        line.push_str(&format!("  # {note}"));
    }
    line
}

pub fn print_summary(summary: &ImportSummary) {
    println!(
        "{} members, {} projects ({} skipped), {} tasks: {} scheduled, {} unscheduled, {} invalid",
        summary.total_members,
        summary.total_projects,
        summary.skipped_projects,
        summary.total_tasks,
        summary.scheduled,
        summary.unscheduled,
        summary.invalid
    );
}

pub fn print_warnings(warnings: &[ImportWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!("\nWarnings ({}):", warnings.len());
    for w in warnings {
        println!("  [{}] {}", w.code.as_str(), w.message);
    }
}

pub fn print_diff(diff: &DiffResult) {
    let s = &diff.summary;
    println!(
        "+{} added  ~{} updated  -{} archived  ({} invalid, {} unscheduled)",
        s.added, s.updated, s.archived, s.invalid, s.unscheduled
    );
    for (mark, tasks) in [("+", &diff.added), ("~", &diff.updated), ("-", &diff.archived)] {
        for task in tasks {
            println!("  {mark} {}", task_line(task));
        }
    }
}
