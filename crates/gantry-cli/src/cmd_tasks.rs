use crate::output::{print_json, task_line};
use gantry_core::TaskStatus;
use gantry_ledger::Workspace;
use std::path::Path;

/// `gantry imports`
pub fn imports(root: &Path, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let records = ws.store().list_imports()?;
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No imports yet.");
        return Ok(());
    }
    for r in &records {
        let ts_short = if r.created_at.len() >= 16 {
            format!("{} {}", &r.created_at[..10], &r.created_at[11..16])
        } else {
            r.created_at.clone()
        };
        println!(
            "[{ts_short}] {}  {} tasks  {} warnings  sha256:{}",
            r.import_id,
            r.summary.total_tasks,
            r.summary.warnings,
            r.source_sha256.get(..12).unwrap_or(&r.source_sha256)
        );
    }
    Ok(())
}

/// `gantry tasks [--import ID] [--status S]`
pub fn tasks(root: &Path, import: Option<&str>, status: Option<&str>, json: bool) -> anyhow::Result<()> {
    let status = status
        .map(|s| {
            TaskStatus::parse(s).ok_or_else(|| {
                anyhow::anyhow!("unknown status {s} (expected scheduled, unscheduled or invalid_date)")
            })
        })
        .transpose()?;

    let ws = Workspace::open(root)?;
    let record = ws.resolve_import(import)?;
    let mut tasks = ws.store().tasks_for_import(&record.import_id)?;
    if let Some(status) = status {
        tasks.retain(|t| t.status == status);
    }

    if json {
        return print_json(&tasks);
    }
    println!("Import {}", record.import_id);
    for t in &tasks {
        println!("  {}", task_line(t));
    }
    println!("\n({} tasks shown)", tasks.len());
    Ok(())
}
