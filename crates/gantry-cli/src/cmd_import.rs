use crate::output::{print_diff, print_json, print_summary, print_warnings};
use gantry_core::prepare_import;
use gantry_ledger::Workspace;
use serde_json::json;
use std::io::Read;
use std::path::Path;

/// Read the source text from a file path, or stdin for `-`.
pub fn read_source(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| anyhow::anyhow!("cannot read stdin: {e}"))?;
        tracing::debug!(bytes = buf.len(), "read source from stdin");
        return Ok(buf);
    }
    std::fs::read_to_string(input).map_err(|e| anyhow::anyhow!("cannot read {input}: {e}"))
}

/// `gantry preview <FILE|->`
pub fn preview(root: &Path, input: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let text = read_source(input)?;
    let preview = ws.preview(&text)?;
    let result = &preview.prepared.result;

    if json {
        return print_json(&json!({
            "summary": result.summary,
            "warnings": result.warnings,
            "diff": preview.diff,
        }));
    }

    print_summary(&result.summary);
    print_warnings(&result.warnings);
    println!("\nAgainst latest import:");
    print_diff(&preview.diff);
    Ok(())
}

/// `gantry apply <FILE|->`
pub fn apply(root: &Path, input: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let _lock = ws.lock()?;
    let text = read_source(input)?;
    let prepared = prepare_import(&text)?;
    let applied = ws.apply(&prepared)?;

    if json {
        return print_json(&json!({
            "import": applied.record,
            "tasks": applied.tasks,
            "warnings": prepared.result.warnings,
            "same_source_as_previous": applied.same_source_as_previous,
        }));
    }

    println!("Recorded import {}", applied.record.import_id);
    if applied.same_source_as_previous {
        println!("(source text is identical to the previous import)");
    }
    print_summary(&applied.record.summary);
    print_warnings(&prepared.result.warnings);
    Ok(())
}
