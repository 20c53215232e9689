use crate::output::{print_diff, print_json};
use gantry_ledger::Workspace;
use std::path::Path;

/// `gantry diff [--from ID] [--to ID]`
pub fn execute(root: &Path, from: Option<&str>, to: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root)?;
    let diff = ws.diff_imports(from, to)?;
    if json {
        return print_json(&diff);
    }
    print_diff(&diff);
    Ok(())
}
