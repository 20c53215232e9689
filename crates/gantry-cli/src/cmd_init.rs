use gantry_ledger::{GantryPaths, Workspace};
use std::path::Path;

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let already = GantryPaths::discover(root).is_initialized();
    // Re-running init repairs a partially created workspace.
    let ws = Workspace::init(root)?;
    if already {
        println!("Already initialized at {}", ws.paths.gantry_dir.display());
    } else {
        println!("Initialized gantry workspace at {}", ws.paths.gantry_dir.display());
    }
    Ok(())
}
