use std::path::{Path, PathBuf};

/// Well-known paths under `.gantry/`.
#[derive(Debug, Clone)]
pub struct GantryPaths {
    pub root: PathBuf,
    pub gantry_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_json: PathBuf,
    pub lock_file: PathBuf,
}

impl GantryPaths {
    /// Derive all paths from a project root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let gantry_dir = root.join(".gantry");
        Self {
            db_path: gantry_dir.join("gantry.db"),
            config_json: gantry_dir.join("config.json"),
            lock_file: gantry_dir.join("LOCK"),
            gantry_dir,
            root,
        }
    }

    /// Create `.gantry/`. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.gantry_dir)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.gantry_dir.is_dir()
    }

    /// Walk up from `start` looking for a directory containing `.gantry/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".gantry").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}
