use crate::paths::GantryPaths;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

/// Exclusive lock on `.gantry/LOCK`, held while `apply`, `edit`, `undo` or
/// `redo` write to the store. The holder's pid is written into the file so
/// a refused command can name it. Released when dropped.
pub struct WorkspaceLock {
    _file: File,
}

impl WorkspaceLock {
    /// Non-blocking. Fails if `.gantry/` is missing or another process holds the lock.
    pub fn acquire(paths: &GantryPaths) -> anyhow::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)
            .map_err(|e| {
                anyhow::anyhow!("cannot open lock file {}: {}", paths.lock_file.display(), e)
            })?;

        if file.try_lock_exclusive().is_err() {
            let mut holder = String::new();
            let _ = file.read_to_string(&mut holder);
            let holder = match holder.trim() {
                "" => "another gantry process".to_string(),
                pid => format!("gantry process {pid}"),
            };
            anyhow::bail!(
                "workspace is locked by {holder} ({}); retry once it finishes",
                paths.lock_file.display()
            );
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;
        tracing::debug!(lock = %paths.lock_file.display(), "workspace lock acquired");
        Ok(Self { _file: file })
    }
}
