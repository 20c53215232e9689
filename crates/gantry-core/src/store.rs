use crate::types::{CommandHistoryEntry, NormalizedTask};

/// Persistence consumed by the command history engine.
///
/// Every call is scoped to one import id; full keys from different imports
/// never collide. Implementations must make [`TaskStore::atomic`] all or
/// nothing: an `Err` from the closure leaves prior committed state intact.
pub trait TaskStore {
    /// Run `f` inside one transaction.
    fn atomic<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Self) -> anyhow::Result<T>;

    fn task_by_key(&self, import_id: &str, full_key: &str) -> anyhow::Result<Option<NormalizedTask>>;

    fn task_by_id(&self, import_id: &str, id: i64) -> anyhow::Result<Option<NormalizedTask>>;

    /// Full keys of tasks whose base key is `base_key`, minus `excluding_full_key`.
    fn keys_sharing_base(
        &self,
        import_id: &str,
        base_key: &str,
        excluding_full_key: &str,
    ) -> anyhow::Result<Vec<String>>;

    /// Overwrite every editable field (and the full key) of the row currently
    /// stored under `full_key`.
    fn write_task(&self, import_id: &str, full_key: &str, task: &NormalizedTask) -> anyhow::Result<()>;

    fn append_history(&self, entry: &CommandHistoryEntry) -> anyhow::Result<i64>;

    fn read_history(&self, id: i64) -> anyhow::Result<Option<CommandHistoryEntry>>;

    /// Write all fields of `snapshot` over the row with `snapshot.id`.
    /// `Ok(false)` when that row no longer exists.
    fn apply_snapshot(&self, import_id: &str, snapshot: &NormalizedTask) -> anyhow::Result<bool>;

    /// Newest entry not yet undone.
    fn latest_undoable(&self, import_id: &str) -> anyhow::Result<Option<CommandHistoryEntry>>;

    /// Oldest undone entry.
    fn next_redoable(&self, import_id: &str) -> anyhow::Result<Option<CommandHistoryEntry>>;

    fn set_history_undone(&self, id: i64, undone: bool) -> anyhow::Result<()>;

    /// Drop undone entries; returns how many were removed.
    fn discard_redo_tail(&self, import_id: &str) -> anyhow::Result<usize>;
}
