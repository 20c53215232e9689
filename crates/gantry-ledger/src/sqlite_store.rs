//! SQLite-backed storage for import generations and edit history.
//!
//! One `gantry.db` file in WAL mode holds every accepted import, its tasks
//! and warnings, and the command history used for undo/redo.

use gantry_core::snapshot::{decode_optional, encode_snapshot};
use gantry_core::{
    CommandHistoryEntry, ImportSummary, ImportWarning, NormalizedTask, PreparedImport, TaskStatus,
    TaskStore, WarningCode,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS imports (
    rowid INTEGER PRIMARY KEY,
    import_id TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL,
    source_sha256 TEXT NOT NULL,
    summary TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY,
    import_id TEXT NOT NULL REFERENCES imports(import_id),
    position INTEGER NOT NULL,
    task_key TEXT NOT NULL,
    task_key_full TEXT NOT NULL,
    member_name TEXT NOT NULL,
    project_id TEXT NOT NULL,
    project_group TEXT,
    task_name TEXT NOT NULL,
    assignees TEXT NOT NULL DEFAULT '[]',
    start_date TEXT,
    end_date TEXT,
    raw_date TEXT NOT NULL,
    note TEXT,
    status TEXT NOT NULL,
    UNIQUE (import_id, task_key_full)
);

CREATE INDEX IF NOT EXISTS idx_tasks_import_base ON tasks(import_id, task_key);

CREATE TABLE IF NOT EXISTS import_warnings (
    id INTEGER PRIMARY KEY,
    import_id TEXT NOT NULL REFERENCES imports(import_id),
    code TEXT NOT NULL,
    message TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_warnings_import ON import_warnings(import_id);

CREATE TABLE IF NOT EXISTS command_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    import_id TEXT NOT NULL REFERENCES imports(import_id),
    command_type TEXT NOT NULL,
    task_id INTEGER,
    before_snapshot TEXT,
    after_snapshot TEXT,
    created_at TEXT NOT NULL,
    undone BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS idx_history_import ON command_history(import_id, id);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const TASK_COLUMNS: &str = "id, task_key, task_key_full, member_name, project_id, project_group,
     task_name, assignees, start_date, end_date, raw_date, note, status";

const HISTORY_COLUMNS: &str =
    "id, import_id, command_type, task_id, before_snapshot, after_snapshot, created_at, undone";

/// A row from the `imports` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    pub import_id: String,
    pub created_at: String,
    pub source_sha256: String,
    pub summary: ImportSummary,
}

/// SQLite-backed storage engine.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing gantry.db.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if !db_path.exists() {
            anyhow::bail!("database not found at {}", db_path.display());
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    /// Open or create gantry.db with full schema.
    pub fn open_or_create(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            anyhow::bail!(
                "gantry.db schema v{current} is newer than this build supports (v{SCHEMA_VERSION})"
            );
        }
        Ok(())
    }

    pub fn schema_version(&self) -> anyhow::Result<u32> {
        let version_str: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version_str.and_then(|v| v.parse().ok()).unwrap_or(1))
    }

    // ── Imports ─────────────────────────────────────────────────────

    /// Persist one accepted import: the import row, every task and every
    /// warning, in a single transaction. Returns the record and the stored
    /// tasks with their ids.
    pub fn record_import(
        &self,
        prepared: &PreparedImport,
    ) -> anyhow::Result<(ImportRecord, Vec<NormalizedTask>)> {
        let record = ImportRecord {
            import_id: format!("imp_{}", ulid::Ulid::new().to_string().to_lowercase()),
            created_at: now_rfc3339()?,
            source_sha256: prepared.source_digest.clone(),
            summary: prepared.result.summary.clone(),
        };
        let summary_json = serde_json::to_string(&record.summary)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO imports (import_id, created_at, source_sha256, summary)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.import_id,
                record.created_at,
                record.source_sha256,
                summary_json
            ],
        )?;

        let mut stored = Vec::with_capacity(prepared.result.tasks.len());
        for (position, task) in prepared.result.tasks.iter().enumerate() {
            tx.execute(
                "INSERT INTO tasks (
                    import_id, position, task_key, task_key_full, member_name,
                    project_id, project_group, task_name, assignees,
                    start_date, end_date, raw_date, note, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.import_id,
                    position as i64,
                    task.task_key,
                    task.task_key_full,
                    task.member_name,
                    task.project_id,
                    task.project_group,
                    task.task_name,
                    serde_json::to_string(&task.assignees)?,
                    task.start,
                    task.end,
                    task.raw_date,
                    task.note,
                    task.status.as_str(),
                ],
            )?;
            let mut task = task.clone();
            task.id = Some(tx.last_insert_rowid());
            stored.push(task);
        }

        for warning in &prepared.result.warnings {
            tx.execute(
                "INSERT INTO import_warnings (import_id, code, message, context)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.import_id,
                    warning.code.as_str(),
                    warning.message,
                    serde_json::to_string(&warning.context)?,
                ],
            )?;
        }

        tx.commit()?;
        tracing::info!(
            import_id = %record.import_id,
            tasks = stored.len(),
            warnings = prepared.result.warnings.len(),
            "import recorded"
        );
        Ok((record, stored))
    }

    pub fn latest_import(&self) -> anyhow::Result<Option<ImportRecord>> {
        self.query_import(
            "SELECT import_id, created_at, source_sha256, summary FROM imports
             ORDER BY rowid DESC LIMIT 1",
            params![],
        )
    }

    pub fn import_by_id(&self, import_id: &str) -> anyhow::Result<Option<ImportRecord>> {
        self.query_import(
            "SELECT import_id, created_at, source_sha256, summary FROM imports
             WHERE import_id = ?1",
            params![import_id],
        )
    }

    /// The import accepted immediately before `import_id`.
    pub fn previous_import(&self, import_id: &str) -> anyhow::Result<Option<ImportRecord>> {
        self.query_import(
            "SELECT import_id, created_at, source_sha256, summary FROM imports
             WHERE rowid < (SELECT rowid FROM imports WHERE import_id = ?1)
             ORDER BY rowid DESC LIMIT 1",
            params![import_id],
        )
    }

    /// All imports, newest first.
    pub fn list_imports(&self) -> anyhow::Result<Vec<ImportRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT import_id, created_at, source_sha256, summary FROM imports
             ORDER BY rowid DESC",
        )?;
        let rows = stmt
            .query_map([], map_import_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_import).collect()
    }

    fn query_import(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> anyhow::Result<Option<ImportRecord>> {
        let row = self.conn.query_row(sql, params, map_import_row).optional()?;
        row.map(row_to_import).transpose()
    }

    /// Tasks of one import in their original encounter order.
    pub fn tasks_for_import(&self, import_id: &str) -> anyhow::Result<Vec<NormalizedTask>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE import_id = ?1 ORDER BY position, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![import_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_task).collect()
    }

    pub fn warnings_for_import(&self, import_id: &str) -> anyhow::Result<Vec<ImportWarning>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, message, context FROM import_warnings
             WHERE import_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![import_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(code, message, context)| {
                let code = WarningCode::parse(&code)
                    .ok_or_else(|| anyhow::anyhow!("unknown warning code in store: {code}"))?;
                Ok(ImportWarning {
                    code,
                    message,
                    context: serde_json::from_str(&context)?,
                })
            })
            .collect()
    }

    // ── History ─────────────────────────────────────────────────────

    /// History of one import, newest first.
    pub fn history_for_import(
        &self,
        import_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<CommandHistoryEntry>> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM command_history
             WHERE import_id = ?1 ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![import_id, limit as i64], map_history_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(row_to_history).collect())
    }

    /// Keep only the newest `keep` entries of an import. Returns rows removed.
    pub fn prune_history(&self, import_id: &str, keep: usize) -> anyhow::Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM command_history
             WHERE import_id = ?1 AND id NOT IN (
                 SELECT id FROM command_history WHERE import_id = ?1
                 ORDER BY id DESC LIMIT ?2
             )",
            params![import_id, keep as i64],
        )?;
        if removed > 0 {
            tracing::debug!(import_id, removed, keep, "pruned command history");
        }
        Ok(removed)
    }

    fn query_history(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> anyhow::Result<Option<CommandHistoryEntry>> {
        let sql = format!("SELECT {HISTORY_COLUMNS} FROM command_history WHERE {filter}");
        let row = self.conn.query_row(&sql, params, map_history_row).optional()?;
        Ok(row.map(row_to_history))
    }

    fn query_task(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> anyhow::Result<Option<NormalizedTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE {filter}");
        let row = self.conn.query_row(&sql, params, map_task_row).optional()?;
        row.map(row_to_task).transpose()
    }
}

impl TaskStore for SqliteStore {
    fn atomic<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Self) -> anyhow::Result<T>,
    {
        // Dropping an uncommitted transaction rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    fn task_by_key(&self, import_id: &str, full_key: &str) -> anyhow::Result<Option<NormalizedTask>> {
        self.query_task(
            "import_id = ?1 AND task_key_full = ?2",
            params![import_id, full_key],
        )
    }

    fn task_by_id(&self, import_id: &str, id: i64) -> anyhow::Result<Option<NormalizedTask>> {
        self.query_task("import_id = ?1 AND id = ?2", params![import_id, id])
    }

    fn keys_sharing_base(
        &self,
        import_id: &str,
        base_key: &str,
        excluding_full_key: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_key_full FROM tasks
             WHERE import_id = ?1 AND task_key = ?2 AND task_key_full != ?3
             ORDER BY id",
        )?;
        let keys = stmt
            .query_map(params![import_id, base_key, excluding_full_key], |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn write_task(&self, import_id: &str, full_key: &str, task: &NormalizedTask) -> anyhow::Result<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET
                task_key = ?3, task_key_full = ?4, member_name = ?5, project_id = ?6,
                project_group = ?7, task_name = ?8, assignees = ?9, start_date = ?10,
                end_date = ?11, raw_date = ?12, note = ?13, status = ?14
             WHERE import_id = ?1 AND task_key_full = ?2",
            params![
                import_id,
                full_key,
                task.task_key,
                task.task_key_full,
                task.member_name,
                task.project_id,
                task.project_group,
                task.task_name,
                serde_json::to_string(&task.assignees)?,
                task.start,
                task.end,
                task.raw_date,
                task.note,
                task.status.as_str(),
            ],
        )?;
        if changed == 0 {
            anyhow::bail!("no task {full_key} in import {import_id}");
        }
        Ok(())
    }

    fn append_history(&self, entry: &CommandHistoryEntry) -> anyhow::Result<i64> {
        let before = entry.before.as_ref().map(encode_snapshot).transpose()?;
        let after = entry.after.as_ref().map(encode_snapshot).transpose()?;
        self.conn.execute(
            "INSERT INTO command_history
             (import_id, command_type, task_id, before_snapshot, after_snapshot, created_at, undone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.import_id,
                entry.command_type,
                entry.task_id,
                before,
                after,
                entry.created_at,
                entry.undone,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn read_history(&self, id: i64) -> anyhow::Result<Option<CommandHistoryEntry>> {
        self.query_history("id = ?1", params![id])
    }

    fn apply_snapshot(&self, import_id: &str, snapshot: &NormalizedTask) -> anyhow::Result<bool> {
        let Some(id) = snapshot.id else {
            return Ok(false);
        };
        let changed = self.conn.execute(
            "UPDATE tasks SET
                task_key = ?3, task_key_full = ?4, member_name = ?5, project_id = ?6,
                project_group = ?7, task_name = ?8, assignees = ?9, start_date = ?10,
                end_date = ?11, raw_date = ?12, note = ?13, status = ?14
             WHERE import_id = ?1 AND id = ?2",
            params![
                import_id,
                id,
                snapshot.task_key,
                snapshot.task_key_full,
                snapshot.member_name,
                snapshot.project_id,
                snapshot.project_group,
                snapshot.task_name,
                serde_json::to_string(&snapshot.assignees)?,
                snapshot.start,
                snapshot.end,
                snapshot.raw_date,
                snapshot.note,
                snapshot.status.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }

    fn latest_undoable(&self, import_id: &str) -> anyhow::Result<Option<CommandHistoryEntry>> {
        self.query_history(
            "import_id = ?1 AND undone = FALSE ORDER BY id DESC LIMIT 1",
            params![import_id],
        )
    }

    fn next_redoable(&self, import_id: &str) -> anyhow::Result<Option<CommandHistoryEntry>> {
        self.query_history(
            "import_id = ?1 AND undone = TRUE AND id > COALESCE(
                 (SELECT MAX(id) FROM command_history WHERE import_id = ?1 AND undone = FALSE), 0)
             ORDER BY id ASC LIMIT 1",
            params![import_id],
        )
    }

    fn set_history_undone(&self, id: i64, undone: bool) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE command_history SET undone = ?2 WHERE id = ?1",
            params![id, undone],
        )?;
        Ok(())
    }

    fn discard_redo_tail(&self, import_id: &str) -> anyhow::Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM command_history WHERE import_id = ?1 AND undone = TRUE",
            params![import_id],
        )?;
        Ok(removed)
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Merge WAL back into main DB so users see a single file when idle.
        let _ = self
            .conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

fn now_rfc3339() -> anyhow::Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

// ── Row mapping ─────────────────────────────────────────────────────

/// Intermediate row structs; JSON columns are decoded outside the rusqlite
/// mapper so their errors surface as `anyhow` errors.
struct ImportRow {
    import_id: String,
    created_at: String,
    source_sha256: String,
    summary_str: String,
}

fn map_import_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportRow> {
    Ok(ImportRow {
        import_id: row.get(0)?,
        created_at: row.get(1)?,
        source_sha256: row.get(2)?,
        summary_str: row.get(3)?,
    })
}

fn row_to_import(row: ImportRow) -> anyhow::Result<ImportRecord> {
    Ok(ImportRecord {
        import_id: row.import_id,
        created_at: row.created_at,
        source_sha256: row.source_sha256,
        summary: serde_json::from_str(&row.summary_str)?,
    })
}

struct TaskRow {
    id: i64,
    task_key: String,
    task_key_full: String,
    member_name: String,
    project_id: String,
    project_group: Option<String>,
    task_name: String,
    assignees_str: String,
    start: Option<String>,
    end: Option<String>,
    raw_date: String,
    note: Option<String>,
    status_str: String,
}

fn map_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        task_key: row.get(1)?,
        task_key_full: row.get(2)?,
        member_name: row.get(3)?,
        project_id: row.get(4)?,
        project_group: row.get(5)?,
        task_name: row.get(6)?,
        assignees_str: row.get(7)?,
        start: row.get(8)?,
        end: row.get(9)?,
        raw_date: row.get(10)?,
        note: row.get(11)?,
        status_str: row.get(12)?,
    })
}

fn row_to_task(row: TaskRow) -> anyhow::Result<NormalizedTask> {
    let status = TaskStatus::parse(&row.status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown task status in store: {}", row.status_str))?;
    Ok(NormalizedTask {
        id: Some(row.id),
        task_key: row.task_key,
        task_key_full: row.task_key_full,
        member_name: row.member_name,
        project_id: row.project_id,
        project_group: row.project_group,
        task_name: row.task_name,
        assignees: serde_json::from_str(&row.assignees_str)?,
        start: row.start,
        end: row.end,
        raw_date: row.raw_date,
        note: row.note,
        status,
    })
}

struct HistoryRow {
    id: i64,
    import_id: String,
    command_type: String,
    task_id: Option<i64>,
    before_str: Option<String>,
    after_str: Option<String>,
    created_at: String,
    undone: bool,
}

fn map_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        import_id: row.get(1)?,
        command_type: row.get(2)?,
        task_id: row.get(3)?,
        before_str: row.get(4)?,
        after_str: row.get(5)?,
        created_at: row.get(6)?,
        undone: row.get(7)?,
    })
}

/// Unreadable snapshots decode to `None` rather than failing the read.
fn row_to_history(row: HistoryRow) -> CommandHistoryEntry {
    CommandHistoryEntry {
        id: Some(row.id),
        import_id: row.import_id,
        command_type: row.command_type,
        task_id: row.task_id,
        before: decode_optional(row.before_str.as_deref()),
        after: decode_optional(row.after_str.as_deref()),
        created_at: row.created_at,
        undone: row.undone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::history::{apply_edit, undo, EditOutcome, ReplayOutcome};
    use gantry_core::{prepare_import, TaskEdit};
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    const PLAN: &str = r#"{"members":[
        {"name":"Ann","projects":[{"project_id":"P1","tasks":[
            {"name":"Design","start":"2024-01-01","end":"2024-01-05","assignees":["Bo"]},
            {"name":"Design"},
            {"name":"Build","start":"2024-01-06","end":"2024-01-02"}
        ]}]}
    ]}"#;

    fn tmp_db() -> (std::path::PathBuf, SqliteStore) {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir =
            std::env::temp_dir().join(format!("gantry_sqlite_test_{}_{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let store = SqliteStore::open_or_create(&dir.join("gantry.db")).unwrap();
        (dir, store)
    }

    fn seeded(store: &SqliteStore) -> ImportRecord {
        let prepared = prepare_import(PLAN).unwrap();
        store.record_import(&prepared).unwrap().0
    }

    #[test]
    fn schema_creation() {
        let (dir, store) = tmp_db();
        let tables: Vec<String> = store
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        for t in ["imports", "tasks", "import_warnings", "command_history", "schema_meta"] {
            assert!(tables.contains(&t.to_string()), "missing table {t}");
        }
        assert_eq!(store.schema_version().unwrap(), 1);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn record_import_persists_tasks_and_warnings() {
        let (dir, store) = tmp_db();
        let prepared = prepare_import(PLAN).unwrap();
        let (record, stored) = store.record_import(&prepared).unwrap();

        assert!(record.import_id.starts_with("imp_"));
        assert_eq!(record.source_sha256, prepared.source_digest);
        assert_eq!(record.summary.total_tasks, 3);
        assert!(stored.iter().all(|t| t.id.is_some()));

        let loaded = store.tasks_for_import(&record.import_id).unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded[0].assignees, vec!["Bo"]);
        assert_eq!(loaded[1].task_key_full, "P1::Design#2");
        assert_eq!(loaded[2].status, TaskStatus::InvalidDate);

        let warnings = store.warnings_for_import(&record.import_id).unwrap();
        assert_eq!(warnings, prepared.result.warnings);

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn import_ordering_queries() {
        let (dir, store) = tmp_db();
        assert!(store.latest_import().unwrap().is_none());
        let first = seeded(&store);
        let second = seeded(&store);

        assert_eq!(store.latest_import().unwrap(), Some(second.clone()));
        assert_eq!(store.previous_import(&second.import_id).unwrap(), Some(first.clone()));
        assert!(store.previous_import(&first.import_id).unwrap().is_none());
        assert_eq!(store.import_by_id(&first.import_id).unwrap(), Some(first.clone()));
        assert!(store.import_by_id("imp_missing").unwrap().is_none());

        let all = store.list_imports().unwrap();
        assert_eq!(all, vec![second, first]);

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn full_keys_are_scoped_per_import() {
        let (dir, store) = tmp_db();
        let a = seeded(&store);
        let b = seeded(&store);
        let in_a = store.task_by_key(&a.import_id, "P1::Design").unwrap().unwrap();
        let in_b = store.task_by_key(&b.import_id, "P1::Design").unwrap().unwrap();
        assert_ne!(in_a.id, in_b.id);
        assert!(store.task_by_id(&a.import_id, in_b.id.unwrap()).unwrap().is_none());
        assert_eq!(
            store
                .keys_sharing_base(&a.import_id, "P1::Design", "P1::Design")
                .unwrap(),
            vec!["P1::Design#2"]
        );
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn edit_and_undo_through_sqlite() {
        let (dir, store) = tmp_db();
        let import = seeded(&store);
        let imp = import.import_id.as_str();
        let original = store.task_by_key(imp, "P1::Build").unwrap().unwrap();

        let mut edit = TaskEdit::from_task(&original);
        edit.task_name = "Design".into();
        edit.start = Some("2024-01-06".into());
        edit.end = Some("2024-01-09".into());
        let task = match apply_edit(&store, imp, &edit).unwrap() {
            EditOutcome::Committed { task, .. } => task,
            EditOutcome::NotFound => panic!("expected commit"),
        };
        assert_eq!(task.task_key_full, "P1::Design#3");
        assert_eq!(task.status, TaskStatus::Scheduled);

        let history = store.history_for_import(imp, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].before.as_ref(), Some(&original));
        assert_eq!(history[0].after.as_ref(), Some(&task));

        match undo(&store, imp).unwrap() {
            ReplayOutcome::Applied { task, .. } => assert_eq!(task, original),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.history_for_import(imp, 10).unwrap()[0].undone);

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_atomic_block_rolls_back() {
        let (dir, store) = tmp_db();
        let import = seeded(&store);
        let imp = import.import_id.as_str();
        let mut task = store.task_by_key(imp, "P1::Build").unwrap().unwrap();
        task.note = Some("half-done".into());

        let res: anyhow::Result<()> = store.atomic(|s| {
            s.write_task(imp, "P1::Build", &task)?;
            anyhow::bail!("boom")
        });
        assert!(res.is_err());
        let after = store.task_by_key(imp, "P1::Build").unwrap().unwrap();
        assert!(after.note.is_none());

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_snapshot_reads_as_absent() {
        let (dir, store) = tmp_db();
        let import = seeded(&store);
        store
            .conn
            .execute(
                "INSERT INTO command_history
                 (import_id, command_type, task_id, before_snapshot, after_snapshot, created_at)
                 VALUES (?1, 'update_task', 1, '{\"task_key\": 5}', NULL, '2024-01-01T00:00:00Z')",
                params![import.import_id],
            )
            .unwrap();
        let entry = store.latest_undoable(&import.import_id).unwrap().unwrap();
        assert!(entry.before.is_none());
        assert!(entry.after.is_none());
        assert_eq!(
            undo(&store, &import.import_id).unwrap(),
            ReplayOutcome::NotApplied
        );
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn redo_cursor_and_prune() {
        let (dir, store) = tmp_db();
        let import = seeded(&store);
        let imp = import.import_id.as_str();
        let entry = |undone| CommandHistoryEntry {
            id: None,
            import_id: imp.to_string(),
            command_type: "update_task".into(),
            task_id: None,
            before: None,
            after: None,
            created_at: "2024-01-01T00:00:00Z".into(),
            undone,
        };
        let h1 = store.append_history(&entry(false)).unwrap();
        let h2 = store.append_history(&entry(true)).unwrap();
        let h3 = store.append_history(&entry(true)).unwrap();

        assert_eq!(store.latest_undoable(imp).unwrap().unwrap().id, Some(h1));
        assert_eq!(store.next_redoable(imp).unwrap().unwrap().id, Some(h2));
        store.set_history_undone(h2, false).unwrap();
        assert_eq!(store.next_redoable(imp).unwrap().unwrap().id, Some(h3));

        assert_eq!(store.discard_redo_tail(imp).unwrap(), 1);
        assert!(store.next_redoable(imp).unwrap().is_none());

        for _ in 0..5 {
            store.append_history(&entry(false)).unwrap();
        }
        assert_eq!(store.prune_history(imp, 3).unwrap(), 4);
        let kept = store.history_for_import(imp, 100).unwrap();
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|e| e.id > Some(h2)));

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wal_checkpoint_on_drop() {
        let (dir, store) = tmp_db();
        seeded(&store);
        drop(store);
        let wal_path = dir.join("gantry.db-wal");
        if wal_path.exists() {
            let size = std::fs::metadata(&wal_path).unwrap().len();
            assert_eq!(size, 0, "WAL file should be empty after checkpoint");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
