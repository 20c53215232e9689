use crate::config::Config;
use crate::lock::WorkspaceLock;
use crate::paths::GantryPaths;
use crate::sqlite_store::{ImportRecord, SqliteStore};
use gantry_core::diff::diff_tasks;
use gantry_core::history::{self, EditOutcome, ReplayOutcome};
use gantry_core::store::TaskStore;
use gantry_core::{DiffResult, NormalizedTask, PipelineError, PreparedImport, Preview, TaskEdit};
use std::path::PathBuf;

/// An opened `.gantry/` workspace: paths, config and the store.
pub struct Workspace {
    pub paths: GantryPaths,
    pub config: Config,
    store: SqliteStore,
}

/// Result of accepting an import.
#[derive(Debug, Clone)]
pub struct Applied {
    pub record: ImportRecord,
    pub tasks: Vec<NormalizedTask>,
    /// The source text is byte-identical to the previous import's.
    pub same_source_as_previous: bool,
}

impl Workspace {
    /// Open an existing workspace. Fails if `.gantry/` does not exist.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let paths = GantryPaths::discover(root);
        if !paths.is_initialized() {
            anyhow::bail!(
                "not a gantry workspace ({}/.gantry not found). Run `gantry init` first.",
                paths.root.display()
            );
        }
        let config = Config::load(&paths.config_json)?;
        let store = SqliteStore::open(&paths.db_path)?;
        Ok(Self {
            paths,
            config,
            store,
        })
    }

    /// Create `.gantry/`, the database and a default config. Idempotent.
    pub fn init(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let paths = GantryPaths::discover(root);
        paths.ensure_layout()?;
        let store = SqliteStore::open_or_create(&paths.db_path)?;
        let config = Config::load(&paths.config_json)?;
        if !paths.config_json.exists() {
            config.save(&paths.config_json)?;
        }
        Ok(Self {
            paths,
            config,
            store,
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn lock(&self) -> anyhow::Result<WorkspaceLock> {
        WorkspaceLock::acquire(&self.paths)
    }

    /// The import `id`, or the latest one when `id` is `None`.
    pub fn resolve_import(&self, id: Option<&str>) -> anyhow::Result<ImportRecord> {
        match id {
            Some(id) => self
                .store
                .import_by_id(id)?
                .ok_or_else(|| anyhow::anyhow!("no import with id {id}")),
            None => self
                .store
                .latest_import()?
                .ok_or_else(|| anyhow::anyhow!("no imports yet. Run `gantry apply` first.")),
        }
    }

    /// Recover and normalize `text`, diffed against the latest import.
    pub fn preview(&self, text: &str) -> Result<Preview, PipelineError> {
        gantry_core::preview_with(text, || match self.store.latest_import()? {
            Some(latest) => self.store.tasks_for_import(&latest.import_id),
            None => Ok(Vec::new()),
        })
    }

    /// Persist a prepared import as the new latest generation.
    pub fn apply(&self, prepared: &PreparedImport) -> anyhow::Result<Applied> {
        let same_source_as_previous = self
            .store
            .latest_import()?
            .is_some_and(|latest| latest.source_sha256 == prepared.source_digest);
        if same_source_as_previous {
            tracing::info!("source text unchanged since the latest import");
        }
        let (record, tasks) = self.store.record_import(prepared)?;
        Ok(Applied {
            record,
            tasks,
            same_source_as_previous,
        })
    }

    /// Diff import `to` (default latest) against `from` (default its predecessor).
    pub fn diff_imports(&self, from: Option<&str>, to: Option<&str>) -> anyhow::Result<DiffResult> {
        let to = self.resolve_import(to)?;
        let from = match from {
            Some(id) => Some(self.resolve_import(Some(id))?),
            None => self.store.previous_import(&to.import_id)?,
        };
        let prev = match &from {
            Some(record) => self.store.tasks_for_import(&record.import_id)?,
            None => Vec::new(),
        };
        let next = self.store.tasks_for_import(&to.import_id)?;
        Ok(diff_tasks(&prev, &next))
    }

    /// Edit one task of the latest import, then trim history to the configured limit.
    pub fn edit(&self, edit: &TaskEdit) -> anyhow::Result<EditOutcome> {
        let latest = self.resolve_import(None)?;
        let outcome = history::apply_edit(&self.store, &latest.import_id, edit)?;
        if matches!(outcome, EditOutcome::Committed { .. }) {
            self.store
                .prune_history(&latest.import_id, self.config.history_limit)?;
        }
        Ok(outcome)
    }

    pub fn undo(&self) -> anyhow::Result<ReplayOutcome> {
        let latest = self.resolve_import(None)?;
        history::undo(&self.store, &latest.import_id)
    }

    pub fn redo(&self) -> anyhow::Result<ReplayOutcome> {
        let latest = self.resolve_import(None)?;
        history::redo(&self.store, &latest.import_id)
    }

    /// Undo one specific history entry of the latest import, out of cursor order.
    pub fn undo_entry(&self, history_id: i64) -> anyhow::Result<ReplayOutcome> {
        self.ensure_latest_entry(history_id)?;
        history::undo_entry(&self.store, history_id)
    }

    /// Redo one specific history entry of the latest import, out of cursor order.
    pub fn redo_entry(&self, history_id: i64) -> anyhow::Result<ReplayOutcome> {
        self.ensure_latest_entry(history_id)?;
        history::redo_entry(&self.store, history_id)
    }

    // Unknown ids pass through and replay as empty.
    fn ensure_latest_entry(&self, history_id: i64) -> anyhow::Result<()> {
        let latest = self.resolve_import(None)?;
        match self.store.read_history(history_id)? {
            Some(entry) if entry.import_id != latest.import_id => anyhow::bail!(
                "history entry {history_id} belongs to import {}, not the latest ({})",
                entry.import_id,
                latest.import_id
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{prepare_import, TaskStatus};

    const V1: &str = r#"{"members":[{"name":"Ann","projects":[{"project_id":"P","tasks":[
        {"name":"Design","start":"2024-01-01","end":"2024-01-05"},
        {"name":"Build"}
    ]}]}]}"#;

    const V2: &str = r#"Updated plan:
```json
{"members":[{"name":"Ann","projects":[{"project_id":"P","tasks":[
    {"name":"Design","start":"2024-01-01","end":"2024-01-08"},
    {"name":"Launch"}
]}]}]}
```"#;

    fn applied(ws: &Workspace, text: &str) -> Applied {
        ws.apply(&prepare_import(text).unwrap()).unwrap()
    }

    #[test]
    fn open_requires_init() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Workspace::open(tmp.path()).is_err());
        let ws = Workspace::init(tmp.path()).unwrap();
        assert!(ws.paths.config_json.exists());
        drop(ws);
        let ws = Workspace::open(tmp.path()).unwrap();
        assert_eq!(ws.config.history_limit, 200);
    }

    #[test]
    fn preview_and_diff_between_generations() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        let first = ws.preview(V1).unwrap();
        assert_eq!(first.diff.summary.added, 2);
        let a = applied(&ws, V1);
        assert!(!a.same_source_as_previous);
        assert!(applied(&ws, V1).same_source_as_previous);

        let preview = ws.preview(V2).unwrap();
        assert_eq!(preview.diff.summary.added, 1);
        assert_eq!(preview.diff.summary.updated, 1);
        assert_eq!(preview.diff.summary.archived, 1);

        let b = applied(&ws, V2);
        let diff = ws.diff_imports(None, None).unwrap();
        assert_eq!(diff.summary, preview.diff.summary);

        let back = ws
            .diff_imports(Some(&b.record.import_id), Some(&a.record.import_id))
            .unwrap();
        assert_eq!(back.added[0].task_key_full, "P::Build");
        assert_eq!(back.archived[0].task_key_full, "P::Launch");

        let first_ever = ws.diff_imports(None, Some(&a.record.import_id)).unwrap();
        assert_eq!(first_ever.summary.added, 2);
    }

    #[test]
    fn preview_without_document_fails_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();
        assert!(matches!(ws.preview("no json here"), Err(PipelineError::NoDocument)));
    }

    #[test]
    fn edits_target_latest_import_and_respect_history_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = Workspace::init(tmp.path()).unwrap();
        ws.config.history_limit = 2;
        assert!(ws.undo().is_err());
        let imported = applied(&ws, V1);
        let imp = imported.record.import_id.as_str();

        for note in ["a", "b", "c"] {
            let current = ws.store().tasks_for_import(imp).unwrap()[1].clone();
            let mut edit = TaskEdit::from_task(&current);
            edit.note = Some(note.into());
            assert!(matches!(ws.edit(&edit).unwrap(), EditOutcome::Committed { .. }));
        }
        assert_eq!(ws.store().history_for_import(imp, 10).unwrap().len(), 2);

        let undone = match ws.undo().unwrap() {
            ReplayOutcome::Applied { task, .. } => task,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(undone.note.as_deref(), Some("b"));
        assert_eq!(undone.status, TaskStatus::Unscheduled);
        assert!(matches!(ws.redo().unwrap(), ReplayOutcome::Applied { .. }));

        let mut missing = TaskEdit::from_task(&undone);
        missing.current_full_key = "P::Nope".into();
        assert_eq!(ws.edit(&missing).unwrap(), EditOutcome::NotFound);
    }

    #[test]
    fn entries_replay_by_id_within_latest_import() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();
        let imp = applied(&ws, V1).record.import_id;

        let mut ids = Vec::new();
        for key in ["P::Build", "P::Design"] {
            let current = ws.store().task_by_key(&imp, key).unwrap().unwrap();
            let mut edit = TaskEdit::from_task(&current);
            edit.note = Some(format!("{key} reviewed"));
            match ws.edit(&edit).unwrap() {
                EditOutcome::Committed { history_id, .. } => ids.push(history_id),
                EditOutcome::NotFound => panic!("edit of {key} not committed"),
            }
        }

        let build = match ws.undo_entry(ids[0]).unwrap() {
            ReplayOutcome::Applied { task, .. } => task,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(build.task_key_full, "P::Build");
        assert!(build.note.is_none());
        let design = ws.store().task_by_key(&imp, "P::Design").unwrap().unwrap();
        assert_eq!(design.note.as_deref(), Some("P::Design reviewed"));

        assert!(matches!(ws.redo_entry(ids[0]).unwrap(), ReplayOutcome::Applied { .. }));
        assert_eq!(ws.undo_entry(9_999).unwrap(), ReplayOutcome::Empty);

        applied(&ws, V2);
        assert!(ws.undo_entry(ids[0]).is_err());
        assert!(ws.redo_entry(ids[1]).is_err());
    }
}
