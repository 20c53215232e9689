//! In-memory [`TaskStore`] for engine tests.

use std::cell::{Cell, RefCell};

use crate::keys::base_key;
use crate::normalize::{classify_dates, derive_raw_date};
use crate::store::TaskStore;
use crate::types::{CommandHistoryEntry, NormalizedTask};

#[derive(Debug, Clone, Default)]
struct State {
    tasks: Vec<(String, NormalizedTask)>,
    history: Vec<CommandHistoryEntry>,
    next_task_id: i64,
    next_history_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<State>,
    refuse_snapshots: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task under the first free slot of its base key.
    pub fn insert(
        &self,
        import_id: &str,
        project_id: &str,
        name: &str,
        dates: Option<(&str, &str)>,
    ) -> NormalizedTask {
        let mut state = self.state.borrow_mut();
        let base = base_key(project_id, name);
        let mut n = 1;
        let full = loop {
            let candidate = if n == 1 {
                base.clone()
            } else {
                format!("{base}#{n}")
            };
            let taken = state
                .tasks
                .iter()
                .any(|(imp, t)| imp == import_id && t.task_key_full == candidate);
            if !taken {
                break candidate;
            }
            n += 1;
        };

        let (start, end) = match dates {
            Some((s, e)) => (Some(s), Some(e)),
            None => (None, None),
        };
        let check = classify_dates(start, end);
        state.next_task_id += 1;
        let task = NormalizedTask {
            id: Some(state.next_task_id),
            task_key: base,
            task_key_full: full,
            member_name: "Ann".to_string(),
            project_id: project_id.to_string(),
            project_group: None,
            task_name: name.to_string(),
            assignees: Vec::new(),
            start: check.start,
            end: check.end,
            raw_date: derive_raw_date("", start, end),
            note: None,
            status: check.status,
        };
        state.tasks.push((import_id.to_string(), task.clone()));
        task
    }

    pub fn get(&self, import_id: &str, full_key: &str) -> Option<NormalizedTask> {
        self.state
            .borrow()
            .tasks
            .iter()
            .find(|(imp, t)| imp == import_id && t.task_key_full == full_key)
            .map(|(_, t)| t.clone())
    }

    pub fn delete(&self, import_id: &str, id: i64) {
        self.state
            .borrow_mut()
            .tasks
            .retain(|(imp, t)| !(imp == import_id && t.id == Some(id)));
    }

    pub fn history_len(&self) -> usize {
        self.state.borrow().history.len()
    }

    /// While set, `apply_snapshot` fails as a broken store write would.
    pub fn refuse_snapshot_writes(&self, refuse: bool) {
        self.refuse_snapshots.set(refuse);
    }
}

impl TaskStore for MemoryStore {
    fn atomic<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Self) -> anyhow::Result<T>,
    {
        let saved = self.state.borrow().clone();
        let out = f(self);
        if out.is_err() {
            *self.state.borrow_mut() = saved;
        }
        out
    }

    fn task_by_key(&self, import_id: &str, full_key: &str) -> anyhow::Result<Option<NormalizedTask>> {
        Ok(self.get(import_id, full_key))
    }

    fn task_by_id(&self, import_id: &str, id: i64) -> anyhow::Result<Option<NormalizedTask>> {
        Ok(self
            .state
            .borrow()
            .tasks
            .iter()
            .find(|(imp, t)| imp == import_id && t.id == Some(id))
            .map(|(_, t)| t.clone()))
    }

    fn keys_sharing_base(
        &self,
        import_id: &str,
        base_key: &str,
        excluding_full_key: &str,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self
            .state
            .borrow()
            .tasks
            .iter()
            .filter(|(imp, t)| {
                imp == import_id && t.task_key == base_key && t.task_key_full != excluding_full_key
            })
            .map(|(_, t)| t.task_key_full.clone())
            .collect())
    }

    fn write_task(&self, import_id: &str, full_key: &str, task: &NormalizedTask) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        let Some((_, row)) = state
            .tasks
            .iter_mut()
            .find(|(imp, t)| imp == import_id && t.task_key_full == full_key)
        else {
            anyhow::bail!("no task {full_key}");
        };
        let id = row.id;
        *row = task.clone();
        row.id = id;
        Ok(())
    }

    fn append_history(&self, entry: &CommandHistoryEntry) -> anyhow::Result<i64> {
        let mut state = self.state.borrow_mut();
        state.next_history_id += 1;
        let id = state.next_history_id;
        let mut entry = entry.clone();
        entry.id = Some(id);
        state.history.push(entry);
        Ok(id)
    }

    fn read_history(&self, id: i64) -> anyhow::Result<Option<CommandHistoryEntry>> {
        Ok(self
            .state
            .borrow()
            .history
            .iter()
            .find(|e| e.id == Some(id))
            .cloned())
    }

    fn apply_snapshot(&self, import_id: &str, snapshot: &NormalizedTask) -> anyhow::Result<bool> {
        if self.refuse_snapshots.get() {
            anyhow::bail!("snapshot write refused");
        }
        let mut state = self.state.borrow_mut();
        let row = state
            .tasks
            .iter_mut()
            .find(|(imp, t)| imp == import_id && t.id.is_some() && t.id == snapshot.id);
        match row {
            Some((_, row)) => {
                *row = snapshot.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn latest_undoable(&self, import_id: &str) -> anyhow::Result<Option<CommandHistoryEntry>> {
        Ok(self
            .state
            .borrow()
            .history
            .iter()
            .filter(|e| e.import_id == import_id && !e.undone)
            .max_by_key(|e| e.id)
            .cloned())
    }

    fn next_redoable(&self, import_id: &str) -> anyhow::Result<Option<CommandHistoryEntry>> {
        let state = self.state.borrow();
        let floor = state
            .history
            .iter()
            .filter(|e| e.import_id == import_id && !e.undone)
            .filter_map(|e| e.id)
            .max()
            .unwrap_or(0);
        Ok(state
            .history
            .iter()
            .filter(|e| e.import_id == import_id && e.undone && e.id.unwrap_or(0) > floor)
            .min_by_key(|e| e.id)
            .cloned())
    }

    fn set_history_undone(&self, id: i64, undone: bool) -> anyhow::Result<()> {
        if let Some(entry) = self
            .state
            .borrow_mut()
            .history
            .iter_mut()
            .find(|e| e.id == Some(id))
        {
            entry.undone = undone;
        }
        Ok(())
    }

    fn discard_redo_tail(&self, import_id: &str) -> anyhow::Result<usize> {
        let mut state = self.state.borrow_mut();
        let before = state.history.len();
        state
            .history
            .retain(|e| !(e.import_id == import_id && e.undone));
        Ok(before - state.history.len())
    }
}
