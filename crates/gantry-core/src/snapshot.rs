//! Task snapshots as stored in command history.
//!
//! Snapshots written by older builds or edited by hand are not trusted: they
//! go through a structural check first and anything off-shape is rejected
//! rather than surfaced as an error.

use serde_json::Value;

use crate::types::{NormalizedTask, TaskStatus};

const REQUIRED_STRINGS: &[&str] = &[
    "task_key",
    "task_key_full",
    "member_name",
    "project_id",
    "task_name",
    "raw_date",
];

const OPTIONAL_STRINGS: &[&str] = &["project_group", "start", "end", "note"];

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotParse {
    Valid(NormalizedTask),
    Rejected(String),
}

impl SnapshotParse {
    /// Rejected snapshots are indistinguishable from absent ones.
    pub fn into_task(self) -> Option<NormalizedTask> {
        match self {
            SnapshotParse::Valid(task) => Some(task),
            SnapshotParse::Rejected(_) => None,
        }
    }
}

pub fn encode_snapshot(task: &NormalizedTask) -> anyhow::Result<String> {
    Ok(serde_json::to_string(task)?)
}

pub fn parse_snapshot(text: &str) -> SnapshotParse {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return SnapshotParse::Rejected(format!("not JSON: {e}")),
    };
    check_shape(value)
}

/// Decode an optional snapshot column, logging and dropping bad payloads.
pub fn decode_optional(text: Option<&str>) -> Option<NormalizedTask> {
    match parse_snapshot(text?) {
        SnapshotParse::Valid(task) => Some(task),
        SnapshotParse::Rejected(reason) => {
            tracing::debug!(%reason, "ignoring unreadable snapshot");
            None
        }
    }
}

fn check_shape(value: Value) -> SnapshotParse {
    let Some(obj) = value.as_object() else {
        return SnapshotParse::Rejected("snapshot is not an object".to_string());
    };

    for key in REQUIRED_STRINGS {
        if !obj.get(*key).is_some_and(Value::is_string) {
            return SnapshotParse::Rejected(format!("missing string field `{key}`"));
        }
    }
    for key in OPTIONAL_STRINGS {
        if let Some(v) = obj.get(*key) {
            if !(v.is_null() || v.is_string()) {
                return SnapshotParse::Rejected(format!("field `{key}` must be a string or null"));
            }
        }
    }

    let status_ok = obj
        .get("status")
        .and_then(Value::as_str)
        .and_then(TaskStatus::parse)
        .is_some();
    if !status_ok {
        return SnapshotParse::Rejected("unknown or missing status".to_string());
    }

    if let Some(assignees) = obj.get("assignees") {
        let ok = assignees
            .as_array()
            .is_some_and(|arr| arr.iter().all(Value::is_string));
        if !ok {
            return SnapshotParse::Rejected("assignees must be a list of strings".to_string());
        }
    }

    if let Some(id) = obj.get("id") {
        if !(id.is_null() || id.is_i64()) {
            return SnapshotParse::Rejected("id must be an integer".to_string());
        }
    }

    match serde_json::from_value::<NormalizedTask>(value) {
        Ok(task) => SnapshotParse::Valid(task),
        Err(e) => SnapshotParse::Rejected(e.to_string()),
    }
}
