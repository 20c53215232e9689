use serde::{Deserialize, Serialize};

/// Marker stored in `raw_date` when a task carries no date information at all.
pub const RAW_DATE_TBD: &str = "TBD";

/// Placeholder for members whose name is blank after trimming.
pub const UNNAMED_MEMBER: &str = "Unnamed member";

/// Placeholder for tasks whose name is blank after trimming.
pub const UNTITLED_TASK: &str = "Untitled task";

/// Separator between project id and task name in a base key.
pub const KEY_SEPARATOR: &str = "::";

/// Opaque import generation id: `imp_<ulid>`.
pub type ImportId = String;

// ── Recovered document ──────────────────────────────────────────────

/// The literal document recovered from text. No uniqueness holds here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawImport {
    pub members: Vec<RawMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawMember {
    pub name: String,
    pub projects: Vec<RawProject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawProject {
    #[serde(default, alias = "projectId")]
    pub project_id: Option<String>,
    #[serde(default, alias = "projectGroup", alias = "group")]
    pub project_group: Option<String>,
    pub tasks: Vec<RawTask>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTask {
    pub name: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, alias = "rawDate")]
    pub raw_date: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub assignees: Option<Vec<String>>,
}

// ── Canonical task model ────────────────────────────────────────────

/// Derived scheduling status. Never user-supplied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    Unscheduled,
    InvalidDate,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Unscheduled => "unscheduled",
            TaskStatus::InvalidDate => "invalid_date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(TaskStatus::Scheduled),
            "unscheduled" => Some(TaskStatus::Unscheduled),
            "invalid_date" => Some(TaskStatus::InvalidDate),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical unit produced by normalization and stored per import.
///
/// `task_key_full` is unique within one import; `task_key` is the shared
/// `projectId::taskName` base it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub task_key: String,
    pub task_key_full: String,
    pub member_name: String,
    pub project_id: String,
    #[serde(default)]
    pub project_group: Option<String>,
    pub task_name: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    pub raw_date: String,
    #[serde(default)]
    pub note: Option<String>,
    pub status: TaskStatus,
}

// ── Warnings and summary ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    ProjectIdMissing,
    DuplicateTaskKey,
    InvalidDateFormat,
    DateRangeInvalid,
    PartialDate,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::ProjectIdMissing => "project_id_missing",
            WarningCode::DuplicateTaskKey => "duplicate_task_key",
            WarningCode::InvalidDateFormat => "invalid_date_format",
            WarningCode::DateRangeInvalid => "date_range_invalid",
            WarningCode::PartialDate => "partial_date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project_id_missing" => Some(WarningCode::ProjectIdMissing),
            "duplicate_task_key" => Some(WarningCode::DuplicateTaskKey),
            "invalid_date_format" => Some(WarningCode::InvalidDateFormat),
            "date_range_invalid" => Some(WarningCode::DateRangeInvalid),
            "partial_date" => Some(WarningCode::PartialDate),
            _ => None,
        }
    }
}

/// A row-level data defect. Accumulated, never raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportWarning {
    pub code: WarningCode,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub total_members: usize,
    pub total_projects: usize,
    pub total_tasks: usize,
    pub scheduled: usize,
    pub unscheduled: usize,
    pub invalid: usize,
    pub warnings: usize,
    pub skipped_projects: usize,
}

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizeResult {
    pub tasks: Vec<NormalizedTask>,
    pub warnings: Vec<ImportWarning>,
    pub summary: ImportSummary,
}

// ── Diff ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub updated: usize,
    pub archived: usize,
    pub invalid: usize,
    pub unscheduled: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiffResult {
    pub added: Vec<NormalizedTask>,
    pub updated: Vec<NormalizedTask>,
    pub archived: Vec<NormalizedTask>,
    pub summary: DiffSummary,
}

// ── Edits and history ───────────────────────────────────────────────

/// Command type tag for single-task field edits.
pub const CMD_UPDATE_TASK: &str = "update_task";

/// A requested point-edit of one task, addressed by its current full key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskEdit {
    pub current_full_key: String,
    pub member_name: String,
    pub project_id: String,
    pub project_group: Option<String>,
    pub task_name: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub note: Option<String>,
    pub assignees: Vec<String>,
}

impl TaskEdit {
    /// Seed an edit with every field of `task`, ready for selective overrides.
    pub fn from_task(task: &NormalizedTask) -> Self {
        Self {
            current_full_key: task.task_key_full.clone(),
            member_name: task.member_name.clone(),
            project_id: task.project_id.clone(),
            project_group: task.project_group.clone(),
            task_name: task.task_name.clone(),
            start: task.start.clone(),
            end: task.end.clone(),
            note: task.note.clone(),
            assignees: task.assignees.clone(),
        }
    }
}

/// One committed mutation with the snapshots needed to reverse it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandHistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub import_id: ImportId,
    pub command_type: String,
    #[serde(default)]
    pub task_id: Option<i64>,
    pub before: Option<NormalizedTask>,
    pub after: Option<NormalizedTask>,
    pub created_at: String,
    #[serde(default)]
    pub undone: bool,
}
