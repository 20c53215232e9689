//! Normalization of a recovered [`RawImport`] into canonical tasks.
//!
//! Never fails: every malformed row degrades to a warning plus a
//! non-`scheduled` status.

use serde_json::{Map, Value};
use time::{Date, Month};

use crate::keys::{base_key, KeyCounter};
use crate::types::*;

/// Strict `YYYY-MM-DD` calendar date. Rejects other separators, short fields,
/// month 13, Feb 29 outside leap years and the like.
pub fn parse_strict_date(s: &str) -> Option<Date> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year: i32 = s[0..4].parse().ok()?;
    let month: u8 = s[5..7].parse().ok()?;
    let day: u8 = s[8..10].parse().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Which side of a date range a problem was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSide {
    Start,
    End,
}

impl DateSide {
    fn as_str(&self) -> &'static str {
        match self {
            DateSide::Start => "start",
            DateSide::End => "end",
        }
    }
}

/// Outcome of classifying one task's date pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateIssue {
    BadFormat { side: DateSide, value: String },
    Partial { present: DateSide },
    Reversed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCheck {
    pub status: TaskStatus,
    pub start: Option<String>,
    pub end: Option<String>,
    pub issue: Option<DateIssue>,
}

/// Classify an already-trimmed date pair (blank counts as absent).
pub fn classify_dates(start: Option<&str>, end: Option<&str>) -> DateCheck {
    let invalid = |issue| DateCheck {
        status: TaskStatus::InvalidDate,
        start: None,
        end: None,
        issue: Some(issue),
    };

    let start_date = match start {
        Some(s) => match parse_strict_date(s) {
            Some(d) => Some(d),
            None => {
                return invalid(DateIssue::BadFormat {
                    side: DateSide::Start,
                    value: s.to_string(),
                })
            }
        },
        None => None,
    };
    let end_date = match end {
        Some(s) => match parse_strict_date(s) {
            Some(d) => Some(d),
            None => {
                return invalid(DateIssue::BadFormat {
                    side: DateSide::End,
                    value: s.to_string(),
                })
            }
        },
        None => None,
    };

    let (Some(start_date), Some(end_date)) = (start_date, end_date) else {
        let issue = match (start_date.is_some(), end_date.is_some()) {
            (true, false) => Some(DateIssue::Partial {
                present: DateSide::Start,
            }),
            (false, true) => Some(DateIssue::Partial {
                present: DateSide::End,
            }),
            _ => None,
        };
        return DateCheck {
            status: TaskStatus::Unscheduled,
            start: None,
            end: None,
            issue,
        };
    };

    if end_date < start_date {
        return invalid(DateIssue::Reversed);
    }

    DateCheck {
        status: TaskStatus::Scheduled,
        start: start.map(str::to_string),
        end: end.map(str::to_string),
        issue: None,
    }
}

/// Free-form date text for display: the original if any, else the raw date
/// strings joined by ` ~ `, else [`RAW_DATE_TBD`].
pub fn derive_raw_date(original: &str, start: Option<&str>, end: Option<&str>) -> String {
    if let Some(text) = non_blank(original) {
        return text.to_string();
    }
    let parts: Vec<&str> = [start, end].into_iter().flatten().collect();
    if parts.is_empty() {
        RAW_DATE_TBD.to_string()
    } else {
        parts.join(" ~ ")
    }
}

/// Trim, drop blanks, dedupe keeping first-seen order.
pub fn clean_assignees(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() || out.iter().any(|n| n == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}

pub(crate) fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

fn trimmed_opt(s: Option<&str>) -> Option<&str> {
    s.and_then(non_blank)
}

fn context<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Turn a date issue into the warning it produces, if any.
pub fn date_warning(issue: &DateIssue, task_key: &str, task_name: &str) -> ImportWarning {
    match issue {
        DateIssue::BadFormat { side, value } => ImportWarning {
            code: WarningCode::InvalidDateFormat,
            message: format!(
                "Task \"{task_name}\" has an unparseable {} date \"{value}\" (expected YYYY-MM-DD)",
                side.as_str()
            ),
            context: context([
                ("task_key", Value::from(task_key)),
                ("field", Value::from(side.as_str())),
                ("value", Value::from(value.as_str())),
            ]),
        },
        DateIssue::Partial { present } => ImportWarning {
            code: WarningCode::PartialDate,
            message: format!(
                "Task \"{task_name}\" only has a {} date; treated as unscheduled",
                present.as_str()
            ),
            context: context([
                ("task_key", Value::from(task_key)),
                ("present", Value::from(present.as_str())),
            ]),
        },
        DateIssue::Reversed => ImportWarning {
            code: WarningCode::DateRangeInvalid,
            message: format!("Task \"{task_name}\" ends before it starts; dates cleared"),
            context: context([("task_key", Value::from(task_key))]),
        },
    }
}

/// Normalize a recovered document into tasks, warnings and a summary.
pub fn normalize(raw: &RawImport) -> NormalizeResult {
    let mut tasks: Vec<NormalizedTask> = Vec::new();
    let mut warnings: Vec<ImportWarning> = Vec::new();
    let mut summary = ImportSummary {
        total_members: raw.members.len(),
        ..ImportSummary::default()
    };
    let mut keys = KeyCounter::new();

    for member in &raw.members {
        let member_name = non_blank(&member.name).unwrap_or(UNNAMED_MEMBER).to_string();

        for project in &member.projects {
            let Some(project_id) = trimmed_opt(project.project_id.as_deref()) else {
                summary.skipped_projects += 1;
                warnings.push(ImportWarning {
                    code: WarningCode::ProjectIdMissing,
                    message: format!(
                        "Project under \"{member_name}\" has no project_id; {} task(s) skipped",
                        project.tasks.len()
                    ),
                    context: context([
                        ("member", Value::from(member_name.as_str())),
                        ("skipped_tasks", Value::from(project.tasks.len())),
                    ]),
                });
                continue;
            };
            summary.total_projects += 1;
            let project_group = trimmed_opt(project.project_group.as_deref()).map(str::to_string);

            for raw_task in &project.tasks {
                let task_name = non_blank(&raw_task.name).unwrap_or(UNTITLED_TASK).to_string();
                let raw_start = trimmed_opt(raw_task.start.as_deref());
                let raw_end = trimmed_opt(raw_task.end.as_deref());

                let task_key = base_key(project_id, &task_name);
                let (task_key_full, occurrence) = keys.allocate(&task_key);
                if occurrence > 1 {
                    warnings.push(ImportWarning {
                        code: WarningCode::DuplicateTaskKey,
                        message: format!(
                            "Duplicate task \"{task_name}\" in project \"{project_id}\" (occurrence {occurrence}); keyed as \"{task_key_full}\""
                        ),
                        context: context([
                            ("task_key", Value::from(task_key.as_str())),
                            ("task_key_full", Value::from(task_key_full.as_str())),
                            ("occurrence", Value::from(occurrence)),
                        ]),
                    });
                }

                let check = classify_dates(raw_start, raw_end);
                if let Some(issue) = &check.issue {
                    warnings.push(date_warning(issue, &task_key_full, &task_name));
                }

                match check.status {
                    TaskStatus::Scheduled => summary.scheduled += 1,
                    TaskStatus::Unscheduled => summary.unscheduled += 1,
                    TaskStatus::InvalidDate => summary.invalid += 1,
                }

                tasks.push(NormalizedTask {
                    id: None,
                    task_key,
                    task_key_full,
                    member_name: member_name.clone(),
                    project_id: project_id.to_string(),
                    project_group: project_group.clone(),
                    task_name,
                    assignees: clean_assignees(raw_task.assignees.as_deref().unwrap_or(&[])),
                    start: check.start,
                    end: check.end,
                    raw_date: derive_raw_date(&raw_task.raw_date, raw_start, raw_end),
                    note: trimmed_opt(raw_task.note.as_deref()).map(str::to_string),
                    status: check.status,
                });
            }
        }
    }

    summary.total_tasks = tasks.len();
    summary.warnings = warnings.len();

    tracing::debug!(
        tasks = summary.total_tasks,
        warnings = summary.warnings,
        skipped_projects = summary.skipped_projects,
        "normalized import"
    );

    NormalizeResult {
        tasks,
        warnings,
        summary,
    }
}
