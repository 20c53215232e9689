//! Recovery of `members → projects → tasks` documents from noisy text.
//!
//! Chat output tends to wrap JSON in prose, fence it in markdown, repeat it,
//! or cut it off mid-object. Extraction runs in four steps:
//!
//! 1. collect candidates (fenced block interiors, or a bracket-balanced scan
//!    of the raw text that keeps only objects carrying a `"members"` key),
//! 2. repair each candidate by closing an open string and every open bracket,
//! 3. parse against the [`RawImport`] schema, discarding failures,
//! 4. merge the surviving documents into one.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{RawImport, RawMember, RawProject};

/// Key whose presence marks a scanned object as worth parsing.
const MEMBERS_MARKER: &str = "members";

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("fenced block pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    Normal,
    InString,
    Escaped,
}

/// String/escape state plus the stack of open `{` / `[`.
#[derive(Debug, Default)]
struct Tracker {
    state: ScanState,
    stack: Vec<char>,
}

impl Tracker {
    fn step(&mut self, ch: char) {
        match self.state {
            ScanState::Escaped => self.state = ScanState::InString,
            ScanState::InString => match ch {
                '\\' => self.state = ScanState::Escaped,
                '"' => self.state = ScanState::Normal,
                _ => {}
            },
            ScanState::Normal => match ch {
                '"' => self.state = ScanState::InString,
                '{' | '[' => self.stack.push(ch),
                '}' | ']' => {
                    let opener = if ch == '}' { '{' } else { '[' };
                    // Mismatched closers are left for the parser to reject.
                    if self.stack.last() == Some(&opener) {
                        self.stack.pop();
                    }
                }
                _ => {}
            },
        }
    }
}

/// Recover one merged document from `text`, or `None` when nothing valid is found.
pub fn extract_import(text: &str) -> Option<RawImport> {
    let candidates = collect_candidates(text);
    let mut seen: HashSet<String> = HashSet::new();
    let mut docs = Vec::new();

    for candidate in candidates {
        let repaired = repair_json(candidate);
        if !seen.insert(repaired.clone()) {
            continue;
        }
        match serde_json::from_str::<RawImport>(&repaired) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                tracing::debug!(error = %e, len = repaired.len(), "discarding candidate");
            }
        }
    }

    tracing::debug!(valid = docs.len(), "recovery finished");
    merge_imports(docs)
}

/// Fenced block interiors when any fence exists, otherwise scanned objects.
fn collect_candidates(text: &str) -> Vec<&str> {
    let fenced = fenced_blocks(text);
    if fenced.is_empty() {
        scan_candidates(text)
    } else {
        fenced
    }
}

/// Interiors of all closed markdown code fences, in order.
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Find top-level `{ ... }` spans that contain a `"members":` key.
///
/// A span that never closes (truncated input) runs to end-of-text and is
/// still returned when the marker was seen.
pub fn scan_candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut tracker = Tracker::default();
    let mut start: Option<usize> = None;
    let mut string_start = 0;
    let mut pending_key = false;
    let mut marker = false;

    for (i, ch) in text.char_indices() {
        let Some(begin) = start else {
            if ch == '{' {
                start = Some(i);
                tracker = Tracker::default();
                tracker.step(ch);
                pending_key = false;
                marker = false;
            }
            continue;
        };

        let was = tracker.state;
        tracker.step(ch);

        if was == ScanState::Normal {
            if pending_key && !ch.is_whitespace() {
                marker |= ch == ':';
                pending_key = false;
            }
            if tracker.state == ScanState::InString {
                string_start = i + 1;
            }
        } else if was == ScanState::InString && tracker.state == ScanState::Normal {
            pending_key = &text[string_start..i] == MEMBERS_MARKER;
        }

        if tracker.stack.is_empty() {
            if marker {
                out.push(&text[begin..i + ch.len_utf8()]);
            }
            start = None;
        }
    }

    if let Some(begin) = start {
        if marker {
            out.push(&text[begin..]);
        }
    }
    out
}

/// Close whatever `candidate` left open so it becomes syntactically complete.
///
/// Balanced input comes back unchanged.
pub fn repair_json(candidate: &str) -> String {
    let mut tracker = Tracker::default();
    for ch in candidate.chars() {
        tracker.step(ch);
    }

    let mut out = candidate.to_string();
    match tracker.state {
        ScanState::Escaped => {
            out.pop();
            out.push('"');
        }
        ScanState::InString => out.push('"'),
        ScanState::Normal if !tracker.stack.is_empty() => {
            out.truncate(out.trim_end().len());
            if out.ends_with(',') {
                out.pop();
            } else if out.ends_with(':') {
                out.push_str(" null");
            }
        }
        ScanState::Normal => {}
    }

    for open in tracker.stack.iter().rev() {
        out.push(if *open == '{' { '}' } else { ']' });
    }
    out
}

/// Combine documents: members by exact name, projects by exact id.
///
/// First occurrence fixes order; the first non-null group label wins and
/// task lists are concatenated in encounter order.
pub fn merge_imports(docs: Vec<RawImport>) -> Option<RawImport> {
    if docs.len() <= 1 {
        return docs.into_iter().next();
    }

    let mut merged = RawImport::default();
    let mut member_index: HashMap<String, usize> = HashMap::new();

    for doc in docs {
        for member in doc.members {
            let idx = match member_index.get(&member.name) {
                Some(idx) => *idx,
                None => {
                    merged.members.push(RawMember {
                        name: member.name.clone(),
                        projects: Vec::new(),
                    });
                    let idx = merged.members.len() - 1;
                    member_index.insert(member.name.clone(), idx);
                    idx
                }
            };
            merge_projects(&mut merged.members[idx].projects, member.projects);
        }
    }

    Some(merged)
}

fn merge_projects(into: &mut Vec<RawProject>, incoming: Vec<RawProject>) {
    for project in incoming {
        match into.iter_mut().find(|p| p.project_id == project.project_id) {
            Some(existing) => {
                if existing.project_group.is_none() {
                    existing.project_group = project.project_group;
                }
                existing.tasks.extend(project.tasks);
            }
            None => into.push(project),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_A: &str = r#"{"members":[{"name":"Ann","projects":[{"project_id":"P1","project_group":null,"tasks":[{"name":"Design","start":"2024-01-01","end":"2024-01-05","raw_date":"1/1-1/5"}]}]}]}"#;
    const DOC_B: &str = r#"{"members":[{"name":"Ann","projects":[{"project_id":"P1","project_group":"Core","tasks":[{"name":"Build","raw_date":""}]}]},{"name":"Bo","projects":[]}]}"#;

    #[test]
    fn extracts_fenced_block() {
        let text = format!("Here is the plan:\n```json\n{DOC_A}\n```\nLet me know!");
        let doc = extract_import(&text).unwrap();
        assert_eq!(doc.members.len(), 1);
        assert_eq!(doc.members[0].projects[0].tasks[0].name, "Design");
    }

    #[test]
    fn extracts_object_from_prose() {
        let text = format!("Sure {{not json}} - here you go: {DOC_A} hope that helps");
        let doc = extract_import(&text).unwrap();
        assert_eq!(doc.members[0].name, "Ann");
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"{"members":[{"name":"Ann {lead] \"x\" }","projects":[]}]}"#;
        let candidates = scan_candidates(text);
        assert_eq!(candidates, vec![text]);
        let doc = extract_import(text).unwrap();
        assert_eq!(doc.members[0].name, "Ann {lead] \"x\" }");
    }

    #[test]
    fn objects_without_members_key_are_skipped() {
        assert!(extract_import(r#"{"tasks":[{"name":"x"}]}"#).is_none());
        // "members" as a value, not a key
        assert!(extract_import(r#"{"note":"members","x":1}"#).is_none());
        assert!(extract_import("no json here at all").is_none());
    }

    #[test]
    fn truncated_document_is_repaired() {
        let text = r#"Output: {"members":[{"name":"Ann","projects":[{"project_id":"P","tasks":[{"name":"x","start":"2024-01-01""#;
        let doc = extract_import(text).unwrap();
        let task = &doc.members[0].projects[0].tasks[0];
        assert_eq!(task.name, "x");
        assert_eq!(task.start.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn truncation_inside_string_closes_it() {
        let text = r#"{"members":[{"name":"Ann","projects":[{"project_id":"P","tasks":[{"name":"Writ"#;
        let doc = extract_import(text).unwrap();
        assert_eq!(doc.members[0].projects[0].tasks[0].name, "Writ");
    }

    #[test]
    fn repair_closes_in_reverse_order() {
        assert_eq!(repair_json(r#"{"a":[{"b":"c"#), r#"{"a":[{"b":"c"}]}"#);
        assert_eq!(repair_json(r#"{"a":[1,2,"#), r#"{"a":[1,2]}"#);
        assert_eq!(repair_json(r#"{"a":"#), r#"{"a": null}"#);
    }

    #[test]
    fn repair_drops_dangling_escape() {
        assert_eq!(repair_json(r#"{"a":"x\"#), r#"{"a":"x"}"#);
    }

    #[test]
    fn repair_is_identity_on_valid_json() {
        assert_eq!(repair_json(DOC_A), DOC_A);
        let direct: RawImport = serde_json::from_str(DOC_A).unwrap();
        let repaired: RawImport = serde_json::from_str(&repair_json(DOC_A)).unwrap();
        assert_eq!(direct, repaired);
    }

    #[test]
    fn schema_mismatch_is_discarded() {
        let text = r#"{"members":"Ann"}"#;
        assert!(extract_import(text).is_none());
    }

    #[test]
    fn duplicate_blocks_are_deduplicated() {
        let text = format!("```json\n{DOC_A}\n```\nagain:\n```json\n{DOC_A}\n```");
        let doc = extract_import(&text).unwrap();
        assert_eq!(doc.members[0].projects[0].tasks.len(), 1);
    }

    #[test]
    fn multiple_documents_are_merged() {
        let text = format!("first {DOC_A} and then {DOC_B}");
        let doc = extract_import(&text).unwrap();
        assert_eq!(doc.members.len(), 2);
        assert_eq!(doc.members[0].name, "Ann");
        assert_eq!(doc.members[1].name, "Bo");

        let project = &doc.members[0].projects[0];
        assert_eq!(doc.members[0].projects.len(), 1);
        assert_eq!(project.project_group.as_deref(), Some("Core"));
        let names: Vec<&str> = project.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Design", "Build"]);
    }

    #[test]
    fn fences_take_precedence_over_raw_objects() {
        let text = format!("{DOC_B}\n```json\n{DOC_A}\n```");
        let doc = extract_import(&text).unwrap();
        assert_eq!(doc.members.len(), 1);
        assert_eq!(doc.members[0].projects[0].tasks[0].name, "Design");
    }

    #[test]
    fn non_json_fence_hides_raw_document() {
        // Any closed fence switches off the raw scan.
        let text = format!("Run this first:\n```bash\ngantry init\n```\n{DOC_A}");
        assert!(extract_import(&text).is_none());
    }

    #[test]
    fn merge_keeps_first_group_label() {
        let a = RawImport {
            members: vec![RawMember {
                name: "Ann".into(),
                projects: vec![RawProject {
                    project_id: Some("P".into()),
                    project_group: Some("First".into()),
                    tasks: Vec::new(),
                }],
            }],
        };
        let mut b = a.clone();
        b.members[0].projects[0].project_group = Some("Second".into());
        let merged = merge_imports(vec![a, b]).unwrap();
        assert_eq!(
            merged.members[0].projects[0].project_group.as_deref(),
            Some("First")
        );
        assert!(merge_imports(Vec::new()).is_none());
    }
}
