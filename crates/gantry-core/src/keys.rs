//! Identity keys: `projectId::taskName` bases and their `#N` disambiguation.

use std::collections::{HashMap, HashSet};

use crate::types::KEY_SEPARATOR;

/// Build the shared base key for a task.
pub fn base_key(project_id: &str, task_name: &str) -> String {
    format!("{project_id}{KEY_SEPARATOR}{task_name}")
}

/// First-seen numbering for one normalization pass.
///
/// The first occurrence of a base keeps the bare base; the Nth gets `base#N`.
/// A candidate already issued in this pass (a task literally named `X#2`
/// next to two `X` tasks) is skipped so full keys stay unique.
#[derive(Debug, Default)]
pub struct KeyCounter {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl KeyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(full_key, occurrence)` where occurrence is 1-based.
    pub fn allocate(&mut self, base: &str) -> (String, usize) {
        let count = self.occurrences.entry(base.to_string()).or_insert(0);
        *count += 1;
        let occurrence = *count;

        let mut n = occurrence;
        loop {
            let candidate = if n == 1 {
                base.to_string()
            } else {
                format!("{base}#{n}")
            };
            if self.issued.insert(candidate.clone()) {
                return (candidate, occurrence);
            }
            n += 1;
        }
    }
}

/// Suffix slot a full key occupies under `base`: bare base is 1, `base#N` is N.
pub fn suffix_number(base: &str, full_key: &str) -> Option<u32> {
    if full_key == base {
        return Some(1);
    }
    let digits = full_key.strip_prefix(base)?.strip_prefix('#')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Pick the full key for a task being renamed to `proposed_base`.
///
/// `siblings` are the full keys of the other tasks in the same import whose
/// base key equals `proposed_base`. Slot 1 (the bare base) is reclaimed
/// whenever it is free, otherwise the smallest free `#N` with N ≥ 2 is used.
pub fn resolve_full_key(proposed_base: &str, current_full_key: &str, siblings: &[String]) -> String {
    let used: HashSet<u32> = siblings
        .iter()
        .filter(|k| k.as_str() != current_full_key)
        .filter_map(|k| suffix_number(proposed_base, k))
        .collect();

    if !used.contains(&1) {
        return proposed_base.to_string();
    }

    let mut n = 2;
    while used.contains(&n) {
        n += 1;
    }
    format!("{proposed_base}#{n}")
}
