//! `.gantry/config.json`.
//!
//! The file is a flat JSON object. Known keys are typed through [`Config`];
//! anything else is carried along untouched so `config set` can store it.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_HISTORY_LIMIT: usize = 200;

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Maximum history entries kept per import.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Default tracing filter when no env override is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_filter: None,
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let map = read_map(path)?;
        from_map(map)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }
}

fn from_map(map: Map<String, Value>) -> anyhow::Result<Config> {
    let config: Config = serde_json::from_value(Value::Object(map))
        .map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;
    if config.history_limit == 0 {
        anyhow::bail!("invalid config: history_limit must be at least 1");
    }
    Ok(config)
}

/// Read the raw key/value map. Missing file or non-object content reads as empty.
pub fn read_map(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: Value = serde_json::from_str(&content)?;
    match val {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Set one key, validating the result against [`Config`] before writing.
pub fn set_value(path: &Path, key: &str, raw: &str) -> anyhow::Result<Value> {
    let mut map = read_map(path)?;
    let value = parse_value(raw);
    map.insert(key.to_string(), value.clone());
    from_map(map.clone())?;
    let json = serde_json::to_string_pretty(&map)?;
    write_atomic(path, json.as_bytes())?;
    Ok(value)
}

/// Parse a CLI string into bool, number or string.
pub fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// Write via a temp file in the same directory, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
