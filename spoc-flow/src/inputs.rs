use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// An accepted answer, typed by the field it was collected for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Path(PathBuf),
    File(PathBuf),
    Boolean(bool),
    Text(String),
}

impl FieldValue {
    /// Renders the value the way the analysis program expects it on its
    /// command line: paths as-is, flags as `0`/`1`.
    pub fn as_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Path(path) | FieldValue::File(path) => write!(f, "{}", path.display()),
            FieldValue::Boolean(flag) => write!(f, "{}", u8::from(*flag)),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Answers collected so far, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inputs {
    entries: Vec<(String, FieldValue)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing an earlier answer in place.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
