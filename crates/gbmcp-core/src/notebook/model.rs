//! Notebook entries.

use crate::config::NotebookConfig;
use crate::error::{GbError, Result};
use crate::save_slot::validate_storage_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a notebook entry; same character rules as save slot names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteKey(String);

impl NoteKey {
    pub fn parse(value: &str) -> Result<Self> {
        validate_storage_key("key", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NoteKey {
    type Error = GbError;

    fn try_from(value: String) -> Result<Self> {
        validate_storage_key("key", &value)?;
        Ok(Self(value))
    }
}

impl From<NoteKey> for String {
    fn from(key: NoteKey) -> Self {
        key.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub key: NoteKey,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

impl NoteEntry {
    pub fn new(key: NoteKey, text: impl Into<String>) -> Self {
        Self {
            key,
            text: text.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Checks a write against the notebook caps.
///
/// `existing_entries` is the entry count before the write and `replacing`
/// tells whether the key is already present (overwrites never grow the
/// notebook).
pub fn check_write(
    limits: &NotebookConfig,
    text: &str,
    existing_entries: usize,
    replacing: bool,
) -> Result<()> {
    if text.len() > limits.max_entry_bytes {
        return Err(GbError::invalid_parameter(
            "text",
            format!("{} bytes", text.len()),
            format!("entries are limited to {} bytes", limits.max_entry_bytes),
        ));
    }
    if !replacing && existing_entries >= limits.max_entries {
        return Err(GbError::invalid_parameter(
            "key",
            format!("{} entries", existing_entries),
            format!(
                "notebook is full ({} entries); delete an entry first",
                limits.max_entries
            ),
        ));
    }
    Ok(())
}
