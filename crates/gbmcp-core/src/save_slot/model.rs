//! Save slot domain model.

use crate::error::{GbError, Result};
use crate::rom::RomFingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted slot name or notebook key.
pub const MAX_KEY_LEN: usize = 64;

/// Validates a storage key (`[A-Za-z0-9_.-]{1,64}`, not `.` or `..`).
///
/// Keys become file names, so anything that could escape the namespace
/// directory is rejected.
pub(crate) fn validate_storage_key(parameter: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > MAX_KEY_LEN {
        return Err(GbError::invalid_parameter(
            parameter,
            value,
            format!("must be 1 to {} characters", MAX_KEY_LEN),
        ));
    }
    if value == "." || value == ".." {
        return Err(GbError::invalid_parameter(
            parameter,
            value,
            "is a reserved name",
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(GbError::invalid_parameter(
            parameter,
            value,
            format!(
                "contains '{}'; only letters, digits, '_', '-' and '.' are allowed",
                bad
            ),
        ));
    }
    Ok(())
}

/// A validated save slot name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotName(String);

impl SlotName {
    pub fn parse(value: &str) -> Result<Self> {
        validate_storage_key("slot", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SlotName {
    type Error = GbError;

    fn try_from(value: String) -> Result<Self> {
        validate_storage_key("slot", &value)?;
        Ok(Self(value))
    }
}

impl From<SlotName> for String {
    fn from(slot: SlotName) -> Self {
        slot.0
    }
}

/// A persisted emulator snapshot, namespaced by ROM fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlot {
    pub slot_name: SlotName,
    pub rom_fingerprint: RomFingerprint,
    pub snapshot: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl SaveSlot {
    pub fn new(slot_name: SlotName, rom_fingerprint: RomFingerprint, snapshot: Vec<u8>) -> Self {
        Self {
            slot_name,
            rom_fingerprint,
            snapshot,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> SaveSlotSummary {
        SaveSlotSummary {
            slot_name: self.slot_name.clone(),
            rom_fingerprint: self.rom_fingerprint.clone(),
            created_at: self.created_at,
            size_bytes: self.snapshot.len(),
        }
    }
}

/// Listing entry for a save slot, without the snapshot bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSlotSummary {
    pub slot_name: SlotName,
    pub rom_fingerprint: RomFingerprint,
    pub created_at: DateTime<Utc>,
    pub size_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_name_accepts_simple_names() {
        for name in ["checkpoint", "boss-1", "world_2.3", "A"] {
            assert_eq!(SlotName::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_slot_name_rejects_path_like_names() {
        for name in ["", ".", "..", "../x", "a/b", "a b", "slot\\1"] {
            let err = SlotName::parse(name).unwrap_err();
            assert_eq!(err.kind(), "invalid_parameter", "{name:?}");
        }
        assert!(SlotName::parse(&"x".repeat(MAX_KEY_LEN)).is_ok());
        assert!(SlotName::parse(&"x".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_slot_name_deserialization_validates() {
        let ok: SlotName = serde_json::from_str("\"checkpoint\"").unwrap();
        assert_eq!(ok.as_str(), "checkpoint");
        assert!(serde_json::from_str::<SlotName>("\"../etc\"").is_err());
    }
}
