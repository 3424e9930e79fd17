//! Data Transfer Objects (DTOs) for persistence.
//!
//! These are the on-disk schemas. They are private to the infrastructure
//! layer and convert to and from the core domain types.
//!
//! ### Version History
//! - **SaveSlot 1.0.0**: initial schema, snapshot stored as standard base64
//! - **Notebook 1.0.0**: initial schema, one document per ROM

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use gbmcp_core::notebook::{NoteEntry, NoteKey};
use gbmcp_core::rom::RomFingerprint;
use gbmcp_core::save_slot::{SaveSlot, SaveSlotSummary, SlotName};
use gbmcp_core::{GbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SAVE_SLOT_VERSION: &str = "1.0.0";
pub const NOTEBOOK_VERSION: &str = "1.0.0";

fn check_major(kind: &str, version: &str) -> Result<()> {
    if version.split('.').next() == Some("1") {
        Ok(())
    } else {
        Err(GbError::Serialization {
            format: "toml".to_string(),
            message: format!("unsupported {} schema version {}", kind, version),
        })
    }
}

/// Save slot file: `saves/<fingerprint>/<slot>.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSlotV1 {
    pub version: String,
    pub slot_name: String,
    pub rom_fingerprint: String,
    pub created_at: DateTime<Utc>,
    /// Opaque emulator snapshot, base64.
    pub snapshot: String,
}

impl SaveSlotV1 {
    pub fn from_domain(slot: &SaveSlot) -> Self {
        Self {
            version: SAVE_SLOT_VERSION.to_string(),
            slot_name: slot.slot_name.to_string(),
            rom_fingerprint: slot.rom_fingerprint.to_string(),
            created_at: slot.created_at,
            snapshot: STANDARD.encode(&slot.snapshot),
        }
    }

    pub fn into_domain(self) -> Result<SaveSlot> {
        check_major("save slot", &self.version)?;
        let snapshot = STANDARD
            .decode(self.snapshot.as_bytes())
            .map_err(|e| GbError::Serialization {
                format: "base64".to_string(),
                message: e.to_string(),
            })?;
        Ok(SaveSlot {
            slot_name: SlotName::parse(&self.slot_name)?,
            rom_fingerprint: RomFingerprint::parse(&self.rom_fingerprint)?,
            snapshot,
            created_at: self.created_at,
        })
    }

    /// Listing view; skips decoding the snapshot.
    pub fn summary(&self) -> Result<SaveSlotSummary> {
        check_major("save slot", &self.version)?;
        let padding = self.snapshot.bytes().rev().take_while(|b| *b == b'=').count();
        Ok(SaveSlotSummary {
            slot_name: SlotName::parse(&self.slot_name)?,
            rom_fingerprint: RomFingerprint::parse(&self.rom_fingerprint)?,
            created_at: self.created_at,
            size_bytes: (self.snapshot.len() / 4 * 3).saturating_sub(padding),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntryV1 {
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

/// Notebook file: `notebooks/<fingerprint>.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookV1 {
    pub version: String,
    pub rom_fingerprint: String,
    #[serde(default)]
    pub entries: BTreeMap<String, NoteEntryV1>,
}

impl NotebookV1 {
    pub fn empty(fingerprint: &RomFingerprint) -> Self {
        Self {
            version: NOTEBOOK_VERSION.to_string(),
            rom_fingerprint: fingerprint.to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn check_version(&self) -> Result<()> {
        check_major("notebook", &self.version)
    }

    pub fn entry(&self, key: &str) -> Result<Option<NoteEntry>> {
        self.entries
            .get(key)
            .map(|entry| to_domain(key, entry))
            .transpose()
    }

    pub fn into_entries(self) -> Result<Vec<NoteEntry>> {
        self.entries
            .iter()
            .map(|(key, entry)| to_domain(key, entry))
            .collect()
    }
}

fn to_domain(key: &str, entry: &NoteEntryV1) -> Result<NoteEntry> {
    Ok(NoteEntry {
        key: NoteKey::parse(key)?,
        text: entry.text.clone(),
        updated_at: entry.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_size_matches_decoded_length() {
        let fp = RomFingerprint::of(b"rom");
        for len in 0..8 {
            let slot = SaveSlot::new(SlotName::parse("s").unwrap(), fp.clone(), vec![7; len]);
            let dto = SaveSlotV1::from_domain(&slot);
            assert_eq!(dto.summary().unwrap().size_bytes, len);
            assert_eq!(dto.into_domain().unwrap(), slot);
        }
    }

    #[test]
    fn test_future_major_version_is_rejected() {
        let fp = RomFingerprint::of(b"rom");
        let slot = SaveSlot::new(SlotName::parse("s").unwrap(), fp, vec![1]);
        let mut dto = SaveSlotV1::from_domain(&slot);
        dto.version = "2.0.0".to_string();
        assert_eq!(dto.into_domain().unwrap_err().kind(), "serialization");
    }
}
