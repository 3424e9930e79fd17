//! TOML-based SaveSlotRepository implementation

use crate::dto::SaveSlotV1;
use crate::paths::GbmcpPaths;
use crate::storage::{AtomicTomlFile, blocking};
use async_trait::async_trait;
use gbmcp_core::config::StorageConfig;
use gbmcp_core::rom::RomFingerprint;
use gbmcp_core::save_slot::{SaveSlot, SaveSlotRepository, SaveSlotSummary, SlotName};
use gbmcp_core::{GbError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores each save slot as its own TOML file:
///
/// ```text
/// base_dir/
/// ├── 3f2a9c01d4e5b6a7/
/// │   ├── autosave.toml
/// │   └── checkpoint.toml
/// └── 0b1c2d3e4f5a6b7c/
///     └── checkpoint.toml
/// ```
#[derive(Debug, Clone)]
pub struct TomlSaveSlotRepository {
    base_dir: PathBuf,
}

impl TomlSaveSlotRepository {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Repository under `<data_dir>/saves`.
    pub fn from_storage_config(storage: &StorageConfig) -> Result<Self> {
        Ok(Self::new(GbmcpPaths::saves_dir(storage)?))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn slot_file(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> AtomicTomlFile<SaveSlotV1> {
        AtomicTomlFile::new(
            self.base_dir
                .join(fingerprint.as_str())
                .join(format!("{}.toml", slot)),
        )
    }
}

fn read_slot(
    file: &AtomicTomlFile<SaveSlotV1>,
    fingerprint: &RomFingerprint,
    slot: &SlotName,
) -> Result<Option<SaveSlot>> {
    let Some(dto) = file.load()? else {
        return Ok(None);
    };
    let record = dto.into_domain()?;
    if &record.rom_fingerprint != fingerprint {
        return Err(GbError::RomMismatch {
            slot: slot.to_string(),
            expected: fingerprint.to_string(),
            found: record.rom_fingerprint.to_string(),
        });
    }
    Ok(Some(record))
}

fn list_slots(dir: &Path) -> Result<Vec<SaveSlotSummary>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut summaries = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let loaded = AtomicTomlFile::<SaveSlotV1>::new(path.clone())
            .load()
            .map_err(GbError::from)
            .and_then(|dto| dto.map(|d| d.summary()).transpose());
        match loaded {
            Ok(Some(summary)) => summaries.push(summary),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable save slot"),
        }
    }
    summaries.sort_by(|a, b| a.slot_name.cmp(&b.slot_name));
    Ok(summaries)
}

#[async_trait]
impl SaveSlotRepository for TomlSaveSlotRepository {
    async fn find(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> Result<Option<SaveSlot>> {
        let file = self.slot_file(fingerprint, slot);
        let (fingerprint, slot) = (fingerprint.clone(), slot.clone());
        blocking(move || read_slot(&file, &fingerprint, &slot)).await
    }

    async fn save(&self, slot: &SaveSlot) -> Result<()> {
        let file = self.slot_file(&slot.rom_fingerprint, &slot.slot_name);
        let dto = SaveSlotV1::from_domain(slot);
        blocking(move || file.save(&dto).map_err(GbError::from)).await?;
        tracing::debug!(
            fingerprint = %slot.rom_fingerprint,
            slot = %slot.slot_name,
            "save slot written"
        );
        Ok(())
    }

    async fn delete(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> Result<bool> {
        let file = self.slot_file(fingerprint, slot);
        let dir = self.base_dir.join(fingerprint.as_str());
        blocking(move || {
            let removed = file.remove()?;
            // Only succeeds once the namespace is empty.
            let _ = fs::remove_dir(&dir);
            Ok(removed)
        })
        .await
    }

    async fn list(&self, fingerprint: &RomFingerprint) -> Result<Vec<SaveSlotSummary>> {
        let dir = self.base_dir.join(fingerprint.as_str());
        blocking(move || list_slots(&dir)).await
    }

    async fn fingerprints_with(&self, slot: &SlotName) -> Result<Vec<RomFingerprint>> {
        let base_dir = self.base_dir.clone();
        let file_name = format!("{}.toml", slot);
        blocking(move || {
            let entries = match fs::read_dir(&base_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let mut found = Vec::new();
            for entry in entries {
                let entry = entry?;
                let Ok(fingerprint) = RomFingerprint::parse(&entry.file_name().to_string_lossy())
                else {
                    continue;
                };
                if entry.path().join(&file_name).is_file() {
                    found.push(fingerprint);
                }
            }
            found.sort();
            Ok(found)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn slot(name: &str, rom: &[u8], snapshot: Vec<u8>) -> SaveSlot {
        SaveSlot::new(
            SlotName::parse(name).unwrap(),
            RomFingerprint::of(rom),
            snapshot,
        )
    }

    #[tokio::test]
    async fn test_save_find_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSaveSlotRepository::new(dir.path());
        let record = slot("checkpoint", b"rom-a", vec![0, 1, 2, 250, 255]);
        repo.save(&record).await.unwrap();

        let path = dir
            .path()
            .join(record.rom_fingerprint.as_str())
            .join("checkpoint.toml");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("version = \"1.0.0\""));

        let found = repo
            .find(&record.rom_fingerprint, &record.slot_name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.snapshot, record.snapshot);
        assert_eq!(found.created_at, record.created_at);
    }

    #[tokio::test]
    async fn test_list_and_fingerprints_with() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSaveSlotRepository::new(dir.path());
        repo.save(&slot("b", b"rom-a", vec![1; 10])).await.unwrap();
        repo.save(&slot("a", b"rom-a", vec![1; 3])).await.unwrap();
        repo.save(&slot("a", b"rom-b", vec![1])).await.unwrap();

        let listed = repo.list(&RomFingerprint::of(b"rom-a")).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|s| s.slot_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(listed[1].size_bytes, 10);

        let a = SlotName::parse("a").unwrap();
        let mut expected = vec![RomFingerprint::of(b"rom-a"), RomFingerprint::of(b"rom-b")];
        expected.sort();
        assert_eq!(repo.fingerprints_with(&a).await.unwrap(), expected);
        assert!(
            repo.list(&RomFingerprint::of(b"none"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_stored_fingerprint_is_verified() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSaveSlotRepository::new(dir.path());
        let record = slot("moved", b"rom-a", vec![1]);
        repo.save(&record).await.unwrap();

        // Copy the file into another ROM's namespace.
        let other = RomFingerprint::of(b"rom-b");
        let src = dir
            .path()
            .join(record.rom_fingerprint.as_str())
            .join("moved.toml");
        let dst_dir = dir.path().join(other.as_str());
        std::fs::create_dir_all(&dst_dir).unwrap();
        std::fs::copy(src, dst_dir.join("moved.toml")).unwrap();

        let err = repo.find(&other, &record.slot_name).await.unwrap_err();
        assert_eq!(err.kind(), "rom_mismatch");
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_empty_namespace() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSaveSlotRepository::new(dir.path());
        let record = slot("gone", b"rom-a", vec![1]);
        repo.save(&record).await.unwrap();

        assert!(
            repo.delete(&record.rom_fingerprint, &record.slot_name)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .delete(&record.rom_fingerprint, &record.slot_name)
                .await
                .unwrap()
        );
        assert!(!dir.path().join(record.rom_fingerprint.as_str()).exists());
    }
}
