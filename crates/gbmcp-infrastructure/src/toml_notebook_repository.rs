//! TOML-based NotebookRepository implementation

use crate::dto::{NoteEntryV1, NotebookV1};
use crate::paths::GbmcpPaths;
use crate::storage::{AtomicTomlError, AtomicTomlFile, blocking};
use async_trait::async_trait;
use chrono::Utc;
use gbmcp_core::config::{NotebookConfig, StorageConfig};
use gbmcp_core::notebook::{NoteEntry, NoteKey, NotebookRepository, check_write};
use gbmcp_core::rom::RomFingerprint;
use gbmcp_core::{GbError, Result};
use std::path::{Path, PathBuf};

/// One TOML document per ROM under `base_dir/<fingerprint>.toml`.
///
/// Writes are read-modify-write cycles under the file lock of
/// [`AtomicTomlFile::update`], so the caps hold across processes.
#[derive(Debug, Clone)]
pub struct TomlNotebookRepository {
    base_dir: PathBuf,
    limits: NotebookConfig,
}

impl TomlNotebookRepository {
    pub fn new(base_dir: impl AsRef<Path>, limits: NotebookConfig) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            limits,
        }
    }

    /// Repository under `<data_dir>/notebooks`.
    pub fn from_config(storage: &StorageConfig, limits: NotebookConfig) -> Result<Self> {
        Ok(Self::new(GbmcpPaths::notebooks_dir(storage)?, limits))
    }

    fn file(&self, fingerprint: &RomFingerprint) -> AtomicTomlFile<NotebookV1> {
        AtomicTomlFile::new(self.base_dir.join(format!("{}.toml", fingerprint)))
    }
}

fn load(file: &AtomicTomlFile<NotebookV1>) -> Result<Option<NotebookV1>> {
    match file.load()? {
        Some(notebook) => {
            notebook.check_version()?;
            Ok(Some(notebook))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl NotebookRepository for TomlNotebookRepository {
    async fn list(&self, fingerprint: &RomFingerprint) -> Result<Vec<NoteEntry>> {
        let file = self.file(fingerprint);
        blocking(move || match load(&file)? {
            Some(notebook) => notebook.into_entries(),
            None => Ok(Vec::new()),
        })
        .await
    }

    async fn read(&self, fingerprint: &RomFingerprint, key: &NoteKey) -> Result<Option<NoteEntry>> {
        let file = self.file(fingerprint);
        let key = key.clone();
        blocking(move || match load(&file)? {
            Some(notebook) => notebook.entry(key.as_str()),
            None => Ok(None),
        })
        .await
    }

    async fn write(
        &self,
        fingerprint: &RomFingerprint,
        key: &NoteKey,
        text: &str,
    ) -> Result<NoteEntry> {
        let file = self.file(fingerprint);
        let empty = NotebookV1::empty(fingerprint);
        let limits = self.limits.clone();
        let key = key.clone();
        let text = text.to_string();
        let entry = blocking(move || {
            file.update(empty, |notebook| {
                notebook.check_version().map_err(AtomicTomlError::Rejected)?;
                let replacing = notebook.entries.contains_key(key.as_str());
                check_write(&limits, &text, notebook.entries.len(), replacing)
                    .map_err(AtomicTomlError::Rejected)?;
                let entry = NoteEntry::new(key, text);
                notebook.entries.insert(
                    entry.key.to_string(),
                    NoteEntryV1 {
                        text: entry.text.clone(),
                        updated_at: entry.updated_at,
                    },
                );
                Ok(entry)
            })
            .map_err(GbError::from)
        })
        .await?;
        tracing::debug!(fingerprint = %fingerprint, key = %entry.key, "note written");
        Ok(entry)
    }

    async fn delete(&self, fingerprint: &RomFingerprint, key: &NoteKey) -> Result<bool> {
        let file = self.file(fingerprint);
        let empty = NotebookV1::empty(fingerprint);
        let key = key.clone();
        blocking(move || {
            if !file.path().exists() {
                return Ok(false);
            }
            file.update(empty, |notebook| Ok(notebook.entries.remove(key.as_str()).is_some()))
                .map_err(GbError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo(dir: &TempDir, max_entries: usize) -> TomlNotebookRepository {
        TomlNotebookRepository::new(
            dir.path(),
            NotebookConfig {
                max_entries,
                max_entry_bytes: 32,
            },
        )
    }

    fn key(name: &str) -> NoteKey {
        NoteKey::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_write_read_list_delete() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir, 8);
        let fp = RomFingerprint::of(b"rom");

        repo.write(&fp, &key("route"), "go north").await.unwrap();
        repo.write(&fp, &key("boss"), "weak to fire").await.unwrap();
        repo.write(&fp, &key("route"), "go south").await.unwrap();

        let entry = repo.read(&fp, &key("route")).await.unwrap().unwrap();
        assert_eq!(entry.text, "go south");

        let keys: Vec<String> = repo
            .list(&fp)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key.to_string())
            .collect();
        assert_eq!(keys, vec!["boss", "route"]);

        assert!(repo.delete(&fp, &key("boss")).await.unwrap());
        assert!(!repo.delete(&fp, &key("boss")).await.unwrap());
        assert!(repo.read(&fp, &key("boss")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_caps_are_enforced_and_nothing_is_written() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir, 1);
        let fp = RomFingerprint::of(b"rom");

        let err = repo
            .write(&fp, &key("long"), &"x".repeat(33))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(repo.list(&fp).await.unwrap().is_empty());

        repo.write(&fp, &key("one"), "first").await.unwrap();
        let err = repo.write(&fp, &key("two"), "second").await.unwrap_err();
        assert!(err.to_string().contains("full"));
        // overwriting an existing key is still allowed
        repo.write(&fp, &key("one"), "again").await.unwrap();
    }

    #[tokio::test]
    async fn test_notebooks_are_separate_per_rom() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir, 8);
        let a = RomFingerprint::of(b"a");
        let b = RomFingerprint::of(b"b");

        repo.write(&a, &key("k"), "for a").await.unwrap();
        assert!(repo.read(&b, &key("k")).await.unwrap().is_none());
        assert!(!repo.delete(&b, &key("k")).await.unwrap());
        assert!(dir.path().join(format!("{}.toml", a)).exists());
    }
}
