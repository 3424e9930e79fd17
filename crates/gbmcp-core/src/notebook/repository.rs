use super::model::{NoteEntry, NoteKey};
use crate::error::Result;
use crate::rom::RomFingerprint;
use async_trait::async_trait;

/// Keyed text notes that survive across sessions, one notebook per ROM.
///
/// Implementations enforce the caps from `NotebookConfig` on `write`.
#[async_trait]
pub trait NotebookRepository: Send + Sync {
    /// All entries of a notebook, sorted by key.
    async fn list(&self, fingerprint: &RomFingerprint) -> Result<Vec<NoteEntry>>;

    async fn read(&self, fingerprint: &RomFingerprint, key: &NoteKey) -> Result<Option<NoteEntry>>;

    /// Creates or replaces an entry and returns it.
    async fn write(&self, fingerprint: &RomFingerprint, key: &NoteKey, text: &str)
    -> Result<NoteEntry>;

    /// Returns `false` if the entry did not exist.
    async fn delete(&self, fingerprint: &RomFingerprint, key: &NoteKey) -> Result<bool>;
}
