//! Save slot repository trait.

use super::model::{SaveSlot, SaveSlotSummary, SlotName};
use crate::error::Result;
use crate::rom::RomFingerprint;
use async_trait::async_trait;

/// Persistence for emulator snapshots, keyed by `(rom_fingerprint, slot_name)`.
///
/// Slots of different ROMs live in separate namespaces; a name may exist
/// under several fingerprints at once.
#[async_trait]
pub trait SaveSlotRepository: Send + Sync {
    /// Finds a slot in the namespace of `fingerprint`.
    ///
    /// - `Ok(Some(slot))`: slot found
    /// - `Ok(None)`: no slot with that name for this ROM
    async fn find(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> Result<Option<SaveSlot>>;

    /// Stores a slot, replacing any slot with the same key.
    async fn save(&self, slot: &SaveSlot) -> Result<()>;

    /// Deletes a slot. Returns `false` if it did not exist.
    async fn delete(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> Result<bool>;

    /// Lists the slots of one ROM, sorted by name.
    async fn list(&self, fingerprint: &RomFingerprint) -> Result<Vec<SaveSlotSummary>>;

    /// Fingerprints of every ROM that has a slot named `slot`.
    ///
    /// Used to tell "no such slot" apart from "slot of another ROM".
    async fn fingerprints_with(&self, slot: &SlotName) -> Result<Vec<RomFingerprint>>;
}
