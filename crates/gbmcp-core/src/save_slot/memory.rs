//! In-memory save slot store.

use super::model::{SaveSlot, SaveSlotSummary, SlotName};
use super::repository::SaveSlotRepository;
use crate::error::Result;
use crate::rom::RomFingerprint;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Keeps slots in a map for the lifetime of the process.
#[derive(Default)]
pub struct InMemorySaveSlotRepository {
    slots: RwLock<BTreeMap<(RomFingerprint, SlotName), SaveSlot>>,
}

impl InMemorySaveSlotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaveSlotRepository for InMemorySaveSlotRepository {
    async fn find(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> Result<Option<SaveSlot>> {
        let slots = self.slots.read().await;
        Ok(slots.get(&(fingerprint.clone(), slot.clone())).cloned())
    }

    async fn save(&self, slot: &SaveSlot) -> Result<()> {
        let mut slots = self.slots.write().await;
        slots.insert(
            (slot.rom_fingerprint.clone(), slot.slot_name.clone()),
            slot.clone(),
        );
        Ok(())
    }

    async fn delete(&self, fingerprint: &RomFingerprint, slot: &SlotName) -> Result<bool> {
        let mut slots = self.slots.write().await;
        Ok(slots
            .remove(&(fingerprint.clone(), slot.clone()))
            .is_some())
    }

    async fn list(&self, fingerprint: &RomFingerprint) -> Result<Vec<SaveSlotSummary>> {
        let slots = self.slots.read().await;
        Ok(slots
            .iter()
            .filter(|((fp, _), _)| fp == fingerprint)
            .map(|(_, slot)| slot.summary())
            .collect())
    }

    async fn fingerprints_with(&self, slot: &SlotName) -> Result<Vec<RomFingerprint>> {
        let slots = self.slots.read().await;
        Ok(slots
            .keys()
            .filter(|(_, name)| name == slot)
            .map(|(fp, _)| fp.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> RomFingerprint {
        RomFingerprint::of(&[byte; 4])
    }

    #[tokio::test]
    async fn test_slots_are_namespaced_by_fingerprint() {
        let repo = InMemorySaveSlotRepository::new();
        let name = SlotName::parse("checkpoint").unwrap();
        repo.save(&SaveSlot::new(name.clone(), fp(1), vec![1, 2, 3]))
            .await
            .unwrap();

        assert!(repo.find(&fp(1), &name).await.unwrap().is_some());
        assert!(repo.find(&fp(2), &name).await.unwrap().is_none());
        assert_eq!(repo.fingerprints_with(&name).await.unwrap(), vec![fp(1)]);
    }

    #[tokio::test]
    async fn test_save_overwrites_and_delete_reports_existence() {
        let repo = InMemorySaveSlotRepository::new();
        let name = SlotName::parse("slot").unwrap();
        repo.save(&SaveSlot::new(name.clone(), fp(1), vec![1]))
            .await
            .unwrap();
        repo.save(&SaveSlot::new(name.clone(), fp(1), vec![9, 9]))
            .await
            .unwrap();

        let listed = repo.list(&fp(1)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size_bytes, 2);

        assert!(repo.delete(&fp(1), &name).await.unwrap());
        assert!(!repo.delete(&fp(1), &name).await.unwrap());
    }
}
