use super::utils::{load_config, parse_fingerprint};
use anyhow::{Context, Result};
use gbmcp_core::save_slot::{SaveSlotRepository, SlotName};
use gbmcp_infrastructure::{ConfigService, TomlSaveSlotRepository};

fn repository(service: &ConfigService) -> Result<TomlSaveSlotRepository> {
    let config = load_config(service)?;
    TomlSaveSlotRepository::from_storage_config(&config.storage)
        .context("Failed to resolve the save directory")
}

pub async fn list(service: &ConfigService, fingerprint: &str) -> Result<()> {
    let fingerprint = parse_fingerprint(fingerprint)?;
    let repo = repository(service)?;
    let slots = repo.list(&fingerprint).await?;

    if slots.is_empty() {
        println!("No save slots for {}", fingerprint);
        return Ok(());
    }
    for slot in slots {
        println!(
            "{:<24} {:>8} bytes  {}",
            slot.slot_name,
            slot.size_bytes,
            slot.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

pub async fn delete(service: &ConfigService, fingerprint: &str, slot: &str) -> Result<()> {
    let fingerprint = parse_fingerprint(fingerprint)?;
    let slot = SlotName::parse(slot)?;
    let repo = repository(service)?;

    if repo.delete(&fingerprint, &slot).await? {
        println!("✅ Deleted slot '{}' for {}", slot, fingerprint);
    } else {
        anyhow::bail!("No slot '{}' for {}", slot, fingerprint);
    }
    Ok(())
}
