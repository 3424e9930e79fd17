use super::utils::{load_config, parse_fingerprint};
use anyhow::{Context, Result};
use gbmcp_core::notebook::{NoteKey, NotebookRepository};
use gbmcp_infrastructure::{ConfigService, TomlNotebookRepository};

fn repository(service: &ConfigService) -> Result<TomlNotebookRepository> {
    let config = load_config(service)?;
    TomlNotebookRepository::from_config(&config.storage, config.notebook)
        .context("Failed to resolve the notebook directory")
}

pub async fn list(service: &ConfigService, fingerprint: &str) -> Result<()> {
    let fingerprint = parse_fingerprint(fingerprint)?;
    let entries = repository(service)?.list(&fingerprint).await?;

    if entries.is_empty() {
        println!("Notebook for {} is empty", fingerprint);
        return Ok(());
    }
    for entry in entries {
        let first_line = entry.text.lines().next().unwrap_or_default();
        println!("{:<24} {}", entry.key, first_line);
    }
    Ok(())
}

pub async fn show(service: &ConfigService, fingerprint: &str, key: &str) -> Result<()> {
    let fingerprint = parse_fingerprint(fingerprint)?;
    let key = NoteKey::parse(key)?;
    let entry = repository(service)?
        .read(&fingerprint, &key)
        .await?
        .with_context(|| format!("No note '{}' for {}", key, fingerprint))?;

    println!("# {} (updated {})", entry.key, entry.updated_at.to_rfc3339());
    println!("{}", entry.text);
    Ok(())
}
