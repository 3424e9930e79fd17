use super::utils::load_config;
use anyhow::{Context, Result};
use gbmcp_core::rom::{RomImage, RomSource};
use gbmcp_infrastructure::ConfigService;
use std::path::PathBuf;

pub async fn run(service: &ConfigService, rom: PathBuf) -> Result<()> {
    let config = load_config(service)?;
    let image = RomImage::load(RomSource::path(&rom), &config.rom)
        .await
        .with_context(|| format!("{} is not a loadable ROM", rom.display()))?;

    println!("name:        {}", image.name);
    println!("title:       {}", image.title().as_deref().unwrap_or("-"));
    println!("fingerprint: {}", image.fingerprint);
    println!("size:        {} bytes", image.size());
    println!(
        "color:       {}",
        if image.supports_color() { "yes" } else { "no" }
    );
    Ok(())
}
