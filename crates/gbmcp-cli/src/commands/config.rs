use super::utils::load_config;
use anyhow::{Context, Result};
use gbmcp_infrastructure::ConfigService;

pub fn show(service: &ConfigService) -> Result<()> {
    let config = load_config(service)?;
    let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("# {}", service.path().display());
    print!("{}", text);
    Ok(())
}

pub fn init(service: &ConfigService, force: bool) -> Result<()> {
    let written = service
        .init(force)
        .with_context(|| format!("Failed to write {}", service.path().display()))?;
    if written {
        println!("✅ Wrote default configuration to {}", service.path().display());
    } else {
        println!(
            "{} already exists; pass --force to overwrite it",
            service.path().display()
        );
    }
    Ok(())
}

pub fn path(service: &ConfigService) {
    println!("{}", service.path().display());
}
