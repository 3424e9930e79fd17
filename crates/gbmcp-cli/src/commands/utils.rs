use anyhow::{Context, Result};
use gbmcp_core::config::ServerConfig;
use gbmcp_core::rom::RomFingerprint;
use gbmcp_infrastructure::ConfigService;
use std::path::PathBuf;

/// `--config` wins over `GBMCP_CONFIG` and the platform default.
pub fn config_service(path: Option<PathBuf>) -> Result<ConfigService> {
    match path {
        Some(path) => Ok(ConfigService::with_path(path)),
        None => ConfigService::new().context("Failed to resolve the configuration path"),
    }
}

pub fn load_config(service: &ConfigService) -> Result<ServerConfig> {
    service
        .get_config()
        .with_context(|| format!("Failed to load {}", service.path().display()))
}

pub fn parse_fingerprint(value: &str) -> Result<RomFingerprint> {
    RomFingerprint::parse(value).with_context(|| format!("'{}' is not a ROM fingerprint", value))
}
