//! Configuration service.
//!
//! Loads `ServerConfig` from `~/.config/gbmcp/config.toml` (or the file named
//! by `GBMCP_CONFIG`) and caches it.

use crate::paths::GbmcpPaths;
use crate::storage::AtomicTomlFile;
use gbmcp_core::config::ServerConfig;
use gbmcp_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Loads and caches the server configuration.
///
/// A missing file is created with the defaults on first access.
#[derive(Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration; `None` until first access.
    config: Arc<RwLock<Option<ServerConfig>>>,
}

impl ConfigService {
    /// Uses the platform config path.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(GbmcpPaths::config_file()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration, loading it from disk if not cached.
    pub fn get_config(&self) -> Result<ServerConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = self.load_or_create()?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Writes the default configuration. Existing files are kept unless
    /// `overwrite` is set. Returns whether a file was written.
    pub fn init(&self, overwrite: bool) -> Result<bool> {
        let file = AtomicTomlFile::<ServerConfig>::new(self.path.clone());
        if !overwrite && self.path.exists() {
            return Ok(false);
        }
        file.save(&ServerConfig::default())?;
        self.invalidate_cache();
        tracing::info!(path = %self.path.display(), "wrote default configuration");
        Ok(true)
    }

    fn load_or_create(&self) -> Result<ServerConfig> {
        let file = AtomicTomlFile::<ServerConfig>::new(self.path.clone());
        let config = match file.load()? {
            Some(config) => {
                tracing::debug!(path = %self.path.display(), "loaded configuration");
                config
            }
            None => {
                let config = ServerConfig::default();
                file.save(&config)?;
                tracing::info!(path = %self.path.display(), "created default configuration");
                config
            }
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(dir.path().join("gbmcp/config.toml"));

        let config = service.get_config().unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(service.path().exists());
    }

    #[test]
    fn test_partial_file_and_cache_invalidation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nqueue_capacity = 8\n").unwrap();
        let service = ConfigService::with_path(&path);

        assert_eq!(service.get_config().unwrap().session.queue_capacity, 8);

        std::fs::write(&path, "[session]\nqueue_capacity = 16\n").unwrap();
        assert_eq!(service.get_config().unwrap().session.queue_capacity, 8);
        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().session.queue_capacity, 16);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nqueue_capacity = 0\n").unwrap();
        let err = ConfigService::with_path(&path).get_config().unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_init_keeps_existing_file_unless_overwriting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[notebook]\nmax_entries = 3\n").unwrap();
        let service = ConfigService::with_path(&path);

        assert!(!service.init(false).unwrap());
        assert_eq!(service.get_config().unwrap().notebook.max_entries, 3);
        assert!(service.init(true).unwrap());
        assert_eq!(service.get_config().unwrap().notebook.max_entries, 256);
    }
}
