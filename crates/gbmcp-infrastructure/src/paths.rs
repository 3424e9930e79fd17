//! Path resolution for gbmcp configuration and data.
//!
//! ```text
//! ~/.config/gbmcp/             # Config directory (GBMCP_CONFIG overrides the file)
//! └── config.toml
//!
//! ~/.local/share/gbmcp/        # Data directory (GBMCP_DATA_DIR or [storage].data_dir)
//! ├── saves/
//! │   └── <fingerprint>/
//! │       └── <slot>.toml
//! └── notebooks/
//!     └── <fingerprint>.toml
//! ```

use gbmcp_core::GbError;
use gbmcp_core::config::StorageConfig;
use std::path::PathBuf;
use thiserror::Error;

pub const CONFIG_ENV: &str = "GBMCP_CONFIG";
pub const DATA_DIR_ENV: &str = "GBMCP_DATA_DIR";

const APP_DIR: &str = "gbmcp";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot determine the {0} directory for this platform")]
    DirNotFound(&'static str),
}

impl From<PathError> for GbError {
    fn from(err: PathError) -> Self {
        GbError::config(err.to_string())
    }
}

pub struct GbmcpPaths;

impl GbmcpPaths {
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::DirNotFound("config"))
    }

    /// `config.toml`, or the file named by `GBMCP_CONFIG`.
    pub fn config_file() -> Result<PathBuf, PathError> {
        if let Some(path) = env_path(CONFIG_ENV) {
            return Ok(path);
        }
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Data directory: `GBMCP_DATA_DIR`, then `[storage].data_dir`, then the
    /// platform default.
    pub fn data_dir(storage: &StorageConfig) -> Result<PathBuf, PathError> {
        if let Some(path) = env_path(DATA_DIR_ENV) {
            return Ok(path);
        }
        if let Some(path) = &storage.data_dir {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::DirNotFound("data"))
    }

    pub fn saves_dir(storage: &StorageConfig) -> Result<PathBuf, PathError> {
        Ok(Self::data_dir(storage)?.join("saves"))
    }

    pub fn notebooks_dir(storage: &StorageConfig) -> Result<PathBuf, PathError> {
        Ok(Self::data_dir(storage)?.join("notebooks"))
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_data_dir_is_used_for_subdirectories() {
        // GBMCP_DATA_DIR is not set in the test environment.
        if std::env::var_os(DATA_DIR_ENV).is_some() {
            return;
        }
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/srv/gbmcp")),
        };
        assert_eq!(
            GbmcpPaths::saves_dir(&storage).unwrap(),
            PathBuf::from("/srv/gbmcp/saves")
        );
        assert_eq!(
            GbmcpPaths::notebooks_dir(&storage).unwrap(),
            PathBuf::from("/srv/gbmcp/notebooks")
        );
    }
}
