//! ROM sources, validation and fingerprinting.

use crate::config::RomConfig;
use crate::error::{GbError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Smallest acceptable ROM: the cartridge header ends at 0x150.
pub const MIN_ROM_BYTES: u64 = 0x150;

const TITLE_RANGE: std::ops::Range<usize> = 0x134..0x144;
const CGB_FLAG_OFFSET: usize = 0x143;

/// Content hash of a ROM: the first 16 hex characters of its SHA-256.
///
/// Used as the namespace key for save slots and notebooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RomFingerprint(String);

impl RomFingerprint {
    pub const LEN: usize = 16;

    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hex = format!("{:x}", hasher.finalize());
        Self(hex[..Self::LEN].to_string())
    }

    /// Parses a previously computed fingerprint (e.g. from a CLI argument or
    /// a directory name).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.len() == Self::LEN && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(GbError::invalid_parameter(
                "fingerprint",
                value,
                format!("expected {} hex characters", Self::LEN),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RomFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a ROM comes from.
#[derive(Debug, Clone)]
pub enum RomSource {
    Path(PathBuf),
    /// In-memory ROM; `name` must still carry a valid extension.
    Bytes { name: String, data: Vec<u8> },
}

impl RomSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            name: name.into(),
            data,
        }
    }

    fn display_name(&self) -> String {
        match self {
            RomSource::Path(p) => p.display().to_string(),
            RomSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// A validated ROM held in memory.
#[derive(Debug, Clone)]
pub struct RomImage {
    pub name: String,
    pub path: Option<PathBuf>,
    pub bytes: Arc<[u8]>,
    pub fingerprint: RomFingerprint,
}

impl RomImage {
    /// Validates `source` against `config` and reads it into memory.
    pub async fn load(source: RomSource, config: &RomConfig) -> Result<Self> {
        let display = source.display_name();
        match source {
            RomSource::Path(path) => {
                check_extension(&path, &display, config)?;
                check_roots(&path, &display, config).await?;

                let metadata = tokio::fs::metadata(&path).await.map_err(|_| {
                    GbError::invalid_rom(
                        &display,
                        "ROM file not found. Check the file path and ensure the ROM file exists.",
                    )
                })?;
                if !metadata.is_file() {
                    return Err(GbError::invalid_rom(&display, "path is not a regular file"));
                }
                check_size(metadata.len(), &display, config)?;

                let data = tokio::fs::read(&path).await.map_err(|e| {
                    GbError::invalid_rom(&display, format!("cannot read ROM file: {}", e))
                })?;
                // The file may have changed between stat and read.
                check_size(data.len() as u64, &display, config)?;

                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| display.clone());
                Ok(Self::from_parts(name, Some(path), data))
            }
            RomSource::Bytes { name, data } => {
                check_extension(Path::new(&name), &display, config)?;
                check_size(data.len() as u64, &display, config)?;
                Ok(Self::from_parts(name, None, data))
            }
        }
    }

    fn from_parts(name: String, path: Option<PathBuf>, data: Vec<u8>) -> Self {
        let fingerprint = RomFingerprint::of(&data);
        Self {
            name,
            path,
            bytes: Arc::from(data),
            fingerprint,
        }
    }

    /// Cartridge title from the header, with trailing NULs stripped.
    pub fn title(&self) -> Option<String> {
        let raw = self.bytes.get(TITLE_RANGE)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let title: String = raw[..end]
            .iter()
            .filter(|b| b.is_ascii_graphic() || **b == b' ')
            .map(|&b| b as char)
            .collect();
        let title = title.trim().to_string();
        (!title.is_empty()).then_some(title)
    }

    /// Whether the header flags Game Boy Color support.
    pub fn supports_color(&self) -> bool {
        self.bytes
            .get(CGB_FLAG_OFFSET)
            .is_some_and(|flag| flag & 0x80 != 0)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

fn check_extension(path: &Path, display: &str, config: &RomConfig) -> Result<()> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let allowed = config
        .allowed_extensions
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext));
    if allowed {
        Ok(())
    } else {
        Err(GbError::invalid_rom(
            display,
            format!(
                "invalid extension '.{}'; only {} files are supported",
                ext,
                config
                    .allowed_extensions
                    .iter()
                    .map(|e| format!(".{}", e.trim_start_matches('.')))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ))
    }
}

fn check_size(len: u64, display: &str, config: &RomConfig) -> Result<()> {
    if len < MIN_ROM_BYTES {
        return Err(GbError::invalid_rom(
            display,
            format!("file is {} bytes, too small to hold a cartridge header", len),
        ));
    }
    if len > config.max_rom_bytes {
        return Err(GbError::invalid_rom(
            display,
            format!(
                "file is {} bytes, above the {} byte limit",
                len, config.max_rom_bytes
            ),
        ));
    }
    Ok(())
}

async fn check_roots(path: &Path, display: &str, config: &RomConfig) -> Result<()> {
    if config.roots.is_empty() {
        return Ok(());
    }
    let resolved = tokio::fs::canonicalize(path).await.map_err(|_| {
        GbError::invalid_rom(
            display,
            "ROM file not found. Check the file path and ensure the ROM file exists.",
        )
    })?;
    for root in &config.roots {
        if let Ok(root) = tokio::fs::canonicalize(root).await
            && resolved.starts_with(&root)
        {
            return Ok(());
        }
    }
    Err(GbError::invalid_rom(
        display,
        "path is outside the configured ROM directories",
    ))
}
