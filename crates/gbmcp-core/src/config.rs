//! Server configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer. Every section and
//! field has a default so a partial (or empty) file is valid.

use crate::error::{GbError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `session.queue_capacity`.
pub const MAX_QUEUE_CAPACITY: usize = 4096;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub session: SessionConfig,
    pub rom: RomConfig,
    pub storage: StorageConfig,
    pub notebook: NotebookConfig,
}

impl ServerConfig {
    /// Rejects values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("session.queue_capacity", self.session.queue_capacity as u64),
            ("session.max_hold_frames", u64::from(self.session.max_hold_frames)),
            ("session.max_tick_frames", u64::from(self.session.max_tick_frames)),
            ("notebook.max_entries", self.notebook.max_entries as u64),
            ("notebook.max_entry_bytes", self.notebook.max_entry_bytes as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(GbError::config(format!("{} must be at least 1", name)));
        }
        if self.session.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(GbError::config(format!(
                "session.queue_capacity cannot exceed {}",
                MAX_QUEUE_CAPACITY
            )));
        }
        if self.rom.max_rom_bytes < crate::rom::MIN_ROM_BYTES {
            return Err(GbError::config(format!(
                "rom.max_rom_bytes must be at least {} bytes",
                crate::rom::MIN_ROM_BYTES
            )));
        }
        if self.rom.allowed_extensions.is_empty() {
            return Err(GbError::config("rom.allowed_extensions is empty"));
        }
        crate::save_slot::SlotName::parse(&self.session.autosave_slot)
            .map_err(|e| GbError::config(format!("session.autosave_slot: {}", e)))?;
        Ok(())
    }
}

/// Limits applied to the live emulator session.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum pending operations before enqueue fails with `QueueFull`.
    pub queue_capacity: usize,
    /// How long teardown waits for queued operations to finish.
    pub drain_timeout_ms: u64,
    /// How long `load_rom`/`stop_session` wait for a concurrent lifecycle call.
    pub busy_timeout_ms: u64,
    pub max_hold_frames: u32,
    pub max_tick_frames: u32,
    /// Slot written by `stop_session(save = true)`.
    pub autosave_slot: String,
}

impl SessionConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            drain_timeout_ms: 5_000,
            busy_timeout_ms: 30_000,
            // one second at 60 fps
            max_hold_frames: 60,
            max_tick_frames: 3_600,
            autosave_slot: "autosave".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RomConfig {
    pub max_rom_bytes: u64,
    pub allowed_extensions: Vec<String>,
    /// Directories ROM paths must live under. Empty means unrestricted.
    pub roots: Vec<PathBuf>,
}

impl Default for RomConfig {
    fn default() -> Self {
        Self {
            max_rom_bytes: 8 * 1024 * 1024,
            allowed_extensions: vec!["gb".to_string(), "gbc".to_string()],
            roots: Vec::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory for saves and notebooks.
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NotebookConfig {
    pub max_entries: usize,
    pub max_entry_bytes: usize,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_entry_bytes: 16 * 1024,
        }
    }
}
