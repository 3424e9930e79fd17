//! The dispatcher-facing service.
//!
//! `GameService` is what a protocol layer calls for each tool invocation. It
//! parses and validates raw arguments, routes mutations through the
//! session's input queue, serves reads from the frame cache and encodes
//! frames for the response.

use crate::dto::{
    ActionResponse, LoadRomResponse, NoteDeleteResponse, NoteListResponse, SaveStateResponse,
    ServerInfo, ServerLimits,
};
use crate::screen::ScreenImage;
use gbmcp_core::config::ServerConfig;
use gbmcp_core::emulator::{Button, EmulatorFactory};
use gbmcp_core::notebook::{NoteEntry, NoteKey, NotebookRepository};
use gbmcp_core::rom::{RomFingerprint, RomSource};
use gbmcp_core::save_slot::SaveSlotSummary;
use gbmcp_core::session::{
    OperationKind, OperationOutcome, SessionHandle, SessionManager, SessionState, SessionStatus,
    StopReport,
};
use gbmcp_core::{GbError, Result};
use gbmcp_infrastructure::{TomlNotebookRepository, TomlSaveSlotRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const SERVER_NAME: &str = "gbmcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub message: String,
    pub session_state: SessionState,
}

pub struct GameService {
    manager: Arc<SessionManager>,
    notebook: Arc<dyn NotebookRepository>,
}

impl GameService {
    pub fn new(manager: Arc<SessionManager>, notebook: Arc<dyn NotebookRepository>) -> Self {
        Self { manager, notebook }
    }

    /// Wires the manager to the file-backed save slot and notebook stores
    /// under the configured data directory.
    pub fn with_config(config: ServerConfig, factory: Arc<dyn EmulatorFactory>) -> Result<Self> {
        config.validate()?;
        let save_slots = Arc::new(TomlSaveSlotRepository::from_storage_config(&config.storage)?);
        let notebook = Arc::new(TomlNotebookRepository::from_config(
            &config.storage,
            config.notebook.clone(),
        )?);
        let manager = Arc::new(SessionManager::new(factory, save_slots, config));
        Ok(Self::new(manager, notebook))
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    // ============================================================================
    // Server
    // ============================================================================

    pub fn health_check(&self) -> HealthResponse {
        let state = self.manager.get_status().state;
        HealthResponse {
            healthy: true,
            message: format!("{} is running (session {})", SERVER_NAME, state),
            session_state: state,
        }
    }

    pub fn server_info(&self) -> ServerInfo {
        let config = self.manager.config();
        ServerInfo {
            name: SERVER_NAME,
            version: SERVER_VERSION,
            description: "Serialized Game Boy emulator sessions for tool-driven language models",
            capabilities: vec![
                "rom_loading",
                "screen_capture",
                "input_control",
                "save_states",
                "notebook",
            ],
            supported_formats: config
                .rom
                .allowed_extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.')))
                .collect(),
            buttons: Button::ALL.iter().map(Button::as_str).collect(),
            limits: ServerLimits {
                queue_capacity: config.session.queue_capacity,
                max_hold_frames: config.session.max_hold_frames,
                max_tick_frames: config.session.max_tick_frames,
                max_rom_bytes: config.rom.max_rom_bytes,
            },
        }
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    pub async fn load_rom(&self, rom_path: &str) -> Result<LoadRomResponse> {
        info!(rom_path, "loading ROM");
        self.load(RomSource::path(rom_path)).await
    }

    pub async fn load_rom_bytes(&self, name: &str, data: Vec<u8>) -> Result<LoadRomResponse> {
        info!(name, bytes = data.len(), "loading ROM from memory");
        self.load(RomSource::bytes(name, data)).await
    }

    async fn load(&self, source: RomSource) -> Result<LoadRomResponse> {
        let handle = self.manager.load_rom(source).await?;
        let frame = handle.frame().ok_or(GbError::NoActiveSession)?;
        let rom = handle.rom();
        Ok(LoadRomResponse {
            session_id: handle.id().to_string(),
            rom_name: rom.name.clone(),
            rom_title: rom.title.clone(),
            rom_fingerprint: rom.fingerprint.clone(),
            rom_size_bytes: rom.size,
            screen: ScreenImage::from_frame(&frame)?,
        })
    }

    pub async fn stop_session(&self, save: bool) -> StopReport {
        info!(save, "stopping session");
        self.manager.stop_session(save).await
    }

    pub fn get_session_status(&self) -> SessionStatus {
        self.manager.get_status()
    }

    // ============================================================================
    // Input
    // ============================================================================

    /// Presses `button` for `hold_frames` frames (default 1), then releases.
    pub async fn press_button(
        &self,
        button: &str,
        hold_frames: Option<i64>,
    ) -> Result<ActionResponse> {
        let button = Button::parse(button)?;
        let hold_frames = hold_frames.unwrap_or(1);
        let kind = OperationKind::press(button, hold_frames, &self.manager.config().session)?;
        self.run(
            kind,
            format!("Button {} pressed for {} frames", button, hold_frames),
        )
        .await
    }

    pub async fn hold_button(&self, button: &str) -> Result<ActionResponse> {
        let button = Button::parse(button)?;
        self.run(
            OperationKind::Hold { button },
            format!("Button {} held", button),
        )
        .await
    }

    pub async fn release_button(&self, button: &str) -> Result<ActionResponse> {
        let button = Button::parse(button)?;
        self.run(
            OperationKind::Release { button },
            format!("Button {} released", button),
        )
        .await
    }

    pub async fn tick(&self, count: i64) -> Result<ActionResponse> {
        let kind = OperationKind::tick(count, &self.manager.config().session)?;
        self.run(kind, format!("Advanced {} frames", count)).await
    }

    pub async fn reset_game(&self) -> Result<ActionResponse> {
        self.run(OperationKind::Reset, "Game reset".to_string())
            .await
    }

    async fn run(&self, kind: OperationKind, message: String) -> Result<ActionResponse> {
        let handle: SessionHandle = self.manager.require_handle()?;
        debug!(session_id = %handle.id(), kind = kind.name(), "submitting");
        let outcome = handle.submit(kind)?.wait().await?;
        action_response(outcome, message)
    }

    // ============================================================================
    // Screen
    // ============================================================================

    /// Latest cached frame; never waits for queued input.
    pub fn get_screen(&self) -> Result<ScreenImage> {
        let frame = self.manager.current_frame()?;
        ScreenImage::from_frame(&frame)
    }

    // ============================================================================
    // Save states
    // ============================================================================

    pub async fn save_state(&self, slot: &str) -> Result<SaveStateResponse> {
        let summary = self.manager.save_state(slot).await?;
        Ok(SaveStateResponse {
            message: format!("State saved to slot '{}'", summary.slot_name),
            slot: summary,
        })
    }

    pub async fn load_state(&self, slot: &str) -> Result<ActionResponse> {
        let outcome = self.manager.load_state(slot).await?;
        action_response(outcome, format!("State restored from slot '{}'", slot))
    }

    pub async fn list_save_states(&self) -> Result<Vec<SaveSlotSummary>> {
        self.manager.list_save_states().await
    }

    pub async fn delete_save_state(&self, slot: &str) -> Result<bool> {
        self.manager.delete_save_state(slot).await
    }

    // ============================================================================
    // Notebook
    // ============================================================================

    fn active_fingerprint(&self) -> Result<RomFingerprint> {
        self.manager.rom_fingerprint().ok_or(GbError::NoActiveSession)
    }

    pub async fn note_write(&self, key: &str, text: &str) -> Result<NoteEntry> {
        let key = NoteKey::parse(key)?;
        let fingerprint = self.active_fingerprint()?;
        self.notebook.write(&fingerprint, &key, text).await
    }

    pub async fn note_read(&self, key: &str) -> Result<NoteEntry> {
        let key = NoteKey::parse(key)?;
        let fingerprint = self.active_fingerprint()?;
        self.notebook
            .read(&fingerprint, &key)
            .await?
            .ok_or_else(|| {
                GbError::invalid_parameter("key", key.as_str(), "no note with this key")
            })
    }

    pub async fn note_list(&self) -> Result<NoteListResponse> {
        let fingerprint = self.active_fingerprint()?;
        let entries = self.notebook.list(&fingerprint).await?;
        Ok(NoteListResponse {
            rom_fingerprint: fingerprint,
            entries,
        })
    }

    pub async fn note_delete(&self, key: &str) -> Result<NoteDeleteResponse> {
        let key = NoteKey::parse(key)?;
        let fingerprint = self.active_fingerprint()?;
        let deleted = self.notebook.delete(&fingerprint, &key).await?;
        Ok(NoteDeleteResponse {
            key: key.to_string(),
            deleted,
        })
    }
}

fn action_response(outcome: OperationOutcome, message: String) -> Result<ActionResponse> {
    Ok(ActionResponse {
        action: outcome.kind,
        message,
        sequence: outcome.seq,
        frames_advanced: outcome.frames_stepped,
        screen: ScreenImage::from_frame(&outcome.frame)?,
    })
}
