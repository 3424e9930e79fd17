//! Tool responses.
//!
//! Every operation of [`GameService`](crate::GameService) returns one of
//! these serde types; a transport serializes them as it sees fit.

use crate::screen::ScreenImage;
use gbmcp_core::GbError;
use gbmcp_core::notebook::NoteEntry;
use gbmcp_core::rom::RomFingerprint;
use gbmcp_core::save_slot::SaveSlotSummary;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LoadRomResponse {
    pub session_id: String,
    pub rom_name: String,
    pub rom_title: Option<String>,
    pub rom_fingerprint: RomFingerprint,
    pub rom_size_bytes: usize,
    pub screen: ScreenImage,
}

/// Result of an executed queue operation.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub action: &'static str,
    pub message: String,
    pub sequence: u64,
    pub frames_advanced: u32,
    pub screen: ScreenImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveStateResponse {
    pub message: String,
    pub slot: SaveSlotSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub capabilities: Vec<&'static str>,
    pub supported_formats: Vec<String>,
    pub buttons: Vec<&'static str>,
    pub limits: ServerLimits,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerLimits {
    pub queue_capacity: usize,
    pub max_hold_frames: u32,
    pub max_tick_frames: u32,
    pub max_rom_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteListResponse {
    pub rom_fingerprint: RomFingerprint,
    pub entries: Vec<NoteEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteDeleteResponse {
    pub key: String,
    pub deleted: bool,
}

/// Error payload for a failed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolError {
    pub kind: &'static str,
    pub message: String,
    pub suggestion: &'static str,
    pub retryable: bool,
}

impl From<&GbError> for ToolError {
    fn from(err: &GbError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            suggestion: err.suggestion(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<GbError> for ToolError {
    fn from(err: GbError) -> Self {
        Self::from(&err)
    }
}
