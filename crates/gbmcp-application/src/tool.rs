//! JSON tool-call dispatch.
//!
//! A transport hands over `{"tool": "<name>", ...arguments}` objects and gets
//! back either the serialized response or a [`ToolError`].

use crate::dto::ToolError;
use crate::game_service::GameService;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use gbmcp_core::GbError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    HealthCheck,
    ServerInfo,
    LoadRom {
        rom_path: String,
    },
    /// In-memory ROM; `name` carries the extension used for validation.
    LoadRomBytes {
        name: String,
        data_base64: String,
    },
    GetScreen,
    GetSessionStatus,
    PressButton {
        button: String,
        #[serde(default)]
        duration: Option<i64>,
    },
    HoldButton {
        button: String,
    },
    ReleaseButton {
        button: String,
    },
    Tick {
        #[serde(default = "default_tick")]
        count: i64,
    },
    ResetGame,
    SaveState {
        slot: String,
    },
    LoadState {
        slot: String,
    },
    ListSaveStates,
    DeleteSaveState {
        slot: String,
    },
    StopSession {
        #[serde(default)]
        save: bool,
    },
    NoteWrite {
        key: String,
        text: String,
    },
    NoteRead {
        key: String,
    },
    NoteList,
    NoteDelete {
        key: String,
    },
}

fn default_tick() -> i64 {
    1
}

impl ToolCall {
    /// Parses a raw call. Malformed input is an `InvalidParameter` error.
    pub fn from_value(value: Value) -> Result<Self, GbError> {
        serde_json::from_value(value)
            .map_err(|e| GbError::invalid_parameter("tool", "call", e.to_string()))
    }
}

fn to_value<T: Serialize>(response: T) -> gbmcp_core::Result<Value> {
    Ok(serde_json::to_value(response)?)
}

impl GameService {
    /// Runs one tool call.
    pub async fn call(&self, call: ToolCall) -> Result<Value, ToolError> {
        let result = match call {
            ToolCall::HealthCheck => to_value(self.health_check()),
            ToolCall::ServerInfo => to_value(self.server_info()),
            ToolCall::LoadRom { rom_path } => self.load_rom(&rom_path).await.and_then(to_value),
            ToolCall::LoadRomBytes { name, data_base64 } => match BASE64.decode(data_base64.trim()) {
                Ok(data) => self.load_rom_bytes(&name, data).await.and_then(to_value),
                Err(e) => Err(GbError::invalid_parameter(
                    "data_base64",
                    &name,
                    format!("not valid base64: {}", e),
                )),
            },
            ToolCall::GetScreen => self.get_screen().and_then(to_value),
            ToolCall::GetSessionStatus => to_value(self.get_session_status()),
            ToolCall::PressButton { button, duration } => self
                .press_button(&button, duration)
                .await
                .and_then(to_value),
            ToolCall::HoldButton { button } => self.hold_button(&button).await.and_then(to_value),
            ToolCall::ReleaseButton { button } => {
                self.release_button(&button).await.and_then(to_value)
            }
            ToolCall::Tick { count } => self.tick(count).await.and_then(to_value),
            ToolCall::ResetGame => self.reset_game().await.and_then(to_value),
            ToolCall::SaveState { slot } => self.save_state(&slot).await.and_then(to_value),
            ToolCall::LoadState { slot } => self.load_state(&slot).await.and_then(to_value),
            ToolCall::ListSaveStates => self.list_save_states().await.and_then(to_value),
            ToolCall::DeleteSaveState { slot } => self
                .delete_save_state(&slot)
                .await
                .and_then(|deleted| to_value(serde_json::json!({ "slot": slot, "deleted": deleted }))),
            ToolCall::StopSession { save } => to_value(self.stop_session(save).await),
            ToolCall::NoteWrite { key, text } => {
                self.note_write(&key, &text).await.and_then(to_value)
            }
            ToolCall::NoteRead { key } => self.note_read(&key).await.and_then(to_value),
            ToolCall::NoteList => self.note_list().await.and_then(to_value),
            ToolCall::NoteDelete { key } => self.note_delete(&key).await.and_then(to_value),
        };
        result.map_err(|e| {
            tracing::warn!(kind = e.kind(), error = %e, "tool call failed");
            ToolError::from(e)
        })
    }

    /// Parses and runs a raw JSON call.
    pub async fn call_json(&self, value: Value) -> Result<Value, ToolError> {
        let call = ToolCall::from_value(value).map_err(ToolError::from)?;
        self.call(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbmcp_core::config::ServerConfig;
    use gbmcp_core::save_slot::InMemorySaveSlotRepository;
    use gbmcp_core::session::SessionManager;
    use gbmcp_core::testing::{ScriptedEmulatorFactory, sample_rom};
    use gbmcp_infrastructure::TomlNotebookRepository;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(notes: &TempDir) -> GameService {
        let config = ServerConfig::default();
        let manager = Arc::new(SessionManager::new(
            Arc::new(ScriptedEmulatorFactory::new()),
            Arc::new(InMemorySaveSlotRepository::new()),
            config.clone(),
        ));
        GameService::new(
            manager,
            Arc::new(TomlNotebookRepository::new(notes.path(), config.notebook)),
        )
    }

    #[test]
    fn test_parses_calls_with_defaults() {
        assert_eq!(
            ToolCall::from_value(json!({"tool": "tick"})).unwrap(),
            ToolCall::Tick { count: 1 }
        );
        assert_eq!(
            ToolCall::from_value(json!({"tool": "press_button", "button": "a"})).unwrap(),
            ToolCall::PressButton {
                button: "a".to_string(),
                duration: None
            }
        );
        assert_eq!(
            ToolCall::from_value(json!({"tool": "stop_session"})).unwrap(),
            ToolCall::StopSession { save: false }
        );
    }

    #[test]
    fn test_unknown_tool_is_invalid_parameter() {
        let err = ToolCall::from_value(json!({"tool": "format_disk"})).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        let err = ToolCall::from_value(json!({"tool": "tick", "count": "many"})).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[tokio::test]
    async fn test_errors_carry_kind_and_suggestion() {
        let notes = TempDir::new().unwrap();
        let service = service(&notes);
        let err = service
            .call_json(json!({"tool": "get_screen"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "no_active_session");
        assert!(!err.suggestion.is_empty());
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_session_round_trip_over_json() {
        let notes = TempDir::new().unwrap();
        let service = service(&notes);
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("tetris.gb");
        std::fs::write(&rom, sample_rom("TETRIS")).unwrap();

        let loaded = service
            .call_json(json!({"tool": "load_rom", "rom_path": rom.to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(loaded["rom_title"], "TETRIS");
        assert_eq!(loaded["screen"]["frame_counter"], 0);

        let pressed = service
            .call_json(json!({"tool": "press_button", "button": "start", "duration": 5}))
            .await
            .unwrap();
        assert_eq!(pressed["frames_advanced"], 5);

        let status = service
            .call_json(json!({"tool": "get_session_status"}))
            .await
            .unwrap();
        assert_eq!(status["state"], "running");
        assert_eq!(status["frame_counter"], 1);

        let stopped = service
            .call_json(json!({"tool": "stop_session", "save": true}))
            .await
            .unwrap();
        assert_eq!(stopped["was_active"], true);
        assert_eq!(stopped["saved_slot"], "autosave");
    }

    #[tokio::test]
    async fn test_load_rom_bytes_over_json() {
        let notes = TempDir::new().unwrap();
        let service = service(&notes);

        let loaded = service
            .call_json(json!({
                "tool": "load_rom_bytes",
                "name": "pocket.gbc",
                "data_base64": BASE64.encode(sample_rom("POCKET")),
            }))
            .await
            .unwrap();
        assert_eq!(loaded["rom_name"], "pocket.gbc");
        assert_eq!(loaded["rom_title"], "POCKET");

        let err = service
            .call_json(json!({
                "tool": "load_rom_bytes",
                "name": "pocket.gbc",
                "data_base64": "%%%",
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "invalid_parameter");
        assert_eq!(service.get_session_status().rom_name.as_deref(), Some("pocket.gbc"));
    }
}
