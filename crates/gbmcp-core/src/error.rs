//! Error types for gbmcp.
//!
//! Every variant carries enough structured context for a caller (usually a
//! language model driving the tools) to decide whether to retry, reload the
//! ROM, or abandon the request. See [`GbError::suggestion`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire gbmcp workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GbError {
    /// ROM path or content failed validation
    #[error("Invalid ROM '{source_name}': {reason}")]
    InvalidRom { source_name: String, reason: String },

    /// A tool argument was out of range or malformed
    #[error("Invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Another lifecycle operation held the session for too long
    #[error("Session is busy: another load or stop did not finish within {waited_ms} ms")]
    SessionBusy { waited_ms: u64 },

    /// The emulator faulted; the session must be reloaded
    #[error("Session {session_id} crashed: {reason}")]
    SessionCrashed { session_id: String, reason: String },

    /// The session was stopped before the operation could run
    #[error("Session {session_id} stopped: {reason}")]
    SessionStopped { session_id: String, reason: String },

    /// Backpressure: the input queue is at capacity
    #[error("Input queue is full ({capacity} pending operations)")]
    QueueFull { capacity: usize },

    /// No save slot with this name exists for any loaded ROM
    #[error("Save slot '{slot}' not found for ROM {fingerprint}")]
    SlotNotFound { slot: String, fingerprint: String },

    /// The save slot belongs to a different ROM
    #[error("Save slot '{slot}' was created by ROM {found}, but ROM {expected} is loaded")]
    RomMismatch {
        slot: String,
        expected: String,
        found: String,
    },

    /// A read was attempted before any ROM was loaded
    #[error("No active session")]
    NoActiveSession,

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GbError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn invalid_rom(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRom {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn crashed(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionCrashed {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    pub fn stopped(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionStopped {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Inspection
    // ============================================================================

    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRom { .. } => "invalid_rom",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::SessionBusy { .. } => "session_busy",
            Self::SessionCrashed { .. } => "session_crashed",
            Self::SessionStopped { .. } => "session_stopped",
            Self::QueueFull { .. } => "queue_full",
            Self::SlotNotFound { .. } => "slot_not_found",
            Self::RomMismatch { .. } => "rom_mismatch",
            Self::NoActiveSession => "no_active_session",
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// What the caller should do next.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::InvalidRom { .. } => {
                "Check the ROM path, use a .gb or .gbc file, and make sure it is readable."
            }
            Self::InvalidParameter { .. } => "Correct the argument and call the tool again.",
            Self::SessionBusy { .. } => "Another ROM load is in progress. Retry shortly.",
            Self::SessionCrashed { .. } => {
                "The emulator crashed. Call load_rom (or stop_session) before sending more input; \
                 retrying the same operation will not help."
            }
            Self::SessionStopped { .. } => "The session was stopped. Load a ROM to continue.",
            Self::QueueFull { .. } => {
                "Too many inputs are pending. Wait for earlier inputs to finish, then retry."
            }
            Self::SlotNotFound { .. } => "List the available save states and pick an existing slot.",
            Self::RomMismatch { .. } => {
                "That save state belongs to another ROM. Load the matching ROM or pick another slot."
            }
            Self::NoActiveSession => "No game is running. Call load_rom first.",
            Self::Io { .. } | Self::Serialization { .. } => {
                "A storage operation failed. Check disk space and permissions."
            }
            Self::Config(_) => "Fix the configuration file and restart the server.",
            Self::Internal(_) => "Unexpected internal error. Stop the session and reload the ROM.",
        }
    }

    /// Whether the same call may succeed if repeated later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionBusy { .. } | Self::QueueFull { .. })
    }

    pub fn is_crashed(&self) -> bool {
        matches!(self, Self::SessionCrashed { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SlotNotFound { .. } | Self::NoActiveSession)
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for GbError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for GbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for GbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for GbError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, GbError>`.
pub type Result<T> = std::result::Result<T, GbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_backpressure_and_busy_are_retryable() {
        assert!(GbError::QueueFull { capacity: 4 }.is_retryable());
        assert!(GbError::SessionBusy { waited_ms: 10 }.is_retryable());
        assert!(!GbError::crashed("s", "boom").is_retryable());
        assert!(!GbError::invalid_parameter("count", 0, "must be >= 1").is_retryable());
    }

    #[test]
    fn test_message_names_offending_parameter() {
        let err = GbError::invalid_parameter("button", "Z", "unknown button");
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(err.to_string().contains("button"));
        assert!(err.to_string().contains("'Z'"));
    }

    #[test]
    fn test_io_conversion_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GbError = io.into();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("NotFound"));
    }

    #[test]
    fn test_errors_serialize_with_variant_tag() {
        let err = GbError::RomMismatch {
            slot: "checkpoint".into(),
            expected: "fb".into(),
            found: "fa".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["RomMismatch"]["slot"], "checkpoint");
    }
}
