//! Session state and status snapshots.

use crate::rom::RomFingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the emulator session.
///
/// ```text
/// idle --load_rom--> running --fault--> crashed
///                    running --stop---> stopping --> idle
///                    crashed --stop / load_rom--> idle / running
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Crashed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Crashed => "crashed",
        }
    }

    /// Whether new operations may be queued.
    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionState::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable bookkeeping for one live session. Written only by the session
/// worker (counters) and the manager (state transitions).
#[derive(Debug, Clone)]
pub(crate) struct SessionRecord {
    pub state: SessionState,
    /// Executed operations; the cached frame carries the same value.
    pub frame_counter: u64,
    /// Emulator frames stepped across all operations.
    pub frames_emulated: u64,
    pub input_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl SessionRecord {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: SessionState::Running,
            frame_counter: 0,
            frames_emulated: 0,
            input_count: 0,
            created_at: now,
            last_activity_at: now,
            error_message: None,
        }
    }
}

/// Read-only view of the session returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub rom_name: Option<String>,
    pub rom_title: Option<String>,
    pub rom_fingerprint: Option<RomFingerprint>,
    pub frame_counter: u64,
    pub frames_emulated: u64,
    pub input_count: u64,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    /// Crashes observed by this manager since it was constructed.
    pub crash_count: u64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub idle_seconds: f64,
}

impl SessionStatus {
    pub fn idle(crash_count: u64) -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            rom_name: None,
            rom_title: None,
            rom_fingerprint: None,
            frame_counter: 0,
            frames_emulated: 0,
            input_count: 0,
            queue_depth: 0,
            queue_capacity: 0,
            crash_count,
            error_message: None,
            started_at: None,
            last_activity_at: None,
            duration_seconds: 0.0,
            idle_seconds: 0.0,
        }
    }

    pub fn has_rom(&self) -> bool {
        self.rom_fingerprint.is_some()
    }
}

pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    (millis as f64 / 1000.0 * 100.0).round() / 100.0
}
