//! Queued operations and their outcomes.

use super::frame_cache::Frame;
use crate::config::SessionConfig;
use crate::emulator::Button;
use crate::error::{GbError, Result};
use crate::save_slot::SlotName;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// A mutation of the emulator. Parameters are validated by the constructors,
/// so a value of this type is always safe to execute.
#[derive(Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Press, hold for `hold_frames` frames, release.
    Press { button: Button, hold_frames: u32 },
    /// Press without releasing.
    Hold { button: Button },
    Release { button: Button },
    Tick { frames: u32 },
    SaveState { slot: SlotName },
    LoadState { slot: SlotName, snapshot: Arc<[u8]> },
    Reset,
}

impl OperationKind {
    pub fn press(button: Button, hold_frames: i64, limits: &SessionConfig) -> Result<Self> {
        let hold_frames = frames_in_range("hold_frames", hold_frames, limits.max_hold_frames)?;
        Ok(Self::Press {
            button,
            hold_frames,
        })
    }

    pub fn tick(count: i64, limits: &SessionConfig) -> Result<Self> {
        let frames = frames_in_range("count", count, limits.max_tick_frames)?;
        Ok(Self::Tick { frames })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Press { .. } => "press",
            OperationKind::Hold { .. } => "hold",
            OperationKind::Release { .. } => "release",
            OperationKind::Tick { .. } => "tick",
            OperationKind::SaveState { .. } => "save_state",
            OperationKind::LoadState { .. } => "load_state",
            OperationKind::Reset => "reset",
        }
    }

    /// Whether this counts towards the session's input total.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            OperationKind::Press { .. } | OperationKind::Hold { .. } | OperationKind::Release { .. }
        )
    }
}

impl fmt::Debug for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Press {
                button,
                hold_frames,
            } => write!(f, "press({}, {} frames)", button, hold_frames),
            OperationKind::Hold { button } => write!(f, "hold({})", button),
            OperationKind::Release { button } => write!(f, "release({})", button),
            OperationKind::Tick { frames } => write!(f, "tick({})", frames),
            OperationKind::SaveState { slot } => write!(f, "save_state({})", slot),
            OperationKind::LoadState { slot, snapshot } => {
                write!(f, "load_state({}, {} bytes)", slot, snapshot.len())
            }
            OperationKind::Reset => f.write_str("reset"),
        }
    }
}

fn frames_in_range(parameter: &str, value: i64, max: u32) -> Result<u32> {
    if value < 1 {
        return Err(GbError::invalid_parameter(
            parameter,
            value,
            "must be at least 1 frame",
        ));
    }
    if value > i64::from(max) {
        return Err(GbError::invalid_parameter(
            parameter,
            value,
            format!("cannot exceed {} frames", max),
        ));
    }
    Ok(value as u32)
}

pub(crate) type Reply = oneshot::Sender<Result<OperationOutcome>>;

/// A pending mutation sitting in the input queue.
#[derive(Debug)]
pub struct QueuedOperation {
    /// Ordering key, assigned at enqueue time.
    pub seq: u64,
    pub kind: OperationKind,
    pub(crate) reply: Option<Reply>,
}

impl QueuedOperation {
    /// Resolves the waiter, if the caller is still listening.
    pub(crate) fn resolve(&mut self, result: Result<OperationOutcome>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(result);
        }
    }
}

/// Result of a successfully executed operation.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub seq: u64,
    pub kind: &'static str,
    pub frame: Arc<Frame>,
    /// Emulator frames stepped by this operation.
    pub frames_stepped: u32,
    /// Set for `SaveState`.
    pub snapshot: Option<Vec<u8>>,
}
