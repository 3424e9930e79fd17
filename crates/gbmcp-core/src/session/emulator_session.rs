//! The serialization core: one emulator, one worker, one ordered queue.
//!
//! [`SessionHandle`] is the producer side used by callers; the worker task
//! spawned by [`spawn_worker`] is the only code that touches the emulator.
//! Each operation runs on a blocking thread as one unit, followed by exactly
//! one render.

use super::frame_cache::{Frame, FrameCache};
use super::input_queue::{InputQueue, Ticket};
use super::model::{SessionRecord, SessionState, SessionStatus, seconds_between};
use super::operation::{OperationKind, OperationOutcome, QueuedOperation};
use crate::config::SessionConfig;
use crate::emulator::{Button, EmuResult, Emulator, EmulatorFault, RawFrame};
use crate::error::{GbError, Result};
use crate::rom::{RomFingerprint, RomImage};
use crate::save_slot::SlotName;
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Identity of the ROM a session was created from.
#[derive(Debug, Clone)]
pub struct RomInfo {
    pub name: String,
    pub title: Option<String>,
    pub fingerprint: RomFingerprint,
    pub size: usize,
}

impl From<&RomImage> for RomInfo {
    fn from(rom: &RomImage) -> Self {
        Self {
            name: rom.name.clone(),
            title: rom.title(),
            fingerprint: rom.fingerprint.clone(),
            size: rom.size(),
        }
    }
}

pub(crate) struct EmulatorSession {
    id: String,
    rom: RomInfo,
    limits: SessionConfig,
    queue: Arc<InputQueue>,
    record: RwLock<SessionRecord>,
    frames: Arc<FrameCache>,
    crash_count: Arc<AtomicU64>,
}

impl EmulatorSession {
    fn record(&self) -> RwLockReadGuard<'_, SessionRecord> {
        self.record.read().unwrap_or_else(|e| e.into_inner())
    }

    fn record_mut(&self) -> RwLockWriteGuard<'_, SessionRecord> {
        self.record.write().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, frame_counter: u64, raw: RawFrame) -> Arc<Frame> {
        let frame = Arc::new(Frame {
            session_id: self.id.clone(),
            frame_counter,
            width: raw.width,
            height: raw.height,
            pixels: Arc::from(raw.rgba),
            rendered_at: Utc::now(),
        });
        self.frames.set(frame.clone());
        frame
    }

    /// Books a successful operation: counter, cached frame, outcome.
    fn commit(&self, op: &QueuedOperation, executed: Executed) -> OperationOutcome {
        let frame = {
            let mut record = self.record_mut();
            record.frame_counter += 1;
            record.frames_emulated += u64::from(executed.frames_stepped);
            if op.kind.is_input() {
                record.input_count += 1;
            }
            record.last_activity_at = Utc::now();
            // Published under the record lock so the cached frame and the
            // counter never disagree.
            self.publish(record.frame_counter, executed.frame)
        };
        OperationOutcome {
            seq: op.seq,
            kind: op.kind.name(),
            frame,
            frames_stepped: executed.frames_stepped,
            snapshot: executed.snapshot,
        }
    }

    fn crash(&self, reason: &str) -> GbError {
        {
            let mut record = self.record_mut();
            record.state = SessionState::Crashed;
            record.error_message = Some(reason.to_string());
        }
        self.crash_count.fetch_add(1, Ordering::SeqCst);
        GbError::crashed(&self.id, reason)
    }
}

/// Cloneable producer-side handle to the live session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<EmulatorSession>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("rom", &self.inner.rom.name)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) fn create(
        rom: &RomImage,
        limits: SessionConfig,
        frames: Arc<FrameCache>,
        crash_count: Arc<AtomicU64>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        frames.bind(&id);
        Self {
            inner: Arc::new(EmulatorSession {
                id,
                rom: RomInfo::from(rom),
                queue: InputQueue::new(limits.queue_capacity),
                limits,
                record: RwLock::new(SessionRecord::new()),
                frames,
                crash_count,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn rom(&self) -> &RomInfo {
        &self.inner.rom
    }

    pub fn fingerprint(&self) -> &RomFingerprint {
        &self.inner.rom.fingerprint
    }

    pub fn limits(&self) -> &SessionConfig {
        &self.inner.limits
    }

    pub fn state(&self) -> SessionState {
        self.inner.record().state
    }

    pub fn frame_counter(&self) -> u64 {
        self.inner.record().frame_counter
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.len()
    }

    /// Same-session check for callers holding an old handle.
    pub fn is_same(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queues a validated operation.
    pub fn submit(&self, kind: OperationKind) -> Result<Ticket> {
        let state = self.state();
        if state == SessionState::Crashed {
            return Err(self.crashed_error());
        }
        let ticket = self.inner.queue.enqueue(kind)?;
        debug!(session_id = %self.inner.id, seq = ticket.seq(), "operation queued");
        Ok(ticket)
    }

    pub fn press_button(&self, button: Button, hold_frames: i64) -> Result<Ticket> {
        self.submit(OperationKind::press(button, hold_frames, &self.inner.limits)?)
    }

    pub fn hold_button(&self, button: Button) -> Result<Ticket> {
        self.submit(OperationKind::Hold { button })
    }

    pub fn release_button(&self, button: Button) -> Result<Ticket> {
        self.submit(OperationKind::Release { button })
    }

    pub fn tick(&self, count: i64) -> Result<Ticket> {
        self.submit(OperationKind::tick(count, &self.inner.limits)?)
    }

    pub fn reset(&self) -> Result<Ticket> {
        self.submit(OperationKind::Reset)
    }

    /// Queues a snapshot; the outcome carries the bytes.
    pub fn save_snapshot(&self, slot: SlotName) -> Result<Ticket> {
        self.submit(OperationKind::SaveState { slot })
    }

    pub fn load_snapshot(&self, slot: SlotName, snapshot: Arc<[u8]>) -> Result<Ticket> {
        self.submit(OperationKind::LoadState { slot, snapshot })
    }

    /// Latest cached frame of this session.
    pub fn frame(&self) -> Option<Arc<Frame>> {
        self.inner
            .frames
            .get()
            .filter(|frame| frame.session_id == self.inner.id)
    }

    pub fn status(&self) -> SessionStatus {
        let record = self.inner.record().clone();
        let now = Utc::now();
        SessionStatus {
            state: record.state,
            session_id: Some(self.inner.id.clone()),
            rom_name: Some(self.inner.rom.name.clone()),
            rom_title: self.inner.rom.title.clone(),
            rom_fingerprint: Some(self.inner.rom.fingerprint.clone()),
            frame_counter: record.frame_counter,
            frames_emulated: record.frames_emulated,
            input_count: record.input_count,
            queue_depth: self.inner.queue.len(),
            queue_capacity: self.inner.queue.capacity(),
            crash_count: self.inner.crash_count.load(Ordering::SeqCst),
            error_message: record.error_message,
            started_at: Some(record.created_at),
            last_activity_at: Some(record.last_activity_at),
            duration_seconds: seconds_between(record.created_at, now),
            idle_seconds: seconds_between(record.last_activity_at, now),
        }
    }

    fn crashed_error(&self) -> GbError {
        let reason = self
            .inner
            .record()
            .error_message
            .clone()
            .unwrap_or_else(|| "emulator fault".to_string());
        GbError::crashed(&self.inner.id, reason)
    }

    /// Publishes the frame rendered right after the emulator was created.
    pub(crate) fn publish_initial_frame(&self, raw: RawFrame) {
        self.inner.publish(0, raw);
    }

    /// Stops accepting input; queued operations still run.
    pub(crate) fn begin_stop(&self) {
        {
            let mut record = self.inner.record_mut();
            if record.state == SessionState::Running {
                record.state = SessionState::Stopping;
            }
        }
        self.inner
            .queue
            .close(GbError::stopped(&self.inner.id, "stop requested"));
    }

    /// Rejects whatever is still queued.
    pub(crate) fn force_reject(&self, reason: &str) -> usize {
        self.inner
            .queue
            .drain_and_reject(GbError::stopped(&self.inner.id, reason))
    }

    pub(crate) fn mark_idle(&self) {
        self.inner.record_mut().state = SessionState::Idle;
    }
}

/// Result of running one operation against the emulator.
struct Executed {
    frame: RawFrame,
    frames_stepped: u32,
    snapshot: Option<Vec<u8>>,
}

fn execute(emulator: &mut dyn Emulator, kind: &OperationKind) -> EmuResult<Executed> {
    let mut frames_stepped = 0;
    let mut snapshot = None;
    match kind {
        OperationKind::Press {
            button,
            hold_frames,
        } => {
            emulator.press(*button)?;
            for _ in 0..*hold_frames {
                emulator.step()?;
            }
            emulator.release(*button)?;
            frames_stepped = *hold_frames;
        }
        OperationKind::Hold { button } => emulator.press(*button)?,
        OperationKind::Release { button } => emulator.release(*button)?,
        OperationKind::Tick { frames } => {
            for _ in 0..*frames {
                emulator.step()?;
            }
            frames_stepped = *frames;
        }
        OperationKind::SaveState { .. } => snapshot = Some(emulator.save_snapshot()?),
        OperationKind::LoadState { snapshot, .. } => emulator.load_snapshot(snapshot)?,
        OperationKind::Reset => emulator.reset()?,
    }
    let frame = emulator.render()?;
    if !frame.is_well_formed() {
        return Err(EmulatorFault::new(format!(
            "render returned {} bytes for a {}x{} frame",
            frame.rgba.len(),
            frame.width,
            frame.height
        )));
    }
    Ok(Executed {
        frame,
        frames_stepped,
        snapshot,
    })
}

/// Spawns the worker that owns `emulator` until the queue closes or the
/// emulator faults. The emulator is dropped when the worker exits.
pub(crate) fn spawn_worker(handle: SessionHandle, emulator: Box<dyn Emulator>) -> JoinHandle<()> {
    tokio::spawn(run_worker(handle.inner, emulator))
}

async fn run_worker(session: Arc<EmulatorSession>, emulator: Box<dyn Emulator>) {
    let mut emulator = Some(emulator);
    info!(session_id = %session.id, rom = %session.rom.name, "session worker started");

    while let Some(mut op) = session.queue.dequeue().await {
        let Some(mut emu) = emulator.take() else {
            op.resolve(Err(GbError::crashed(&session.id, "emulator unavailable")));
            continue;
        };
        let kind = op.kind.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = execute(emu.as_mut(), &kind);
            (emu, result)
        })
        .await;

        let fault = match joined {
            Ok((emu, Ok(executed))) => {
                emulator = Some(emu);
                let outcome = session.commit(&op, executed);
                debug!(
                    session_id = %session.id,
                    seq = op.seq,
                    kind = op.kind.name(),
                    frame_counter = outcome.frame.frame_counter,
                    "operation executed"
                );
                op.resolve(Ok(outcome));
                continue;
            }
            Ok((_emu, Err(fault))) => fault.message,
            Err(join_error) => format!("emulator panicked: {}", join_error),
        };

        error!(
            session_id = %session.id,
            seq = op.seq,
            kind = op.kind.name(),
            reason = %fault,
            "emulator fault, session crashed"
        );
        let crashed = session.crash(&fault);
        op.resolve(Err(crashed.clone()));
        let rejected = session.queue.drain_and_reject(crashed);
        if rejected > 0 {
            info!(session_id = %session.id, rejected, "rejected operations queued behind the fault");
        }
        break;
    }

    info!(session_id = %session.id, "session worker stopped");
}
