use super::emulator_session::{SessionHandle, spawn_worker};
use super::frame_cache::{Frame, FrameCache};
use super::model::{SessionState, SessionStatus};
use super::operation::OperationOutcome;
use crate::config::ServerConfig;
use crate::emulator::{Emulator, EmulatorFactory, RawFrame};
use crate::error::{GbError, Result};
use crate::rom::{RomFingerprint, RomImage, RomSource};
use crate::save_slot::{SaveSlot, SaveSlotRepository, SaveSlotSummary, SlotName};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ActiveSession {
    handle: SessionHandle,
    worker: JoinHandle<()>,
}

/// What `stop_session` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopReport {
    /// `false` when there was nothing to stop.
    pub was_active: bool,
    pub session_id: Option<String>,
    pub final_state: Option<SessionState>,
    pub saved_slot: Option<SlotName>,
    /// The autosave failed; the session was stopped anyway.
    pub save_error: Option<GbError>,
    /// Operations rejected because the drain budget ran out.
    pub rejected_operations: usize,
}

impl StopReport {
    fn idle() -> Self {
        Self {
            was_active: false,
            session_id: None,
            final_state: None,
            saved_slot: None,
            save_error: None,
            rejected_operations: 0,
        }
    }
}

/// Owns the single emulator session of the process.
///
/// Lifecycle calls (`load_rom`, `stop_session`) are serialized by an async
/// lock; everything else goes through the session's input queue or reads
/// the frame cache, and never waits for a lifecycle call to finish.
pub struct SessionManager {
    factory: Arc<dyn EmulatorFactory>,
    save_slots: Arc<dyn SaveSlotRepository>,
    config: ServerConfig,
    lifecycle: Mutex<Option<ActiveSession>>,
    /// Read side of `lifecycle`, for lock-free status and routing.
    current: RwLock<Option<SessionHandle>>,
    frames: Arc<FrameCache>,
    crash_count: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn EmulatorFactory>,
        save_slots: Arc<dyn SaveSlotRepository>,
        config: ServerConfig,
    ) -> Self {
        Self {
            factory,
            save_slots,
            config,
            lifecycle: Mutex::new(None),
            current: RwLock::new(None),
            frames: Arc::new(FrameCache::new()),
            crash_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn frame_cache(&self) -> &Arc<FrameCache> {
        &self.frames
    }

    pub fn save_slots(&self) -> &Arc<dyn SaveSlotRepository> {
        &self.save_slots
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Validates the ROM, builds an emulator for it and swaps it in.
    ///
    /// The previous session (if any) is only torn down once the new emulator
    /// exists, so a failing load leaves it running.
    pub async fn load_rom(&self, source: RomSource) -> Result<SessionHandle> {
        let rom = RomImage::load(source, &self.config.rom).await?;
        let (emulator, first_frame) = self.create_emulator(&rom).await?;

        let mut active = self.lock_lifecycle().await?;
        if let Some(previous) = active.take() {
            info!(
                session_id = %previous.handle.id(),
                "replacing session with new ROM"
            );
            self.teardown(previous, false).await;
        }

        let handle = SessionHandle::create(
            &rom,
            self.config.session.clone(),
            self.frames.clone(),
            self.crash_count.clone(),
        );
        handle.publish_initial_frame(first_frame);
        let worker = spawn_worker(handle.clone(), emulator);
        *active = Some(ActiveSession {
            handle: handle.clone(),
            worker,
        });
        self.set_current(Some(handle.clone()));

        info!(
            session_id = %handle.id(),
            rom = %rom.name,
            fingerprint = %rom.fingerprint,
            "session started"
        );
        Ok(handle)
    }

    /// Tears down the active session, optionally saving it to the autosave
    /// slot first. A no-op when idle.
    ///
    /// Never fails: a concurrent lifecycle call is waited out without the
    /// busy budget, and autosave errors land in [`StopReport::save_error`].
    pub async fn stop_session(&self, save: bool) -> StopReport {
        let mut active = self.lifecycle.lock().await;
        match active.take() {
            Some(current) => self.teardown(current, save).await,
            None => {
                debug!("stop_session called with no active session");
                StopReport::idle()
            }
        }
    }

    async fn lock_lifecycle(&self) -> Result<MutexGuard<'_, Option<ActiveSession>>> {
        let budget = self.config.session.busy_timeout();
        tokio::time::timeout(budget, self.lifecycle.lock())
            .await
            .map_err(|_| {
                warn!(waited_ms = budget.as_millis() as u64, "lifecycle lock busy");
                GbError::SessionBusy {
                    waited_ms: budget.as_millis() as u64,
                }
            })
    }

    async fn create_emulator(&self, rom: &RomImage) -> Result<(Box<dyn Emulator>, RawFrame)> {
        let factory = self.factory.clone();
        let image = rom.clone();
        let created = tokio::task::spawn_blocking(move || {
            let mut emulator = factory.create(&image)?;
            let frame = emulator.render()?;
            Ok::<_, crate::emulator::EmulatorFault>((emulator, frame))
        })
        .await;

        match created {
            Ok(Ok((emulator, frame))) if frame.is_well_formed() => Ok((emulator, frame)),
            Ok(Ok(_)) => Err(GbError::invalid_rom(
                &rom.name,
                "emulator produced a malformed first frame",
            )),
            Ok(Err(fault)) => Err(GbError::invalid_rom(
                &rom.name,
                format!("emulator rejected the ROM: {}", fault.message),
            )),
            Err(join_error) => Err(GbError::invalid_rom(
                &rom.name,
                format!("emulator panicked while loading: {}", join_error),
            )),
        }
    }

    async fn teardown(&self, active: ActiveSession, save: bool) -> StopReport {
        let ActiveSession { handle, mut worker } = active;
        let mut report = StopReport {
            was_active: true,
            session_id: Some(handle.id().to_string()),
            final_state: Some(handle.state()),
            ..StopReport::idle()
        };

        if save {
            if handle.state() == SessionState::Running {
                let slot = SlotName::parse(&self.config.session.autosave_slot);
                let saved = match slot {
                    Ok(slot) => self.persist_snapshot(&handle, slot).await,
                    Err(e) => Err(e),
                };
                match saved {
                    Ok(summary) => report.saved_slot = Some(summary.slot_name),
                    Err(e) => {
                        warn!(session_id = %handle.id(), error = %e, "autosave failed");
                        report.save_error = Some(e);
                    }
                }
            } else {
                debug!(
                    session_id = %handle.id(),
                    state = %handle.state(),
                    "skipping autosave"
                );
            }
        }

        handle.begin_stop();
        let drain = self.config.session.drain_timeout();
        if tokio::time::timeout(drain, &mut worker).await.is_err() {
            report.rejected_operations = handle.force_reject("drain timed out");
            warn!(
                session_id = %handle.id(),
                rejected = report.rejected_operations,
                "queue did not drain in time"
            );
            // Waits only for the operation already on the emulator.
            let _ = worker.await;
        }

        self.frames.invalidate();
        handle.mark_idle();
        self.set_current(None);
        info!(session_id = %handle.id(), "session stopped");
        report
    }

    // ============================================================================
    // Reads
    // ============================================================================

    pub fn current_handle(&self) -> Option<SessionHandle> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn require_handle(&self) -> Result<SessionHandle> {
        self.current_handle().ok_or(GbError::NoActiveSession)
    }

    fn set_current(&self, handle: Option<SessionHandle>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = handle;
    }

    pub fn get_status(&self) -> SessionStatus {
        match self.current_handle() {
            Some(handle) => handle.status(),
            None => SessionStatus::idle(self.crash_count.load(Ordering::SeqCst)),
        }
    }

    pub fn rom_fingerprint(&self) -> Option<RomFingerprint> {
        self.current_handle().map(|h| h.fingerprint().clone())
    }

    /// Latest rendered frame; never waits on the input queue.
    pub fn current_frame(&self) -> Result<Arc<Frame>> {
        self.require_handle()?
            .frame()
            .ok_or(GbError::NoActiveSession)
    }

    // ============================================================================
    // Save states
    // ============================================================================

    /// Snapshots the running emulator (in queue order) and persists it.
    pub async fn save_state(&self, name: &str) -> Result<SaveSlotSummary> {
        let slot = SlotName::parse(name)?;
        let handle = self.require_handle()?;
        self.persist_snapshot(&handle, slot).await
    }

    async fn persist_snapshot(
        &self,
        handle: &SessionHandle,
        slot: SlotName,
    ) -> Result<SaveSlotSummary> {
        let outcome = handle.save_snapshot(slot.clone())?.wait().await?;
        let snapshot = outcome
            .snapshot
            .ok_or_else(|| GbError::internal("save_state completed without a snapshot"))?;
        let record = SaveSlot::new(slot, handle.fingerprint().clone(), snapshot);
        self.save_slots.save(&record).await?;
        info!(
            session_id = %handle.id(),
            slot = %record.slot_name,
            bytes = record.snapshot.len(),
            "state saved"
        );
        Ok(record.summary())
    }

    /// Restores a slot of the loaded ROM. Slots saved by a different ROM
    /// fail with `RomMismatch`.
    pub async fn load_state(&self, name: &str) -> Result<OperationOutcome> {
        let slot = SlotName::parse(name)?;
        let handle = self.require_handle()?;
        let expected = handle.fingerprint().clone();

        let record = match self.save_slots.find(&expected, &slot).await? {
            Some(record) => record,
            None => {
                let owners = self.save_slots.fingerprints_with(&slot).await?;
                return Err(match owners.into_iter().next() {
                    Some(found) => GbError::RomMismatch {
                        slot: slot.to_string(),
                        expected: expected.to_string(),
                        found: found.to_string(),
                    },
                    None => GbError::SlotNotFound {
                        slot: slot.to_string(),
                        fingerprint: expected.to_string(),
                    },
                });
            }
        };
        if record.rom_fingerprint != expected {
            return Err(GbError::RomMismatch {
                slot: slot.to_string(),
                expected: expected.to_string(),
                found: record.rom_fingerprint.to_string(),
            });
        }

        let outcome = handle
            .load_snapshot(slot.clone(), Arc::from(record.snapshot))?
            .wait()
            .await?;
        info!(session_id = %handle.id(), slot = %slot, "state loaded");
        Ok(outcome)
    }

    pub async fn list_save_states(&self) -> Result<Vec<SaveSlotSummary>> {
        let handle = self.require_handle()?;
        self.save_slots.list(handle.fingerprint()).await
    }

    pub async fn delete_save_state(&self, name: &str) -> Result<bool> {
        let slot = SlotName::parse(name)?;
        let handle = self.require_handle()?;
        self.save_slots.delete(handle.fingerprint(), &slot).await
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // Lets the worker finish what is queued and exit.
        if let Some(handle) = self.current_handle() {
            handle.begin_stop();
        }
    }
}
