//! Deterministic emulator double with fault injection.
//!
//! The rendered picture is a pure function of the ROM, the number of frames
//! stepped and the held buttons, so tests can compare pixels across
//! snapshot round trips.

use crate::emulator::{
    Button, EmuResult, Emulator, EmulatorFactory, EmulatorFault, RawFrame, SCREEN_HEIGHT,
    SCREEN_WIDTH,
};
use crate::rom::RomImage;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SNAPSHOT_MAGIC: &[u8; 4] = b"GBSS";
const SNAPSHOT_LEN: usize = 4 + 8 + 1;

/// Faults applied to emulators created after the plan is set.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// 1-based `step()` call that returns an error.
    pub fail_on_step: Option<u64>,
    /// 1-based `step()` call that panics.
    pub panic_on_step: Option<u64>,
    /// Sleep inside every `step()`.
    pub step_delay: Duration,
    /// Makes `EmulatorFactory::create` fail with this message.
    pub reject_creation: Option<String>,
}

pub struct ScriptedEmulator {
    seed: u8,
    frames: u64,
    held: u8,
    step_calls: u64,
    plan: FaultPlan,
}

impl ScriptedEmulator {
    pub fn new(rom: &RomImage, plan: FaultPlan) -> Self {
        Self {
            seed: rom.fingerprint.as_str().as_bytes()[0],
            frames: 0,
            held: 0,
            step_calls: 0,
            plan,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn mask(button: Button) -> u8 {
        let index = Button::ALL
            .iter()
            .position(|b| *b == button)
            .unwrap_or_default();
        1 << index
    }
}

impl Emulator for ScriptedEmulator {
    fn press(&mut self, button: Button) -> EmuResult<()> {
        self.held |= Self::mask(button);
        Ok(())
    }

    fn release(&mut self, button: Button) -> EmuResult<()> {
        self.held &= !Self::mask(button);
        Ok(())
    }

    fn step(&mut self) -> EmuResult<()> {
        self.step_calls += 1;
        if !self.plan.step_delay.is_zero() {
            std::thread::sleep(self.plan.step_delay);
        }
        if self.plan.panic_on_step == Some(self.step_calls) {
            panic!("scripted panic on step {}", self.step_calls);
        }
        if self.plan.fail_on_step == Some(self.step_calls) {
            return Err(EmulatorFault::new(format!(
                "scripted fault on step {}",
                self.step_calls
            )));
        }
        self.frames += 1;
        Ok(())
    }

    fn render(&mut self) -> EmuResult<RawFrame> {
        let pixel = [
            self.seed,
            self.frames as u8,
            (self.frames >> 8) as u8,
            0xFF,
        ];
        let mut rgba = Vec::with_capacity((SCREEN_WIDTH * SCREEN_HEIGHT * 4) as usize);
        for _ in 0..SCREEN_WIDTH * SCREEN_HEIGHT {
            rgba.extend_from_slice(&pixel);
        }
        // First pixel marks the held buttons.
        rgba[0] = self.held;
        Ok(RawFrame::new(SCREEN_WIDTH, SCREEN_HEIGHT, rgba))
    }

    fn save_snapshot(&mut self) -> EmuResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(SNAPSHOT_LEN);
        bytes.extend_from_slice(SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&self.frames.to_le_bytes());
        bytes.push(self.held);
        Ok(bytes)
    }

    fn load_snapshot(&mut self, snapshot: &[u8]) -> EmuResult<()> {
        if snapshot.len() != SNAPSHOT_LEN || &snapshot[..4] != SNAPSHOT_MAGIC {
            return Err(EmulatorFault::new("snapshot is not a scripted emulator state"));
        }
        let mut frames = [0u8; 8];
        frames.copy_from_slice(&snapshot[4..12]);
        self.frames = u64::from_le_bytes(frames);
        self.held = snapshot[12];
        Ok(())
    }

    fn reset(&mut self) -> EmuResult<()> {
        self.frames = 0;
        self.held = 0;
        Ok(())
    }
}

/// Creates [`ScriptedEmulator`]s and counts how many were built.
#[derive(Default)]
pub struct ScriptedEmulatorFactory {
    plan: Mutex<FaultPlan>,
    created: AtomicUsize,
}

impl ScriptedEmulatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(plan: FaultPlan) -> Self {
        Self {
            plan: Mutex::new(plan),
            created: AtomicUsize::new(0),
        }
    }

    pub fn set_plan(&self, plan: FaultPlan) {
        *self.plan.lock().unwrap_or_else(|e| e.into_inner()) = plan;
    }

    pub fn clear_faults(&self) {
        self.set_plan(FaultPlan::default());
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EmulatorFactory for ScriptedEmulatorFactory {
    fn create(&self, rom: &RomImage) -> EmuResult<Box<dyn Emulator>> {
        let plan = self
            .plan
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(reason) = &plan.reject_creation {
            return Err(EmulatorFault::new(reason.clone()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEmulator::new(rom, plan)))
    }
}

/// A minimal 32 KiB cartridge with `title` in the header and a valid header
/// checksum.
pub fn sample_rom(title: &str) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    // entry point: nop; jp $0150
    rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
    for (slot, byte) in rom[0x134..0x143].iter_mut().zip(title.bytes()) {
        *slot = byte;
    }
    // cartridge type ROM ONLY, 32 KiB, no RAM
    rom[0x147] = 0x00;
    rom[0x148] = 0x00;
    rom[0x149] = 0x00;
    let checksum = rom[0x134..0x14D]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_sub(*b).wrapping_sub(1));
    rom[0x14D] = checksum;
    rom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RomConfig;
    use crate::rom::RomSource;

    async fn rom(title: &str) -> RomImage {
        RomImage::load(
            RomSource::bytes("sample.gb", sample_rom(title)),
            &RomConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_restores_pixels() {
        let rom = rom("SNAP").await;
        let mut emu = ScriptedEmulator::new(&rom, FaultPlan::default());
        emu.step().unwrap();
        let saved = emu.save_snapshot().unwrap();
        let before = emu.render().unwrap();
        emu.step().unwrap();
        emu.press(Button::B).unwrap();
        assert_ne!(emu.render().unwrap(), before);

        emu.load_snapshot(&saved).unwrap();
        assert_eq!(emu.render().unwrap(), before);
        assert!(emu.load_snapshot(b"junk").is_err());
    }

    #[tokio::test]
    async fn test_fail_on_step_counts_calls() {
        let rom = rom("FAULT").await;
        let plan = FaultPlan {
            fail_on_step: Some(2),
            ..FaultPlan::default()
        };
        let mut emu = ScriptedEmulator::new(&rom, plan);
        assert!(emu.step().is_ok());
        assert!(emu.step().is_err());
        assert_eq!(emu.frames(), 1);
    }

    #[tokio::test]
    async fn test_sample_rom_title_is_readable() {
        assert_eq!(rom("POKEMON").await.title().as_deref(), Some("POKEMON"));
    }
}
