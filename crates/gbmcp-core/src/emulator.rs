//! The emulator collaborator.
//!
//! gbmcp never looks inside the emulator. It only needs a value that can be
//! stepped, rendered, snapshotted and fed button presses. Every call may fail
//! with an [`EmulatorFault`]; the session worker is the only place that
//! calls these methods and turns a fault into a crashed session.

use crate::error::{GbError, Result};
use crate::rom::RomImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Game Boy screen width in pixels.
pub const SCREEN_WIDTH: u32 = 160;
/// Game Boy screen height in pixels.
pub const SCREEN_HEIGHT: u32 = 144;

/// The eight Game Boy buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Button {
    A,
    B,
    Start,
    Select,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::Start => "START",
            Button::Select => "SELECT",
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
        }
    }

    /// Parses a button name case-insensitively, rejecting anything outside
    /// the fixed set.
    pub fn parse(name: &str) -> Result<Self> {
        let upper = name.trim().to_ascii_uppercase();
        Button::ALL
            .into_iter()
            .find(|b| b.as_str() == upper)
            .ok_or_else(|| {
                let valid: Vec<&str> = Button::ALL.iter().map(Button::as_str).collect();
                GbError::invalid_parameter(
                    "button",
                    name,
                    format!("unknown button; valid buttons are {}", valid.join(", ")),
                )
            })
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = GbError;

    fn from_str(s: &str) -> Result<Self> {
        Button::parse(s)
    }
}

/// Pixels exactly as the emulator rendered them, RGBA8 row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    /// A blank (black, opaque) Game Boy sized frame.
    pub fn blank() -> Self {
        let mut rgba = vec![0u8; (SCREEN_WIDTH * SCREEN_HEIGHT * 4) as usize];
        rgba.chunks_exact_mut(4).for_each(|px| px[3] = 0xFF);
        Self::new(SCREEN_WIDTH, SCREEN_HEIGHT, rgba)
    }

    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

/// A fault raised by the emulator. After a fault the instance is treated as
/// corrupted and is never called again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorFault {
    pub message: String,
}

impl EmulatorFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EmulatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emulator fault: {}", self.message)
    }
}

impl std::error::Error for EmulatorFault {}

pub type EmuResult<T> = std::result::Result<T, EmulatorFault>;

/// An emulator instance. Not required to be `Sync`: the session worker owns
/// it exclusively and moves it onto a blocking thread for each operation.
pub trait Emulator: Send + 'static {
    fn press(&mut self, button: Button) -> EmuResult<()>;

    fn release(&mut self, button: Button) -> EmuResult<()>;

    /// Advances emulation by one frame.
    fn step(&mut self) -> EmuResult<()>;

    fn render(&mut self) -> EmuResult<RawFrame>;

    /// Serializes the complete machine state. Must not include ROM data.
    fn save_snapshot(&mut self) -> EmuResult<Vec<u8>>;

    fn load_snapshot(&mut self, snapshot: &[u8]) -> EmuResult<()>;

    /// Reinitializes the machine with the ROM it was created from.
    fn reset(&mut self) -> EmuResult<()>;
}

/// Builds emulator instances for validated ROMs.
pub trait EmulatorFactory: Send + Sync {
    fn create(&self, rom: &RomImage) -> EmuResult<Box<dyn Emulator>>;
}

impl<F> EmulatorFactory for F
where
    F: Fn(&RomImage) -> EmuResult<Box<dyn Emulator>> + Send + Sync,
{
    fn create(&self, rom: &RomImage) -> EmuResult<Box<dyn Emulator>> {
        self(rom)
    }
}
