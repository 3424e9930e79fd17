//! Core domain of gbmcp: the emulator session, its input queue and frame
//! cache, ROM validation, save slots and the notebook.

pub mod config;
pub mod emulator;
pub mod error;
pub mod notebook;
pub mod rom;
pub mod save_slot;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export common error type
pub use error::{GbError, Result};
