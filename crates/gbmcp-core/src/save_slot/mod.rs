//! Save slots: named emulator snapshots scoped to a ROM fingerprint.

mod memory;
mod model;
mod repository;

pub use memory::InMemorySaveSlotRepository;
pub use model::{MAX_KEY_LEN, SaveSlot, SaveSlotSummary, SlotName};
pub(crate) use model::validate_storage_key;
pub use repository::SaveSlotRepository;
