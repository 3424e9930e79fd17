//! The notebook: curated text notes kept per ROM across sessions.

mod model;
mod repository;

pub use model::{NoteEntry, NoteKey, check_write};
pub use repository::NotebookRepository;
