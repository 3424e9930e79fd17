//! File-backed implementations of the gbmcp repositories, path resolution
//! and the configuration service.

pub mod config_service;
pub mod dto;
pub mod paths;
pub mod storage;
pub mod toml_notebook_repository;
pub mod toml_save_slot_repository;

pub use crate::config_service::ConfigService;
pub use crate::paths::GbmcpPaths;
pub use crate::toml_notebook_repository::TomlNotebookRepository;
pub use crate::toml_save_slot_repository::TomlSaveSlotRepository;
