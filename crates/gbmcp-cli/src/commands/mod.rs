pub mod config;
pub mod fingerprint;
pub mod notes;
pub mod saves;
pub mod utils;
