//! Application layer for gbmcp.
//!
//! Turns tool invocations into session manager and notebook calls and
//! shapes their results into serializable responses.

pub mod dto;
pub mod game_service;
pub mod screen;
pub mod tool;

pub use dto::ToolError;
pub use game_service::GameService;
pub use screen::ScreenImage;
pub use tool::ToolCall;
