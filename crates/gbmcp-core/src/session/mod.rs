//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: lifecycle state and the status snapshot
//! - `operation`: queued operations and their outcomes
//! - `frame_cache`: latest rendered frame (`FrameCache`)
//! - `input_queue`: bounded FIFO between callers and the worker (`InputQueue`)
//! - `emulator_session`: the worker and its producer handle (`SessionHandle`)
//! - `manager`: single-session lifecycle (`SessionManager`)

mod emulator_session;
mod frame_cache;
mod input_queue;
mod manager;
mod model;
mod operation;


pub use emulator_session::{RomInfo, SessionHandle};
pub use frame_cache::{Frame, FrameCache};
pub use input_queue::{InputQueue, Ticket};
pub use manager::{SessionManager, StopReport};
pub use model::{SessionState, SessionStatus};
pub use operation::{OperationKind, OperationOutcome, QueuedOperation};
