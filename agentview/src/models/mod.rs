//! Value types shared across the session runtime.

mod origin;
mod queue;
mod session;

pub use origin::MessageOrigin;
pub use queue::QueuedMessageState;
pub use session::{ConnectionStatus, PermissionMode, SessionPhase};
