//! Reduction engine.
//!
//! `reduce(store, action)` is a pure, total left-fold over a fixed, ordered
//! registry of slice reducers. Each slice owns one `Arc`'d part of the
//! [`SessionStore`] and either hands the store back untouched (the `Arc` stays
//! pointer-identical) or replaces its own part.
//!
//! Slice order is part of the contract. It is only observable when two
//! slices react to the same action:
//!
//! 1. `session`
//! 2. `requests`
//! 3. `queue`
//! 4. `messages`
//! 5. `tooling` (reads the log `messages` just produced)
//! 6. `compaction` (cut point is the tail after ingestion)
//! 7. `system`
//! 8. `settings`
//! 9. `rewind_preview` (invalidates against the updated log)
//! 10. `rewind_execution` (truncates the log and rebuilds tooling on success)
//!
//! `SessionSelected`/`NewSession` reset slices 1-7, 9 and 10 in that one fold;
//! settings survive.

mod action;
mod compaction;
mod ingest;
mod message;
mod queue;
mod requests;
mod rewind;
mod session;
mod settings;
mod system;
mod tooling;

use std::sync::Arc;

pub use action::{
    Action, QueueTransition, RewindFile, SettingsPatch, Snapshot, SystemInit,
};
pub use compaction::{CompactBoundaryMark, CompactionState};
pub use message::{MergeOutcome, Message, MessageLog, OrderKey, Payload, ResultSummary};
pub use queue::{QueueState, QueuedUserMessage};
pub use requests::{RequestState, Resolution, ResolutionOutcome};
pub use rewind::{ExecutionStatus, PreviewStatus, RewindExecution, RewindPreview, RewindState};
pub use session::SessionState;
pub use settings::SettingsState;
pub use system::{HookStatus, SystemState, TaskNotice};
pub use tooling::{ClosedToolUse, OpenToolUse, OrphanResult, ToolUseSummary, ToolingState};

/// The whole client-side session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    pub session: Arc<SessionState>,
    pub requests: Arc<RequestState>,
    pub queue: Arc<QueueState>,
    pub messages: Arc<MessageLog>,
    pub tooling: Arc<ToolingState>,
    pub compaction: Arc<CompactionState>,
    pub system: Arc<SystemState>,
    pub settings: Arc<SettingsState>,
    pub rewind: Arc<RewindState>,
}

/// A slice reducer.
pub type Slice = fn(SessionStore, &Action) -> SessionStore;

/// The slice registry, in fold order.
pub const SLICES: &[(&str, Slice)] = &[
    ("session", session::reduce),
    ("requests", requests::reduce),
    ("queue", queue::reduce),
    ("messages", ingest::reduce),
    ("tooling", tooling::reduce),
    ("compaction", compaction::reduce),
    ("system", system::reduce),
    ("settings", settings::reduce),
    ("rewind_preview", rewind::reduce_preview),
    ("rewind_execution", rewind::reduce_execution),
];

/// Fold one action through every slice.
pub fn reduce(store: SessionStore, action: &Action) -> SessionStore {
    SLICES
        .iter()
        .fold(store, |store, (_, slice)| slice(store, action))
}

/// Apply `f` to a copy of a slice and swap it in only if it changed, so
/// unchanged slices keep their identity.
pub(crate) fn update<T: Clone + PartialEq>(slot: &mut Arc<T>, f: impl FnOnce(&mut T)) -> bool {
    let mut next = T::clone(slot);
    f(&mut next);
    if next == **slot {
        return false;
    }
    *slot = Arc::new(next);
    true
}
