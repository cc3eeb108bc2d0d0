//! Context compaction: marks cut points, never deletes history.

use serde::Serialize;

use super::{update, Action, OrderKey, SessionStore};

/// A compaction boundary, placed after the log tail at the time it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactBoundaryMark {
    /// Last entry before the cut; `None` if the log was empty.
    pub after: Option<OrderKey>,
    pub trigger: Option<String>,
    pub pre_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionState {
    /// The producer is compacting right now.
    pub compacting: bool,
    pub boundaries: Vec<CompactBoundaryMark>,
}

impl CompactionState {
    /// Most recent cut point. Entries at or before it are history the agent
    /// no longer has in context; the UI may fold them.
    pub fn cut_point(&self) -> Option<OrderKey> {
        self.boundaries.last().and_then(|b| b.after)
    }

    /// Whether `key` lies before the latest compaction boundary.
    pub fn is_compacted(&self, key: OrderKey) -> bool {
        self.cut_point().is_some_and(|cut| key <= cut)
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    let tail = store.messages.tail_key();
    update(&mut store.compaction, |c| match action {
        Action::CompactBoundary {
            trigger,
            pre_tokens,
        } => {
            if c.boundaries.last().is_some_and(|b| b.after == tail) {
                return;
            }
            c.boundaries.push(CompactBoundaryMark {
                after: tail,
                trigger: trigger.clone(),
                pre_tokens: *pre_tokens,
            });
            c.compacting = false;
        }
        Action::CompactingStarted => c.compacting = true,
        Action::CompactingEnded => c.compacting = false,
        Action::SnapshotLoaded(_) | Action::SessionSelected { .. } | Action::NewSession => {
            *c = CompactionState::default();
        }
        _ => {}
    });
    store
}
