//! Tool-use / tool-result correlation, maintained incrementally.
//!
//! A result closes the open use with the same correlation id. A result that
//! arrives before its use is buffered as an orphan for one further delivery
//! batch. Once that batch passes without the use, the orphan expires: the
//! live view stops waiting for it, but a use that still turns up later is
//! closed with the expired result so the call never stays open.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use super::{update, Action, Message, MessageLog, OrderKey, Payload, SessionStore};

/// How many further delivery batches an orphaned result waits for its use.
pub const ORPHAN_WINDOW: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenToolUse {
    pub name: String,
    pub order: OrderKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedToolUse {
    pub name: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanResult {
    pub order: OrderKey,
    pub is_error: bool,
    /// Batches ingested since the orphan was buffered.
    pub age: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolUseSummary {
    pub summary: String,
    pub tool_use_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolingState {
    pub open: BTreeMap<String, OpenToolUse>,
    pub closed: BTreeMap<String, ClosedToolUse>,
    pub orphans: BTreeMap<String, OrphanResult>,
    /// Results whose use did not show up within the window.
    pub expired: BTreeMap<String, OrphanResult>,
    /// Elapsed seconds reported for in-flight tools.
    pub progress: BTreeMap<String, f64>,
    pub summaries: Vec<ToolUseSummary>,
    /// Message ids already correlated; replays are skipped.
    #[serde(skip)]
    seen: BTreeSet<String>,
}

impl ToolingState {
    /// Rebuild correlation from an ordered log, e.g. after a snapshot.
    pub fn from_log(log: &MessageLog) -> Self {
        let mut state = Self::default();
        state.ingest_batch(log.messages());
        state
    }

    pub fn is_in_flight(&self, tool_use_id: &str) -> bool {
        self.open.contains_key(tool_use_id)
    }

    /// Summary covering `tool_use_id`, if the producer sent one.
    pub fn summary_for(&self, tool_use_id: &str) -> Option<&ToolUseSummary> {
        self.summaries
            .iter()
            .rev()
            .find(|s| s.tool_use_ids.iter().any(|id| id == tool_use_id))
    }

    /// Correlate one delivery, then age the orphans left over from earlier ones.
    fn ingest_batch<'a>(&mut self, messages: impl IntoIterator<Item = &'a Message>) {
        let mut fresh = BTreeSet::new();
        for message in messages {
            if let Some(orphan) = self.ingest(message) {
                fresh.insert(orphan);
            }
        }
        self.age_orphans(&fresh);
    }

    /// Returns the correlation id when the message was buffered as an orphan.
    fn ingest(&mut self, message: &Message) -> Option<String> {
        if !self.seen.insert(message.id.clone()) {
            return None;
        }
        match &message.payload {
            Payload::ToolUse {
                tool_use_id, name, ..
            } => {
                if self.open.contains_key(tool_use_id) || self.closed.contains_key(tool_use_id) {
                    return None;
                }
                let waiting = self
                    .orphans
                    .remove(tool_use_id)
                    .or_else(|| self.expired.remove(tool_use_id));
                match waiting {
                    Some(result) => {
                        self.closed.insert(
                            tool_use_id.clone(),
                            ClosedToolUse {
                                name: name.clone(),
                                is_error: result.is_error,
                            },
                        );
                    }
                    None => {
                        self.open.insert(
                            tool_use_id.clone(),
                            OpenToolUse {
                                name: name.clone(),
                                order: message.order,
                            },
                        );
                    }
                }
                None
            }
            Payload::ToolResult {
                tool_use_id,
                is_error,
                ..
            } => {
                if let Some(open) = self.open.remove(tool_use_id) {
                    self.progress.remove(tool_use_id);
                    self.closed.insert(
                        tool_use_id.clone(),
                        ClosedToolUse {
                            name: open.name,
                            is_error: *is_error,
                        },
                    );
                    return None;
                }
                if self.closed.contains_key(tool_use_id)
                    || self.orphans.contains_key(tool_use_id)
                    || self.expired.contains_key(tool_use_id)
                {
                    return None;
                }
                self.orphans.insert(
                    tool_use_id.clone(),
                    OrphanResult {
                        order: message.order,
                        is_error: *is_error,
                        age: 0,
                    },
                );
                Some(tool_use_id.clone())
            }
            _ => None,
        }
    }

    fn age_orphans(&mut self, fresh: &BTreeSet<String>) {
        let mut expired = Vec::new();
        for (id, orphan) in &mut self.orphans {
            if fresh.contains(id) {
                continue;
            }
            orphan.age += 1;
            if orphan.age >= ORPHAN_WINDOW {
                expired.push(id.clone());
            }
        }
        for id in expired {
            if let Some(orphan) = self.orphans.remove(&id) {
                tracing::warn!(tool_use_id = %id, "tool result never matched a tool use");
                self.expired.insert(id, orphan);
            }
        }
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    match action {
        Action::MessagesReceived(messages) => {
            update(&mut store.tooling, |t| t.ingest_batch(messages));
        }
        Action::ToolProgress {
            tool_use_id,
            elapsed_seconds,
        } => {
            if !store.tooling.is_in_flight(tool_use_id) {
                tracing::debug!(tool_use_id, "progress for unknown tool ignored");
                return store;
            }
            update(&mut store.tooling, |t| {
                t.progress.insert(tool_use_id.clone(), *elapsed_seconds);
            });
        }
        Action::ToolUseSummary {
            summary,
            tool_use_ids,
        } => {
            update(&mut store.tooling, |t| {
                let entry = ToolUseSummary {
                    summary: summary.clone(),
                    tool_use_ids: tool_use_ids.clone(),
                };
                if !t.summaries.contains(&entry) {
                    t.summaries.push(entry);
                }
            });
        }
        Action::SnapshotLoaded(_) => {
            store.tooling = Arc::new(ToolingState::from_log(&store.messages));
        }
        Action::SessionSelected { .. } | Action::NewSession => {
            update(&mut store.tooling, |t| *t = ToolingState::default());
        }
        _ => {}
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageOrigin;
    use crate::state::reduce as fold;

    fn tool_use(id: &str, seq: u64) -> Message {
        Message::new(
            format!("use-{id}"),
            OrderKey::new(seq, 0),
            MessageOrigin::Agent,
            Payload::ToolUse {
                tool_use_id: id.to_string(),
                name: "Read".to_string(),
                input: serde_json::json!({"file_path": "src/lib.rs"}),
            },
        )
    }

    fn tool_result(id: &str, seq: u64) -> Message {
        Message::new(
            format!("result-{id}"),
            OrderKey::new(seq, 0),
            MessageOrigin::User,
            Payload::ToolResult {
                tool_use_id: id.to_string(),
                content: Some("ok".to_string()),
                is_error: false,
            },
        )
    }

    fn text(seq: u64) -> Message {
        Message::new(
            format!("text-{seq}"),
            OrderKey::new(seq, 0),
            MessageOrigin::Agent,
            Payload::Text {
                text: "thinking out loud".to_string(),
            },
        )
    }

    fn ingest(batches: Vec<Vec<Message>>) -> ToolingState {
        let store = batches.into_iter().fold(SessionStore::default(), |s, batch| {
            fold(s, &Action::MessagesReceived(batch))
        });
        ToolingState::clone(&store.tooling)
    }

    #[test]
    fn result_closes_open_use() {
        let t = ingest(vec![vec![tool_use("t1", 1)], vec![tool_result("t1", 2)]]);
        assert!(t.open.is_empty());
        assert_eq!(t.closed.get("t1").map(|c| c.name.as_str()), Some("Read"));
    }

    #[test]
    fn result_before_use_is_buffered_then_matched() {
        let t = ingest(vec![vec![tool_result("t1", 2)]]);
        assert!(t.orphans.contains_key("t1"));

        let t = ingest(vec![vec![tool_result("t1", 2)], vec![tool_use("t1", 1)]]);
        assert!(t.orphans.is_empty());
        assert!(t.open.is_empty());
        assert!(t.closed.contains_key("t1"));
    }

    #[test]
    fn orphan_expires_after_window() {
        let t = ingest(vec![vec![tool_result("t1", 3)], vec![text(4)]]);
        assert!(t.orphans.is_empty());
        assert!(t.expired.contains_key("t1"));

        let t = ingest(vec![
            vec![tool_result("t1", 3)],
            vec![text(4)],
            vec![tool_use("t1", 1)],
        ]);
        assert!(t.expired.is_empty());
        assert!(t.open.is_empty());
        assert!(t.closed.contains_key("t1"));
    }

    #[test]
    fn use_batched_with_text_matches_early_result() {
        // One assistant event carries both a text block and the tool use.
        let t = ingest(vec![
            vec![tool_result("t1", 2)],
            vec![text(1), tool_use("t1", 1)],
        ]);
        assert!(t.orphans.is_empty());
        assert!(t.expired.is_empty());
        assert!(t.open.is_empty());
        assert_eq!(t.closed.get("t1").map(|c| c.is_error), Some(false));
    }

    #[test]
    fn failed_result_survives_expiry() {
        let mut failed = tool_result("t1", 3);
        failed.payload = Payload::ToolResult {
            tool_use_id: "t1".to_string(),
            content: None,
            is_error: true,
        };
        let t = ingest(vec![
            vec![failed],
            vec![text(4)],
            vec![text(5)],
            vec![tool_use("t1", 1)],
        ]);
        assert_eq!(t.closed.get("t1").map(|c| c.is_error), Some(true));
    }

    #[test]
    fn progress_only_for_in_flight_tools() {
        let mut store = fold(
            SessionStore::default(),
            &Action::MessagesReceived(vec![tool_use("t1", 1)]),
        );
        store = fold(
            store,
            &Action::ToolProgress {
                tool_use_id: "t1".to_string(),
                elapsed_seconds: 2.5,
            },
        );
        assert_eq!(store.tooling.progress.get("t1"), Some(&2.5));

        let before = store.clone();
        store = fold(
            store,
            &Action::ToolProgress {
                tool_use_id: "nope".to_string(),
                elapsed_seconds: 1.0,
            },
        );
        assert!(Arc::ptr_eq(&before.tooling, &store.tooling));

        store = fold(store, &Action::MessagesReceived(vec![tool_result("t1", 2)]));
        assert!(store.tooling.progress.is_empty());
    }

    #[test]
    fn duplicate_result_does_not_reopen() {
        let t = ingest(vec![
            vec![tool_use("t1", 1), tool_result("t1", 2)],
            vec![tool_result("t1", 2)],
        ]);
        assert!(t.orphans.is_empty());
        assert_eq!(t.closed.len(), 1);
    }

    #[test]
    fn summary_lookup() {
        let store = fold(
            SessionStore::default(),
            &Action::ToolUseSummary {
                summary: "Read 3 files".to_string(),
                tool_use_ids: vec!["a".to_string(), "b".to_string()],
            },
        );
        assert_eq!(
            store.tooling.summary_for("b").map(|s| s.summary.as_str()),
            Some("Read 3 files")
        );
    }
}
