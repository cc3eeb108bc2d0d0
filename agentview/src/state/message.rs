//! Ordered, append-mostly message log.
//!
//! The log is sorted by producer-assigned [`OrderKey`], never by arrival.
//! Entries are merged by identifier, so replaying a message is a no-op.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::MessageOrigin;

/// Producer-assigned position of a message in the log.
///
/// `seq` comes from the envelope, `part` is the content block index inside it.
/// Parts at or above [`OrderKey::LOCAL_PART_BASE`] are reserved for entries
/// the client synthesizes itself (error blocks, task notices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub seq: u64,
    pub part: u32,
}

impl OrderKey {
    pub const LOCAL_PART_BASE: u32 = 1 << 31;

    pub const fn new(seq: u64, part: u32) -> Self {
        Self { seq, part }
    }

    /// Whether this key was synthesized by the client.
    pub const fn is_local(self) -> bool {
        self.part >= Self::LOCAL_PART_BASE
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.seq, self.part)
    }
}

/// Summary carried by a `result` event at the end of a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub text: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
    pub is_error: bool,
}

/// Content variant of a single log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    TextDelta {
        text: String,
    },
    Thinking {
        text: String,
    },
    ThinkingDelta {
        text: String,
    },
    ToolUse {
        tool_use_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Option<String>,
        is_error: bool,
    },
    Result(ResultSummary),
    Status {
        text: String,
    },
    Error {
        message: String,
    },
}

impl Payload {
    /// Whether this entry belongs in a tool-call run.
    pub const fn is_tool(&self) -> bool {
        matches!(self, Self::ToolUse { .. } | Self::ToolResult { .. })
    }

    /// Correlation id shared by a tool use and its result.
    pub fn tool_use_id(&self) -> Option<&str> {
        match self {
            Self::ToolUse { tool_use_id, .. } | Self::ToolResult { tool_use_id, .. } => {
                Some(tool_use_id)
            }
            _ => None,
        }
    }

    /// Short label for logs and the plain-text transcript.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::TextDelta { .. } => "text_delta",
            Self::Thinking { .. } => "thinking",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Result(_) => "result",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
        }
    }
}

/// An immutable record in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier; the merge key.
    pub id: String,
    /// Ordering key assigned by the producer.
    pub order: OrderKey,
    pub origin: MessageOrigin,
    pub payload: Payload,
    pub timestamp: Option<DateTime<Utc>>,
    /// Client-generated correlation id of the queued message this entry
    /// acknowledges. A join key only; ordering always uses `order`.
    pub local_id: Option<String>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        order: OrderKey,
        origin: MessageOrigin,
        payload: Payload,
    ) -> Self {
        Self {
            id: id.into(),
            order,
            origin,
            payload,
            timestamp: None,
            local_id: None,
        }
    }

    /// A message authored by the user (not a tool result).
    pub const fn is_user_authored(&self) -> bool {
        matches!(self.origin, MessageOrigin::User) && !self.payload.is_tool()
    }
}

/// What [`MessageLog::merge`] did with an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Pushed at the tail (the common streaming case).
    Appended,
    /// Inserted before the tail after an out-of-order delivery.
    Inserted,
    /// Replaced an entry with the same identifier.
    Replaced,
    /// Identical to the stored entry; nothing changed.
    Unchanged,
}

/// The session's message log, sorted by [`OrderKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    entries: Vec<Message>,
    by_id: HashMap<String, OrderKey>,
    revision: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from an unordered batch, e.g. a history snapshot.
    ///
    /// Later duplicates of an identifier win.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut log = Self::new();
        for message in messages {
            log.merge(message);
        }
        log
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Incremented on every mutation.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn tail_key(&self) -> Option<OrderKey> {
        self.entries.last().map(|m| m.order)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index_of(id).map(|idx| &self.entries[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// First entry produced by the producer event `event_id`. Multi-block
    /// events are stored as `{event_id}#{index}`.
    pub fn first_of_event(&self, event_id: &str) -> Option<&Message> {
        let prefix = format!("{event_id}#");
        self.get(event_id).or_else(|| {
            self.entries
                .iter()
                .find(|m| m.id.starts_with(&prefix))
        })
    }

    /// Find the entry that acknowledged a queued message.
    pub fn find_by_local_id(&self, local_id: &str) -> Option<&Message> {
        self.entries
            .iter()
            .rev()
            .find(|m| m.local_id.as_deref() == Some(local_id))
    }

    /// Whether merging `message` would change the log.
    pub fn would_change(&self, message: &Message) -> bool {
        match self.existing_index(message) {
            Some(idx) => self.entries[idx] != *message,
            None => true,
        }
    }

    /// Merge a message by identifier.
    ///
    /// Tail appends are O(1); an out-of-order message is placed by binary
    /// search, shifting only the entries after it.
    pub fn merge(&mut self, message: Message) -> MergeOutcome {
        let mut outcome = MergeOutcome::Appended;
        if let Some(idx) = self.existing_index(&message) {
            if self.entries[idx] == message {
                return MergeOutcome::Unchanged;
            }
            if self.entries[idx].order == message.order {
                self.by_id.remove(&self.entries[idx].id);
                self.by_id.insert(message.id.clone(), message.order);
                self.entries[idx] = message;
                self.revision += 1;
                return MergeOutcome::Replaced;
            }
            let old = self.entries.remove(idx);
            self.by_id.remove(&old.id);
            outcome = MergeOutcome::Replaced;
        }

        self.by_id.insert(message.id.clone(), message.order);
        match self.entries.last() {
            Some(last) if last.order > message.order => {
                let at = self.entries.partition_point(|m| m.order <= message.order);
                self.entries.insert(at, message);
                if outcome == MergeOutcome::Appended {
                    outcome = MergeOutcome::Inserted;
                }
            }
            _ => self.entries.push(message),
        }
        self.revision += 1;
        outcome
    }

    /// Remove the entry `id` and everything ordered after it.
    ///
    /// Returns the number of removed entries.
    pub fn truncate_from(&mut self, id: &str) -> usize {
        let Some(idx) = self.index_of(id) else {
            return 0;
        };
        let removed = self.entries.len() - idx;
        for message in self.entries.drain(idx..) {
            self.by_id.remove(&message.id);
        }
        self.revision += 1;
        removed
    }

    /// Replace the whole history, keeping the revision monotonic.
    pub fn replace(&mut self, messages: Vec<Message>) {
        let revision = self.revision;
        *self = Self::from_messages(messages);
        self.revision = revision + 1;
    }

    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.entries.clear();
        self.by_id.clear();
        self.revision += 1;
    }

    /// Next key for a client-synthesized entry, placed after the current tail.
    pub fn next_local_key(&self) -> OrderKey {
        match self.tail_key() {
            Some(tail) if tail.is_local() => OrderKey::new(tail.seq, tail.part + 1),
            Some(tail) => OrderKey::new(tail.seq, OrderKey::LOCAL_PART_BASE),
            None => OrderKey::new(0, OrderKey::LOCAL_PART_BASE),
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        let key = *self.by_id.get(id)?;
        let start = self.entries.partition_point(|m| m.order < key);
        self.entries[start..]
            .iter()
            .take_while(|m| m.order == key)
            .position(|m| m.id == id)
            .map(|offset| start + offset)
    }

    /// Index of the entry `message` would merge into: same id, or a
    /// placeholder carrying the same local correlation id.
    fn existing_index(&self, message: &Message) -> Option<usize> {
        self.index_of(&message.id).or_else(|| {
            let local_id = message.local_id.as_deref()?;
            self.entries
                .iter()
                .rposition(|m| m.local_id.as_deref() == Some(local_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &str, seq: u64, body: &str) -> Message {
        Message::new(
            id,
            OrderKey::new(seq, 0),
            MessageOrigin::Agent,
            Payload::Text {
                text: body.to_string(),
            },
        )
    }

    fn ids(log: &MessageLog) -> Vec<&str> {
        log.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn appends_in_order() {
        let mut log = MessageLog::new();
        assert_eq!(log.merge(text("a", 1, "one")), MergeOutcome::Appended);
        assert_eq!(log.merge(text("b", 2, "two")), MergeOutcome::Appended);
        assert_eq!(ids(&log), vec!["a", "b"]);
    }

    #[test]
    fn out_of_order_delivery_is_sorted_by_key() {
        let mut log = MessageLog::new();
        log.merge(text("c", 3, "three"));
        log.merge(text("a", 1, "one"));
        assert_eq!(log.merge(text("b", 2, "two")), MergeOutcome::Inserted);
        assert_eq!(ids(&log), vec!["a", "b", "c"]);
        assert_eq!(log.get("b").map(|m| m.order), Some(OrderKey::new(2, 0)));
    }

    #[test]
    fn duplicate_is_unchanged() {
        let mut log = MessageLog::new();
        log.merge(text("a", 1, "one"));
        let revision = log.revision();
        assert!(!log.would_change(&text("a", 1, "one")));
        assert_eq!(log.merge(text("a", 1, "one")), MergeOutcome::Unchanged);
        assert_eq!(log.len(), 1);
        assert_eq!(log.revision(), revision);
    }

    #[test]
    fn same_id_with_new_content_replaces() {
        let mut log = MessageLog::new();
        log.merge(text("a", 1, "partial"));
        assert_eq!(log.merge(text("a", 1, "complete")), MergeOutcome::Replaced);
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.get("a").map(|m| m.payload.clone()),
            Some(Payload::Text {
                text: "complete".to_string()
            })
        );
    }

    #[test]
    fn local_id_joins_placeholder() {
        let mut log = MessageLog::new();
        let mut placeholder = Message::new(
            "local-1",
            OrderKey::new(5, 0),
            MessageOrigin::User,
            Payload::Text {
                text: "hi".to_string(),
            },
        );
        placeholder.local_id = Some("local-1".to_string());
        log.merge(placeholder);

        let mut echoed = Message::new(
            "uuid-9",
            OrderKey::new(5, 0),
            MessageOrigin::User,
            Payload::Text {
                text: "hi".to_string(),
            },
        );
        echoed.local_id = Some("local-1".to_string());
        log.merge(echoed);

        assert_eq!(ids(&log), vec!["uuid-9"]);
        assert!(!log.contains("local-1"));
    }

    #[test]
    fn truncate_removes_tail() {
        let mut log = MessageLog::from_messages(vec![
            text("a", 1, "one"),
            text("b", 2, "two"),
            text("c", 3, "three"),
        ]);
        assert_eq!(log.truncate_from("b"), 2);
        assert_eq!(ids(&log), vec!["a"]);
        assert!(!log.contains("c"));
        assert_eq!(log.truncate_from("missing"), 0);
    }

    #[test]
    fn local_keys_follow_tail() {
        let mut log = MessageLog::new();
        log.merge(text("a", 7, "one"));
        let key = log.next_local_key();
        assert_eq!(key, OrderKey::new(7, OrderKey::LOCAL_PART_BASE));
        log.merge(Message::new(
            "err",
            key,
            MessageOrigin::System,
            Payload::Error {
                message: "boom".to_string(),
            },
        ));
        assert_eq!(
            log.next_local_key(),
            OrderKey::new(7, OrderKey::LOCAL_PART_BASE + 1)
        );
        // A later producer message still sorts after local entries of an earlier seq.
        log.merge(text("b", 8, "two"));
        assert_eq!(ids(&log), vec!["a", "err", "b"]);
    }
}
