//! Message grouping and tool-sequence pairing.
//!
//! One left-to-right pass over the ordered log. Tool uses and results gather
//! into tool runs, agent text/thinking/status into assistant runs, and every
//! user-authored message is its own group and ends both runs. The output is a
//! pure function of the log and is recomputed whenever the log changes.

use std::ops::Range;

use serde::Serialize;

use crate::state::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    User,
    Assistant,
    ToolSequence,
}

impl GroupKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolSequence => "tool_group",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tool use paired with its result, as indices into the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallView {
    pub tool_use_id: String,
    pub use_index: Option<usize>,
    pub result_index: Option<usize>,
}

impl ToolCallView {
    /// A use without a result is still in flight.
    pub const fn is_in_flight(&self) -> bool {
        self.use_index.is_some() && self.result_index.is_none()
    }
}

/// A contiguous run of log entries rendered as one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageGroup {
    pub kind: GroupKind,
    /// Id of the first message; stable while the run grows.
    pub key: String,
    /// Indices into the log.
    pub range: Range<usize>,
    /// Tool calls in first-appearance order (tool runs only).
    pub tools: Vec<ToolCallView>,
}

impl MessageGroup {
    pub fn messages<'a>(&self, log: &'a [Message]) -> &'a [Message] {
        &log[self.range.clone()]
    }

    /// Every call in the run has its result.
    pub fn is_settled(&self) -> bool {
        self.kind == GroupKind::ToolSequence && !self.tools.iter().any(ToolCallView::is_in_flight)
    }
}

#[derive(Default)]
struct Run {
    start: Option<usize>,
    end: usize,
}

impl Run {
    fn push(&mut self, index: usize) {
        self.start.get_or_insert(index);
        self.end = index + 1;
    }

    fn flush(&mut self, kind: GroupKind, log: &[Message], out: &mut Vec<MessageGroup>) {
        let Some(start) = self.start.take() else {
            return;
        };
        let range = start..self.end;
        let tools = if kind == GroupKind::ToolSequence {
            pair_tools(log, range.clone())
        } else {
            Vec::new()
        };
        out.push(MessageGroup {
            kind,
            key: log[start].id.clone(),
            range,
            tools,
        });
    }
}

/// Group an ordered log.
pub fn group_messages(log: &[Message]) -> Vec<MessageGroup> {
    let mut groups = Vec::new();
    let mut tool_run = Run::default();
    let mut assistant_run = Run::default();

    for (index, message) in log.iter().enumerate() {
        if message.payload.is_tool() {
            assistant_run.flush(GroupKind::Assistant, log, &mut groups);
            tool_run.push(index);
        } else if message.is_user_authored() {
            tool_run.flush(GroupKind::ToolSequence, log, &mut groups);
            assistant_run.flush(GroupKind::Assistant, log, &mut groups);
            groups.push(MessageGroup {
                kind: GroupKind::User,
                key: message.id.clone(),
                range: index..index + 1,
                tools: Vec::new(),
            });
        } else {
            tool_run.flush(GroupKind::ToolSequence, log, &mut groups);
            assistant_run.push(index);
        }
    }
    tool_run.flush(GroupKind::ToolSequence, log, &mut groups);
    assistant_run.flush(GroupKind::Assistant, log, &mut groups);
    groups
}

fn pair_tools(log: &[Message], range: Range<usize>) -> Vec<ToolCallView> {
    let mut calls: Vec<ToolCallView> = Vec::new();
    for index in range {
        let payload = &log[index].payload;
        let Some(id) = payload.tool_use_id() else {
            continue;
        };
        let position = match calls.iter().position(|c| c.tool_use_id == id) {
            Some(position) => position,
            None => {
                calls.push(ToolCallView {
                    tool_use_id: id.to_string(),
                    use_index: None,
                    result_index: None,
                });
                calls.len() - 1
            }
        };
        let call = &mut calls[position];
        if matches!(payload, crate::state::Payload::ToolUse { .. }) {
            call.use_index.get_or_insert(index);
        } else {
            call.result_index.get_or_insert(index);
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageOrigin;
    use crate::state::{OrderKey, Payload};

    fn msg(id: &str, seq: u64, origin: MessageOrigin, payload: Payload) -> Message {
        Message::new(id, OrderKey::new(seq, 0), origin, payload)
    }

    fn user(id: &str, seq: u64) -> Message {
        msg(
            id,
            seq,
            MessageOrigin::User,
            Payload::Text {
                text: "do it".to_string(),
            },
        )
    }

    fn agent(id: &str, seq: u64) -> Message {
        msg(
            id,
            seq,
            MessageOrigin::Agent,
            Payload::Text {
                text: "ok".to_string(),
            },
        )
    }

    fn tool_use(id: &str, seq: u64, call: &str) -> Message {
        msg(
            id,
            seq,
            MessageOrigin::Agent,
            Payload::ToolUse {
                tool_use_id: call.to_string(),
                name: "Bash".to_string(),
                input: serde_json::Value::Null,
            },
        )
    }

    fn tool_result(id: &str, seq: u64, call: &str) -> Message {
        msg(
            id,
            seq,
            MessageOrigin::User,
            Payload::ToolResult {
                tool_use_id: call.to_string(),
                content: None,
                is_error: false,
            },
        )
    }

    fn kinds(groups: &[MessageGroup]) -> Vec<GroupKind> {
        groups.iter().map(|g| g.kind).collect()
    }

    #[test]
    fn user_assistant_tool_run() {
        let log = vec![
            user("u", 1),
            agent("a", 2),
            tool_use("tu", 3, "t1"),
            tool_result("tr", 4, "t1"),
        ];
        let groups = group_messages(&log);
        assert_eq!(
            kinds(&groups),
            vec![GroupKind::User, GroupKind::Assistant, GroupKind::ToolSequence]
        );
        assert_eq!(groups[2].range, 2..4);
        assert_eq!(groups[2].tools[0].use_index, Some(2));
        assert_eq!(groups[2].tools[0].result_index, Some(3));
        assert!(groups[2].is_settled());
    }

    #[test]
    fn user_turn_splits_tool_runs() {
        let log = vec![
            tool_use("a", 1, "t1"),
            user("u", 2),
            tool_result("b", 3, "t1"),
        ];
        let groups = group_messages(&log);
        assert_eq!(
            kinds(&groups),
            vec![GroupKind::ToolSequence, GroupKind::User, GroupKind::ToolSequence]
        );
        assert!(groups[0].tools[0].is_in_flight());
        assert_eq!(groups[2].tools[0].use_index, None);
    }

    #[test]
    fn adjacent_content_coalesces() {
        let thinking = msg(
            "th",
            2,
            MessageOrigin::Agent,
            Payload::Thinking {
                text: "hmm".to_string(),
            },
        );
        let log = vec![
            thinking,
            agent("a", 3),
            tool_use("x", 4, "t1"),
            tool_use("y", 5, "t2"),
            tool_result("z", 6, "t2"),
            agent("b", 7),
        ];
        let groups = group_messages(&log);
        assert_eq!(
            kinds(&groups),
            vec![GroupKind::Assistant, GroupKind::ToolSequence, GroupKind::Assistant]
        );
        assert_eq!(groups[0].key, "th");
        assert_eq!(groups[1].tools.len(), 2);
        assert!(!groups[1].is_settled());
    }

    #[test]
    fn grouping_is_deterministic() {
        let log = vec![user("u", 1), agent("a", 2), user("v", 3)];
        assert_eq!(group_messages(&log), group_messages(&log));
        assert!(group_messages(&[]).is_empty());
    }
}
