//! Translation of Claude stream events into log messages.
//!
//! Every content block of an event becomes one [`Message`]. Events holding a
//! single block keep the event uuid as message id; multi-block events use
//! `{uuid}#{index}`. The order key is `(seq, block index)`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::models::MessageOrigin;
use crate::state::{Action, Message, OrderKey, Payload, ResultSummary, SystemInit};

use super::{str_field, strings};

static SYSTEM_REMINDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<system-reminder>.*?</system-reminder>").expect("system reminder pattern")
});

/// Strip injected `<system-reminder>` blocks and surrounding whitespace.
pub fn strip_noise(text: &str) -> String {
    SYSTEM_REMINDER.replace_all(text, "").trim().to_string()
}

pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value.and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Classify a `claude_message` envelope.
pub(super) fn classify_message(envelope: &Value) -> Option<Action> {
    let seq = envelope.get("seq").and_then(Value::as_u64)?;
    let event = envelope.get("message").filter(|m| m.is_object())?;

    if event.get("type").and_then(Value::as_str) == Some("system") {
        match event.get("subtype").and_then(Value::as_str) {
            Some("init") => return Some(Action::SystemInit(system_init(event))),
            Some("compact_boundary") => {
                let meta = event.get("compact_metadata").unwrap_or(event);
                return Some(Action::CompactBoundary {
                    trigger: str_field(meta, "trigger"),
                    pre_tokens: meta.get("pre_tokens").and_then(Value::as_u64),
                });
            }
            _ => {}
        }
    }

    let timestamp = parse_timestamp(envelope.get("timestamp"));
    let local_id = envelope.get("local_id").and_then(Value::as_str);
    let messages = messages_from_event(seq, event, local_id, timestamp);
    if messages.is_empty() {
        return None;
    }
    Some(Action::MessagesReceived(messages))
}

/// Init metadata, from either a stream event or a `system_init` envelope.
pub(super) fn system_init(value: &Value) -> SystemInit {
    SystemInit {
        tools: value.get("tools").and_then(strings).unwrap_or_default(),
        model: str_field(value, "model"),
        cwd: str_field(value, "cwd"),
        slash_commands: value
            .get("slash_commands")
            .and_then(strings)
            .unwrap_or_default(),
    }
}

/// All log messages carried by one stream event.
pub fn messages_from_event(
    seq: u64,
    event: &Value,
    local_id: Option<&str>,
    timestamp: Option<DateTime<Utc>>,
) -> Vec<Message> {
    let uuid = str_field(event, "uuid")
        .or_else(|| {
            event
                .get("message")
                .and_then(|m| m.get("id"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| format!("seq-{seq}"));
    let timestamp = timestamp.or_else(|| parse_timestamp(event.get("timestamp")));

    let mut messages = match event.get("type").and_then(Value::as_str) {
        Some("assistant") => content_messages(seq, &uuid, event, MessageOrigin::Agent),
        Some("user") => content_messages(seq, &uuid, event, MessageOrigin::User),
        Some("result") => vec![result_message(seq, &uuid, event)],
        Some("stream_event") => delta_message(seq, &uuid, event).into_iter().collect(),
        Some("system") => status_message(seq, &uuid, event).into_iter().collect(),
        _ => Vec::new(),
    };

    for message in &mut messages {
        message.timestamp = timestamp;
        if message.is_user_authored() {
            message.local_id = local_id.map(String::from);
        }
    }
    messages
}

fn content_messages(seq: u64, uuid: &str, event: &Value, origin: MessageOrigin) -> Vec<Message> {
    let Some(content) = event.get("message").and_then(|m| m.get("content")) else {
        return Vec::new();
    };

    // A user turn may carry plain text instead of content blocks.
    if let Some(text) = content.as_str() {
        let text = strip_noise(text);
        if text.is_empty() {
            return Vec::new();
        }
        return vec![Message::new(
            uuid,
            OrderKey::new(seq, 0),
            origin,
            Payload::Text { text },
        )];
    }

    let Some(blocks) = content.as_array() else {
        return Vec::new();
    };
    let single = blocks.len() == 1;
    blocks
        .iter()
        .enumerate()
        .filter_map(|(index, block)| {
            let payload = block_payload(block)?;
            let part = u32::try_from(index).ok()?;
            let id = if single {
                uuid.to_string()
            } else {
                format!("{uuid}#{index}")
            };
            Some(Message::new(id, OrderKey::new(seq, part), origin, payload))
        })
        .collect()
}

fn block_payload(block: &Value) -> Option<Payload> {
    match block.get("type").and_then(Value::as_str)? {
        "text" => {
            let text = strip_noise(block.get("text").and_then(Value::as_str)?);
            (!text.is_empty()).then_some(Payload::Text { text })
        }
        "thinking" => {
            let text = block.get("thinking").and_then(Value::as_str)?.trim().to_string();
            (!text.is_empty()).then_some(Payload::Thinking { text })
        }
        "tool_use" => Some(Payload::ToolUse {
            tool_use_id: str_field(block, "id")?,
            name: str_field(block, "name")?,
            input: block.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => Some(Payload::ToolResult {
            tool_use_id: str_field(block, "tool_use_id")?,
            content: block.get("content").and_then(result_text),
            is_error: block
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        other => {
            tracing::trace!(block_type = other, "content block skipped");
            None
        }
    }
}

/// Tool result content is either a string or a list of text items.
fn result_text(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(s) => strip_noise(s),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .map(strip_noise)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn result_message(seq: u64, uuid: &str, event: &Value) -> Message {
    let summary = ResultSummary {
        text: event
            .get("result")
            .and_then(Value::as_str)
            .map(strip_noise)
            .filter(|s| !s.is_empty()),
        total_cost_usd: event.get("total_cost_usd").and_then(Value::as_f64),
        duration_ms: event.get("duration_ms").and_then(Value::as_u64),
        num_turns: event
            .get("num_turns")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        is_error: event
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };
    Message::new(
        uuid,
        OrderKey::new(seq, 0),
        MessageOrigin::System,
        Payload::Result(summary),
    )
}

fn delta_message(seq: u64, uuid: &str, event: &Value) -> Option<Message> {
    let inner = event.get("event")?;
    if inner.get("type").and_then(Value::as_str)? != "content_block_delta" {
        return None;
    }
    let delta = inner.get("delta")?;
    let payload = match delta.get("type").and_then(Value::as_str)? {
        "text_delta" => Payload::TextDelta {
            text: str_field(delta, "text")?,
        },
        "thinking_delta" => Payload::ThinkingDelta {
            text: str_field(delta, "thinking")?,
        },
        _ => return None,
    };
    let part = inner
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|i| u32::try_from(i).ok())
        .unwrap_or(0);
    Some(Message::new(
        uuid,
        OrderKey::new(seq, part),
        MessageOrigin::Agent,
        payload,
    ))
}

fn status_message(seq: u64, uuid: &str, event: &Value) -> Option<Message> {
    let text = event
        .get("message")
        .or_else(|| event.get("content"))
        .and_then(Value::as_str)
        .map(strip_noise)
        .filter(|s| !s.is_empty())?;
    Some(Message::new(
        uuid,
        OrderKey::new(seq, 0),
        MessageOrigin::System,
        Payload::Status { text },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_system_reminders() {
        let text = "before <system-reminder>\nignore me\n</system-reminder> after";
        assert_eq!(strip_noise(text), "before  after");
    }

    #[test]
    fn multi_block_event_splits_into_messages() {
        let event = json!({
            "type": "assistant",
            "uuid": "u1",
            "message": {"content": [
                {"type": "thinking", "thinking": "plan"},
                {"type": "text", "text": "Reading the file."},
                {"type": "tool_use", "id": "t1", "name": "Read", "input": {"file_path": "a.rs"}}
            ]}
        });
        let messages = messages_from_event(7, &event, None, None);
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["u1#0", "u1#1", "u1#2"]);
        assert_eq!(messages[2].order, OrderKey::new(7, 2));
        assert_eq!(messages[2].payload.tool_use_id(), Some("t1"));
    }

    #[test]
    fn user_text_carries_local_id_but_tool_result_does_not() {
        let text = json!({"type": "user", "uuid": "u2", "message": {"content": "hi"}});
        let messages = messages_from_event(1, &text, Some("l1"), None);
        assert_eq!(messages[0].id, "u2");
        assert_eq!(messages[0].local_id.as_deref(), Some("l1"));

        let result = json!({
            "type": "user",
            "uuid": "u3",
            "message": {"content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": [{"type": "text", "text": "ok"}]}
            ]}
        });
        let messages = messages_from_event(2, &result, Some("l1"), None);
        assert_eq!(messages[0].local_id, None);
        assert_eq!(
            messages[0].payload,
            Payload::ToolResult {
                tool_use_id: "t1".to_string(),
                content: Some("ok".to_string()),
                is_error: false,
            }
        );
    }

    #[test]
    fn stream_delta_and_result() {
        let delta = json!({
            "type": "stream_event",
            "uuid": "d1",
            "event": {"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Hel"}}
        });
        let messages = messages_from_event(4, &delta, None, None);
        assert_eq!(messages[0].order, OrderKey::new(4, 1));
        assert!(matches!(messages[0].payload, Payload::TextDelta { .. }));

        let result = json!({
            "type": "result", "uuid": "r1", "result": "done",
            "total_cost_usd": 0.12, "duration_ms": 3400, "num_turns": 3, "is_error": false
        });
        let messages = messages_from_event(5, &result, None, None);
        let Payload::Result(summary) = &messages[0].payload else {
            panic!("expected result summary");
        };
        assert_eq!(summary.num_turns, Some(3));
        assert_eq!(summary.text.as_deref(), Some("done"));
    }

    #[test]
    fn empty_event_yields_nothing() {
        let envelope = json!({
            "type": "claude_message",
            "seq": 3,
            "message": {"type": "assistant", "uuid": "u", "message": {"content": []}}
        });
        assert!(classify_message(&envelope).is_none());
    }
}
