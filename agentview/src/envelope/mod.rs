//! Envelope classifier.
//!
//! Maps one inbound wire envelope to at most one [`Action`]. Unknown
//! discriminators and envelopes missing a required field classify to `None`;
//! both are protocol noise, not errors.

mod claude;
mod command;

use serde_json::Value;

use crate::interrupt::{CancelTarget, PendingRequest, PermissionRequest, QuestionRequest};
use crate::models::{PermissionMode, SessionPhase};
use crate::state::{Action, OrderKey, QueueTransition, RewindFile, Snapshot};

pub use claude::{messages_from_event, strip_noise};
pub use command::ClientCommand;

/// Classify one envelope.
pub fn classify(envelope: &Value) -> Option<Action> {
    let Some(kind) = envelope.get("type").and_then(Value::as_str) else {
        tracing::debug!("envelope without type discriminator dropped");
        return None;
    };
    let action = classify_kind(kind, envelope);
    if action.is_none() {
        tracing::debug!(kind, "envelope dropped");
    }
    action
}

fn classify_kind(kind: &str, v: &Value) -> Option<Action> {
    let action = match kind {
        "status" => Action::StatusReported {
            running: v.get("running").and_then(Value::as_bool)?,
            alive: v.get("alive").and_then(Value::as_bool).unwrap_or(true),
        },
        "starting" => Action::SessionStarting,
        "started" => Action::SessionStarted {
            session_id: str_field(v, "session_id"),
            cwd: str_field(v, "cwd"),
        },
        "stopped" => Action::SessionStopped,
        "process_exit" => Action::ProcessExited {
            code: v
                .get("code")
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok()),
        },
        "claude_message" => return claude::classify_message(v),
        "error" => Action::ErrorReported {
            message: str_field(v, "message")?,
        },
        "sessions" => Action::SessionsListed(v.get("sessions").and_then(strings)?),
        "permission_request" => Action::PermissionRequested(permission_request(v)?),
        "user_question" => Action::QuestionAsked(question_request(v)?),
        "permission_cancelled" => Action::RequestCancelled(match str_field(v, "request_id") {
            Some(id) => CancelTarget::Id(id),
            None => {
                tracing::warn!("permission_cancelled without request_id, cancelling active request");
                CancelTarget::Any
            }
        }),
        "message_used_as_response" => Action::MessageUsedAsResponse {
            local_id: str_field(v, "message_id")?,
            request_id: str_field(v, "request_id"),
        },
        "messages_snapshot" => Action::SnapshotLoaded(snapshot(v)?),
        "message_state_changed" => Action::MessageStateChanged {
            local_id: str_field(v, "message_id")?,
            transition: v
                .get("state")
                .and_then(Value::as_str)
                .and_then(QueueTransition::from_str)?,
            queue_position: v
                .get("queue_position")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok()),
            error: str_field(v, "error"),
            order: v
                .get("seq")
                .and_then(Value::as_u64)
                .map(|seq| OrderKey::new(seq, 0)),
        },
        "tool_progress" => Action::ToolProgress {
            tool_use_id: str_field(v, "tool_use_id")?,
            elapsed_seconds: v.get("elapsed_seconds").and_then(Value::as_f64)?,
        },
        "tool_use_summary" => Action::ToolUseSummary {
            summary: str_field(v, "summary")?,
            tool_use_ids: v
                .get("tool_use_ids")
                .and_then(strings)
                .unwrap_or_default(),
        },
        "status_update" => Action::PermissionModeChanged(
            v.get("permission_mode")
                .and_then(Value::as_str)
                .and_then(PermissionMode::from_str)?,
        ),
        "task_notification" => Action::TaskNotification {
            task_id: str_field(v, "task_id")?,
            status: str_field(v, "status")?,
            summary: str_field(v, "summary"),
        },
        "system_init" => Action::SystemInit(claude::system_init(v)),
        "compact_boundary" => {
            let meta = v.get("compact_metadata").unwrap_or(v);
            Action::CompactBoundary {
                trigger: str_field(meta, "trigger"),
                pre_tokens: meta.get("pre_tokens").and_then(Value::as_u64),
            }
        }
        "compacting_start" => Action::CompactingStarted,
        "compacting_end" => Action::CompactingEnded,
        "hook_started" => Action::HookStarted {
            hook_id: str_field(v, "hook_id")?,
            hook_name: str_field(v, "hook_name")?,
        },
        "hook_response" => Action::HookResponded {
            hook_id: str_field(v, "hook_id")?,
            output: str_field(v, "output"),
            exit_code: v
                .get("exit_code")
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok()),
        },
        "slash_commands" => Action::SlashCommandsListed(v.get("commands").and_then(strings)?),
        "user_message_uuid" => Action::UserMessageUuid {
            local_id: str_field(v, "local_id")?,
            uuid: str_field(v, "uuid")?,
        },
        "rewind_files_preview" => Action::RewindPreviewReceived {
            message_id: str_field(v, "message_id")?,
            files: serde_json::from_value::<Vec<RewindFile>>(v.get("files")?.clone()).ok()?,
        },
        "rewind_files_error" => Action::RewindPreviewFailed {
            message_id: str_field(v, "message_id"),
            error: str_field(v, "error")?,
        },
        "rewind_result" => Action::RewindCompleted {
            message_id: str_field(v, "message_id")?,
            success: v.get("success").and_then(Value::as_bool)?,
            error: str_field(v, "error"),
        },
        _ => return None,
    };
    Some(action)
}

pub(crate) fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(String::from)
}

/// A JSON array of strings; non-string items are skipped.
pub(crate) fn strings(v: &Value) -> Option<Vec<String>> {
    Some(
        v.as_array()?
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
    )
}

fn permission_request(v: &Value) -> Option<PermissionRequest> {
    serde_json::from_value(v.clone()).ok()
}

fn question_request(v: &Value) -> Option<QuestionRequest> {
    let request: QuestionRequest = serde_json::from_value(v.clone()).ok()?;
    (!request.questions.is_empty()).then_some(request)
}

fn pending_request(v: &Value) -> Option<PendingRequest> {
    match v.get("type").and_then(Value::as_str)? {
        "permission_request" => permission_request(v).map(PendingRequest::Permission),
        "user_question" => question_request(v).map(PendingRequest::Question),
        _ => None,
    }
}

fn snapshot(v: &Value) -> Option<Snapshot> {
    let entries = v.get("messages").and_then(Value::as_array)?;
    let mut messages = Vec::new();
    for entry in entries {
        let (Some(seq), Some(event)) = (entry.get("seq").and_then(Value::as_u64), entry.get("message"))
        else {
            tracing::debug!("snapshot entry without seq or message skipped");
            continue;
        };
        let timestamp = claude::parse_timestamp(entry.get("timestamp"));
        let local_id = entry.get("local_id").and_then(Value::as_str);
        messages.extend(messages_from_event(seq, event, local_id, timestamp));
    }
    Some(Snapshot {
        messages,
        phase: v
            .get("phase")
            .and_then(Value::as_str)
            .and_then(SessionPhase::from_str),
        pending: v.get("pending_request").and_then(pending_request),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_or_malformed_is_none() {
        assert!(classify(&json!({"type": "from_the_future"})).is_none());
        assert!(classify(&json!({"no_type": true})).is_none());
        assert!(classify(&json!("status")).is_none());
        assert!(classify(&json!({"type": "status"})).is_none());
        assert!(classify(&json!({"type": "tool_progress", "tool_use_id": "t"})).is_none());
        assert!(classify(&json!({"type": "user_question", "request_id": "q", "questions": []})).is_none());
    }

    #[test]
    fn lifecycle_envelopes() {
        assert_eq!(
            classify(&json!({"type": "status", "running": true})),
            Some(Action::StatusReported {
                running: true,
                alive: true
            })
        );
        assert_eq!(
            classify(&json!({"type": "process_exit", "code": 1})),
            Some(Action::ProcessExited { code: Some(1) })
        );
        assert_eq!(
            classify(&json!({"type": "status_update", "permission_mode": "acceptEdits"})),
            Some(Action::PermissionModeChanged(PermissionMode::AcceptEdits))
        );
    }

    #[test]
    fn permission_request_and_cancel() {
        let action = classify(&json!({
            "type": "permission_request",
            "request_id": "p1",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"}
        }));
        let Some(Action::PermissionRequested(request)) = action else {
            panic!("expected permission request");
        };
        assert_eq!(request.tool_name, "Bash");
        assert_eq!(request.plan, None);

        assert_eq!(
            classify(&json!({"type": "permission_cancelled", "request_id": "p1"})),
            Some(Action::RequestCancelled(CancelTarget::Id("p1".to_string())))
        );
        assert_eq!(
            classify(&json!({"type": "permission_cancelled"})),
            Some(Action::RequestCancelled(CancelTarget::Any))
        );
    }

    #[test]
    fn queue_state_change_carries_order() {
        let action = classify(&json!({
            "type": "message_state_changed",
            "message_id": "l1",
            "state": "accepted",
            "seq": 12
        }));
        assert_eq!(
            action,
            Some(Action::MessageStateChanged {
                local_id: "l1".to_string(),
                transition: QueueTransition::Accepted,
                queue_position: None,
                error: None,
                order: Some(OrderKey::new(12, 0)),
            })
        );
    }

    #[test]
    fn snapshot_parses_history_and_pending() {
        let action = classify(&json!({
            "type": "messages_snapshot",
            "phase": "running",
            "messages": [
                {"seq": 1, "message": {"type": "user", "uuid": "u1", "message": {"content": "hi"}}},
                {"bogus": true},
                {"seq": 2, "message": {"type": "assistant", "uuid": "a1", "message": {"content": [{"type": "text", "text": "hello"}]}}}
            ],
            "pending_request": {
                "type": "user_question",
                "request_id": "q1",
                "questions": [{"question": "Proceed?", "options": [{"label": "Yes"}]}]
            }
        }));
        let Some(Action::SnapshotLoaded(snapshot)) = action else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.phase, Some(SessionPhase::Running));
        assert_eq!(snapshot.pending.as_ref().map(PendingRequest::request_id), Some("q1"));
    }

    #[test]
    fn system_init_inside_claude_message() {
        let action = classify(&json!({
            "type": "claude_message",
            "seq": 0,
            "message": {"type": "system", "subtype": "init", "model": "sonnet", "cwd": "/w", "tools": ["Bash"]}
        }));
        let Some(Action::SystemInit(init)) = action else {
            panic!("expected init");
        };
        assert_eq!(init.cwd.as_deref(), Some("/w"));
        assert_eq!(init.tools, vec!["Bash".to_string()]);
    }

    #[test]
    fn rewind_envelopes() {
        let action = classify(&json!({
            "type": "rewind_files_preview",
            "message_id": "u1",
            "files": [{"path": "a.rs", "additions": 2}]
        }));
        let Some(Action::RewindPreviewReceived { files, .. }) = action else {
            panic!("expected preview");
        };
        assert_eq!(files[0].deletions, 0);

        assert!(classify(&json!({"type": "rewind_files_error"})).is_none());
        assert_eq!(
            classify(&json!({"type": "rewind_result", "message_id": "u1", "success": true})),
            Some(Action::RewindCompleted {
                message_id: "u1".to_string(),
                success: true,
                error: None
            })
        );
    }
}
