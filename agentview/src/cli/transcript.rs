//! Plain-text transcript of a folded session.

use std::fmt::Write;

use crate::grouping::{GroupKind, MessageGroup};
use crate::runtime::{SessionRuntime, StateSummary};
use crate::state::{Message, Payload, SessionStore};

const THINKING_PREVIEW_CHARS: usize = 200;
const TOOL_OUTPUT_PREVIEW_CHARS: usize = 120;

fn preview(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Render every group of the session, honouring the display settings.
pub fn render_transcript(runtime: &SessionRuntime) -> String {
    let store = runtime.store();
    let log = store.messages.messages();
    let mut out = String::new();
    let mut folded = false;

    for group in runtime.groups() {
        let messages = group.messages(log);
        let compacted = messages
            .last()
            .is_some_and(|m| store.compaction.is_compacted(m.order));
        if folded && !compacted {
            out.push_str("--- context compacted ---\n\n");
        }
        folded = compacted;

        match group.kind {
            GroupKind::ToolSequence => render_tools(&mut out, store, group),
            GroupKind::User | GroupKind::Assistant => {
                render_text_group(&mut out, store, group.kind, messages);
            }
        }
        out.push('\n');
    }
    if folded {
        out.push_str("--- context compacted ---\n");
    }
    out
}

fn render_text_group(out: &mut String, store: &SessionStore, kind: GroupKind, messages: &[Message]) {
    let show_thinking = store.settings.show_thinking;
    let _ = writeln!(out, "[{}]:", kind.as_str().to_uppercase());

    // Consecutive deltas render as one paragraph.
    let mut streaming = String::new();
    let mut streaming_thinking = String::new();
    let flush = |out: &mut String, text: &mut String, thinking: &mut String| {
        if !thinking.is_empty() {
            let _ = writeln!(out, "(thinking) {}", preview(thinking, THINKING_PREVIEW_CHARS));
            thinking.clear();
        }
        if !text.is_empty() {
            let _ = writeln!(out, "{text}");
            text.clear();
        }
    };

    for message in messages {
        match &message.payload {
            Payload::TextDelta { text } => streaming.push_str(text),
            Payload::ThinkingDelta { text } => {
                if show_thinking {
                    streaming_thinking.push_str(text);
                }
            }
            payload => {
                flush(out, &mut streaming, &mut streaming_thinking);
                match payload {
                    Payload::Text { text } => {
                        let _ = writeln!(out, "{text}");
                    }
                    Payload::Thinking { text } if show_thinking => {
                        let _ = writeln!(out, "(thinking) {}", preview(text, THINKING_PREVIEW_CHARS));
                    }
                    Payload::Status { text } => {
                        let _ = writeln!(out, "(status) {text}");
                    }
                    Payload::Error { message } => {
                        let _ = writeln!(out, "(error) {message}");
                    }
                    Payload::Result(result) => {
                        let mut line = String::from("(result)");
                        if result.is_error {
                            line.push_str(" failed");
                        }
                        if let Some(turns) = result.num_turns {
                            let _ = write!(line, " turns={turns}");
                        }
                        if let Some(ms) = result.duration_ms {
                            let _ = write!(line, " duration={ms}ms");
                        }
                        if let Some(cost) = result.total_cost_usd {
                            let _ = write!(line, " cost=${cost:.4}");
                        }
                        let _ = writeln!(out, "{line}");
                    }
                    _ => {}
                }
            }
        }
    }
    flush(out, &mut streaming, &mut streaming_thinking);
}

fn tool_name(log: &[Message], index: Option<usize>) -> &str {
    match index.map(|i| &log[i].payload) {
        Some(Payload::ToolUse { name, .. }) => name,
        _ => "?",
    }
}

fn render_tools(out: &mut String, store: &SessionStore, group: &MessageGroup) {
    let log = store.messages.messages();

    if group.is_settled() && store.settings.collapse_completed_tools {
        let names: Vec<&str> = group.tools.iter().map(|t| tool_name(log, t.use_index)).collect();
        let summary = group
            .tools
            .first()
            .and_then(|t| store.tooling.summary_for(&t.tool_use_id))
            .map(|s| format!(" - {}", s.summary))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "[TOOLS]: {} call(s): {}{summary}",
            group.tools.len(),
            names.join(", ")
        );
        return;
    }

    let _ = writeln!(out, "[TOOLS]:");
    for call in &group.tools {
        let status = match call.result_index.map(|i| &log[i].payload) {
            Some(Payload::ToolResult { is_error: true, .. }) => "error".to_string(),
            Some(Payload::ToolResult { content, .. }) => content
                .as_deref()
                .map(|c| format!("ok: {}", preview(c.trim(), TOOL_OUTPUT_PREVIEW_CHARS)))
                .unwrap_or_else(|| "ok".to_string()),
            _ => match store.tooling.progress.get(&call.tool_use_id) {
                Some(elapsed) => format!("running ({elapsed:.1}s)"),
                None => "running".to_string(),
            },
        };
        let _ = writeln!(
            out,
            "  {} [{}] {status}",
            tool_name(log, call.use_index),
            call.tool_use_id
        );
    }
}

/// Short multi-line overview printed after a replay.
pub fn render_summary(summary: &StateSummary) -> String {
    let mut out = String::new();
    let session = &summary.session;
    let _ = writeln!(
        out,
        "session: {}",
        session.session_id.as_deref().unwrap_or("-")
    );
    let phase = if session.running {
        "running"
    } else if session.starting {
        "starting"
    } else {
        "idle"
    };
    let _ = writeln!(out, "state: {phase} (mode {})", session.permission_mode.as_str());
    let _ = writeln!(
        out,
        "messages: {} in {} group(s)",
        summary.messages,
        summary.groups.len()
    );
    if let Some(pending) = &summary.pending {
        let _ = writeln!(
            out,
            "pending: {} {} (+{} waiting)",
            pending.kind(),
            pending.request_id(),
            summary.backlog
        );
    }
    if !summary.queue.is_empty() {
        let _ = writeln!(out, "queued: {}", summary.queue.len());
    }
    if !summary.in_flight_tools.is_empty() {
        let _ = writeln!(out, "in flight: {}", summary.in_flight_tools.join(", "));
    }
    if !summary.compaction.boundaries.is_empty() {
        let _ = writeln!(out, "compactions: {}", summary.compaction.boundaries.len());
    }
    out
}
