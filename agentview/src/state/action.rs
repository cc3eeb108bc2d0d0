//! Actions folded by the reducer.
//!
//! Inbound envelopes are classified into these; user intents are dispatched
//! as these too. Every action is legal in every state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interrupt::{CancelTarget, PendingRequest, PermissionRequest, QuestionRequest};
use crate::models::{ConnectionStatus, PermissionMode, SessionPhase};

use super::message::{Message, OrderKey};

/// Full history replacement delivered by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub phase: Option<SessionPhase>,
    pub pending: Option<PendingRequest>,
}

/// Session metadata from the producer's init event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInit {
    pub tools: Vec<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub slash_commands: Vec<String>,
}

/// A file a rewind would touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewindFile {
    pub path: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
}

/// Producer-reported transition of a queued user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueTransition {
    Queued,
    Accepted,
    Rejected,
    Removed,
}

impl QueueTransition {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "removed" | "cancelled" => Some(Self::Removed),
            other => crate::models::QueuedMessageState::from_str(other).map(|state| match state {
                crate::models::QueuedMessageState::Queued => Self::Queued,
                crate::models::QueuedMessageState::Accepted => Self::Accepted,
                crate::models::QueuedMessageState::Rejected => Self::Rejected,
            }),
        }
    }
}

/// Partial update of client-side settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub show_thinking: Option<bool>,
    pub collapse_completed_tools: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // === Transport and lifecycle ===
    ConnectionChanged(ConnectionStatus),
    StatusReported {
        running: bool,
        alive: bool,
    },
    SessionStarting,
    SessionStarted {
        session_id: Option<String>,
        cwd: Option<String>,
    },
    SessionStopped,
    ProcessExited {
        code: Option<i32>,
    },
    SessionsListed(Vec<String>),
    PermissionModeChanged(PermissionMode),

    // === Message log ===
    MessagesReceived(Vec<Message>),
    ErrorReported {
        message: String,
    },
    SnapshotLoaded(Snapshot),

    // === Interactive requests ===
    PermissionRequested(PermissionRequest),
    QuestionAsked(QuestionRequest),
    RequestCancelled(CancelTarget),
    MessageUsedAsResponse {
        local_id: String,
        request_id: Option<String>,
    },

    // === Queued user messages ===
    MessageStateChanged {
        local_id: String,
        transition: QueueTransition,
        queue_position: Option<u32>,
        error: Option<String>,
        order: Option<OrderKey>,
    },
    UserMessageUuid {
        local_id: String,
        uuid: String,
    },

    // === Tooling ===
    ToolProgress {
        tool_use_id: String,
        elapsed_seconds: f64,
    },
    ToolUseSummary {
        summary: String,
        tool_use_ids: Vec<String>,
    },

    // === System metadata ===
    TaskNotification {
        task_id: String,
        status: String,
        summary: Option<String>,
    },
    SystemInit(SystemInit),
    CompactBoundary {
        trigger: Option<String>,
        pre_tokens: Option<u64>,
    },
    CompactingStarted,
    CompactingEnded,
    HookStarted {
        hook_id: String,
        hook_name: String,
    },
    HookResponded {
        hook_id: String,
        output: Option<String>,
        exit_code: Option<i32>,
    },
    SlashCommandsListed(Vec<String>),

    // === Rewind ===
    RewindPreviewReceived {
        message_id: String,
        files: Vec<RewindFile>,
    },
    RewindPreviewFailed {
        message_id: Option<String>,
        error: String,
    },
    RewindCompleted {
        message_id: String,
        success: bool,
        error: Option<String>,
    },

    // === Local user intents ===
    SendMessage {
        local_id: String,
        text: String,
        timestamp: Option<DateTime<Utc>>,
    },
    StopRequested,
    SessionSelected {
        session_id: String,
    },
    NewSession,
    PermissionAnswered {
        request_id: String,
        allow: bool,
    },
    QuestionAnswered {
        request_id: String,
    },
    QueuedMessageRemoved {
        local_id: String,
    },
    RewindPreviewRequested {
        message_id: String,
    },
    RewindRequested {
        message_id: String,
    },
    SettingsChanged(SettingsPatch),
}

impl Action {
    /// Whether this action replaces the whole session context.
    pub const fn resets_session(&self) -> bool {
        matches!(self, Self::SessionSelected { .. } | Self::NewSession)
    }

    /// Short name for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ConnectionChanged(_) => "connection_changed",
            Self::StatusReported { .. } => "status_reported",
            Self::SessionStarting => "session_starting",
            Self::SessionStarted { .. } => "session_started",
            Self::SessionStopped => "session_stopped",
            Self::ProcessExited { .. } => "process_exited",
            Self::SessionsListed(_) => "sessions_listed",
            Self::PermissionModeChanged(_) => "permission_mode_changed",
            Self::MessagesReceived(_) => "messages_received",
            Self::ErrorReported { .. } => "error_reported",
            Self::SnapshotLoaded(_) => "snapshot_loaded",
            Self::PermissionRequested(_) => "permission_requested",
            Self::QuestionAsked(_) => "question_asked",
            Self::RequestCancelled(_) => "request_cancelled",
            Self::MessageUsedAsResponse { .. } => "message_used_as_response",
            Self::MessageStateChanged { .. } => "message_state_changed",
            Self::UserMessageUuid { .. } => "user_message_uuid",
            Self::ToolProgress { .. } => "tool_progress",
            Self::ToolUseSummary { .. } => "tool_use_summary",
            Self::TaskNotification { .. } => "task_notification",
            Self::SystemInit(_) => "system_init",
            Self::CompactBoundary { .. } => "compact_boundary",
            Self::CompactingStarted => "compacting_started",
            Self::CompactingEnded => "compacting_ended",
            Self::HookStarted { .. } => "hook_started",
            Self::HookResponded { .. } => "hook_responded",
            Self::SlashCommandsListed(_) => "slash_commands_listed",
            Self::RewindPreviewReceived { .. } => "rewind_preview_received",
            Self::RewindPreviewFailed { .. } => "rewind_preview_failed",
            Self::RewindCompleted { .. } => "rewind_completed",
            Self::SendMessage { .. } => "send_message",
            Self::StopRequested => "stop_requested",
            Self::SessionSelected { .. } => "session_selected",
            Self::NewSession => "new_session",
            Self::PermissionAnswered { .. } => "permission_answered",
            Self::QuestionAnswered { .. } => "question_answered",
            Self::QueuedMessageRemoved { .. } => "queued_message_removed",
            Self::RewindPreviewRequested { .. } => "rewind_preview_requested",
            Self::RewindRequested { .. } => "rewind_requested",
            Self::SettingsChanged(_) => "settings_changed",
        }
    }
}
