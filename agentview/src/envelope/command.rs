//! Outbound commands the client sends back to the producer.

use serde::{Deserialize, Serialize};

use crate::interrupt::QuestionAnswer;
use crate::models::PermissionMode;

/// A command for the transport collaborator to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    SendMessage {
        local_id: String,
        text: String,
    },
    Stop,
    LoadSession {
        session_id: String,
    },
    NewSession,
    PermissionResponse {
        request_id: String,
        allow: bool,
        always: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    QuestionResponse {
        request_id: String,
        answers: Vec<QuestionAnswer>,
    },
    RewindPreview {
        message_id: String,
    },
    RewindExecute {
        message_id: String,
    },
    RemoveQueuedMessage {
        local_id: String,
    },
    SetPermissionMode {
        mode: PermissionMode,
    },
}

impl ClientCommand {
    /// Wire discriminator, for logging.
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::Stop => "stop",
            Self::LoadSession { .. } => "load_session",
            Self::NewSession => "new_session",
            Self::PermissionResponse { .. } => "permission_response",
            Self::QuestionResponse { .. } => "question_response",
            Self::RewindPreview { .. } => "rewind_preview",
            Self::RewindExecute { .. } => "rewind_execute",
            Self::RemoveQueuedMessage { .. } => "remove_queued_message",
            Self::SetPermissionMode { .. } => "set_permission_mode",
        }
    }
}
