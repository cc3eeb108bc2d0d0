//! Permission prompt.

use crate::envelope::ClientCommand;

use super::PermissionRequest;

/// What the user decided about a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    AllowOnce,
    /// Allow, and stop asking for this tool for the rest of the session.
    AllowAlways,
    Deny { reason: Option<String> },
}

impl PermissionDecision {
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::AllowOnce | Self::AllowAlways)
    }
}

/// Prompt-side view of an active permission request.
#[derive(Debug, Clone)]
pub struct PermissionPrompt<'a> {
    request: &'a PermissionRequest,
}

impl<'a> PermissionPrompt<'a> {
    pub const fn new(request: &'a PermissionRequest) -> Self {
        Self { request }
    }

    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }

    pub fn tool_name(&self) -> &str {
        &self.request.tool_name
    }

    /// Whether this is a plan-approval request.
    pub const fn has_plan(&self) -> bool {
        self.request.plan.is_some()
    }

    /// One-line summary of the tool input, e.g. a bash command or a file path.
    pub fn input_summary(&self) -> Option<String> {
        let input = &self.request.tool_input;
        ["command", "file_path", "path", "url", "pattern"]
            .iter()
            .find_map(|key| input.get(*key).and_then(serde_json::Value::as_str))
            .map(String::from)
    }

    /// Build the outbound response for a decision.
    pub fn respond(&self, decision: PermissionDecision) -> ClientCommand {
        let allow = decision.is_allow();
        let always = matches!(decision, PermissionDecision::AllowAlways);
        let reason = match decision {
            PermissionDecision::Deny { reason } => reason.filter(|r| !r.trim().is_empty()),
            _ => None,
        };
        ClientCommand::PermissionResponse {
            request_id: self.request.request_id.clone(),
            allow,
            always,
            reason,
        }
    }
}
