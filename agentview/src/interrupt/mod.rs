//! Interrupt surfaces: permission and multi-question prompts.
//!
//! The producer can pause the agent to ask for a permission grant or for
//! answers to one or more questions. At most one such request is active per
//! session; the request slice of the reducer owns admission and resolution,
//! this module owns the request data and the prompt-side state a user edits
//! before answering.

mod permission;
mod question;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use permission::{PermissionDecision, PermissionPrompt};
pub use question::{QuestionAnswer, QuestionPrompt};

/// A request to approve a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub request_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    /// Plan text when the agent asks to leave plan mode.
    #[serde(default)]
    pub plan: Option<String>,
}

/// One selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One question of a multi-question request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub question: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub multi_select: bool,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

/// A request to answer one or more questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub request_id: String,
    pub questions: Vec<QuestionSpec>,
}

/// The interactive request currently blocking the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingRequest {
    Permission(PermissionRequest),
    Question(QuestionRequest),
}

impl PendingRequest {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Permission(p) => &p.request_id,
            Self::Question(q) => &q.request_id,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Permission(_) => "permission",
            Self::Question(_) => "question",
        }
    }
}

/// Which request a producer cancellation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelTarget {
    /// Cancel only the request with this id.
    Id(String),
    /// The producer sent no id: cancel whatever is active.
    Any,
}

impl CancelTarget {
    pub fn matches(&self, request_id: &str) -> bool {
        match self {
            Self::Id(id) => id == request_id,
            Self::Any => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_target_matching() {
        assert!(CancelTarget::Any.matches("anything"));
        assert!(CancelTarget::Id("r1".to_string()).matches("r1"));
        assert!(!CancelTarget::Id("r1".to_string()).matches("r2"));
    }

    #[test]
    fn question_request_deserializes_with_defaults() {
        let json = r#"{"request_id":"q1","questions":[{"question":"Which db?","options":[{"label":"sqlite"}]}]}"#;
        let request: QuestionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.questions.len(), 1);
        assert!(!request.questions[0].multi_select);
        assert_eq!(request.questions[0].options[0].label, "sqlite");
    }
}
