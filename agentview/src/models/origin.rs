//! Who authored a log entry.

use serde::{Deserialize, Serialize};

/// Origin of a message in the session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Authored by the user.
    User,
    /// Produced by the agent (text, thinking, tool calls and their results).
    Agent,
    /// Produced by the runtime or the producer itself.
    System,
}

impl MessageOrigin {
    /// Convert origin to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }

    /// Parse origin from a wire string.
    ///
    /// Claude stream roles (`assistant`) are accepted as aliases.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "agent" | "assistant" => Some(Self::Agent),
            "system" | "result" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
