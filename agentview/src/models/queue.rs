//! Lifecycle of a locally accepted user message.

use serde::{Deserialize, Serialize};

/// State of a queued user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuedMessageState {
    /// Accepted locally, not yet acknowledged by the producer.
    Queued,
    /// Acknowledged by the producer and given an order key.
    Accepted,
    /// Refused by the producer.
    Rejected,
}

impl QueuedMessageState {
    /// Convert state to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parse state from its wire string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" | "pending" => Some(Self::Queued),
            "accepted" | "dispatched" | "sent" => Some(Self::Accepted),
            "rejected" | "failed" | "error" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueuedMessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
