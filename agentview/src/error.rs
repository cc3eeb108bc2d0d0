//! Typed errors.
//!
//! The reduction path never fails; these cover local validation of user
//! intents and loading configuration.

use std::path::PathBuf;

use thiserror::Error;

/// A question answer that must not be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("question {index} ({question:?}) has no answer")]
    Incomplete { index: usize, question: String },

    #[error("question {index} has no option {option}")]
    UnknownOption { index: usize, option: usize },

    #[error("question {index} does not exist")]
    UnknownQuestion { index: usize },
}

/// A user intent that cannot be turned into an outbound command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("no pending request with id {0}")]
    NoSuchRequest(String),

    #[error("pending request {0} is not a {1}")]
    WrongRequestKind(String, &'static str),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("message text is empty")]
    EmptyMessage,

    #[error("input is locked while a rewind is in progress")]
    InputLocked,

    #[error("no queued message with id {0}")]
    NoSuchQueuedMessage(String),

    #[error("message {0} is not in the log")]
    UnknownMessage(String),
}

/// Failure loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
