//! Rewind preview and execution.
//!
//! A preview remembers the log tail it was computed against and is dropped as
//! soon as the log grows past it. Execution locks input until the producer
//! confirms; only a confirmed success truncates the log.

use std::sync::Arc;

use serde::Serialize;

use super::{update, Action, OrderKey, RewindFile, SessionStore, ToolingState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreviewStatus {
    Requested,
    Ready { files: Vec<RewindFile> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewindPreview {
    pub message_id: String,
    pub status: PreviewStatus,
    /// Log tail when the preview was requested.
    pub computed_at: Option<OrderKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewindExecution {
    pub message_id: String,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewindState {
    pub preview: Option<RewindPreview>,
    pub execution: Option<RewindExecution>,
}

impl RewindState {
    /// New input is refused while a rewind awaits confirmation.
    pub fn input_locked(&self) -> bool {
        matches!(
            self.execution,
            Some(RewindExecution {
                status: ExecutionStatus::Pending,
                ..
            })
        )
    }

    /// Settle the outstanding preview for `message_id`. The result keeps the
    /// tail recorded at request time; one with no outstanding request was
    /// already invalidated and is dropped.
    fn resolve_preview(&mut self, message_id: &str, status: PreviewStatus) {
        match &mut self.preview {
            Some(preview) if preview.message_id == message_id => preview.status = status,
            _ => tracing::debug!(message_id, "rewind preview without a live request dropped"),
        }
    }

    /// Files the ready preview would touch.
    pub fn preview_files(&self) -> Option<&[RewindFile]> {
        match &self.preview {
            Some(RewindPreview {
                status: PreviewStatus::Ready { files },
                ..
            }) => Some(files),
            _ => None,
        }
    }
}

pub fn reduce_preview(mut store: SessionStore, action: &Action) -> SessionStore {
    let tail = store.messages.tail_key();
    update(&mut store.rewind, |r| {
        match action {
            Action::RewindPreviewRequested { message_id } => {
                r.preview = Some(RewindPreview {
                    message_id: message_id.clone(),
                    status: PreviewStatus::Requested,
                    computed_at: tail,
                });
            }
            Action::RewindPreviewReceived { message_id, files } => {
                r.resolve_preview(
                    message_id,
                    PreviewStatus::Ready {
                        files: files.clone(),
                    },
                );
            }
            Action::RewindPreviewFailed { message_id, error } => {
                let target = message_id
                    .clone()
                    .or_else(|| r.preview.as_ref().map(|p| p.message_id.clone()));
                if let Some(message_id) = target {
                    r.resolve_preview(
                        &message_id,
                        PreviewStatus::Failed {
                            error: error.clone(),
                        },
                    );
                }
            }
            Action::SnapshotLoaded(_) | Action::SessionSelected { .. } | Action::NewSession => {
                r.preview = None;
            }
            _ => {}
        }
        if r
            .preview
            .as_ref()
            .is_some_and(|p| tail > p.computed_at)
        {
            tracing::debug!("rewind preview invalidated by log growth");
            r.preview = None;
        }
    });
    store
}

pub fn reduce_execution(mut store: SessionStore, action: &Action) -> SessionStore {
    match action {
        Action::RewindRequested { message_id } => {
            update(&mut store.rewind, |r| {
                r.execution = Some(RewindExecution {
                    message_id: message_id.clone(),
                    status: ExecutionStatus::Pending,
                });
            });
        }
        Action::RewindCompleted {
            message_id,
            success: true,
            ..
        } => {
            let anchor = store.messages.first_of_event(message_id).map(|m| m.id.clone());
            if let Some(anchor) = anchor {
                let removed = Arc::make_mut(&mut store.messages).truncate_from(&anchor);
                tracing::info!(message_id, removed, "rewound session log");
                store.tooling = Arc::new(ToolingState::from_log(&store.messages));
            }
            update(&mut store.rewind, |r| *r = RewindState::default());
        }
        Action::RewindCompleted {
            message_id,
            success: false,
            error,
        } => {
            update(&mut store.rewind, |r| {
                r.execution = Some(RewindExecution {
                    message_id: message_id.clone(),
                    status: ExecutionStatus::Failed {
                        error: error.clone().unwrap_or_else(|| "rewind failed".to_string()),
                    },
                });
            });
        }
        Action::SnapshotLoaded(_) | Action::SessionSelected { .. } | Action::NewSession => {
            update(&mut store.rewind, |r| r.execution = None);
        }
        _ => {}
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageOrigin;
    use crate::state::{reduce as fold, Message, Payload};

    fn text(id: &str, seq: u64) -> Message {
        Message::new(
            id,
            OrderKey::new(seq, 0),
            MessageOrigin::Agent,
            Payload::Text {
                text: id.to_string(),
            },
        )
    }

    fn seeded() -> SessionStore {
        fold(
            SessionStore::default(),
            &Action::MessagesReceived(vec![text("a", 1), text("b", 2), text("c", 3)]),
        )
    }

    fn preview(message_id: &str) -> Action {
        Action::RewindPreviewReceived {
            message_id: message_id.to_string(),
            files: vec![RewindFile {
                path: "src/main.rs".to_string(),
                additions: 3,
                deletions: 1,
            }],
        }
    }

    fn request_preview(message_id: &str) -> Action {
        Action::RewindPreviewRequested {
            message_id: message_id.to_string(),
        }
    }

    #[test]
    fn preview_is_invalidated_by_log_growth() {
        let mut store = fold(fold(seeded(), &request_preview("b")), &preview("b"));
        assert_eq!(store.rewind.preview_files().map(<[_]>::len), Some(1));

        // Replays that leave the tail alone keep the preview.
        store = fold(store, &Action::MessagesReceived(vec![text("c", 3)]));
        assert!(store.rewind.preview.is_some());

        store = fold(store, &Action::MessagesReceived(vec![text("d", 4)]));
        assert!(store.rewind.preview.is_none());
    }

    #[test]
    fn preview_delivered_after_growth_is_dropped() {
        let mut store = fold(seeded(), &request_preview("b"));
        store = fold(store, &Action::MessagesReceived(vec![text("d", 4)]));
        assert!(store.rewind.preview.is_none());

        store = fold(store, &preview("b"));
        assert!(store.rewind.preview.is_none());
    }

    #[test]
    fn preview_keeps_request_time_tail() {
        let store = fold(fold(seeded(), &request_preview("b")), &preview("b"));
        let preview = store.rewind.preview.as_ref().unwrap();
        assert_eq!(preview.computed_at, Some(OrderKey::new(3, 0)));
        assert!(matches!(preview.status, PreviewStatus::Ready { .. }));
    }

    #[test]
    fn unrequested_preview_is_ignored() {
        let store = fold(seeded(), &preview("b"));
        assert!(store.rewind.preview.is_none());
    }

    #[test]
    fn success_truncates_and_unlocks() {
        let mut store = fold(
            seeded(),
            &Action::RewindRequested {
                message_id: "b".to_string(),
            },
        );
        assert!(store.rewind.input_locked());
        assert_eq!(store.messages.len(), 3);

        store = fold(
            store,
            &Action::RewindCompleted {
                message_id: "b".to_string(),
                success: true,
                error: None,
            },
        );
        assert!(!store.rewind.input_locked());
        let ids: Vec<&str> = store.messages.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn failure_keeps_log() {
        let store = [
            Action::RewindRequested {
                message_id: "b".to_string(),
            },
            Action::RewindCompleted {
                message_id: "b".to_string(),
                success: false,
                error: Some("dirty worktree".to_string()),
            },
        ]
        .iter()
        .fold(seeded(), |s, a| fold(s, a));
        assert_eq!(store.messages.len(), 3);
        assert!(!store.rewind.input_locked());
        assert_eq!(
            store.rewind.execution.as_ref().map(|e| &e.status),
            Some(&ExecutionStatus::Failed {
                error: "dirty worktree".to_string()
            })
        );
    }

    #[test]
    fn rewind_to_multi_block_event() {
        let store = fold(
            SessionStore::default(),
            &Action::MessagesReceived(vec![text("u1", 1), text("u2#0", 2), text("u2#1", 2)]),
        );
        let store = fold(
            store,
            &Action::RewindCompleted {
                message_id: "u2".to_string(),
                success: true,
                error: None,
            },
        );
        assert_eq!(store.messages.len(), 1);
    }
}
