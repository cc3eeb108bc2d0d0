//! Pending-request slice.
//!
//! At most one request is active. A request arriving while another is
//! unresolved waits in a FIFO backlog and is promoted once the active one is
//! answered or cancelled; it never overwrites it. Producer cancellation always
//! wins: a client answer for a request that is no longer active is a no-op,
//! and so is a redelivery of a request that was already closed.

use std::collections::VecDeque;

use serde::Serialize;

use crate::interrupt::PendingRequest;

use super::{update, Action, SessionStore};

/// How many closed request ids are remembered for redelivery checks.
pub const RESOLVED_MEMORY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Approved,
    Denied,
    Answered,
    Cancelled,
    /// A queued user message was consumed as the answer.
    UsedMessage,
}

/// How the last request was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub request_id: String,
    pub outcome: ResolutionOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestState {
    pub active: Option<PendingRequest>,
    pub backlog: VecDeque<PendingRequest>,
    pub last_resolved: Option<Resolution>,
    /// Recently closed request ids, oldest first.
    #[serde(skip)]
    resolved: VecDeque<String>,
}

impl RequestState {
    fn knows(&self, request_id: &str) -> bool {
        self.active
            .iter()
            .chain(&self.backlog)
            .any(|r| r.request_id() == request_id)
    }

    /// Whether `request_id` was answered or cancelled in this session.
    pub fn was_resolved(&self, request_id: &str) -> bool {
        self.resolved.iter().any(|id| id == request_id)
    }

    fn remember(&mut self, request_id: &str) {
        if self.was_resolved(request_id) {
            return;
        }
        if self.resolved.len() == RESOLVED_MEMORY {
            self.resolved.pop_front();
        }
        self.resolved.push_back(request_id.to_string());
    }

    fn admit(&mut self, request: PendingRequest) {
        if self.knows(request.request_id()) {
            return;
        }
        if self.was_resolved(request.request_id()) {
            tracing::debug!(
                request_id = request.request_id(),
                "redelivered request already closed, ignored"
            );
            return;
        }
        if self.active.is_none() {
            self.active = Some(request);
        } else {
            tracing::debug!(
                request_id = request.request_id(),
                kind = request.kind(),
                "request queued behind active request"
            );
            self.backlog.push_back(request);
        }
    }

    fn resolve_active(&mut self, outcome: ResolutionOutcome) {
        if let Some(active) = self.active.take() {
            self.remember(active.request_id());
            self.last_resolved = Some(Resolution {
                request_id: active.request_id().to_string(),
                outcome,
            });
            self.active = self.backlog.pop_front();
        }
    }

    fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(PendingRequest::request_id)
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    update(&mut store.requests, |r| match action {
        Action::PermissionRequested(request) => {
            r.admit(PendingRequest::Permission(request.clone()));
        }
        Action::QuestionAsked(request) => r.admit(PendingRequest::Question(request.clone())),
        Action::RequestCancelled(target) => {
            if r.active_id().is_some_and(|id| target.matches(id)) {
                r.resolve_active(ResolutionOutcome::Cancelled);
            } else if let crate::interrupt::CancelTarget::Id(id) = target {
                let before = r.backlog.len();
                r.backlog.retain(|q| q.request_id() != id);
                if r.backlog.len() != before {
                    r.remember(id);
                }
            }
        }
        Action::PermissionAnswered { request_id, allow } => {
            if matches!(&r.active, Some(PendingRequest::Permission(p)) if p.request_id == *request_id)
            {
                r.resolve_active(if *allow {
                    ResolutionOutcome::Approved
                } else {
                    ResolutionOutcome::Denied
                });
            }
        }
        Action::QuestionAnswered { request_id } => {
            if matches!(&r.active, Some(PendingRequest::Question(q)) if q.request_id == *request_id)
            {
                r.resolve_active(ResolutionOutcome::Answered);
            }
        }
        Action::MessageUsedAsResponse { request_id, .. } => {
            let matches = match request_id {
                Some(id) => r.active_id() == Some(id.as_str()),
                None => true,
            };
            if matches {
                r.resolve_active(ResolutionOutcome::UsedMessage);
            }
        }
        Action::SnapshotLoaded(snapshot) => {
            *r = RequestState {
                active: snapshot.pending.clone(),
                ..RequestState::default()
            };
        }
        Action::SessionSelected { .. } | Action::NewSession => *r = RequestState::default(),
        _ => {}
    });
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::{CancelTarget, PermissionRequest, QuestionRequest, QuestionSpec};
    use crate::state::reduce as fold;

    fn permission(id: &str) -> Action {
        Action::PermissionRequested(PermissionRequest {
            request_id: id.to_string(),
            tool_name: "Edit".to_string(),
            tool_input: serde_json::Value::Null,
            plan: None,
        })
    }

    fn question(id: &str) -> Action {
        Action::QuestionAsked(QuestionRequest {
            request_id: id.to_string(),
            questions: vec![QuestionSpec {
                question: "Continue?".to_string(),
                header: None,
                multi_select: false,
                options: Vec::new(),
            }],
        })
    }

    fn run(actions: &[Action]) -> RequestState {
        let store = actions.iter().fold(SessionStore::default(), |s, a| fold(s, a));
        RequestState::clone(&store.requests)
    }

    #[test]
    fn cancel_then_late_answer_is_noop() {
        let r = run(&[
            permission("p1"),
            Action::RequestCancelled(CancelTarget::Id("p1".to_string())),
        ]);
        assert!(r.active.is_none());
        assert_eq!(
            r.last_resolved.as_ref().map(|x| x.outcome),
            Some(ResolutionOutcome::Cancelled)
        );

        let after = run(&[
            permission("p1"),
            Action::RequestCancelled(CancelTarget::Id("p1".to_string())),
            Action::PermissionAnswered {
                request_id: "p1".to_string(),
                allow: true,
            },
        ]);
        assert_eq!(after, r);
    }

    #[test]
    fn second_request_waits_in_backlog() {
        let r = run(&[permission("p1"), question("q1")]);
        assert_eq!(r.active.as_ref().map(PendingRequest::request_id), Some("p1"));
        assert_eq!(r.backlog.len(), 1);

        let r = run(&[
            permission("p1"),
            question("q1"),
            Action::PermissionAnswered {
                request_id: "p1".to_string(),
                allow: false,
            },
        ]);
        assert_eq!(r.active.as_ref().map(PendingRequest::request_id), Some("q1"));
        assert!(r.backlog.is_empty());
        assert_eq!(
            r.last_resolved.map(|x| x.outcome),
            Some(ResolutionOutcome::Denied)
        );
    }

    #[test]
    fn repeated_request_is_idempotent() {
        let once = run(&[permission("p1")]);
        let twice = run(&[permission("p1"), permission("p1")]);
        assert_eq!(once, twice);
    }

    #[test]
    fn redelivered_request_stays_closed() {
        let answered = run(&[
            permission("p1"),
            Action::PermissionAnswered {
                request_id: "p1".to_string(),
                allow: true,
            },
        ]);
        let redelivered = run(&[
            permission("p1"),
            Action::PermissionAnswered {
                request_id: "p1".to_string(),
                allow: true,
            },
            permission("p1"),
        ]);
        assert!(redelivered.active.is_none());
        assert_eq!(answered, redelivered);

        let r = run(&[
            permission("p1"),
            question("q1"),
            Action::RequestCancelled(CancelTarget::Id("q1".to_string())),
            question("q1"),
        ]);
        assert!(r.backlog.is_empty());
    }

    #[test]
    fn new_session_forgets_closed_requests() {
        let r = run(&[
            permission("p1"),
            Action::RequestCancelled(CancelTarget::Any),
            Action::NewSession,
            permission("p1"),
        ]);
        assert_eq!(r.active.as_ref().map(PendingRequest::request_id), Some("p1"));
    }

    #[test]
    fn resolved_memory_is_bounded() {
        let mut r = RequestState::default();
        for i in 0..=RESOLVED_MEMORY {
            r.remember(&format!("p{i}"));
        }
        assert_eq!(r.resolved.len(), RESOLVED_MEMORY);
        assert!(!r.was_resolved("p0"));
        assert!(r.was_resolved(&format!("p{RESOLVED_MEMORY}")));
    }

    #[test]
    fn answer_of_wrong_kind_is_ignored() {
        let r = run(&[
            permission("p1"),
            Action::QuestionAnswered {
                request_id: "p1".to_string(),
            },
        ]);
        assert!(r.active.is_some());
    }

    #[test]
    fn cancel_without_id_clears_active() {
        let r = run(&[permission("p1"), Action::RequestCancelled(CancelTarget::Any)]);
        assert!(r.active.is_none());
    }

    #[test]
    fn cancel_by_id_removes_backlogged_request() {
        let r = run(&[
            permission("p1"),
            question("q1"),
            Action::RequestCancelled(CancelTarget::Id("q1".to_string())),
        ]);
        assert_eq!(r.active.as_ref().map(PendingRequest::request_id), Some("p1"));
        assert!(r.backlog.is_empty());
    }

    #[test]
    fn message_used_as_response_resolves() {
        let r = run(&[
            question("q1"),
            Action::MessageUsedAsResponse {
                local_id: "l1".to_string(),
                request_id: None,
            },
        ]);
        assert!(r.active.is_none());
        assert_eq!(
            r.last_resolved.map(|x| x.outcome),
            Some(ResolutionOutcome::UsedMessage)
        );
    }
}
