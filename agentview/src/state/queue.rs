//! Queued user messages: accepted locally, awaiting producer acknowledgement.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MessageOrigin, QueuedMessageState};

use super::{update, Action, OrderKey, QueueTransition, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedUserMessage {
    /// Client-generated id; after acceptance only a join key.
    pub local_id: String,
    pub text: String,
    pub state: QueuedMessageState,
    /// Producer-assigned order key, set on acceptance.
    pub order: Option<OrderKey>,
    /// Producer-assigned message id, once announced.
    pub producer_id: Option<String>,
    pub queue_position: Option<u32>,
    pub error: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueState {
    pub items: Vec<QueuedUserMessage>,
}

impl QueueState {
    pub fn get(&self, local_id: &str) -> Option<&QueuedUserMessage> {
        self.items.iter().find(|m| m.local_id == local_id)
    }

    /// Messages still waiting to be dispatched.
    pub fn pending(&self) -> impl Iterator<Item = &QueuedUserMessage> {
        self.items
            .iter()
            .filter(|m| m.state == QueuedMessageState::Queued)
    }

    /// Local id of the queued message the producer knows as `producer_id`.
    pub fn local_id_for(&self, producer_id: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|m| m.producer_id.as_deref() == Some(producer_id))
            .map(|m| m.local_id.as_str())
    }

    fn get_mut(&mut self, local_id: &str) -> Option<&mut QueuedUserMessage> {
        self.items.iter_mut().find(|m| m.local_id == local_id)
    }

    fn remove(&mut self, local_id: &str) {
        self.items.retain(|m| m.local_id != local_id);
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    update(&mut store.queue, |q| match action {
        Action::SendMessage {
            local_id,
            text,
            timestamp,
        } => {
            if q.get(local_id).is_none() {
                q.items.push(QueuedUserMessage {
                    local_id: local_id.clone(),
                    text: text.clone(),
                    state: QueuedMessageState::Queued,
                    order: None,
                    producer_id: None,
                    queue_position: None,
                    error: None,
                    timestamp: *timestamp,
                });
            }
        }
        Action::MessageStateChanged {
            local_id,
            transition,
            queue_position,
            error,
            order,
        } => {
            if *transition == QueueTransition::Removed {
                q.remove(local_id);
                return;
            }
            let Some(item) = q.get_mut(local_id) else {
                tracing::debug!(local_id, "state change for unknown queued message");
                return;
            };
            match transition {
                QueueTransition::Queued => {
                    item.state = QueuedMessageState::Queued;
                    item.queue_position = *queue_position;
                }
                QueueTransition::Accepted => {
                    item.state = QueuedMessageState::Accepted;
                    item.queue_position = None;
                    item.error = None;
                    if order.is_some() {
                        item.order = *order;
                    }
                }
                QueueTransition::Rejected => {
                    item.state = QueuedMessageState::Rejected;
                    item.queue_position = None;
                    item.error.clone_from(error);
                }
                QueueTransition::Removed => {}
            }
        }
        Action::UserMessageUuid { local_id, uuid } => {
            if let Some(item) = q.get_mut(local_id) {
                item.producer_id = Some(uuid.clone());
            }
        }
        Action::MessagesReceived(messages) => {
            for message in messages
                .iter()
                .filter(|m| m.origin == MessageOrigin::User && !m.payload.is_tool())
            {
                let local_id = message
                    .local_id
                    .clone()
                    .or_else(|| q.local_id_for(&message.id).map(String::from));
                let Some(local_id) = local_id else {
                    continue;
                };
                if let Some(item) = q.get_mut(&local_id) {
                    item.state = QueuedMessageState::Accepted;
                    item.order = Some(message.order);
                    item.producer_id = Some(message.id.clone());
                    item.queue_position = None;
                }
            }
        }
        Action::QueuedMessageRemoved { local_id } => {
            if q
                .get(local_id)
                .is_some_and(|m| m.state != QueuedMessageState::Accepted)
            {
                q.remove(local_id);
            }
        }
        Action::MessageUsedAsResponse { local_id, .. } => q.remove(local_id),
        Action::SnapshotLoaded(_) => {
            q.items
                .retain(|m| m.state == QueuedMessageState::Queued);
        }
        Action::SessionSelected { .. } | Action::NewSession => q.items.clear(),
        _ => {}
    });
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{reduce as fold, Message, Payload};

    fn send(local_id: &str) -> Action {
        Action::SendMessage {
            local_id: local_id.to_string(),
            text: "please fix the build".to_string(),
            timestamp: None,
        }
    }

    fn run(actions: &[Action]) -> QueueState {
        let store = actions.iter().fold(SessionStore::default(), |s, a| fold(s, a));
        QueueState::clone(&store.queue)
    }

    #[test]
    fn accepted_adopts_producer_order() {
        let q = run(&[
            send("l1"),
            Action::MessageStateChanged {
                local_id: "l1".to_string(),
                transition: QueueTransition::Accepted,
                queue_position: None,
                error: None,
                order: Some(OrderKey::new(42, 0)),
            },
        ]);
        let item = q.get("l1").unwrap();
        assert_eq!(item.state, QueuedMessageState::Accepted);
        assert_eq!(item.order, Some(OrderKey::new(42, 0)));
    }

    #[test]
    fn echoed_user_message_accepts_via_uuid_join() {
        let echo = Message::new(
            "uuid-1",
            OrderKey::new(9, 0),
            MessageOrigin::User,
            Payload::Text {
                text: "please fix the build".to_string(),
            },
        );
        let q = run(&[
            send("l1"),
            Action::UserMessageUuid {
                local_id: "l1".to_string(),
                uuid: "uuid-1".to_string(),
            },
            Action::MessagesReceived(vec![echo]),
        ]);
        let item = q.get("l1").unwrap();
        assert_eq!(item.state, QueuedMessageState::Accepted);
        assert_eq!(item.order, Some(OrderKey::new(9, 0)));
    }

    #[test]
    fn rejection_keeps_error() {
        let q = run(&[
            send("l1"),
            Action::MessageStateChanged {
                local_id: "l1".to_string(),
                transition: QueueTransition::Rejected,
                queue_position: None,
                error: Some("session busy".to_string()),
                order: None,
            },
        ]);
        let item = q.get("l1").unwrap();
        assert_eq!(item.state, QueuedMessageState::Rejected);
        assert_eq!(item.error.as_deref(), Some("session busy"));
    }

    #[test]
    fn user_can_remove_only_unaccepted() {
        let q = run(&[
            send("l1"),
            Action::QueuedMessageRemoved {
                local_id: "l1".to_string(),
            },
        ]);
        assert!(q.items.is_empty());

        let q = run(&[
            send("l1"),
            Action::MessageStateChanged {
                local_id: "l1".to_string(),
                transition: QueueTransition::Accepted,
                queue_position: None,
                error: None,
                order: Some(OrderKey::new(1, 0)),
            },
            Action::QueuedMessageRemoved {
                local_id: "l1".to_string(),
            },
        ]);
        assert_eq!(q.items.len(), 1);
    }

    #[test]
    fn queue_position_updates() {
        let q = run(&[
            send("l1"),
            Action::MessageStateChanged {
                local_id: "l1".to_string(),
                transition: QueueTransition::Queued,
                queue_position: Some(2),
                error: None,
                order: None,
            },
        ]);
        assert_eq!(q.get("l1").unwrap().queue_position, Some(2));
        assert_eq!(q.pending().count(), 1);
    }
}
