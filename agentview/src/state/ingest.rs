//! Message ingestion slice.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::models::MessageOrigin;

use super::queue::QueueState;
use super::{Action, Message, Payload, QueueTransition, SessionStore};

/// Attach the local correlation id to a producer echo of a queued message.
fn join_local(queue: &QueueState, message: &Message) -> Message {
    let mut message = message.clone();
    if message.origin == MessageOrigin::User && message.local_id.is_none() {
        message.local_id = queue.local_id_for(&message.id).map(String::from);
    }
    message
}

/// Id of a reported error, derived from its text so a replayed report
/// lands on the same entry.
fn error_id(message: &str) -> String {
    let mut hasher = DefaultHasher::new();
    message.hash(&mut hasher);
    format!("error-{:016x}", hasher.finish())
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    match action {
        Action::MessagesReceived(messages) => {
            let joined: Vec<Message> = messages
                .iter()
                .map(|m| join_local(&store.queue, m))
                .collect();
            if joined.iter().any(|m| store.messages.would_change(m)) {
                let log = Arc::make_mut(&mut store.messages);
                for message in joined {
                    log.merge(message);
                }
            }
        }
        Action::MessageStateChanged {
            local_id,
            transition: QueueTransition::Accepted,
            order: Some(order),
            ..
        } => {
            let Some(item) = store.queue.get(local_id) else {
                return store;
            };
            if store.messages.find_by_local_id(local_id).is_some() {
                return store;
            }
            let id = item.producer_id.clone().unwrap_or_else(|| local_id.clone());
            let mut message = Message::new(
                id,
                *order,
                MessageOrigin::User,
                Payload::Text {
                    text: item.text.clone(),
                },
            );
            message.local_id = Some(local_id.clone());
            message.timestamp = item.timestamp;
            Arc::make_mut(&mut store.messages).merge(message);
        }
        Action::ErrorReported { message } => {
            let id = error_id(message);
            if !store.messages.contains(&id) {
                let key = store.messages.next_local_key();
                let entry = Message::new(
                    id,
                    key,
                    MessageOrigin::System,
                    Payload::Error {
                        message: message.clone(),
                    },
                );
                Arc::make_mut(&mut store.messages).merge(entry);
            }
        }
        Action::TaskNotification {
            task_id,
            status,
            summary,
        } => {
            let id = format!("task-{task_id}-{status}");
            if !store.messages.contains(&id) {
                let key = store.messages.next_local_key();
                let text = match summary {
                    Some(summary) => format!("Task {task_id} {status}: {summary}"),
                    None => format!("Task {task_id} {status}"),
                };
                let message =
                    Message::new(id, key, MessageOrigin::System, Payload::Status { text });
                Arc::make_mut(&mut store.messages).merge(message);
            }
        }
        Action::SnapshotLoaded(snapshot) => {
            Arc::make_mut(&mut store.messages).replace(snapshot.messages.clone());
        }
        Action::SessionSelected { .. } | Action::NewSession => {
            if !store.messages.is_empty() {
                Arc::make_mut(&mut store.messages).clear();
            }
        }
        _ => {}
    }
    store
}
