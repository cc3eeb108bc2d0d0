//! Session runtime.
//!
//! Single-threaded owner of the session store. Inbound envelopes are
//! classified and folded; user intents are folded as local actions and turned
//! into outbound commands for the transport. Grouping is recomputed whenever
//! the log revision moves and the render window is kept in sync with it.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::envelope::{classify, ClientCommand};
use crate::error::IntentError;
use crate::grouping::{group_messages, GroupKind, MessageGroup};
use crate::interrupt::{PendingRequest, PermissionDecision, PermissionPrompt, QuestionPrompt};
use crate::models::{ConnectionStatus, PermissionMode, QueuedMessageState};
use crate::render::{RenderWindow, ScrollCommand, WindowConfig};
use crate::state::{
    self, Action, CompactionState, QueuedUserMessage, RewindState, SessionState, SessionStore,
    SettingsPatch, SettingsState,
};

pub struct SessionRuntime {
    store: SessionStore,
    groups: Vec<MessageGroup>,
    grouped_revision: Option<u64>,
    window: RenderWindow,
}

impl Default for SessionRuntime {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

impl SessionRuntime {
    pub fn new(window: WindowConfig) -> Self {
        Self {
            store: SessionStore::default(),
            groups: Vec::new(),
            grouped_revision: None,
            window: RenderWindow::new(window),
        }
    }

    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn groups(&self) -> &[MessageGroup] {
        &self.groups
    }

    pub const fn window(&self) -> &RenderWindow {
        &self.window
    }

    /// Classify and fold one inbound envelope. Returns whether it was
    /// recognised.
    pub fn ingest(&mut self, envelope: &Value) -> bool {
        match classify(envelope) {
            Some(action) => {
                self.dispatch(&action);
                true
            }
            None => false,
        }
    }

    /// Fold one action and bring derived views up to date.
    pub fn dispatch(&mut self, action: &Action) {
        tracing::trace!(action = action.label(), "dispatch");
        let was_loading = self.store.session.loading;
        self.store = state::reduce(std::mem::take(&mut self.store), action);
        let loading = self.store.session.loading;
        // A snapshot replaces history even when no session switch preceded it.
        let hydrated = matches!(action, Action::SnapshotLoaded(_));

        if (hydrated || loading) && !self.window.is_loading() {
            self.window.begin_loading();
        }
        self.refresh_groups();
        if !loading && (was_loading || hydrated) {
            self.window.end_loading();
        }
    }

    fn refresh_groups(&mut self) {
        let revision = self.store.messages.revision();
        if self.grouped_revision == Some(revision) {
            return;
        }
        self.groups = group_messages(self.store.messages.messages());
        self.grouped_revision = Some(revision);
        self.window
            .set_items(self.groups.iter().map(|g| g.key.clone()).collect());
    }

    // === Transport ===

    /// Record a connection change. On connect, every message still queued
    /// locally is handed back for sending.
    pub fn set_connection(&mut self, status: ConnectionStatus) -> Vec<ClientCommand> {
        let was_connected = self.store.session.is_connected();
        self.dispatch(&Action::ConnectionChanged(status));
        if was_connected || status != ConnectionStatus::Connected {
            return Vec::new();
        }
        let commands: Vec<ClientCommand> = self
            .store
            .queue
            .pending()
            .map(|m| ClientCommand::SendMessage {
                local_id: m.local_id.clone(),
                text: m.text.clone(),
            })
            .collect();
        if !commands.is_empty() {
            tracing::info!(count = commands.len(), "flushing queued messages");
        }
        commands
    }

    // === User intents ===

    pub fn send_message(&mut self, text: &str) -> Result<Vec<ClientCommand>, IntentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IntentError::EmptyMessage);
        }
        if self.store.rewind.input_locked() {
            return Err(IntentError::InputLocked);
        }
        let local_id = Uuid::now_v7().to_string();
        self.dispatch(&Action::SendMessage {
            local_id: local_id.clone(),
            text: text.to_string(),
            timestamp: Some(Utc::now()),
        });
        if !self.store.session.is_connected() {
            tracing::info!(local_id, "disconnected, message queued locally");
            return Ok(Vec::new());
        }
        Ok(vec![ClientCommand::SendMessage {
            local_id,
            text: text.to_string(),
        }])
    }

    pub fn stop(&mut self) -> Vec<ClientCommand> {
        self.dispatch(&Action::StopRequested);
        vec![ClientCommand::Stop]
    }

    pub fn select_session(&mut self, session_id: &str) -> Vec<ClientCommand> {
        self.dispatch(&Action::SessionSelected {
            session_id: session_id.to_string(),
        });
        vec![ClientCommand::LoadSession {
            session_id: session_id.to_string(),
        }]
    }

    pub fn new_session(&mut self) -> Vec<ClientCommand> {
        self.dispatch(&Action::NewSession);
        vec![ClientCommand::NewSession]
    }

    pub fn respond_permission(
        &mut self,
        request_id: &str,
        decision: PermissionDecision,
    ) -> Result<Vec<ClientCommand>, IntentError> {
        let command = match &self.store.requests.active {
            Some(PendingRequest::Permission(request)) if request.request_id == request_id => {
                PermissionPrompt::new(request).respond(decision.clone())
            }
            Some(other) if other.request_id() == request_id => {
                return Err(IntentError::WrongRequestKind(
                    request_id.to_string(),
                    "permission",
                ));
            }
            _ => return Err(IntentError::NoSuchRequest(request_id.to_string())),
        };
        self.dispatch(&Action::PermissionAnswered {
            request_id: request_id.to_string(),
            allow: decision.is_allow(),
        });
        Ok(vec![command])
    }

    /// Editable prompt for the active question request, if any.
    pub fn question_prompt(&self) -> Option<QuestionPrompt> {
        match &self.store.requests.active {
            Some(PendingRequest::Question(request)) => Some(QuestionPrompt::new(request)),
            _ => None,
        }
    }

    /// Send every answer of `prompt`. Incomplete prompts are rejected and
    /// nothing is dispatched.
    pub fn answer_questions(
        &mut self,
        prompt: &QuestionPrompt,
    ) -> Result<Vec<ClientCommand>, IntentError> {
        let request_id = prompt.request_id();
        match &self.store.requests.active {
            Some(PendingRequest::Question(q)) if q.request_id == request_id => {}
            Some(other) if other.request_id() == request_id => {
                return Err(IntentError::WrongRequestKind(
                    request_id.to_string(),
                    "question",
                ));
            }
            _ => return Err(IntentError::NoSuchRequest(request_id.to_string())),
        }
        let command = prompt.respond()?;
        self.dispatch(&Action::QuestionAnswered {
            request_id: request_id.to_string(),
        });
        Ok(vec![command])
    }

    pub fn request_rewind_preview(
        &mut self,
        message_id: &str,
    ) -> Result<Vec<ClientCommand>, IntentError> {
        self.known_message(message_id)?;
        self.dispatch(&Action::RewindPreviewRequested {
            message_id: message_id.to_string(),
        });
        Ok(vec![ClientCommand::RewindPreview {
            message_id: message_id.to_string(),
        }])
    }

    pub fn execute_rewind(&mut self, message_id: &str) -> Result<Vec<ClientCommand>, IntentError> {
        if self.store.rewind.input_locked() {
            return Err(IntentError::InputLocked);
        }
        self.known_message(message_id)?;
        self.dispatch(&Action::RewindRequested {
            message_id: message_id.to_string(),
        });
        Ok(vec![ClientCommand::RewindExecute {
            message_id: message_id.to_string(),
        }])
    }

    pub fn remove_queued(&mut self, local_id: &str) -> Result<Vec<ClientCommand>, IntentError> {
        let removable = self
            .store
            .queue
            .get(local_id)
            .is_some_and(|m| m.state != QueuedMessageState::Accepted);
        if !removable {
            return Err(IntentError::NoSuchQueuedMessage(local_id.to_string()));
        }
        self.dispatch(&Action::QueuedMessageRemoved {
            local_id: local_id.to_string(),
        });
        Ok(vec![ClientCommand::RemoveQueuedMessage {
            local_id: local_id.to_string(),
        }])
    }

    pub fn set_permission_mode(&mut self, mode: PermissionMode) -> Vec<ClientCommand> {
        self.dispatch(&Action::PermissionModeChanged(mode));
        vec![ClientCommand::SetPermissionMode { mode }]
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        self.dispatch(&Action::SettingsChanged(patch));
    }

    fn known_message(&self, message_id: &str) -> Result<(), IntentError> {
        if self.store.messages.first_of_event(message_id).is_none() {
            return Err(IntentError::UnknownMessage(message_id.to_string()));
        }
        Ok(())
    }

    // === Render window ===

    pub fn measure(&mut self, key: &str, height: f64) -> bool {
        self.window.measure(key, height)
    }

    pub fn on_scroll(&mut self, top: f64) {
        self.window.on_scroll(top);
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.window.set_viewport_height(height);
    }

    pub fn on_frame(&mut self) -> Option<ScrollCommand> {
        self.window.on_frame()
    }

    /// Serializable overview of the current state.
    pub fn summary(&self) -> StateSummary {
        let requests = &self.store.requests;
        StateSummary {
            session: SessionState::clone(&self.store.session),
            pending: requests.active.clone(),
            backlog: requests.backlog.len(),
            queue: self.store.queue.items.clone(),
            messages: self.store.messages.len(),
            groups: self
                .groups
                .iter()
                .map(|g| GroupSummary {
                    kind: g.kind,
                    key: g.key.clone(),
                    len: g.range.len(),
                })
                .collect(),
            in_flight_tools: self.store.tooling.open.keys().cloned().collect(),
            compaction: CompactionState::clone(&self.store.compaction),
            rewind: RewindState::clone(&self.store.rewind),
            settings: SettingsState::clone(&self.store.settings),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub kind: GroupKind,
    pub key: String,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub session: SessionState,
    pub pending: Option<PendingRequest>,
    pub backlog: usize,
    pub queue: Vec<QueuedUserMessage>,
    pub messages: usize,
    pub groups: Vec<GroupSummary>,
    pub in_flight_tools: Vec<String>,
    pub compaction: CompactionState,
    pub rewind: RewindState,
    pub settings: SettingsState,
}
