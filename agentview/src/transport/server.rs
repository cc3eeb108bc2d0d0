//! HTTP/WebSocket host around a single live runtime.
//!
//! Endpoints:
//! - POST /api/envelopes - Ingest producer envelopes (optionally for `?session=<id>`)
//! - POST /api/actions - Apply a user intent, returns the outbound commands
//! - GET /api/state - Current state summary
//! - WS /ws - State summaries and outbound commands as they happen

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::envelope::ClientCommand;
use crate::error::IntentError;
use crate::interrupt::PermissionDecision;
use crate::models::{ConnectionStatus, PermissionMode};
use crate::runtime::{SessionRuntime, StateSummary};
use crate::state::SettingsPatch;

/// Shared server state.
pub struct ServerState {
    runtime: RwLock<SessionRuntime>,
    tx: broadcast::Sender<Broadcast>,
}

impl ServerState {
    pub fn new(config: &Config) -> Self {
        let mut runtime = SessionRuntime::new(config.window);
        runtime.update_settings(config.display.as_patch());
        let (tx, _rx) = broadcast::channel(config.server.broadcast_capacity.max(1));
        Self {
            runtime: RwLock::new(runtime),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.tx.subscribe()
    }

    pub async fn summary(&self) -> StateSummary {
        self.runtime.read().await.summary()
    }

    fn publish(&self, commands: Vec<ClientCommand>, summary: StateSummary) {
        // No subscribers is fine.
        if !commands.is_empty() {
            let _ = self.tx.send(Broadcast::Commands { commands });
        }
        let _ = self.tx.send(Broadcast::State(summary));
    }
}

/// Message pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Broadcast {
    State(StateSummary),
    Commands { commands: Vec<ClientCommand> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeBatch {
    Many(Vec<Value>),
    One(Value),
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestQuery {
    pub session: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    pub accepted: usize,
    pub ignored: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    AllowOnce,
    AllowAlways,
    Deny,
}

/// Answer to one question: option indices and/or free text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionSelection {
    #[serde(default)]
    pub options: Vec<usize>,
    pub other: Option<String>,
}

/// A user intent posted by a dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentRequest {
    Connection {
        status: ConnectionStatus,
    },
    SendMessage {
        text: String,
    },
    Stop,
    SelectSession {
        session_id: String,
    },
    NewSession,
    RespondPermission {
        request_id: String,
        decision: DecisionKind,
        reason: Option<String>,
    },
    AnswerQuestions {
        request_id: String,
        answers: Vec<QuestionSelection>,
    },
    RewindPreview {
        message_id: String,
    },
    RewindExecute {
        message_id: String,
    },
    RemoveQueued {
        local_id: String,
    },
    SetPermissionMode {
        mode: PermissionMode,
    },
    Settings {
        show_thinking: Option<bool>,
        collapse_completed_tools: Option<bool>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub commands: Vec<ClientCommand>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Run an intent against the runtime.
pub fn apply_intent(
    runtime: &mut SessionRuntime,
    intent: IntentRequest,
) -> Result<Vec<ClientCommand>, IntentError> {
    match intent {
        IntentRequest::Connection { status } => Ok(runtime.set_connection(status)),
        IntentRequest::SendMessage { text } => runtime.send_message(&text),
        IntentRequest::Stop => Ok(runtime.stop()),
        IntentRequest::SelectSession { session_id } => Ok(runtime.select_session(&session_id)),
        IntentRequest::NewSession => Ok(runtime.new_session()),
        IntentRequest::RespondPermission {
            request_id,
            decision,
            reason,
        } => {
            let decision = match decision {
                DecisionKind::AllowOnce => PermissionDecision::AllowOnce,
                DecisionKind::AllowAlways => PermissionDecision::AllowAlways,
                DecisionKind::Deny => PermissionDecision::Deny { reason },
            };
            runtime.respond_permission(&request_id, decision)
        }
        IntentRequest::AnswerQuestions {
            request_id,
            answers,
        } => {
            let mut prompt = runtime
                .question_prompt()
                .filter(|p| p.request_id() == request_id)
                .ok_or_else(|| IntentError::NoSuchRequest(request_id.clone()))?;
            for (index, selection) in answers.iter().enumerate() {
                for option in &selection.options {
                    prompt.select(index, *option)?;
                }
                if let Some(other) = &selection.other {
                    prompt.set_other(index, other)?;
                }
            }
            runtime.answer_questions(&prompt)
        }
        IntentRequest::RewindPreview { message_id } => runtime.request_rewind_preview(&message_id),
        IntentRequest::RewindExecute { message_id } => runtime.execute_rewind(&message_id),
        IntentRequest::RemoveQueued { local_id } => runtime.remove_queued(&local_id),
        IntentRequest::SetPermissionMode { mode } => Ok(runtime.set_permission_mode(mode)),
        IntentRequest::Settings {
            show_thinking,
            collapse_completed_tools,
        } => {
            runtime.update_settings(SettingsPatch {
                show_thinking,
                collapse_completed_tools,
            });
            Ok(Vec::new())
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/envelopes", post(ingest_envelopes))
        .route("/api/actions", post(apply_action))
        .route("/api/state", get(get_state))
        .route("/ws", get(websocket_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the server.
pub async fn start_server(config: &Config, open_browser: bool) -> Result<()> {
    let state = Arc::new(ServerState::new(config));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.host))?;
    tracing::info!(%addr, "agentview server starting");

    if open_browser {
        if let Err(e) = open::that(format!("http://{addr}/api/state")) {
            tracing::warn!(error = %e, "failed to open browser");
        }
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

pub async fn ingest_envelopes(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<IngestQuery>,
    Json(batch): Json<EnvelopeBatch>,
) -> Json<IngestResponse> {
    let envelopes = match batch {
        EnvelopeBatch::Many(envelopes) => envelopes,
        EnvelopeBatch::One(envelope) => vec![envelope],
    };

    let mut runtime = state.runtime.write().await;
    let mut commands = Vec::new();
    if let Some(session) = query.session {
        if runtime.store().session.session_id.as_deref() != Some(session.as_str()) {
            commands = runtime.select_session(&session);
        }
    }

    let mut accepted = 0;
    for envelope in &envelopes {
        if runtime.ingest(envelope) {
            accepted += 1;
        }
    }
    let ignored = envelopes.len() - accepted;
    tracing::debug!(accepted, ignored, "ingested envelopes");

    let summary = runtime.summary();
    drop(runtime);
    state.publish(commands, summary);

    Json(IngestResponse { accepted, ignored })
}

pub async fn apply_action(
    State(state): State<Arc<ServerState>>,
    Json(intent): Json<IntentRequest>,
) -> Result<Json<ActionResponse>, (StatusCode, Json<ErrorBody>)> {
    let mut runtime = state.runtime.write().await;
    let commands = apply_intent(&mut runtime, intent).map_err(|e| {
        tracing::info!(error = %e, "intent rejected");
        (
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
    })?;
    let summary = runtime.summary();
    drop(runtime);
    state.publish(commands.clone(), summary);
    Ok(Json(ActionResponse { commands }))
}

pub async fn get_state(State(state): State<Arc<ServerState>>) -> Json<StateSummary> {
    Json(state.summary().await)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: axum::extract::ws::WebSocket, state: Arc<ServerState>) {
    use axum::extract::ws::Message;
    use tokio::sync::broadcast::error::RecvError;

    let mut rx = state.subscribe();

    let initial = Broadcast::State(state.summary().await);
    if let Ok(json) = serde_json::to_string(&initial) {
        if socket.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    loop {
        let broadcast = match rx.recv().await {
            Ok(broadcast) => broadcast,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "websocket subscriber lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if let Ok(json) = serde_json::to_string(&broadcast) {
            if socket.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }
}
