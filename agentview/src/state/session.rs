//! Session lifecycle slice. The only slice that writes `running`.

use serde::Serialize;

use crate::models::{ConnectionStatus, PermissionMode, SessionPhase};

use super::{update, Action, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub connection: ConnectionStatus,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub running: bool,
    /// Whether the producer process is alive at all.
    pub alive: bool,
    pub starting: bool,
    pub stopping: bool,
    /// A history snapshot for a newly selected session is outstanding.
    pub loading: bool,
    pub exit_code: Option<i32>,
    pub permission_mode: PermissionMode,
    /// Session identifiers the producer knows about.
    pub sessions: Vec<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            session_id: None,
            cwd: None,
            running: false,
            alive: true,
            starting: false,
            stopping: false,
            loading: false,
            exit_code: None,
            permission_mode: PermissionMode::Default,
            sessions: Vec::new(),
        }
    }
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    /// Fresh state for another session, keeping transport-level facts.
    fn reset(&self) -> Self {
        Self {
            connection: self.connection,
            sessions: self.sessions.clone(),
            ..Self::default()
        }
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    update(&mut store.session, |s| match action {
        Action::ConnectionChanged(status) => s.connection = *status,
        Action::StatusReported { running, alive } => {
            s.running = *running;
            s.alive = *alive;
            if *running {
                s.starting = false;
            } else {
                s.stopping = false;
            }
        }
        Action::SessionStarting => {
            s.starting = true;
            s.exit_code = None;
        }
        Action::SessionStarted { session_id, cwd } => {
            s.starting = false;
            s.running = true;
            s.alive = true;
            if session_id.is_some() {
                s.session_id.clone_from(session_id);
            }
            if cwd.is_some() {
                s.cwd.clone_from(cwd);
            }
        }
        Action::SessionStopped => {
            s.running = false;
            s.starting = false;
            s.stopping = false;
        }
        Action::ProcessExited { code } => {
            s.running = false;
            s.starting = false;
            s.stopping = false;
            s.alive = false;
            s.exit_code = *code;
        }
        Action::StopRequested => {
            if s.running || s.starting {
                s.stopping = true;
            }
        }
        Action::SessionsListed(sessions) => s.sessions.clone_from(sessions),
        Action::PermissionModeChanged(mode) => s.permission_mode = *mode,
        Action::SystemInit(init) => {
            if init.cwd.is_some() {
                s.cwd.clone_from(&init.cwd);
            }
        }
        Action::SessionSelected { session_id } => {
            *s = s.reset();
            s.session_id = Some(session_id.clone());
            s.loading = true;
        }
        Action::NewSession => *s = s.reset(),
        Action::SnapshotLoaded(snapshot) => {
            s.loading = false;
            match snapshot.phase {
                Some(SessionPhase::Running) => {
                    s.running = true;
                    s.starting = false;
                }
                Some(SessionPhase::Starting) => {
                    s.running = false;
                    s.starting = true;
                }
                Some(SessionPhase::Idle | SessionPhase::Stopped) => {
                    s.running = false;
                    s.starting = false;
                    s.stopping = false;
                }
                None => {}
            }
        }
        _ => {}
    });
    store
}
