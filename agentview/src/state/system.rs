//! Producer metadata: init info, slash commands, hooks, background tasks.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{update, Action, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookStatus {
    pub name: String,
    pub finished: bool,
    pub output: Option<String>,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNotice {
    pub status: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemState {
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub slash_commands: Vec<String>,
    pub hooks: BTreeMap<String, HookStatus>,
    pub tasks: BTreeMap<String, TaskNotice>,
}

impl SystemState {
    pub fn running_hooks(&self) -> impl Iterator<Item = (&String, &HookStatus)> {
        self.hooks.iter().filter(|(_, h)| !h.finished)
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    update(&mut store.system, |s| match action {
        Action::SystemInit(init) => {
            s.tools.clone_from(&init.tools);
            if init.model.is_some() {
                s.model.clone_from(&init.model);
            }
            if !init.slash_commands.is_empty() {
                s.slash_commands.clone_from(&init.slash_commands);
            }
        }
        Action::SlashCommandsListed(commands) => s.slash_commands.clone_from(commands),
        Action::HookStarted { hook_id, hook_name } => {
            s.hooks.entry(hook_id.clone()).or_insert_with(|| HookStatus {
                name: hook_name.clone(),
                finished: false,
                output: None,
                exit_code: None,
            });
        }
        Action::HookResponded {
            hook_id,
            output,
            exit_code,
        } => {
            let hook = s.hooks.entry(hook_id.clone()).or_insert_with(|| HookStatus {
                name: hook_id.clone(),
                finished: false,
                output: None,
                exit_code: None,
            });
            hook.finished = true;
            hook.output.clone_from(output);
            hook.exit_code = *exit_code;
        }
        Action::TaskNotification {
            task_id,
            status,
            summary,
        } => {
            s.tasks.insert(
                task_id.clone(),
                TaskNotice {
                    status: status.clone(),
                    summary: summary.clone(),
                },
            );
        }
        Action::SessionSelected { .. } | Action::NewSession => *s = SystemState::default(),
        _ => {}
    });
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{reduce as fold, SystemInit};

    #[test]
    fn init_and_hooks() {
        let mut store = fold(
            SessionStore::default(),
            &Action::SystemInit(SystemInit {
                tools: vec!["Bash".to_string(), "Read".to_string()],
                model: Some("claude-sonnet".to_string()),
                cwd: Some("/repo".to_string()),
                slash_commands: vec!["/compact".to_string()],
            }),
        );
        store = fold(
            store,
            &Action::HookStarted {
                hook_id: "h1".to_string(),
                hook_name: "pre-commit".to_string(),
            },
        );
        assert_eq!(store.system.running_hooks().count(), 1);
        assert_eq!(store.session.cwd.as_deref(), Some("/repo"));

        store = fold(
            store,
            &Action::HookResponded {
                hook_id: "h1".to_string(),
                output: Some("ok".to_string()),
                exit_code: Some(0),
            },
        );
        assert_eq!(store.system.running_hooks().count(), 0);
        assert_eq!(store.system.hooks["h1"].name, "pre-commit");
        assert_eq!(store.system.tools.len(), 2);
    }

    #[test]
    fn slash_commands_replace_list() {
        let store = fold(
            SessionStore::default(),
            &Action::SlashCommandsListed(vec!["/review".to_string()]),
        );
        assert_eq!(store.system.slash_commands, vec!["/review".to_string()]);
    }
}
