//! Client-side display preferences. Survive session changes.

use serde::Serialize;

use super::{update, Action, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsState {
    pub show_thinking: bool,
    /// Fold tool runs whose calls have all completed.
    pub collapse_completed_tools: bool,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            show_thinking: true,
            collapse_completed_tools: true,
        }
    }
}

pub fn reduce(mut store: SessionStore, action: &Action) -> SessionStore {
    if let Action::SettingsChanged(patch) = action {
        update(&mut store.settings, |s| {
            if let Some(show) = patch.show_thinking {
                s.show_thinking = show;
            }
            if let Some(collapse) = patch.collapse_completed_tools {
                s.collapse_completed_tools = collapse;
            }
        });
    }
    store
}
