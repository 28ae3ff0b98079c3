use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::navigation::NavigationState;
use crate::ops::command::History;

pub const STATE_FILE: &str = ".timeblock-state.json";

/// Persisted session state (written to .timeblock-state.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub navigation: NavigationState,
    #[serde(default)]
    pub history: History,
}

/// Read the session state. Missing or malformed files read as `None`.
pub fn read_session_state(dir: &Path) -> Option<SessionState> {
    let content = fs::read_to_string(dir.join(STATE_FILE)).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable session state");
            None
        }
    }
}

pub fn write_session_state(dir: &Path, state: &SessionState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    fs::write(dir.join(STATE_FILE), content)
}
