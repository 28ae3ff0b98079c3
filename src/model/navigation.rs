use serde::{Deserialize, Serialize};

use super::task::TaskNode;

/// Where a displayed stack came from, so it can be reloaded later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StackSource {
    /// A loadable identifier (a note path or a task id)
    Path(String),
    /// A synthetic query understood by the loader
    Query(String),
    /// An ad hoc list of task ids; reloaded by id rather than by source
    ExplicitIds,
}

impl StackSource {
    /// The identifier handed to `Loader::load` when reloading this source
    pub fn load_key(&self) -> Option<&str> {
        match self {
            StackSource::Path(path) => Some(path),
            StackSource::Query(query) => Some(query),
            StackSource::ExplicitIds => None,
        }
    }
}

/// Full navigation snapshot: the active view plus three parallel history stacks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    #[serde(default)]
    pub current_stack: Vec<TaskNode>,
    #[serde(default)]
    pub current_focused_index: usize,
    #[serde(default)]
    pub history: Vec<Vec<TaskNode>>,
    #[serde(default)]
    pub focused_history: Vec<usize>,
    #[serde(default)]
    pub source_history: Vec<Option<StackSource>>,
    #[serde(default)]
    pub current_source: Option<StackSource>,
}

impl NavigationState {
    pub fn depth(&self) -> usize {
        self.history.len()
    }
}
