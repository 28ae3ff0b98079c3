use crate::io::loader::{LoadError, Loader};
use crate::model::navigation::{NavigationState, StackSource};
use crate::model::task::{TaskId, TaskNode};

/// Applied to freshly loaded or returned stacks, usually the scheduler
pub type Preprocessor = Box<dyn Fn(Vec<TaskNode>) -> Vec<TaskNode>>;

/// Outcome of `go_back`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoBack {
    pub success: bool,
    pub focused_index: usize,
}

/// Drill-down / go-back stack machine over task lists.
///
/// Every level change goes through the loader, so the active view always
/// shows fresh data rather than a cached copy.
pub struct NavigationManager<L> {
    loader: L,
    preprocess: Option<Preprocessor>,
    state: NavigationState,
}

fn or_empty(result: Result<Vec<TaskNode>, LoadError>, what: &str) -> Vec<TaskNode> {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, source = what, "load failed");
        Vec::new()
    })
}

impl<L: Loader> NavigationManager<L> {
    pub fn new(loader: L) -> Self {
        NavigationManager {
            loader,
            preprocess: None,
            state: NavigationState::default(),
        }
    }

    pub fn with_preprocessor(
        mut self,
        preprocess: impl Fn(Vec<TaskNode>) -> Vec<TaskNode> + 'static,
    ) -> Self {
        self.preprocess = Some(Box::new(preprocess));
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    fn prepare(&self, tasks: Vec<TaskNode>) -> Vec<TaskNode> {
        match &self.preprocess {
            Some(preprocess) => preprocess(tasks),
            None => tasks,
        }
    }

    pub fn current_stack(&self) -> &[TaskNode] {
        &self.state.current_stack
    }

    pub fn current_source(&self) -> Option<&StackSource> {
        self.state.current_source.as_ref()
    }

    pub fn focused_index(&self) -> usize {
        self.state.current_focused_index
    }

    pub fn set_focused_index(&mut self, index: usize) {
        self.state.current_focused_index = index;
    }

    /// Replace the active view without touching history
    pub fn set_stack(&mut self, tasks: Vec<TaskNode>, source: Option<StackSource>) {
        self.state.current_stack = tasks;
        self.state.current_source = source;
    }

    pub fn can_go_back(&self) -> bool {
        !self.state.history.is_empty()
    }

    pub fn get_state(&self) -> NavigationState {
        self.state.clone()
    }

    pub fn set_state(&mut self, state: NavigationState) {
        self.state = state;
    }

    /// Enter `task_id`'s children as the new active view.
    ///
    /// Fails without changing anything when the task is not listed, has no
    /// durable id, or the loader returns no children.
    pub fn drill_down(&mut self, task_id: &TaskId, current_focus_index: usize) -> bool {
        if !self.state.current_stack.iter().any(|t| &t.id == task_id) {
            return false;
        }
        let Some(path) = task_id.as_path() else {
            return false;
        };
        let children = or_empty(self.loader.load(path), path);
        if children.is_empty() {
            tracing::debug!(task = path, "drill-down found no children");
            return false;
        }

        let children = self.prepare(children);
        let previous = std::mem::replace(&mut self.state.current_stack, children);
        self.state.history.push(previous);
        self.state.focused_history.push(current_focus_index);
        let previous_source = self
            .state
            .current_source
            .replace(StackSource::Path(path.to_string()));
        self.state.source_history.push(previous_source);
        self.state.current_focused_index = 0;

        tracing::debug!(task = path, depth = self.state.depth(), "drilled down");
        true
    }

    /// Pop one level and reload it from its source.
    ///
    /// An explicit id list is reloaded by id; if that comes back empty the
    /// cached snapshot is shown instead. Path and query sources are reloaded
    /// directly. A level without a source keeps its snapshot.
    pub fn go_back(&mut self) -> GoBack {
        let Some(snapshot) = self.state.history.pop() else {
            return GoBack {
                success: false,
                focused_index: 0,
            };
        };
        let focused_index = self.state.focused_history.pop().unwrap_or(0);
        let source = self.state.source_history.pop().flatten();

        let stack = match &source {
            Some(StackSource::ExplicitIds) => {
                let fresh = self.reload_ids(&snapshot);
                if fresh.is_empty() {
                    tracing::warn!(cached = snapshot.len(), "id reload empty, using cached stack");
                    snapshot
                } else {
                    fresh
                }
            }
            Some(other) => match other.load_key() {
                Some(key) => or_empty(self.loader.load(key), key),
                None => snapshot,
            },
            None => snapshot,
        };

        self.state.current_stack = self.prepare(stack);
        self.state.current_source = source;
        self.state.current_focused_index = focused_index;
        tracing::debug!(depth = self.state.depth(), focused_index, "went back");
        GoBack {
            success: true,
            focused_index,
        }
    }

    /// Reload the active view from its source. An empty or failed reload
    /// keeps the current stack and returns false.
    pub fn reload_current(&mut self) -> bool {
        let fresh = match &self.state.current_source {
            Some(StackSource::ExplicitIds) => self.reload_ids(&self.state.current_stack),
            Some(source) => match source.load_key() {
                Some(key) => or_empty(self.loader.load(key), key),
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        if fresh.is_empty() {
            return false;
        }
        self.state.current_stack = self.prepare(fresh);
        true
    }

    fn reload_ids(&self, stack: &[TaskNode]) -> Vec<TaskNode> {
        let ids: Vec<String> = stack
            .iter()
            .filter_map(|t| t.id.as_path().map(str::to_string))
            .collect();
        or_empty(self.loader.load_specific_files(&ids), "explicit ids")
    }
}
