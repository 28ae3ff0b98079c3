use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Task completion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Done,
}

impl TaskStatus {
    /// The character used inside the checkbox `[ ]`
    pub fn checkbox_char(self) -> char {
        match self {
            TaskStatus::Todo => ' ',
            TaskStatus::Done => 'x',
        }
    }

    pub fn toggled(self) -> TaskStatus {
        match self {
            TaskStatus::Todo => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }

    pub fn is_done(self) -> bool {
        self == TaskStatus::Done
    }
}

/// Identity of a task.
///
/// `Persisted` ids are durable keys (usually the backing note path).
/// `Pending` ids are local tokens handed out for rows whose backing note
/// has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TaskId {
    Persisted(String),
    Pending(u64),
}

impl TaskId {
    pub fn persisted(id: impl Into<String>) -> Self {
        TaskId::Persisted(id.into())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TaskId::Pending(_))
    }

    /// The durable key, if this id has one
    pub fn as_path(&self) -> Option<&str> {
        match self {
            TaskId::Persisted(path) => Some(path),
            TaskId::Pending(_) => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Persisted(path) => write!(f, "{}", path),
            TaskId::Pending(token) => write!(f, "pending:{}", token),
        }
    }
}

/// A schedulable task.
///
/// `children` is the display/navigation structure only. Duration rollup
/// resolves nodes through a registry instead, so the same child may be
/// reachable along several paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub title: String,
    /// Scheduled minutes: own duration plus incomplete descendants
    pub duration: u32,
    /// Own minutes, excluding rollup. `None` means `duration` is the own value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_duration: Option<u32>,
    #[serde(default)]
    pub is_anchored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskNode>,
    /// Audit lines explaining the rollup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl TaskNode {
    /// Create a floating todo task with the given own duration
    pub fn new(id: TaskId, title: impl Into<String>, duration: u32) -> Self {
        TaskNode {
            id,
            title: title.into(),
            duration,
            original_duration: None,
            is_anchored: false,
            start_time: None,
            status: TaskStatus::Todo,
            children: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// Own minutes, ignoring any rollup already folded into `duration`
    pub fn own_minutes(&self) -> u32 {
        self.original_duration.unwrap_or(self.duration)
    }

    /// Replace the own duration. The displayed duration falls back to the
    /// own value until the next schedule pass rolls children back in.
    pub fn set_own_minutes(&mut self, minutes: u32) {
        self.original_duration = Some(minutes);
        self.duration = minutes;
    }

    /// Anchored and carrying a start time; anything else floats
    pub fn is_rock(&self) -> bool {
        self.is_anchored && self.start_time.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    pub fn anchored_at(mut self, start: NaiveDateTime) -> Self {
        self.is_anchored = true;
        self.start_time = Some(start);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_children(mut self, children: Vec<TaskNode>) -> Self {
        self.children = children;
        self
    }
}
