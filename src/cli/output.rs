use chrono::NaiveDateTime;
use serde::Serialize;

use crate::model::navigation::StackSource;
use crate::model::task::{TaskNode, TaskStatus};
use crate::ops::schedule::end_time;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    /// 1-based position in the view
    pub position: usize,
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub anchored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    /// Own minutes
    pub own_minutes: u32,
    /// Own plus incomplete descendants
    pub total_minutes: u32,
    pub children: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

#[derive(Serialize)]
pub struct ViewJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub depth: usize,
    pub tasks: Vec<TaskJson>,
}

pub fn task_to_json(position: usize, task: &TaskNode, with_trace: bool) -> TaskJson {
    TaskJson {
        position,
        id: task.id.to_string(),
        title: task.title.clone(),
        status: task.status,
        anchored: task.is_anchored,
        start: task.start_time,
        end: end_time(task),
        own_minutes: task.own_minutes(),
        total_minutes: task.duration,
        children: task.children.len(),
        trace: if with_trace {
            task.trace.clone()
        } else {
            Vec::new()
        },
    }
}

pub fn view_to_json(tasks: &[TaskNode], source: Option<&StackSource>, depth: usize) -> ViewJson {
    ViewJson {
        source: source.map(format_source),
        depth,
        tasks: tasks
            .iter()
            .enumerate()
            .map(|(i, t)| task_to_json(i + 1, t, false))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

pub fn format_source(source: &StackSource) -> String {
    match source {
        StackSource::Path(path) => path.clone(),
        StackSource::Query(query) => format!("query:{}", query),
        StackSource::ExplicitIds => "(selection)".to_string(),
    }
}

fn format_clock(time: Option<NaiveDateTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

/// `1h30m`, `45m`, `2h`
pub fn format_minutes(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}

/// One row of the schedule view
pub fn format_task_line(position: usize, task: &TaskNode) -> String {
    let mut line = format!(
        "{:>2}. [{}] {}-{} {:>6}  {}",
        position,
        task.status.checkbox_char(),
        format_clock(task.start_time),
        format_clock(end_time(task)),
        format_minutes(task.duration),
        task.title
    );
    if task.is_anchored {
        line.push_str(" @");
    }
    if !task.children.is_empty() {
        line.push_str(&format!(" +{}", task.children.len()));
    }
    line
}

pub fn format_view(tasks: &[TaskNode], source: Option<&StackSource>, depth: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(tasks.len() + 1);
    let header = source.map(format_source).unwrap_or_else(|| "(unsaved)".to_string());
    if depth > 0 {
        lines.push(format!("{} (depth {})", header, depth));
    } else {
        lines.push(header);
    }
    if tasks.is_empty() {
        lines.push("  (no tasks)".to_string());
    }
    for (i, task) in tasks.iter().enumerate() {
        lines.push(format_task_line(i + 1, task));
    }
    lines
}

/// Detailed task view including the rollup trace
pub fn format_task_detail(task: &TaskNode) -> Vec<String> {
    let mut lines = vec![
        format!("[{}] {}", task.status.checkbox_char(), task.title),
        format!("id: {}", task.id),
        format!(
            "time: {}-{}{}",
            format_clock(task.start_time),
            format_clock(end_time(task)),
            if task.is_anchored { " (anchored)" } else { "" }
        ),
        format!(
            "duration: {} own, {} total",
            format_minutes(task.own_minutes()),
            format_minutes(task.duration)
        ),
    ];
    if !task.children.is_empty() {
        lines.push("children:".to_string());
        for child in &task.children {
            lines.push(format!(
                "  [{}] {} ({})",
                child.status.checkbox_char(),
                child.title,
                format_minutes(child.own_minutes())
            ));
        }
    }
    if !task.trace.is_empty() {
        lines.push("rollup:".to_string());
        for line in &task.trace {
            lines.push(format!("  {}", line));
        }
    }
    lines
}
