use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{Duration, NaiveDateTime};

use crate::model::task::{TaskId, TaskNode};

/// id → node lookup, rebuilt for every schedule pass so rollup sees the
/// current version of a node instead of a stale embedded copy
pub type TaskRegistry<'a> = HashMap<&'a TaskId, &'a TaskNode>;

/// External hints threaded into a schedule pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Accepted and logged; packing does not read it yet
    pub high_pressure: bool,
}

/// Result of a duration rollup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rollup {
    pub total: u32,
    pub trace: Vec<String>,
}

/// An anchored interval after overlap resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rock {
    /// Position in the input slice
    index: usize,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Rock {
    fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && end > self.start
    }
}

fn minutes(m: u32) -> Duration {
    Duration::minutes(i64::from(m))
}

/// `t + m` minutes, saturating at the end of representable time
fn advance(t: NaiveDateTime, m: u32) -> NaiveDateTime {
    t.checked_add_signed(minutes(m)).unwrap_or(NaiveDateTime::MAX)
}

pub fn build_registry(tasks: &[TaskNode]) -> TaskRegistry<'_> {
    tasks.iter().map(|t| (&t.id, t)).collect()
}

/// Sum the own minutes of every incomplete descendant of `root`.
///
/// Breadth-first over the registry-resolved graph. Each id is counted at most
/// once, so diamonds and cycles terminate. A done node is marked visited but
/// its subtree is not explored.
pub fn rollup<'a>(root: &'a TaskNode, registry: &TaskRegistry<'a>) -> Rollup {
    let mut visited: HashSet<&TaskId> = HashSet::new();
    visited.insert(&root.id);
    let mut queue: VecDeque<&TaskNode> = root.children.iter().collect();
    let mut out = Rollup::default();

    while let Some(node) = queue.pop_front() {
        let node = registry.get(&node.id).copied().unwrap_or(node);
        if !visited.insert(&node.id) {
            continue;
        }
        if node.is_done() {
            out.trace
                .push(format!("skip {} ({}): done, subtree pruned", node.title, node.id));
            continue;
        }
        let own = node.own_minutes();
        out.total = out.total.saturating_add(own);
        out.trace.push(format!("+{}m {} ({})", own, node.title, node.id));
        queue.extend(node.children.iter());
    }
    out
}

/// Own minutes plus the rollup of incomplete descendants
pub fn total_duration<'a>(root: &'a TaskNode, registry: &TaskRegistry<'a>) -> Rollup {
    let own = root.own_minutes();
    let children = rollup(root, registry);

    let mut trace = Vec::with_capacity(children.trace.len() + 3);
    trace.push(format!("own {}m", own));
    trace.extend(children.trace);
    let total = own.saturating_add(children.total);
    trace.push(format!("= {}m", total));
    if root.is_done() {
        trace.push("done: total is for display only, schedules as 0m".to_string());
    }
    Rollup { total, trace }
}

/// Sort anchored tasks by start time and push each one forward so that no
/// two overlap. The input is left untouched; the adjusted starts are returned.
fn resolve_rocks(tasks: &[TaskNode]) -> Vec<Rock> {
    let mut anchored: Vec<(usize, NaiveDateTime)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_anchored)
        .filter_map(|(i, t)| t.start_time.map(|start| (i, start)))
        .collect();
    anchored.sort_by_key(|&(_, start)| start);

    let mut bound = NaiveDateTime::MIN;
    let mut rocks = Vec::with_capacity(anchored.len());
    for (index, start) in anchored {
        let start = start.max(bound);
        let end = advance(start, tasks[index].own_minutes());
        bound = end;
        rocks.push(Rock { index, start, end });
    }
    rocks
}

/// `None` sorts after every defined start time
fn cmp_start(a: &TaskNode, b: &TaskNode) -> Ordering {
    match (a.start_time, b.start_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Assign start times to every task.
///
/// Anchored tasks keep their (overlap-resolved) start. Floating tasks are
/// packed in list order from `now`, jumping past any anchored interval they
/// would overlap. Done floating tasks occupy zero minutes. The result is a
/// copy of the input with rolled-up durations and traces, sorted by start.
pub fn compute_schedule(
    tasks: &[TaskNode],
    now: NaiveDateTime,
    options: &ScheduleOptions,
) -> Vec<TaskNode> {
    let rocks = resolve_rocks(tasks);
    let registry = build_registry(tasks);

    let mut scheduled: Vec<TaskNode> = tasks
        .iter()
        .map(|task| {
            let totals = total_duration(task, &registry);
            TaskNode {
                original_duration: Some(task.own_minutes()),
                duration: totals.total,
                trace: totals.trace,
                ..task.clone()
            }
        })
        .collect();
    for rock in &rocks {
        scheduled[rock.index].start_time = Some(rock.start);
    }

    let mut playhead = now;
    for task in scheduled.iter_mut().filter(|t| !t.is_rock()) {
        let effective = if task.is_done() { 0 } else { task.duration };
        let mut end = advance(playhead, effective);
        while let Some(rock) = rocks.iter().find(|r| r.overlaps(playhead, end)) {
            playhead = rock.end;
            end = advance(playhead, effective);
        }
        task.start_time = Some(playhead);
        playhead = end;
    }

    scheduled.sort_by(cmp_start);
    tracing::debug!(
        tasks = scheduled.len(),
        rocks = rocks.len(),
        high_pressure = options.high_pressure,
        "schedule computed"
    );
    scheduled
}

/// End of a scheduled task's own interval, if it has a start
pub fn end_time(task: &TaskNode) -> Option<NaiveDateTime> {
    let minutes_used = if task.is_rock() {
        task.own_minutes()
    } else if task.is_done() {
        0
    } else {
        task.duration
    };
    task.start_time.map(|start| advance(start, minutes_used))
}
