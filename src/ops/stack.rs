use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::model::task::{TaskId, TaskNode, TaskStatus};
use crate::ops::schedule::{ScheduleOptions, compute_schedule};

/// Duration steps (minutes) walked by `scale_duration`
pub const DURATION_STEPS: [u32; 16] = [
    2, 5, 10, 15, 20, 30, 45, 60, 90, 120, 180, 240, 300, 360, 420, 480,
];

/// Floor for `adjust_duration`
pub const MIN_DURATION: u32 = 2;

/// Ceiling for `adjust_duration`: one day
pub const MAX_DURATION: u32 = 24 * 60;

/// Own duration given to tasks built by the default factory
pub const DEFAULT_DURATION: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// What pressing enter on a row should do
#[derive(Debug, Clone, PartialEq)]
pub enum EnterAction {
    /// Show the task's children as a new view
    DrillDown { new_stack: Vec<TaskNode> },
    /// Open the task's backing note
    OpenFile { path: String },
}

/// Partial metadata update; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub duration: Option<u32>,
    pub is_anchored: Option<bool>,
    pub start_time: Option<Option<NaiveDateTime>>,
    pub status: Option<TaskStatus>,
}

impl MetadataPatch {
    fn apply(&self, task: &mut TaskNode) {
        if let Some(minutes) = self.duration {
            task.set_own_minutes(minutes);
        }
        if let Some(anchored) = self.is_anchored {
            task.is_anchored = anchored;
        }
        if let Some(start) = self.start_time {
            task.start_time = start;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

/// Step up to the next strictly greater entry, or down to the previous
/// strictly smaller one, clamping at both ends of the table
pub fn step_duration(own: u32, dir: Direction) -> u32 {
    match dir {
        Direction::Up => DURATION_STEPS
            .iter()
            .copied()
            .find(|&s| s > own)
            .unwrap_or(DURATION_STEPS[DURATION_STEPS.len() - 1]),
        Direction::Down => DURATION_STEPS
            .iter()
            .rev()
            .copied()
            .find(|&s| s < own)
            .unwrap_or(DURATION_STEPS[0]),
    }
}

/// An edit waiting for a placeholder id to resolve. Receives the resolved
/// task's index at replay time.
type DeferredEdit = Box<dyn FnOnce(&mut StackController, usize)>;

type Clock = Box<dyn Fn() -> NaiveDateTime>;
type UpdateHandler = Box<dyn FnMut(&TaskNode)>;
type CreateHandler = Box<dyn FnMut(&str) -> TaskNode>;

/// Owns the displayed task list and keeps it scheduled across edits.
///
/// Every index-returning operation re-locates its task by id after the
/// schedule pass, since the pass re-sorts the whole list by start time.
pub struct StackController {
    tasks: Vec<TaskNode>,
    frozen: bool,
    /// `set_tasks` payload received while frozen
    pending_tasks: Option<Vec<TaskNode>>,
    /// Edits against placeholder rows, keyed by placeholder token
    deferred: HashMap<u64, Vec<DeferredEdit>>,
    high_pressure: bool,
    recomputes: usize,
    next_token: u64,
    clock: Clock,
    on_task_update: UpdateHandler,
    on_task_create: Option<CreateHandler>,
}

impl StackController {
    pub fn new(clock: impl Fn() -> NaiveDateTime + 'static) -> Self {
        StackController {
            tasks: Vec::new(),
            frozen: false,
            pending_tasks: None,
            deferred: HashMap::new(),
            high_pressure: false,
            recomputes: 0,
            next_token: 1,
            clock: Box::new(clock),
            on_task_update: Box::new(|_| {}),
            on_task_create: None,
        }
    }

    /// Persistence hook invoked with the fresh copy after single-task edits
    pub fn on_update(mut self, handler: impl FnMut(&TaskNode) + 'static) -> Self {
        self.on_task_update = Box::new(handler);
        self
    }

    /// Factory for tasks created from a title. Without one, new rows get
    /// placeholder ids and the default duration.
    pub fn on_create(mut self, factory: impl FnMut(&str) -> TaskNode + 'static) -> Self {
        self.on_task_create = Some(Box::new(factory));
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> &[TaskNode] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Option<&TaskNode> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn index_of(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of schedule passes run so far
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }

    pub fn set_high_pressure(&mut self, high_pressure: bool) {
        self.high_pressure = high_pressure;
    }

    pub fn high_pressure(&self) -> bool {
        self.high_pressure
    }

    /// Edits queued against a placeholder token
    pub fn deferred_count(&self, token: u64) -> usize {
        self.deferred.get(&token).map_or(0, Vec::len)
    }

    /// Hand out a fresh placeholder id
    pub fn next_placeholder(&mut self) -> TaskId {
        let token = self.next_token;
        self.next_token += 1;
        TaskId::Pending(token)
    }

    // -----------------------------------------------------------------------
    // Scheduling and batching
    // -----------------------------------------------------------------------

    fn options(&self) -> ScheduleOptions {
        ScheduleOptions {
            high_pressure: self.high_pressure,
        }
    }

    fn recompute(&mut self) {
        let now = (self.clock)();
        self.tasks = compute_schedule(&self.tasks, now, &self.options());
        self.recomputes += 1;
    }

    /// Recompute unless a batch is in progress
    fn refresh(&mut self) {
        if !self.frozen {
            self.recompute();
        }
    }

    /// Replace the whole list. While frozen the payload is held until `unfreeze`.
    pub fn set_tasks(&mut self, tasks: Vec<TaskNode>) {
        if self.frozen {
            self.pending_tasks = Some(tasks);
            return;
        }
        self.tasks = tasks;
        self.recompute();
    }

    /// Suspend recomputation; edits still apply to the in-memory list
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Resume and run exactly one schedule pass over the held payload, or
    /// over the current list when nothing was held
    pub fn unfreeze(&mut self) {
        if !self.frozen {
            return;
        }
        self.frozen = false;
        if let Some(tasks) = self.pending_tasks.take() {
            self.tasks = tasks;
        }
        self.recompute();
    }

    // -----------------------------------------------------------------------
    // Placeholder identities
    // -----------------------------------------------------------------------

    fn defer(&mut self, token: u64, edit: DeferredEdit) {
        let queue = self.deferred.entry(token).or_default();
        queue.push(edit);
        tracing::debug!(token, queued = queue.len(), "edit deferred until id resolves");
    }

    /// Give a placeholder row its durable id, then replay the edits queued
    /// against it in submission order. Returns the row's final index.
    pub fn resolve_temp_id(&mut self, token: u64, real_id: impl Into<String>) -> Option<usize> {
        let edits = self.deferred.remove(&token).unwrap_or_default();
        let Some(index) = self.index_of(&TaskId::Pending(token)) else {
            tracing::warn!(token, dropped = edits.len(), "placeholder not in current list");
            return None;
        };

        let real_id = TaskId::Persisted(real_id.into());
        let mut renamed = self.tasks[index].clone();
        renamed.id = real_id.clone();
        self.tasks[index] = renamed;

        tracing::debug!(token, id = %real_id, replay = edits.len(), "placeholder resolved");
        for edit in edits {
            if let Some(i) = self.index_of(&real_id) {
                edit(self, i);
            }
        }

        let index = self.index_of(&real_id)?;
        (self.on_task_update)(&self.tasks[index]);
        Some(index)
    }

    // -----------------------------------------------------------------------
    // Single-task edits
    // -----------------------------------------------------------------------

    /// Copy-on-write edit of one task. Placeholder rows queue the edit.
    fn edit_task<F>(&mut self, index: usize, edit: F) -> usize
    where
        F: FnOnce(&mut TaskNode) + 'static,
    {
        let Some(task) = self.tasks.get(index) else {
            return index;
        };
        if let TaskId::Pending(token) = task.id {
            self.defer(
                token,
                Box::new(move |ctl: &mut StackController, i| {
                    ctl.edit_task(i, edit);
                }),
            );
            return index;
        }

        let id = task.id.clone();
        let mut updated = task.clone();
        edit(&mut updated);
        self.tasks[index] = updated;
        self.refresh();

        match self.index_of(&id) {
            Some(new_index) => {
                (self.on_task_update)(&self.tasks[new_index]);
                new_index
            }
            None => index,
        }
    }

    pub fn toggle_anchor(&mut self, index: usize) -> usize {
        self.edit_task(index, |t| t.is_anchored = !t.is_anchored)
    }

    pub fn toggle_status(&mut self, index: usize) -> usize {
        self.edit_task(index, |t| t.status = t.status.toggled())
    }

    pub fn update_task_title(&mut self, index: usize, title: impl Into<String>) -> usize {
        let title = title.into();
        self.edit_task(index, move |t| t.title = title)
    }

    pub fn update_task_metadata(&mut self, index: usize, patch: MetadataPatch) -> usize {
        self.edit_task(index, move |t| patch.apply(t))
    }

    /// Replace the task with `id` wholesale, keeping its id.
    /// Returns `None` when no such task is listed.
    pub fn update_task_by_id(&mut self, id: &TaskId, task: TaskNode) -> Option<usize> {
        let index = self.index_of(id)?;
        Some(self.edit_task(index, move |t| {
            let id = t.id.clone();
            *t = task;
            t.id = id;
        }))
    }

    /// Walk the own duration one step along `DURATION_STEPS`
    pub fn scale_duration(&mut self, index: usize, dir: Direction) -> usize {
        self.edit_task(index, move |t| {
            let next = step_duration(t.own_minutes(), dir);
            t.set_own_minutes(next);
        })
    }

    /// Shift the own duration by `delta` minutes, clamped to
    /// `MIN_DURATION..=MAX_DURATION`
    pub fn adjust_duration(&mut self, index: usize, delta: i64) -> usize {
        self.edit_task(index, move |t| {
            let next = i64::from(t.own_minutes())
                .saturating_add(delta)
                .clamp(i64::from(MIN_DURATION), i64::from(MAX_DURATION));
            t.set_own_minutes(u32::try_from(next).unwrap_or(MAX_DURATION));
        })
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    /// Swap with the nearest floating neighbour in `dir`, jumping anchored
    /// rows. Anchored tasks never move.
    pub fn move_task(&mut self, index: usize, dir: Direction) -> usize {
        let Some(task) = self.tasks.get(index) else {
            return index;
        };
        if task.is_anchored {
            return index;
        }
        let target = match dir {
            Direction::Up => (0..index).rev().find(|&i| !self.tasks[i].is_anchored),
            Direction::Down => (index + 1..self.tasks.len()).find(|&i| !self.tasks[i].is_anchored),
        };
        let Some(target) = target else {
            return index;
        };

        let id = task.id.clone();
        self.tasks.swap(index, target);
        self.refresh();
        self.index_of(&id).unwrap_or(index)
    }

    pub fn move_up(&mut self, index: usize) -> usize {
        self.move_task(index, Direction::Up)
    }

    pub fn move_down(&mut self, index: usize) -> usize {
        self.move_task(index, Direction::Down)
    }

    /// Move a floating task to `to` (clamped). Anchored tasks are refused.
    pub fn move_task_to_index(&mut self, from: usize, to: usize) -> usize {
        let Some(task) = self.tasks.get(from) else {
            return from;
        };
        if task.is_anchored {
            return from;
        }
        let id = task.id.clone();
        let task = self.tasks.remove(from);
        let to = to.min(self.tasks.len());
        self.tasks.insert(to, task);
        self.refresh();
        self.index_of(&id).unwrap_or(to)
    }

    /// Ids of the floating rows in packing order
    pub fn floating_order(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| !t.is_rock())
            .map(|t| t.id.clone())
            .collect()
    }

    /// Rearrange the floating rows named in `order` into that order, using
    /// the slots they currently occupy. Rows not named keep their slot.
    pub fn restore_floating_order(&mut self, order: &[TaskId]) {
        let slots: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_rock() && order.contains(&t.id))
            .map(|(i, _)| i)
            .collect();
        let ordered: Vec<TaskNode> = order
            .iter()
            .filter_map(|id| {
                slots
                    .iter()
                    .map(|&i| &self.tasks[i])
                    .find(|t| &t.id == id)
                    .cloned()
            })
            .collect();
        if ordered.len() != slots.len() {
            tracing::warn!(expected = slots.len(), got = ordered.len(), "order has repeated ids");
            return;
        }
        for (slot, task) in slots.into_iter().zip(ordered) {
            self.tasks[slot] = task;
        }
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Insertion and removal
    // -----------------------------------------------------------------------

    fn create(&mut self, title: &str) -> TaskNode {
        match self.on_task_create.as_mut() {
            Some(factory) => factory(title),
            None => {
                let id = self.next_placeholder();
                TaskNode::new(id, title, DEFAULT_DURATION)
            }
        }
    }

    /// Insert an existing node at `index` (clamped)
    pub fn insert_task(&mut self, index: usize, task: TaskNode) -> usize {
        let id = task.id.clone();
        let at = index.min(self.tasks.len());
        self.tasks.insert(at, task);
        self.refresh();
        self.index_of(&id).unwrap_or(at)
    }

    /// Create a task from `title` and insert it at `index`
    pub fn add_task_at(&mut self, index: usize, title: &str) -> usize {
        let task = self.create(title);
        self.insert_task(index, task)
    }

    /// Create a task from `title` and insert it after `index`
    pub fn insert_after(&mut self, index: usize, title: &str) -> usize {
        self.add_task_at(index.saturating_add(1), title)
    }

    /// Remove and return the task at `index`. Edits queued against a
    /// removed placeholder are dropped.
    pub fn remove_task(&mut self, index: usize) -> Option<TaskNode> {
        if index >= self.tasks.len() {
            return None;
        }
        let removed = self.tasks.remove(index);
        if let TaskId::Pending(token) = removed.id
            && let Some(dropped) = self.deferred.remove(&token)
        {
            tracing::debug!(
                token,
                dropped = dropped.len(),
                "removed placeholder with queued edits"
            );
        }
        self.refresh();
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Enter
    // -----------------------------------------------------------------------

    /// Decide what enter on `index` means without changing anything.
    /// Placeholder and missing rows yield `None`.
    pub fn handle_enter(&self, index: usize, force_open: bool) -> Option<EnterAction> {
        let task = self.tasks.get(index)?;
        let path = task.id.as_path()?.to_string();
        if force_open || task.children.is_empty() {
            return Some(EnterAction::OpenFile { path });
        }
        Some(EnterAction::DrillDown {
            new_stack: task.children.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn task(id: &str, minutes: u32) -> TaskNode {
        TaskNode::new(TaskId::persisted(id), id.to_uppercase(), minutes)
    }

    fn controller(tasks: Vec<TaskNode>) -> StackController {
        let mut ctl = StackController::new(|| at(9, 0));
        ctl.set_tasks(tasks);
        ctl
    }

    fn ids(ctl: &StackController) -> Vec<String> {
        ctl.tasks().iter().map(|t| t.id.to_string()).collect()
    }

    fn recorder() -> (Rc<RefCell<Vec<TaskNode>>>, impl FnMut(&TaskNode) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |t: &TaskNode| sink.borrow_mut().push(t.clone()))
    }

    // --- Durations ---

    #[test]
    fn scale_steps_are_symmetric() {
        let mut ctl = controller(vec![task("a", 30)]);
        let i = ctl.scale_duration(0, Direction::Up);
        assert_eq!(ctl.get(i).unwrap().own_minutes(), 45);
        let i = ctl.scale_duration(i, Direction::Down);
        assert_eq!(ctl.get(i).unwrap().own_minutes(), 30);
    }

    #[test]
    fn scale_clamps_at_table_ends() {
        assert_eq!(step_duration(480, Direction::Up), 480);
        assert_eq!(step_duration(600, Direction::Up), 480);
        assert_eq!(step_duration(2, Direction::Down), 2);
        assert_eq!(step_duration(1, Direction::Down), 2);
        // off-table values snap to the neighbouring step
        assert_eq!(step_duration(37, Direction::Up), 45);
        assert_eq!(step_duration(37, Direction::Down), 30);
    }

    #[test]
    fn adjust_duration_floors_at_two() {
        let mut ctl = controller(vec![task("a", 10)]);
        let i = ctl.adjust_duration(0, -25);
        assert_eq!(ctl.get(i).unwrap().own_minutes(), MIN_DURATION);
        let i = ctl.adjust_duration(i, 13);
        assert_eq!(ctl.get(i).unwrap().own_minutes(), 15);
    }

    #[test]
    fn adjust_duration_extreme_deltas_clamp() {
        let mut ctl = controller(vec![task("a", 30)]);
        let i = ctl.adjust_duration(0, i64::MAX);
        assert_eq!(ctl.get(i).unwrap().own_minutes(), MAX_DURATION);
        let i = ctl.adjust_duration(i, i64::MIN);
        assert_eq!(ctl.get(i).unwrap().own_minutes(), MIN_DURATION);
    }

    #[test]
    fn duration_edit_keeps_rollup() {
        let parent = task("p", 30).with_children(vec![task("c", 30)]);
        let mut ctl = controller(vec![parent]);
        assert_eq!(ctl.get(0).unwrap().duration, 60);
        ctl.scale_duration(0, Direction::Up);
        let p = ctl.get(0).unwrap();
        assert_eq!(p.own_minutes(), 45);
        assert_eq!(p.duration, 75);
    }

    // --- Moves ---

    #[test]
    fn move_up_jumps_anchored_neighbour() {
        let mut ctl = controller(vec![
            task("a", 30),
            task("rock", 30).anchored_at(at(9, 30)),
            task("b", 30),
        ]);
        assert_eq!(ids(&ctl), vec!["a", "rock", "b"]);

        let i = ctl.move_up(2);
        assert_eq!(ids(&ctl), vec!["b", "rock", "a"]);
        assert_eq!(i, 0);
    }

    #[test]
    fn move_at_boundary_is_noop() {
        let mut ctl = controller(vec![task("a", 30), task("b", 30)]);
        let before = ctl.tasks().to_vec();
        let passes = ctl.recompute_count();

        assert_eq!(ctl.move_up(0), 0);
        assert_eq!(ctl.move_down(1), 1);
        assert_eq!(ctl.tasks(), &before[..]);
        assert_eq!(ctl.recompute_count(), passes);
    }

    #[test]
    fn move_blocked_by_anchors_is_noop() {
        let mut ctl = controller(vec![
            task("a", 30),
            task("r1", 30).anchored_at(at(9, 30)),
            task("r2", 30).anchored_at(at(10, 0)),
        ]);
        let before = ctl.tasks().to_vec();
        assert_eq!(ctl.move_down(0), 0);
        assert_eq!(ctl.tasks(), &before[..]);
    }

    #[test]
    fn anchored_tasks_are_immovable() {
        let mut ctl = controller(vec![task("rock", 30).anchored_at(at(9, 0)), task("a", 30)]);
        assert_eq!(ctl.move_down(0), 0);
        assert_eq!(ctl.move_task_to_index(0, 1), 0);
        assert_eq!(ids(&ctl), vec!["rock", "a"]);
    }

    #[test]
    fn move_to_index_reorders_floating() {
        let mut ctl = controller(vec![task("a", 10), task("b", 10), task("c", 10)]);
        let i = ctl.move_task_to_index(0, 2);
        assert_eq!(ids(&ctl), vec!["b", "c", "a"]);
        assert_eq!(i, 2);
    }

    // --- Single-task edits ---

    #[test]
    fn toggle_status_notifies_and_relocates() {
        let (log, sink) = recorder();
        let mut ctl = StackController::new(|| at(9, 0)).on_update(sink);
        ctl.set_tasks(vec![task("a", 30), task("b", 30)]);

        let i = ctl.toggle_status(0);
        assert_eq!(ctl.get(i).unwrap().status, TaskStatus::Done);
        // done takes no time, so `b` now starts at 9:00 as well
        assert_eq!(ctl.get(1).unwrap().start_time, Some(at(9, 0)));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].status, TaskStatus::Done);
    }

    #[test]
    fn toggle_anchor_pins_current_slot() {
        let mut ctl = controller(vec![task("a", 30), task("b", 30)]);
        let i = ctl.toggle_anchor(1);
        let b = ctl.get(i).unwrap();
        assert!(b.is_rock());
        assert_eq!(b.start_time, Some(at(9, 30)));

        // moving `a` down cannot displace the pinned task
        assert_eq!(ctl.move_down(0), 0);
    }

    #[test]
    fn retitle_and_metadata_patch() {
        let mut ctl = controller(vec![task("a", 30)]);
        let i = ctl.update_task_title(0, "Write report");
        assert_eq!(ctl.get(i).unwrap().title, "Write report");

        let i = ctl.update_task_metadata(
            i,
            MetadataPatch {
                duration: Some(90),
                is_anchored: Some(true),
                start_time: Some(Some(at(14, 0))),
                ..Default::default()
            },
        );
        let a = ctl.get(i).unwrap();
        assert_eq!(a.own_minutes(), 90);
        assert_eq!(a.start_time, Some(at(14, 0)));
    }

    #[test]
    fn update_by_id_keeps_identity() {
        let mut ctl = controller(vec![task("a", 30)]);
        let replacement = task("other", 60);
        let i = ctl.update_task_by_id(&TaskId::persisted("a"), replacement).unwrap();
        assert_eq!(ctl.get(i).unwrap().id, TaskId::persisted("a"));
        assert_eq!(ctl.get(i).unwrap().own_minutes(), 60);
        assert!(ctl.update_task_by_id(&TaskId::persisted("zzz"), task("x", 1)).is_none());
    }

    #[test]
    fn out_of_range_edits_are_noops() {
        let mut ctl = controller(vec![task("a", 30)]);
        assert_eq!(ctl.toggle_status(5), 5);
        assert_eq!(ctl.scale_duration(5, Direction::Up), 5);
        assert!(ctl.remove_task(5).is_none());
    }

    // --- Freeze ---

    #[test]
    fn frozen_edits_recompute_once_on_unfreeze() {
        let mut ctl = controller(vec![task("a", 30), task("b", 30), task("c", 30)]);
        let passes = ctl.recompute_count();

        ctl.freeze();
        ctl.toggle_status(0);
        ctl.scale_duration(1, Direction::Up);
        ctl.move_down(0);
        ctl.insert_after(0, "new");
        assert_eq!(ctl.recompute_count(), passes);

        ctl.unfreeze();
        assert_eq!(ctl.recompute_count(), passes + 1);
        ctl.unfreeze();
        assert_eq!(ctl.recompute_count(), passes + 1);
    }

    #[test]
    fn unfreeze_prefers_held_payload() {
        let mut ctl = controller(vec![task("a", 30)]);
        ctl.freeze();
        ctl.set_tasks(vec![task("x", 10), task("y", 10)]);
        assert_eq!(ids(&ctl), vec!["a"]);
        ctl.unfreeze();
        assert_eq!(ids(&ctl), vec!["x", "y"]);
        assert_eq!(ctl.get(1).unwrap().start_time, Some(at(9, 10)));
    }

    // --- Placeholders ---

    #[test]
    fn placeholder_edits_replay_in_order() {
        let (log, sink) = recorder();
        let mut ctl = StackController::new(|| at(9, 0)).on_update(sink);
        ctl.set_tasks(vec![task("a", 30)]);

        let i = ctl.insert_after(0, "draft");
        let TaskId::Pending(token) = ctl.get(i).unwrap().id else {
            panic!("expected placeholder id");
        };

        assert_eq!(ctl.update_task_title(i, "first"), i);
        assert_eq!(ctl.update_task_title(i, "second"), i);
        ctl.scale_duration(i, Direction::Up);
        assert_eq!(ctl.deferred_count(token), 3);
        assert_eq!(ctl.get(i).unwrap().title, "draft");
        assert!(log.borrow().is_empty());

        let i = ctl.resolve_temp_id(token, "draft.md").unwrap();
        let resolved = ctl.get(i).unwrap();
        assert_eq!(resolved.id, TaskId::persisted("draft.md"));
        assert_eq!(resolved.title, "second");
        assert_eq!(resolved.own_minutes(), 45);
        assert_eq!(ctl.deferred_count(token), 0);
        // three replayed edits plus the resolution itself
        assert_eq!(log.borrow().len(), 4);
        assert_eq!(log.borrow().last().unwrap().title, "second");
    }

    #[test]
    fn resolving_twice_replays_nothing() {
        let mut ctl = controller(vec![]);
        let i = ctl.add_task_at(0, "draft");
        let TaskId::Pending(token) = ctl.get(i).unwrap().id else {
            panic!("expected placeholder id");
        };
        ctl.toggle_status(i);
        ctl.resolve_temp_id(token, "draft.md");
        assert_eq!(ctl.get(0).unwrap().status, TaskStatus::Done);

        assert!(ctl.resolve_temp_id(token, "again.md").is_none());
        assert_eq!(ctl.get(0).unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn custom_factory_is_used() {
        let mut ctl = StackController::new(|| at(9, 0))
            .on_create(|title| {
                TaskNode::new(TaskId::persisted(format!("{}.md", title)), title, 15)
            });
        ctl.set_tasks(vec![task("a", 30)]);
        let i = ctl.insert_after(0, "b");
        assert_eq!(ctl.get(i).unwrap().id, TaskId::persisted("b.md"));
        assert_eq!(ctl.get(i).unwrap().start_time, Some(at(9, 30)));
    }

    // --- Enter ---

    #[test]
    fn handle_enter_decisions() {
        let parent = task("p", 30).with_children(vec![task("c", 10)]);
        let mut ctl = controller(vec![parent, task("leaf", 10)]);

        match ctl.handle_enter(0, false) {
            Some(EnterAction::DrillDown { new_stack }) => assert_eq!(new_stack.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            ctl.handle_enter(0, true),
            Some(EnterAction::OpenFile { path: "p".into() })
        );
        assert_eq!(
            ctl.handle_enter(1, false),
            Some(EnterAction::OpenFile { path: "leaf".into() })
        );
        assert_eq!(ctl.handle_enter(9, false), None);

        let i = ctl.insert_after(1, "draft");
        assert_eq!(ctl.handle_enter(i, true), None);
    }
}
