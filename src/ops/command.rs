use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::task::{TaskId, TaskNode, TaskStatus};
use crate::ops::stack::{MetadataPatch, StackController};

const UNDO_STACK_LIMIT: usize = 500;

/// A single undoable edit, holding enough prior state to invert it exactly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    StatusChange {
        task_id: TaskId,
        old_status: TaskStatus,
        new_status: TaskStatus,
    },
    AnchorChange {
        task_id: TaskId,
        was_anchored: bool,
        /// Start time before the change, restored on undo
        old_start: Option<NaiveDateTime>,
    },
    TitleEdit {
        task_id: TaskId,
        old_title: String,
        new_title: String,
    },
    DurationChange {
        task_id: TaskId,
        old_minutes: u32,
        new_minutes: u32,
    },
    /// Reorder among floating rows. Sorted positions shift around anchored
    /// rows on every pass, so the packing order is kept by id instead.
    Move {
        task_id: TaskId,
        old_order: Vec<TaskId>,
        new_order: Vec<TaskId>,
    },
    /// `order` is the floating order right after the insert
    Insert {
        index: usize,
        task: TaskNode,
        #[serde(default)]
        order: Vec<TaskId>,
    },
    /// `order` is the floating order right before the removal
    Remove {
        index: usize,
        task: TaskNode,
        #[serde(default)]
        order: Vec<TaskId>,
    },
}

impl Command {
    pub fn toggle_status(task: &TaskNode) -> Self {
        Command::StatusChange {
            task_id: task.id.clone(),
            old_status: task.status,
            new_status: task.status.toggled(),
        }
    }

    pub fn toggle_anchor(task: &TaskNode) -> Self {
        Command::AnchorChange {
            task_id: task.id.clone(),
            was_anchored: task.is_anchored,
            old_start: task.start_time,
        }
    }

    pub fn retitle(task: &TaskNode, new_title: impl Into<String>) -> Self {
        Command::TitleEdit {
            task_id: task.id.clone(),
            old_title: task.title.clone(),
            new_title: new_title.into(),
        }
    }

    pub fn set_duration(task: &TaskNode, new_minutes: u32) -> Self {
        Command::DurationChange {
            task_id: task.id.clone(),
            old_minutes: task.own_minutes(),
            new_minutes,
        }
    }

    /// Record an insert that just landed at `index`
    pub fn inserted(ctl: &StackController, index: usize) -> Option<Self> {
        Some(Command::Insert {
            index,
            task: ctl.get(index)?.clone(),
            order: ctl.floating_order(),
        })
    }

    /// Record a removal before it happens
    pub fn removing(ctl: &StackController, index: usize) -> Option<Self> {
        Some(Command::Remove {
            index,
            task: ctl.get(index)?.clone(),
            order: ctl.floating_order(),
        })
    }

    /// The id this command navigates to after undo/redo
    pub fn task_id(&self) -> &TaskId {
        match self {
            Command::StatusChange { task_id, .. }
            | Command::AnchorChange { task_id, .. }
            | Command::TitleEdit { task_id, .. }
            | Command::DurationChange { task_id, .. }
            | Command::Move { task_id, .. } => task_id,
            Command::Insert { task, .. } | Command::Remove { task, .. } => &task.id,
        }
    }

    /// Run the forward transition. Returns the affected task's index, or
    /// `None` when the task is not in the controller's list.
    pub fn apply(&self, ctl: &mut StackController) -> Option<usize> {
        match self {
            Command::StatusChange {
                task_id,
                new_status,
                ..
            } => set_status(ctl, task_id, *new_status),
            Command::AnchorChange {
                task_id,
                was_anchored,
                old_start,
            } => {
                let index = ctl.index_of(task_id)?;
                // pinning happens at the slot the task held when first pinned
                let start_time = (!was_anchored).then_some(*old_start);
                Some(ctl.update_task_metadata(
                    index,
                    MetadataPatch {
                        is_anchored: Some(!was_anchored),
                        start_time,
                        ..Default::default()
                    },
                ))
            }
            Command::TitleEdit {
                task_id, new_title, ..
            } => {
                let index = ctl.index_of(task_id)?;
                Some(ctl.update_task_title(index, new_title.clone()))
            }
            Command::DurationChange {
                task_id,
                new_minutes,
                ..
            } => set_minutes(ctl, task_id, *new_minutes),
            Command::Move {
                task_id, new_order, ..
            } => {
                ctl.index_of(task_id)?;
                ctl.restore_floating_order(new_order);
                ctl.index_of(task_id)
            }
            Command::Insert { index, task, order } => insert_ordered(ctl, *index, task, order),
            Command::Remove { task, .. } => {
                let index = ctl.index_of(&task.id)?;
                ctl.remove_task(index).map(|_| index)
            }
        }
    }

    /// Run the inverse transition
    pub fn invert(&self, ctl: &mut StackController) -> Option<usize> {
        match self {
            Command::StatusChange {
                task_id,
                old_status,
                ..
            } => set_status(ctl, task_id, *old_status),
            Command::AnchorChange {
                task_id,
                was_anchored,
                old_start,
            } => {
                let index = ctl.index_of(task_id)?;
                Some(ctl.update_task_metadata(
                    index,
                    MetadataPatch {
                        is_anchored: Some(*was_anchored),
                        start_time: Some(*old_start),
                        ..Default::default()
                    },
                ))
            }
            Command::TitleEdit {
                task_id, old_title, ..
            } => {
                let index = ctl.index_of(task_id)?;
                Some(ctl.update_task_title(index, old_title.clone()))
            }
            Command::DurationChange {
                task_id,
                old_minutes,
                ..
            } => set_minutes(ctl, task_id, *old_minutes),
            Command::Move {
                task_id, old_order, ..
            } => {
                ctl.index_of(task_id)?;
                ctl.restore_floating_order(old_order);
                ctl.index_of(task_id)
            }
            Command::Insert { task, .. } => {
                let index = ctl.index_of(&task.id)?;
                ctl.remove_task(index).map(|_| index)
            }
            Command::Remove { index, task, order } => insert_ordered(ctl, *index, task, order),
        }
    }
}

fn insert_ordered(
    ctl: &mut StackController,
    index: usize,
    task: &TaskNode,
    order: &[TaskId],
) -> Option<usize> {
    let index = ctl.insert_task(index, task.clone());
    if order.is_empty() {
        return Some(index);
    }
    ctl.restore_floating_order(order);
    ctl.index_of(&task.id)
}

fn set_status(ctl: &mut StackController, id: &TaskId, status: TaskStatus) -> Option<usize> {
    let index = ctl.index_of(id)?;
    Some(ctl.update_task_metadata(
        index,
        MetadataPatch {
            status: Some(status),
            ..Default::default()
        },
    ))
}

fn set_minutes(ctl: &mut StackController, id: &TaskId, minutes: u32) -> Option<usize> {
    let index = ctl.index_of(id)?;
    Some(ctl.update_task_metadata(
        index,
        MetadataPatch {
            duration: Some(minutes),
            ..Default::default()
        },
    ))
}

/// The undo/redo stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    undo: Vec<Command>,
    #[serde(default)]
    redo: Vec<Command>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Record an already-applied command. Clears the redo stack.
    pub fn push(&mut self, cmd: Command) {
        self.undo.push(cmd);
        if self.undo.len() > UNDO_STACK_LIMIT {
            self.undo.drain(..self.undo.len() - UNDO_STACK_LIMIT);
        }
        self.redo.clear();
    }

    /// Apply `cmd` and record it
    pub fn perform(&mut self, ctl: &mut StackController, cmd: Command) -> Option<usize> {
        let index = cmd.apply(ctl);
        self.push(cmd);
        index
    }

    /// Undo the last command. The outer `None` means the stack was empty;
    /// the inner one means the task is not in the current list.
    pub fn undo(&mut self, ctl: &mut StackController) -> Option<Option<usize>> {
        let cmd = self.undo.pop()?;
        let index = cmd.invert(ctl);
        self.redo.push(cmd);
        Some(index)
    }

    /// Redo the last undone command
    pub fn redo(&mut self, ctl: &mut StackController) -> Option<Option<usize>> {
        let cmd = self.redo.pop()?;
        let index = cmd.apply(ctl);
        self.undo.push(cmd);
        Some(index)
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn peek_last_undo(&self) -> Option<&Command> {
        self.undo.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::stack::Direction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn new_history_is_empty() {
        let mut ctl = controller(vec![]);
        let mut history = History::new();
        assert!(history.is_empty());
        assert_eq!(history.undo(&mut ctl), None);
        assert_eq!(history.redo(&mut ctl), None);
    }

    #[test]
    fn push_clears_redo() {
        let mut ctl = controller(vec![task("a", 30)]);
        let mut history = History::new();
        let cmd = Command::toggle_status(ctl.get(0).unwrap());
        history.perform(&mut ctl, cmd);
        history.undo(&mut ctl);
        assert!(history.can_redo());

        let cmd = Command::retitle(ctl.get(0).unwrap(), "x");
        history.perform(&mut ctl, cmd);
        assert!(!history.can_redo());
    }

    #[test]
    fn stack_limit_enforcement() {
        let mut history = History::new();
        let t = task("a", 30);
        for i in 0..UNDO_STACK_LIMIT + 10 {
            history.push(Command::retitle(&t, format!("t{}", i)));
        }
        assert_eq!(history.undo.len(), UNDO_STACK_LIMIT);
        match history.peek_last_undo() {
            Some(Command::TitleEdit { new_title, .. }) => {
                assert_eq!(new_title, &format!("t{}", UNDO_STACK_LIMIT + 9))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn status_undo_redo() {
        let mut ctl = controller(vec![task("a", 30)]);
        let mut history = History::new();
        let cmd = Command::toggle_status(ctl.get(0).unwrap());
        history.perform(&mut ctl, cmd);
        assert_eq!(ctl.get(0).unwrap().status, TaskStatus::Done);

        history.undo(&mut ctl);
        assert_eq!(ctl.get(0).unwrap().status, TaskStatus::Todo);
        history.redo(&mut ctl);
        assert_eq!(ctl.get(0).unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn anchor_undo_restores_start() {
        let mut ctl = controller(vec![task("a", 30), task("b", 30)]);
        let mut history = History::new();
        let cmd = Command::toggle_anchor(ctl.get(1).unwrap());
        let i = history.perform(&mut ctl, cmd).unwrap();
        assert!(ctl.get(i).unwrap().is_rock());

        let i = history.undo(&mut ctl).flatten().unwrap();
        let b = ctl.get(i).unwrap();
        assert!(!b.is_anchored);
        assert_eq!(b.start_time, Some(at(9, 30)));
    }

    #[test]
    fn duration_undo_matches_scale() {
        let mut ctl = controller(vec![task("a", 30)]);
        let mut history = History::new();
        let cmd = Command::set_duration(ctl.get(0).unwrap(), 45);
        history.perform(&mut ctl, cmd);
        assert_eq!(ctl.get(0).unwrap().own_minutes(), 45);

        history.undo(&mut ctl);
        assert_eq!(ctl.get(0).unwrap().own_minutes(), 30);
        ctl.scale_duration(0, Direction::Up);
        assert_eq!(ctl.get(0).unwrap().own_minutes(), 45);
    }

    /// a 09:00, rock 09:10-09:40, b pushed past the rock to 09:40
    fn with_rock() -> StackController {
        controller(vec![
            task("a", 5),
            task("b", 20),
            task("rock", 30).anchored_at(at(9, 10)),
        ])
    }

    fn floating(ctl: &StackController) -> Vec<String> {
        ctl.floating_order().iter().map(|id| id.to_string()).collect()
    }

    /// Undo restores `before` exactly, redo restores the edited list exactly
    fn assert_round_trip(ctl: &mut StackController, history: &mut History, before: &[TaskNode]) {
        let after = ctl.tasks().to_vec();
        assert_ne!(after, before, "command changed nothing");

        assert!(history.undo(ctl).is_some());
        assert_eq!(ctl.tasks(), before);
        assert!(history.redo(ctl).is_some());
        assert_eq!(ctl.tasks(), &after[..]);
        assert!(history.undo(ctl).is_some());
        assert_eq!(ctl.tasks(), before);
    }

    #[test]
    fn move_across_rock_undo_redo() {
        let mut ctl = with_rock();
        let mut history = History::new();
        assert_eq!(ids(&ctl), vec!["a", "rock", "b"]);
        let before = ctl.tasks().to_vec();

        let old_order = ctl.floating_order();
        ctl.move_up(2);
        history.push(Command::Move {
            task_id: TaskId::persisted("b"),
            old_order,
            new_order: ctl.floating_order(),
        });
        assert_eq!(floating(&ctl), vec!["b", "a"]);

        history.undo(&mut ctl);
        assert_eq!(floating(&ctl), vec!["a", "b"]);
        history.redo(&mut ctl);
        assert_eq!(floating(&ctl), vec!["b", "a"]);

        history.undo(&mut ctl);
        history.redo(&mut ctl);
        assert_round_trip(&mut ctl, &mut history, &before);
    }

    #[test]
    fn status_round_trip_with_rock() {
        let mut ctl = with_rock();
        let mut history = History::new();
        let before = ctl.tasks().to_vec();
        let cmd = Command::toggle_status(ctl.get(0).unwrap());
        history.perform(&mut ctl, cmd);
        assert_round_trip(&mut ctl, &mut history, &before);
    }

    #[test]
    fn pin_round_trip_with_rock() {
        let mut ctl = with_rock();
        let mut history = History::new();
        let before = ctl.tasks().to_vec();
        let b = ctl.get(2).unwrap();
        assert_eq!(b.start_time, Some(at(9, 40)));
        let cmd = Command::toggle_anchor(b);
        let i = history.perform(&mut ctl, cmd).unwrap();
        assert!(ctl.get(i).unwrap().is_rock());
        assert_eq!(ctl.get(i).unwrap().start_time, Some(at(9, 40)));
        assert_round_trip(&mut ctl, &mut history, &before);
    }

    #[test]
    fn unpin_round_trip_restores_rock_start() {
        let mut ctl = with_rock();
        let mut history = History::new();
        let before = ctl.tasks().to_vec();
        let cmd = Command::toggle_anchor(ctl.get(1).unwrap());
        history.perform(&mut ctl, cmd);
        assert_eq!(floating(&ctl), vec!["a", "rock", "b"]);
        assert_round_trip(&mut ctl, &mut history, &before);
        assert_eq!(ctl.get(1).unwrap().start_time, Some(at(9, 10)));
    }

    #[test]
    fn title_and_duration_round_trip_with_rock() {
        let mut ctl = with_rock();
        let mut history = History::new();
        let before = ctl.tasks().to_vec();
        let cmd = Command::retitle(ctl.get(0).unwrap(), "renamed");
        history.perform(&mut ctl, cmd);
        assert_round_trip(&mut ctl, &mut history, &before);

        // growing a pushes b further out
        let cmd = Command::set_duration(ctl.get(0).unwrap(), 60);
        history.perform(&mut ctl, cmd);
        assert_round_trip(&mut ctl, &mut history, &before);
    }

    #[test]
    fn insert_round_trip_with_rock() {
        let mut ctl = with_rock();
        let mut history = History::new();
        let before = ctl.tasks().to_vec();

        let i = ctl.add_task_at(1, "new");
        history.push(Command::inserted(&ctl, i).unwrap());
        let new_id = ctl.get(i).unwrap().id.to_string();
        assert_eq!(floating(&ctl), vec!["a".to_string(), new_id, "b".to_string()]);
        assert_round_trip(&mut ctl, &mut history, &before);
    }

    #[test]
    fn remove_round_trip_with_rock() {
        let mut ctl = with_rock();
        let mut history = History::new();
        let before = ctl.tasks().to_vec();

        let cmd = Command::removing(&ctl, 0).unwrap();
        history.perform(&mut ctl, cmd);
        assert_eq!(ids(&ctl), vec!["rock", "b"]);
        assert_round_trip(&mut ctl, &mut history, &before);
    }

    #[test]
    fn insert_without_order_uses_index() {
        let mut ctl = controller(vec![task("a", 10), task("b", 10)]);
        let mut history = History::new();
        history.perform(
            &mut ctl,
            Command::Insert {
                index: 1,
                task: task("new", 10),
                order: Vec::new(),
            },
        );
        assert_eq!(ids(&ctl), vec!["a", "new", "b"]);
        history.undo(&mut ctl);
        assert_eq!(ids(&ctl), vec!["a", "b"]);
    }

    #[test]
    fn undo_of_missing_task_reports_none() {
        let mut ctl = controller(vec![task("a", 30)]);
        let mut history = History::new();
        history.push(Command::toggle_status(&task("gone", 30)));
        assert_eq!(history.undo(&mut ctl), Some(None));
    }

    #[test]
    fn history_serde_round_trip() {
        let mut history = History::new();
        history.push(Command::toggle_anchor(&task("a", 30).anchored_at(at(9, 0))));
        let json = serde_json::to_string(&history).unwrap();
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
