mod init;
pub use init::cmd_init;

use std::cell::RefCell;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{Local, NaiveDateTime, NaiveTime};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::loader::Loader;
use crate::io::state::{self, SessionState};
use crate::io::vault::{ROOT_SOURCE, VaultLoader};
use crate::model::navigation::StackSource;
use crate::model::task::{TaskId, TaskNode};
use crate::ops::command::{Command, History};
use crate::ops::navigation::NavigationManager;
use crate::ops::schedule::{ScheduleOptions, compute_schedule};
use crate::ops::stack::{Direction, EnterAction, StackController};

type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    if let Commands::Init(args) = &cli.command {
        return cmd_init(&resolve_dir(cli.dir.as_deref())?, args);
    }

    let mut session = Session::open(&cli)?;
    let json = cli.json;
    match cli.command {
        // handled before the session opens
        Commands::Init(_) => Ok(()),
        Commands::List => cmd_list(&mut session, json),
        Commands::Show(args) => cmd_show(&session, args, json),
        Commands::Enter(args) => cmd_enter(&mut session, args, json),
        Commands::Back => cmd_back(&mut session, json),
        Commands::Done(args) => cmd_done(&mut session, args, json),
        Commands::Anchor(args) => cmd_anchor(&mut session, args, json),
        Commands::Scale(args) => cmd_scale(&mut session, args, json),
        Commands::Adjust(args) => cmd_adjust(&mut session, args, json),
        Commands::Move(args) => cmd_move(&mut session, args, json),
        Commands::Add(args) => cmd_add(&mut session, args, json),
        Commands::Title(args) => cmd_title(&mut session, args, json),
        Commands::Undo => cmd_undo(&mut session, json),
        Commands::Redo => cmd_redo(&mut session, json),
    }
}

fn resolve_dir(dir: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    match dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

/// `2026-10-16T09:00`, `2026-10-16T09:00:00`, or `09:00` (today)
fn parse_at(at: Option<&str>) -> Result<NaiveDateTime, Box<dyn Error>> {
    let now = Local::now().naive_local();
    let Some(text) = at else {
        return Ok(now);
    };
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(t);
        }
    }
    if let Ok(t) = NaiveTime::parse_from_str(text, "%H:%M") {
        return Ok(now.date().and_time(t));
    }
    Err(format!("invalid --at time: {}", text).into())
}

/// 1-based position → index
fn index_at(position: usize, len: usize) -> Result<usize, Box<dyn Error>> {
    if position == 0 || position > len {
        return Err(format!("no task at position {}", position).into());
    }
    Ok(position - 1)
}

fn direction(way: Way) -> Direction {
    match way {
        Way::Up => Direction::Up,
        Way::Down => Direction::Down,
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Edits reported by the controller, written to the vault on commit
type Outbox = Rc<RefCell<Vec<TaskNode>>>;

struct Session {
    dir: PathBuf,
    nav: NavigationManager<VaultLoader>,
    history: History,
    now: NaiveDateTime,
    options: ScheduleOptions,
}

impl Session {
    fn open(cli: &Cli) -> Result<Session, Box<dyn Error>> {
        let dir = resolve_dir(cli.dir.as_deref())?;
        let config = config_io::read_config(&dir)?;
        let now = parse_at(cli.at.as_deref())?;
        let options = ScheduleOptions {
            high_pressure: cli.high_pressure || config.schedule.high_pressure,
        };
        let vault = VaultLoader::open(&dir.join(&config.vault.file))?;
        let nav = NavigationManager::new(vault)
            .with_preprocessor(move |tasks| compute_schedule(&tasks, now, &options));

        let mut session = Session {
            dir,
            nav,
            history: History::new(),
            now,
            options,
        };
        match state::read_session_state(&session.dir) {
            Some(saved) if saved.navigation.current_source.is_some() => {
                session.nav.set_state(saved.navigation);
                session.history = saved.history;
                session.refresh_current();
            }
            _ => session.reset_to_root()?,
        }
        Ok(session)
    }

    fn schedule(&self, tasks: &[TaskNode]) -> Vec<TaskNode> {
        compute_schedule(tasks, self.now, &self.options)
    }

    fn reset_to_root(&mut self) -> CmdResult {
        let roots = self.nav.loader().load(ROOT_SOURCE)?;
        let stack = self.schedule(&roots);
        self.nav
            .set_stack(stack, Some(StackSource::Path(ROOT_SOURCE.to_string())));
        Ok(())
    }

    /// Reload the view from the vault; keep (and reschedule) the saved copy
    /// if the reload comes back empty
    fn refresh_current(&mut self) {
        if self.nav.reload_current() {
            return;
        }
        let stack = self.schedule(self.nav.current_stack());
        let source = self.nav.current_source().cloned();
        self.nav.set_stack(stack, source);
    }

    fn controller(&self) -> (StackController, Outbox) {
        let outbox: Outbox = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&outbox);
        let now = self.now;
        let mut ctl = StackController::new(move || now)
            .on_update(move |task| sink.borrow_mut().push(task.clone()));
        ctl.set_high_pressure(self.options.high_pressure);
        ctl.set_tasks(self.nav.current_stack().to_vec());
        (ctl, outbox)
    }

    /// The vault key that owns the current view's membership, if any
    fn member_key(&self) -> Option<String> {
        match self.nav.current_source() {
            Some(StackSource::Path(path)) => Some(path.clone()),
            _ => None,
        }
    }

    /// Persist controller edits and adopt its list as the current view
    fn commit(&mut self, ctl: &StackController, outbox: &Outbox) -> CmdResult {
        let member_key = self.member_key();
        let vault = self.nav.loader_mut();
        for task in outbox.borrow().iter() {
            vault.apply_update(task)?;
        }
        if let Some(key) = member_key {
            let ids: Vec<String> = ctl
                .tasks()
                .iter()
                .filter_map(|t| t.id.as_path().map(str::to_string))
                .collect();
            vault.set_members(&key, &ids)?;
        }
        vault.save()?;

        let source = self.nav.current_source().cloned();
        self.nav.set_stack(ctl.tasks().to_vec(), source);
        self.save_state()
    }

    fn save_state(&self) -> CmdResult {
        let snapshot = SessionState {
            navigation: self.nav.get_state(),
            history: self.history.clone(),
        };
        state::write_session_state(&self.dir, &snapshot)?;
        Ok(())
    }

    fn index_at(&self, position: usize) -> Result<usize, Box<dyn Error>> {
        index_at(position, self.nav.current_stack().len())
    }
}

fn print_view(session: &Session, json: bool) -> CmdResult {
    let state = session.nav.get_state();
    let source = state.current_source.as_ref();
    if json {
        let view = view_to_json(&state.current_stack, source, state.depth());
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for line in format_view(&state.current_stack, source, state.depth()) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(session: &mut Session, json: bool) -> CmdResult {
    session.save_state()?;
    print_view(session, json)
}

fn cmd_show(session: &Session, args: PositionArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let task = &session.nav.current_stack()[index];
    if json {
        let out = task_to_json(args.position, task, true);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_task_detail(task) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

fn cmd_enter(session: &mut Session, args: EnterArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (ctl, _) = session.controller();
    match ctl.handle_enter(index, args.open) {
        Some(EnterAction::DrillDown { .. }) => {
            let id = ctl.tasks()[index].id.clone();
            if !session.nav.drill_down(&id, index) {
                return Err(format!("{} has no children", id).into());
            }
            session.save_state()?;
            print_view(session, json)
        }
        Some(EnterAction::OpenFile { path }) => {
            if json {
                println!("{}", serde_json::json!({ "open": path }));
            } else {
                println!("{}", path);
            }
            Ok(())
        }
        None => Err(format!("task at position {} is not saved yet", args.position).into()),
    }
}

fn cmd_back(session: &mut Session, json: bool) -> CmdResult {
    if !session.nav.can_go_back() {
        return Err("already at the top level".into());
    }
    let back = session.nav.go_back();
    tracing::debug!(focused = back.focused_index, "back");
    session.save_state()?;
    print_view(session, json)
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_done(session: &mut Session, args: PositionArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (mut ctl, outbox) = session.controller();
    let before = ctl.tasks()[index].clone();
    ctl.toggle_status(index);
    session.history.push(Command::toggle_status(&before));
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_anchor(session: &mut Session, args: PositionArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (mut ctl, outbox) = session.controller();
    let before = ctl.tasks()[index].clone();
    ctl.toggle_anchor(index);
    session.history.push(Command::toggle_anchor(&before));
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

/// Record a duration edit made through the controller
fn push_duration_change(history: &mut History, before: &TaskNode, after: Option<&TaskNode>) {
    if let Some(after) = after
        && after.own_minutes() != before.own_minutes()
    {
        history.push(Command::set_duration(before, after.own_minutes()));
    }
}

fn cmd_scale(session: &mut Session, args: ScaleArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (mut ctl, outbox) = session.controller();
    let before = ctl.tasks()[index].clone();
    let new_index = ctl.scale_duration(index, direction(args.way));
    push_duration_change(&mut session.history, &before, ctl.get(new_index));
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_adjust(session: &mut Session, args: AdjustArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (mut ctl, outbox) = session.controller();
    let before = ctl.tasks()[index].clone();
    let new_index = ctl.adjust_duration(index, args.delta);
    push_duration_change(&mut session.history, &before, ctl.get(new_index));
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_move(session: &mut Session, args: MoveArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (mut ctl, outbox) = session.controller();
    let task_id = ctl.tasks()[index].id.clone();
    let old_order = ctl.floating_order();
    ctl.move_task(index, direction(args.way));
    let new_order = ctl.floating_order();
    if new_order == old_order {
        return Err(format!("task at position {} cannot move that way", args.position).into());
    }
    session.history.push(Command::Move {
        task_id,
        old_order,
        new_order,
    });
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_add(session: &mut Session, args: AddArgs, json: bool) -> CmdResult {
    let parent = session
        .member_key()
        .ok_or("tasks can only be added to a note's view")?;
    let (mut ctl, outbox) = session.controller();

    // The row goes in under a placeholder id until the vault allocates one
    let index = match args.after {
        Some(position) => {
            let after = index_at(position, ctl.len())?;
            ctl.insert_after(after, &args.title)
        }
        None => ctl.add_task_at(ctl.len(), &args.title),
    };
    let TaskId::Pending(token) = ctl.tasks()[index].id else {
        return Err("new task already has an id".into());
    };
    let real_id = session.nav.loader_mut().create(&args.title, &parent)?;
    let index = ctl
        .resolve_temp_id(token, real_id.clone())
        .ok_or_else(|| format!("lost track of new task {}", real_id))?;

    if let Some(cmd) = Command::inserted(&ctl, index) {
        session.history.push(cmd);
    }
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_title(session: &mut Session, args: TitleArgs, json: bool) -> CmdResult {
    let index = session.index_at(args.position)?;
    let (mut ctl, outbox) = session.controller();
    let before = ctl.tasks()[index].clone();
    ctl.update_task_title(index, args.title.clone());
    session.history.push(Command::retitle(&before, args.title));
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_undo(session: &mut Session, json: bool) -> CmdResult {
    let (mut ctl, outbox) = session.controller();
    match session.history.undo(&mut ctl) {
        None => return Err("nothing to undo".into()),
        Some(None) => eprintln!("undone, but the task is not in this view"),
        Some(Some(_)) => {}
    }
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}

fn cmd_redo(session: &mut Session, json: bool) -> CmdResult {
    let (mut ctl, outbox) = session.controller();
    match session.history.redo(&mut ctl) {
        None => return Err("nothing to redo".into()),
        Some(None) => eprintln!("redone, but the task is not in this view"),
        Some(Some(_)) => {}
    }
    session.commit(&ctl, &outbox)?;
    print_view(session, json)
}
