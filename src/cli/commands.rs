use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "tb",
    about = concat!(
        "timeblock v",
        env!("CARGO_PKG_VERSION"),
        " - plan the day around what is fixed"
    ),
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,

    /// Schedule from this time instead of now (e.g. 2026-10-16T09:00 or 09:00)
    #[arg(long, global = true)]
    pub at: Option<String>,

    /// Pass the high-pressure hint to the scheduler
    #[arg(long, global = true)]
    pub high_pressure: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create timeblock.toml and an empty vault in the current directory
    Init(InitArgs),
    /// Show the scheduled view
    List,
    /// Show one task with its rollup trace
    Show(PositionArgs),
    /// Drill into a task's children (or print its note path)
    Enter(EnterArgs),
    /// Return to the previous view
    Back,
    /// Toggle a task between todo and done
    Done(PositionArgs),
    /// Pin a task at its current start time, or unpin it
    Anchor(PositionArgs),
    /// Step a task's duration along the duration table
    Scale(ScaleArgs),
    /// Add or subtract minutes from a task's duration
    Adjust(AdjustArgs),
    /// Move a floating task past its floating neighbour
    Move(MoveArgs),
    /// Add a task to the current view
    Add(AddArgs),
    /// Change a task's title
    Title(TitleArgs),
    /// Undo the last edit
    Undo,
    /// Redo the last undone edit
    Redo,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config and vault
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct PositionArgs {
    /// 1-based position in the current view
    pub position: usize,
}

#[derive(Args)]
pub struct EnterArgs {
    /// 1-based position in the current view
    pub position: usize,
    /// Print the note path even if the task has children
    #[arg(long)]
    pub open: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Way {
    Up,
    Down,
}

#[derive(Args)]
pub struct ScaleArgs {
    pub position: usize,
    #[arg(value_enum)]
    pub way: Way,
}

#[derive(Args)]
pub struct AdjustArgs {
    pub position: usize,
    /// Minutes to add (negative to subtract)
    #[arg(allow_hyphen_values = true)]
    pub delta: i64,
}

#[derive(Args)]
pub struct MoveArgs {
    pub position: usize,
    #[arg(value_enum)]
    pub way: Way,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Insert after this position (default: end of the view)
    #[arg(long)]
    pub after: Option<usize>,
}

#[derive(Args)]
pub struct TitleArgs {
    pub position: usize,
    pub title: String,
}
