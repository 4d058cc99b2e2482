use clap::{Args, Parser, Subcommand};

use keyareas_core::PriorityLevel;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "keyareas",
    version,
    about = "Plan tasks by key area and urgency from the terminal.",
    after_help = "Examples:\n  keyareas backlog\n  keyareas quadrants --json\n  keyareas done 42\n  keyareas assign a7 Me --activity\n  keyareas due 42 fri\n  keyareas --offline promote a2"
)]
pub struct Cli {
    /// Base URL of the task API (defaults to KEYAREAS_API_URL, then the config file)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Work against built-in sample data instead of the API
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the tracing filter (e.g. "info", "debug", or full directives)
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// List tasks, optionally narrowed to a key area or goal
    Tasks(TaskListArgs),
    /// List the "Don't Forget" backlog (tasks without a key area)
    Backlog,
    /// Group tasks into the four urgency/importance quadrants
    Quadrants(QuadrantArgs),
    /// List activities, optionally for one task
    Activities(ActivityListArgs),
    /// Mark a task or activity completed
    Done(TargetArgs),
    /// Mark a task or activity open again
    Reopen(TargetArgs),
    /// Change priority
    Priority(PriorityArgs),
    /// Change or clear the assignee
    Assign(AssignArgs),
    /// Change or clear the deadline
    Due(DueArgs),
    /// Move a backlog task into a key area
    Move(MoveArgs),
    /// Turn an activity into a standalone task
    Promote(PromoteArgs),
    /// List users
    Users,
    /// List goals, or show one
    Goals(GoalArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskListArgs {
    /// Only tasks in this key area
    #[arg(long = "key-area", value_name = "ID", conflicts_with = "goal")]
    pub key_area: Option<String>,

    /// Only tasks linked to this goal
    #[arg(long, value_name = "ID")]
    pub goal: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct QuadrantArgs {
    /// Classify as of this day (ISO, today, +3d, mon)
    #[arg(long, value_name = "DATE")]
    pub today: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ActivityListArgs {
    /// Only activities belonging to this task
    #[arg(long, value_name = "ID")]
    pub task: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Task id (or activity id with --activity)
    #[arg(value_name = "ID")]
    pub id: String,

    /// Treat ID as an activity
    #[arg(long)]
    pub activity: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PriorityArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// low, normal, high (or 1-3)
    #[arg(value_name = "LEVEL", value_enum)]
    pub level: PriorityLevel,
}

#[derive(Args, Debug, Clone)]
pub struct AssignArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Name, "Me", or omit to clear
    #[arg(value_name = "ASSIGNEE")]
    pub assignee: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DueArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Deadline (ISO e.g. 2025-12-24, today, +3d, mon); omit to clear
    #[arg(value_name = "DATE")]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    /// Task id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Destination key area id
    #[arg(value_name = "KEY_AREA")]
    pub key_area: String,
}

#[derive(Args, Debug, Clone)]
pub struct PromoteArgs {
    /// Activity id
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GoalArgs {
    /// Show a single goal
    #[arg(value_name = "ID")]
    pub id: Option<String>,
}
