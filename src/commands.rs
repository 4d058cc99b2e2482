use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use keyareas_core::dates::{self, format_date, parse_date_spec};
use keyareas_core::{
    Activity, ActivityBoard, ActivityFilter, EventBus, FieldChange, MutationOutcome, Placement,
    PriorityLevel, Quadrant, Services, Task, TaskBoard, TaskFilter, UiStatus,
};

use crate::cli::{
    ActivityListArgs, AssignArgs, CliCommand, DueArgs, GoalArgs, MoveArgs, PriorityArgs,
    PromoteArgs, QuadrantArgs, TargetArgs, TaskListArgs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn execute<W: Write>(
    services: &Services,
    command: CliCommand,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    match command {
        CliCommand::Tasks(args) => handle_tasks(services, &args, format, &mut writer).await,
        CliCommand::Backlog => handle_backlog(services, format, &mut writer).await,
        CliCommand::Quadrants(args) => handle_quadrants(services, &args, format, &mut writer).await,
        CliCommand::Activities(args) => {
            handle_activities(services, &args, format, &mut writer).await
        }
        CliCommand::Done(args) => handle_completion(services, &args, true, &mut writer).await,
        CliCommand::Reopen(args) => handle_completion(services, &args, false, &mut writer).await,
        CliCommand::Priority(args) => handle_priority(services, &args, &mut writer).await,
        CliCommand::Assign(args) => handle_assign(services, &args, &mut writer).await,
        CliCommand::Due(args) => handle_due(services, &args, &mut writer).await,
        CliCommand::Move(args) => handle_move(services, &args, &mut writer).await,
        CliCommand::Promote(args) => handle_promote(services, &args, format, &mut writer).await,
        CliCommand::Users => handle_users(services, format, &mut writer).await,
        CliCommand::Goals(args) => handle_goals(services, &args, format, &mut writer).await,
    }
}

async fn load_tasks(services: &Services, filter: &TaskFilter) -> Result<TaskBoard> {
    let board = TaskBoard::new(services.clone(), EventBus::new());
    board.load(filter).await.context("failed to load tasks")?;
    Ok(board)
}

async fn load_activities(services: &Services, filter: &ActivityFilter) -> Result<ActivityBoard> {
    let board = ActivityBoard::new(services.clone(), EventBus::new());
    board
        .load(filter)
        .await
        .context("failed to load activities")?;
    Ok(board)
}

async fn handle_tasks<W: Write>(
    services: &Services,
    args: &TaskListArgs,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let filter = match (&args.key_area, &args.goal) {
        (Some(key_area), _) => TaskFilter::KeyArea(key_area.clone()),
        (None, Some(goal)) => TaskFilter::Goal(goal.clone()),
        (None, None) => TaskFilter::All,
    };
    let board = load_tasks(services, &filter).await?;
    write_tasks(&board.tasks(), format, &mut writer)
}

async fn handle_backlog<W: Write>(
    services: &Services,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let board = load_tasks(services, &TaskFilter::DontForget).await?;
    write_tasks(&board.dont_forget(), format, &mut writer)
}

#[derive(Serialize)]
struct QuadrantGroup<'a> {
    quadrant: u8,
    title: &'static str,
    color: &'static str,
    tasks: &'a [Task],
}

async fn handle_quadrants<W: Write>(
    services: &Services,
    args: &QuadrantArgs,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let today = match &args.today {
        Some(spec) => parse_date_spec(spec, dates::today())?,
        None => dates::today(),
    };
    let board = load_tasks(services, &TaskFilter::All).await?;
    let buckets = board.quadrants(today);

    if format == OutputFormat::Json {
        let groups: Vec<_> = buckets
            .iter()
            .map(|(quadrant, tasks)| QuadrantGroup {
                quadrant: quadrant.number(),
                title: quadrant.title(),
                color: quadrant.color_class(),
                tasks,
            })
            .collect();
        return write_json(&groups, &mut writer);
    }

    for quadrant in Quadrant::ALL {
        let tasks = buckets.get(&quadrant).map(Vec::as_slice).unwrap_or(&[]);
        writeln!(writer, "{} [{}]", quadrant, quadrant.color_class())?;
        if tasks.is_empty() {
            writeln!(writer, "  (empty)")?;
        }
        for task in tasks {
            writeln!(writer, "  {}", TaskLine(task))?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ActivityView<'a> {
    #[serde(flatten)]
    activity: &'a Activity,
    effective_priority: PriorityLevel,
    effective_assignee: Option<&'a str>,
}

async fn handle_activities<W: Write>(
    services: &Services,
    args: &ActivityListArgs,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let filter = match &args.task {
        Some(task) => ActivityFilter::Task(task.clone()),
        None => ActivityFilter::All,
    };
    let activities = load_activities(services, &filter).await?.activities();
    let tasks = load_tasks(services, &TaskFilter::All).await?.tasks();
    let parents: HashMap<&str, &Task> = tasks.iter().map(|task| (task.id.as_str(), task)).collect();

    let views: Vec<_> = activities
        .iter()
        .map(|activity| {
            let parent = activity
                .task_id
                .as_deref()
                .and_then(|id| parents.get(id).copied());
            ActivityView {
                activity,
                effective_priority: activity.effective_priority(parent),
                effective_assignee: activity.effective_assignee(parent),
            }
        })
        .collect();

    if format == OutputFormat::Json {
        return write_json(&views, &mut writer);
    }
    if views.is_empty() {
        writeln!(writer, "No activities")?;
    }
    for view in &views {
        writeln!(writer, "{}", ActivityLine(view))?;
    }
    Ok(())
}

async fn handle_completion<W: Write>(
    services: &Services,
    target: &TargetArgs,
    done: bool,
    mut writer: W,
) -> Result<()> {
    let verb = if done { "marked done" } else { "reopened" };
    if target.activity {
        let board = load_activities(services, &ActivityFilter::All).await?;
        let activity = board
            .get(&target.id)
            .ok_or_else(|| anyhow!("Activity '{}' not found", target.id))?;
        if activity.completed == done {
            writeln!(writer, "Activity {} is already {}", target.id, status_word(done))?;
            return Ok(());
        }
        let outcome = board.toggle_completed(&target.id).await;
        return report(&outcome, Kind::Activity, &target.id, verb, &mut writer);
    }

    let board = load_tasks(services, &TaskFilter::All).await?;
    let task = board
        .get(&target.id)
        .ok_or_else(|| anyhow!("Task '{}' not found", target.id))?;
    if task.completed == done {
        writeln!(writer, "Task {} is already {}", target.id, status_word(done))?;
        return Ok(());
    }
    let outcome = board.toggle_completed(&target.id).await;
    report(&outcome, Kind::Task, &target.id, verb, &mut writer)
}

async fn handle_priority<W: Write>(
    services: &Services,
    args: &PriorityArgs,
    mut writer: W,
) -> Result<()> {
    let verb = format!("set to {} priority", args.level.label());
    apply_change(
        services,
        &args.target,
        FieldChange::Priority(args.level),
        &verb,
        &mut writer,
    )
    .await
}

async fn handle_assign<W: Write>(
    services: &Services,
    args: &AssignArgs,
    mut writer: W,
) -> Result<()> {
    let verb = match &args.assignee {
        Some(assignee) => format!("assigned to {}", assignee.trim()),
        None => "unassigned".to_string(),
    };
    apply_change(
        services,
        &args.target,
        FieldChange::Assignee(args.assignee.clone()),
        &verb,
        &mut writer,
    )
    .await
}

async fn handle_due<W: Write>(services: &Services, args: &DueArgs, mut writer: W) -> Result<()> {
    let (raw, verb) = match &args.date {
        Some(spec) => {
            let date = format_date(parse_date_spec(spec, dates::today())?);
            let verb = format!("due {}", date);
            (date, verb)
        }
        None => (String::new(), "deadline cleared".to_string()),
    };
    apply_change(
        services,
        &args.target,
        FieldChange::Deadline(raw),
        &verb,
        &mut writer,
    )
    .await
}

async fn apply_change<W: Write>(
    services: &Services,
    target: &TargetArgs,
    change: FieldChange,
    verb: &str,
    mut writer: W,
) -> Result<()> {
    if target.activity {
        let board = load_activities(services, &ActivityFilter::All).await?;
        let outcome = board.update_field(&target.id, change).await;
        report(&outcome, Kind::Activity, &target.id, verb, &mut writer)
    } else {
        let board = load_tasks(services, &TaskFilter::All).await?;
        let outcome = board.update_field(&target.id, change).await;
        report(&outcome, Kind::Task, &target.id, verb, &mut writer)
    }
}

async fn handle_move<W: Write>(services: &Services, args: &MoveArgs, mut writer: W) -> Result<()> {
    let board = load_tasks(services, &TaskFilter::All).await?;
    if let Some(task) = board.get(&args.id) {
        if task.key_area_id() == Some(args.key_area.as_str()) {
            writeln!(writer, "Task {} is already in {}", args.id, args.key_area)?;
            return Ok(());
        }
    }
    let outcome = board.move_to_key_area(&args.id, &args.key_area).await;
    let verb = format!("moved to {}", args.key_area);
    report(&outcome, Kind::Task, &args.id, &verb, &mut writer)
}

async fn handle_promote<W: Write>(
    services: &Services,
    args: &PromoteArgs,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let activities = load_activities(services, &ActivityFilter::All).await?;
    let tasks = load_tasks(services, &TaskFilter::All).await?;
    let parent = activities
        .get(&args.id)
        .and_then(|activity| activity.task_id)
        .and_then(|task_id| tasks.get(&task_id));

    let task = activities.promote(&args.id, parent.as_ref()).await?;

    if format == OutputFormat::Json {
        return write_json(&task, &mut writer);
    }
    writeln!(writer, "Promoted activity {} to task {}", args.id, task.id)?;
    writeln!(writer, "  {}", TaskLine(&task))?;
    Ok(())
}

async fn handle_users<W: Write>(
    services: &Services,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let users = services.users.list().await.context("failed to load users")?;
    if format == OutputFormat::Json {
        return write_json(&users, &mut writer);
    }
    for user in &users {
        writeln!(writer, "{:<8} {}", user.id, user.name)?;
    }
    Ok(())
}

async fn handle_goals<W: Write>(
    services: &Services,
    args: &GoalArgs,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let goals = match &args.id {
        Some(id) => {
            let goal = services
                .goals
                .get_goal_by_id(id)
                .await
                .context("failed to load goal")?
                .ok_or_else(|| anyhow!("Goal '{}' not found", id))?;
            vec![goal]
        }
        None => services
            .goals
            .get_goals()
            .await
            .context("failed to load goals")?,
    };
    if format == OutputFormat::Json {
        return write_json(&goals, &mut writer);
    }
    for goal in &goals {
        write!(writer, "{:<8} {}", goal.id, goal.title)?;
        if let Some(status) = &goal.status {
            write!(writer, " [{}]", status)?;
        }
        writeln!(writer)?;
        if let Some(description) = &goal.description {
            writeln!(writer, "         {}", description)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Task,
    Activity,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Task => write!(f, "Task"),
            Kind::Activity => write!(f, "Activity"),
        }
    }
}

fn report<W: Write>(
    outcome: &MutationOutcome,
    kind: Kind,
    id: &str,
    verb: &str,
    mut writer: W,
) -> Result<()> {
    match outcome {
        MutationOutcome::Committed => {
            writeln!(writer, "{} {} {}", kind, id, verb)?;
            Ok(())
        }
        MutationOutcome::Skipped => {
            writeln!(writer, "{} {} is still saving; nothing changed", kind, id)?;
            Ok(())
        }
        MutationOutcome::RolledBack(err) => Err(anyhow!(
            "Could not update {} '{}' ({}): {}",
            kind.to_string().to_lowercase(),
            id,
            outcome.label(),
            err
        )),
        MutationOutcome::Missing => Err(anyhow!("{} '{}' not found", kind, id)),
        MutationOutcome::Unchanged => {
            writeln!(writer, "{} {}: nothing to change", kind, id)?;
            Ok(())
        }
    }
}

fn status_word(done: bool) -> &'static str {
    if done {
        UiStatus::Done.as_str()
    } else {
        UiStatus::Open.as_str()
    }
}

fn write_tasks<W: Write>(tasks: &[Task], format: OutputFormat, mut writer: W) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(&tasks, &mut writer);
    }
    if tasks.is_empty() {
        writeln!(writer, "No tasks")?;
    }
    for task in tasks {
        writeln!(writer, "{}", TaskLine(task))?;
    }
    Ok(())
}

fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

struct TaskLine<'a>(&'a Task);

impl fmt::Display for TaskLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.0;
        write!(f, "{:<8} [{}] {}", task.id, task.status, task.title)?;

        let mut details = vec![format!("{} priority", task.priority.label())];
        if let Some(deadline) = task.deadline {
            details.push(format!("due {}", format_date(deadline)));
        }
        details.push(match &task.placement {
            Placement::KeyArea(id) => format!("key area {}", id),
            Placement::Moving(id) => format!("moving to {}", id),
            Placement::Backlog => "don't forget".to_string(),
        });
        if let Some(assignee) = &task.assignee {
            details.push(format!("@{}", assignee));
        }
        write!(f, "  ({})", details.join(", "))
    }
}

struct ActivityLine<'a, 'b>(&'b ActivityView<'a>);

impl fmt::Display for ActivityLine<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.0;
        let activity = view.activity;
        write!(
            f,
            "{:<8} [{}] {}",
            activity.id, activity.status, activity.text
        )?;

        let inherited = if activity.priority.is_none() {
            " (inherited)"
        } else {
            ""
        };
        let mut details = vec![format!(
            "{} priority{}",
            view.effective_priority.label(),
            inherited
        )];
        if let Some(task_id) = &activity.task_id {
            details.push(format!("task {}", task_id));
        }
        if let Some(assignee) = view.effective_assignee {
            details.push(format!("@{}", assignee));
        }
        if let Some(task_id) = &activity.created_task_id {
            details.push(format!("promoted to {}", task_id));
        }
        write!(f, "  ({})", details.join(", "))
    }
}
