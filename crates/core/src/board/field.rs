use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::dates::{parse_calendar_date, remote_date_value};
use crate::model::{Activity, Placement, Task};
use crate::normalize::Record;
use crate::priority::PriorityLevel;
use crate::status::UiStatus;

/// A single inline edit. Date variants carry the text as typed so the
/// outgoing payload can follow the edit rules in [`remote_date_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Title(String),
    Notes(Option<String>),
    Assignee(Option<String>),
    Status(UiStatus),
    Priority(PriorityLevel),
    StartDate(String),
    EndDate(String),
    Deadline(String),
    Duration(Option<String>),
    Goal(Option<String>),
    KeyArea(Option<String>),
    ListIndex(Option<u32>),
}

impl FieldChange {
    pub fn label(&self) -> &'static str {
        match self {
            FieldChange::Title(_) => "rename",
            FieldChange::Notes(_) => "update notes",
            FieldChange::Assignee(_) => "assign",
            FieldChange::Status(_) => "update status",
            FieldChange::Priority(_) => "update priority",
            FieldChange::StartDate(_) => "update start date",
            FieldChange::EndDate(_) => "update end date",
            FieldChange::Deadline(_) => "update deadline",
            FieldChange::Duration(_) => "update duration",
            FieldChange::Goal(_) => "update goal",
            FieldChange::KeyArea(_) => "update key area",
            FieldChange::ListIndex(_) => "update list",
        }
    }

    pub fn apply_to_task(&self, task: &mut Task, now: DateTime<Utc>) {
        match self {
            FieldChange::Title(title) => task.title = title.trim().to_string(),
            FieldChange::Notes(notes) => task.description = clean(notes),
            FieldChange::Assignee(assignee) => task.assignee = clean(assignee),
            FieldChange::Status(status) => {
                task.server_status = None;
                set_status(&mut task.status, &mut task.completed, &mut task.completion_date, *status, now)
            }
            FieldChange::Priority(priority) => task.priority = *priority,
            FieldChange::StartDate(raw) => task.start_date = parse_calendar_date(raw),
            FieldChange::EndDate(raw) => task.end_date = parse_calendar_date(raw),
            FieldChange::Deadline(raw) => task.deadline = parse_calendar_date(raw),
            FieldChange::Duration(duration) => task.duration = clean(duration),
            FieldChange::Goal(goal) => task.goal_id = clean(goal),
            FieldChange::KeyArea(key_area) => {
                task.placement = match clean(key_area) {
                    Some(id) => Placement::Moving(id),
                    None => Placement::Backlog,
                }
            }
            FieldChange::ListIndex(index) => task.list_index = index.filter(|index| *index > 0),
        }
    }

    /// Activities have no goal, key area or list of their own; those edits leave them untouched.
    pub fn apply_to_activity(&self, activity: &mut Activity, now: DateTime<Utc>) {
        match self {
            FieldChange::Title(text) => activity.text = text.trim().to_string(),
            FieldChange::Notes(notes) => activity.notes = clean(notes),
            FieldChange::Assignee(assignee) => activity.assignee = clean(assignee),
            FieldChange::Status(status) => set_status(
                &mut activity.status,
                &mut activity.completed,
                &mut activity.completion_date,
                *status,
                now,
            ),
            FieldChange::Priority(priority) => activity.priority = Some(*priority),
            FieldChange::StartDate(raw) => activity.start_date = parse_calendar_date(raw),
            FieldChange::EndDate(raw) => activity.end_date = parse_calendar_date(raw),
            FieldChange::Deadline(raw) => activity.deadline = parse_calendar_date(raw),
            FieldChange::Duration(duration) => activity.duration = clean(duration),
            FieldChange::Goal(_) | FieldChange::KeyArea(_) | FieldChange::ListIndex(_) => {}
        }
    }

    /// Remote task update body for this edit.
    pub fn task_payload(&self) -> Record {
        let (key, value) = match self {
            FieldChange::Title(title) => ("title", Value::from(title.trim())),
            FieldChange::Notes(notes) => ("description", optional(notes)),
            FieldChange::Assignee(assignee) => ("assignee", optional(assignee)),
            FieldChange::Goal(goal) => ("goalId", optional(goal)),
            FieldChange::KeyArea(key_area) => ("keyAreaId", optional(key_area)),
            FieldChange::ListIndex(index) => (
                "listIndex",
                index
                    .filter(|index| *index > 0)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            ),
            other => return other.shared_payload(),
        };
        single(key, value)
    }

    /// Remote activity update body for this edit. Never includes an assignee.
    pub fn activity_payload(&self) -> Record {
        let (key, value) = match self {
            FieldChange::Title(text) => ("text", Value::from(text.trim())),
            FieldChange::Notes(notes) => ("notes", optional(notes)),
            FieldChange::Assignee(_)
            | FieldChange::Goal(_)
            | FieldChange::KeyArea(_)
            | FieldChange::ListIndex(_) => return Record::new(),
            other => return other.shared_payload(),
        };
        single(key, value)
    }

    fn shared_payload(&self) -> Record {
        let (key, value) = match self {
            FieldChange::Status(status) => ("status", Value::from(status.to_server().as_str())),
            FieldChange::Priority(priority) => ("priority", Value::from(priority.level())),
            FieldChange::StartDate(raw) => ("startDate", remote_date_value(raw)),
            FieldChange::EndDate(raw) => ("endDate", remote_date_value(raw)),
            FieldChange::Deadline(raw) => ("deadline", remote_date_value(raw)),
            FieldChange::Duration(duration) => ("duration", optional(duration)),
            FieldChange::Title(_)
            | FieldChange::Notes(_)
            | FieldChange::Assignee(_)
            | FieldChange::Goal(_)
            | FieldChange::KeyArea(_)
            | FieldChange::ListIndex(_) => return Record::new(),
        };
        single(key, value)
    }
}

/// Body for flipping the completed flag, stamped with `completed_at` when set.
pub fn completion_payload(completed: bool, completed_at: Option<DateTime<Utc>>) -> Record {
    let status = if completed {
        UiStatus::Done
    } else {
        UiStatus::Open
    };
    let mut record = Record::new();
    record.insert("completed".into(), Value::Bool(completed));
    record.insert("status".into(), Value::from(status.to_server().as_str()));
    record.insert(
        "completionDate".into(),
        completed_at
            .map(|instant| Value::from(crate::dates::format_instant(instant)))
            .unwrap_or(Value::Null),
    );
    record
}

fn set_status(
    status: &mut UiStatus,
    completed: &mut bool,
    completion_date: &mut Option<DateTime<Utc>>,
    next: UiStatus,
    now: DateTime<Utc>,
) {
    *status = next;
    *completed = next.is_done();
    if next.is_done() {
        completion_date.get_or_insert(now);
    } else {
        *completion_date = None;
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn optional(value: &Option<String>) -> Value {
    clean(value).map(Value::from).unwrap_or(Value::Null)
}

fn single(key: &str, value: Value) -> Record {
    let mut record = Record::new();
    record.insert(key.to_string(), value);
    record
}
