use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::dates::{date_from_value, format_date, format_instant, instant_from_value};
use crate::normalize::{
    first_present, keys, normalize_record, string_field, Record, PRIORITY_ALIASES,
    STATUS_ALIASES,
};
use crate::priority::PriorityLevel;
use crate::quadrant::{classify, Quadrant, QuadrantInput};
use crate::status::UiStatus;

/// Assignee value meaning "the signed-in user".
pub const ME_SENTINEL: &str = "Me";

/// Where a task lives. `Moving` covers the window between asking the backend
/// to move a backlog task into a key area and hearing back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "key_area_id", rename_all = "snake_case")]
pub enum Placement {
    Backlog,
    Moving(String),
    KeyArea(String),
}

impl Placement {
    pub fn from_key_area(key_area_id: Option<String>) -> Self {
        match key_area_id {
            Some(id) => Placement::KeyArea(id),
            None => Placement::Backlog,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub status: UiStatus,
    /// Status as the backend spelled it; `closed` and `archived` only survive here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_status: Option<String>,
    pub completed: bool,
    pub priority: PriorityLevel,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub duration: Option<String>,
    pub placement: Placement,
    pub list_index: Option<u32>,
    pub goal_id: Option<String>,
    pub completion_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Builds a task from any record shape the backend returns.
    pub fn from_record(raw: &Record) -> Self {
        let record = normalize_record(raw);
        Self {
            id: string_field(&record, keys::ID).unwrap_or_default(),
            title: string_field(&record, keys::TITLE).unwrap_or_default(),
            description: string_field(&record, keys::DESCRIPTION),
            assignee: string_field(&record, keys::ASSIGNEE),
            status: status_field(&record),
            server_status: raw_status(raw),
            completed: record
                .get(keys::COMPLETED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            priority: priority_field(&record),
            start_date: date_field(&record, keys::START_DATE),
            end_date: date_field(&record, keys::END_DATE),
            deadline: date_field(&record, keys::DEADLINE),
            duration: string_field(&record, keys::DURATION),
            placement: Placement::from_key_area(string_field(&record, keys::KEY_AREA_ID)),
            list_index: list_index_field(&record),
            goal_id: string_field(&record, keys::GOAL_ID),
            completion_date: instant_field(&record, keys::COMPLETION_DATE),
        }
    }

    /// Canonical record for this task; `Task::from_record` reads it back unchanged.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(keys::ID.into(), Value::from(self.id.clone()));
        record.insert(keys::TITLE.into(), Value::from(self.title.clone()));
        record.insert(keys::DESCRIPTION.into(), optional_string(&self.description));
        record.insert(keys::ASSIGNEE.into(), optional_string(&self.assignee));
        let status = self
            .server_status
            .clone()
            .unwrap_or_else(|| self.status.as_str().to_string());
        record.insert(keys::STATUS.into(), Value::from(status));
        record.insert(keys::COMPLETED.into(), Value::Bool(self.completed));
        record.insert(keys::PRIORITY.into(), Value::from(self.priority.level()));
        record.insert(keys::START_DATE.into(), optional_date(self.start_date));
        record.insert(keys::END_DATE.into(), optional_date(self.end_date));
        record.insert(keys::DEADLINE.into(), optional_date(self.deadline));
        record.insert(keys::DURATION.into(), optional_string(&self.duration));
        let key_area = match &self.placement {
            Placement::KeyArea(id) => Value::from(id.clone()),
            Placement::Backlog | Placement::Moving(_) => Value::Null,
        };
        record.insert(keys::KEY_AREA_ID.into(), key_area);
        record.insert(
            keys::LIST_INDEX.into(),
            self.list_index.map(Value::from).unwrap_or(Value::Null),
        );
        record.insert(keys::GOAL_ID.into(), optional_string(&self.goal_id));
        record.insert(
            keys::COMPLETION_DATE.into(),
            self.completion_date
                .map(|instant| Value::from(format_instant(instant)))
                .unwrap_or(Value::Null),
        );
        record
    }

    /// Key area the task is committed to. A task still moving has none yet.
    pub fn key_area_id(&self) -> Option<&str> {
        match &self.placement {
            Placement::KeyArea(id) => Some(id.as_str()),
            Placement::Backlog | Placement::Moving(_) => None,
        }
    }

    /// Member of the "Don't Forget" backlog.
    pub fn is_dont_forget(&self) -> bool {
        matches!(self.placement, Placement::Backlog)
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.placement, Placement::Moving(_))
    }

    pub fn is_assigned_to_me(&self) -> bool {
        self.assignee.as_deref() == Some(ME_SENTINEL)
    }

    pub fn quadrant_input(&self) -> QuadrantInput {
        QuadrantInput {
            deadline: self.deadline,
            end_date: self.end_date,
            start_date: self.start_date,
            priority: self.priority,
            key_area_id: self.key_area_id().map(str::to_string),
            status: self
                .server_status
                .clone()
                .unwrap_or_else(|| self.status.as_str().to_string()),
        }
    }

    pub fn quadrant(&self, today: NaiveDate) -> Quadrant {
        classify(&self.quadrant_input(), today)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: String,
    pub text: String,
    pub task_id: Option<String>,
    pub status: UiStatus,
    pub completed: bool,
    pub assignee: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    /// `None` means the activity inherits its task's priority.
    pub priority: Option<PriorityLevel>,
    pub notes: Option<String>,
    pub duration: Option<String>,
    pub completion_date: Option<DateTime<Utc>>,
    pub created_task_id: Option<String>,
}

impl Activity {
    pub fn from_record(raw: &Record) -> Self {
        let record = normalize_record(raw);
        let priority = first_present(raw, PRIORITY_ALIASES).map(|_| priority_field(&record));
        Self {
            id: string_field(&record, keys::ID).unwrap_or_default(),
            text: string_field(&record, keys::TEXT).unwrap_or_default(),
            task_id: string_field(&record, keys::TASK_ID),
            status: status_field(&record),
            completed: record
                .get(keys::COMPLETED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            assignee: string_field(&record, keys::ASSIGNEE),
            start_date: date_field(&record, keys::START_DATE),
            end_date: date_field(&record, keys::END_DATE),
            deadline: date_field(&record, keys::DEADLINE),
            priority,
            notes: string_field(&record, keys::NOTES),
            duration: string_field(&record, keys::DURATION),
            completion_date: instant_field(&record, keys::COMPLETION_DATE),
            created_task_id: string_field(&record, keys::CREATED_TASK_ID),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(keys::ID.into(), Value::from(self.id.clone()));
        record.insert(keys::TEXT.into(), Value::from(self.text.clone()));
        record.insert(keys::TASK_ID.into(), optional_string(&self.task_id));
        record.insert(keys::STATUS.into(), Value::from(self.status.as_str()));
        record.insert(keys::COMPLETED.into(), Value::Bool(self.completed));
        record.insert(keys::ASSIGNEE.into(), optional_string(&self.assignee));
        record.insert(keys::START_DATE.into(), optional_date(self.start_date));
        record.insert(keys::END_DATE.into(), optional_date(self.end_date));
        record.insert(keys::DEADLINE.into(), optional_date(self.deadline));
        if let Some(priority) = self.priority {
            record.insert(keys::PRIORITY.into(), Value::from(priority.level()));
        }
        record.insert(keys::NOTES.into(), optional_string(&self.notes));
        record.insert(keys::DURATION.into(), optional_string(&self.duration));
        record.insert(
            keys::COMPLETION_DATE.into(),
            self.completion_date
                .map(|instant| Value::from(format_instant(instant)))
                .unwrap_or(Value::Null),
        );
        record.insert(keys::CREATED_TASK_ID.into(), optional_string(&self.created_task_id));
        record
    }

    pub fn effective_priority(&self, parent: Option<&Task>) -> PriorityLevel {
        self.priority
            .or_else(|| parent.map(|task| task.priority))
            .unwrap_or_default()
    }

    pub fn effective_assignee<'a>(&'a self, parent: Option<&'a Task>) -> Option<&'a str> {
        self.assignee
            .as_deref()
            .or_else(|| parent.and_then(|task| task.assignee.as_deref()))
    }

    pub fn is_promoted(&self) -> bool {
        self.created_task_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    pub fn from_record(raw: &Record) -> Self {
        let record = normalize_record(raw);
        let name = ["name", "full_name", "fullName", "username", "email"]
            .iter()
            .find_map(|key| string_field(raw, key))
            .unwrap_or_default();
        Self {
            id: string_field(&record, keys::ID).unwrap_or_default(),
            name: name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl Goal {
    pub fn from_record(raw: &Record) -> Self {
        let record = normalize_record(raw);
        Self {
            id: string_field(&record, keys::ID).unwrap_or_default(),
            title: string_field(&record, keys::TITLE).unwrap_or_default(),
            description: string_field(&record, keys::DESCRIPTION),
            status: string_field(raw, keys::STATUS),
        }
    }
}

fn raw_status(raw: &Record) -> Option<String> {
    first_present(raw, STATUS_ALIASES)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .map(str::to_string)
}

fn status_field(record: &Record) -> UiStatus {
    record
        .get(keys::STATUS)
        .and_then(Value::as_str)
        .map(UiStatus::from_server)
        .unwrap_or_default()
}

fn priority_field(record: &Record) -> PriorityLevel {
    record
        .get(keys::PRIORITY)
        .map(PriorityLevel::from_value)
        .unwrap_or_default()
}

fn date_field(record: &Record, key: &str) -> Option<NaiveDate> {
    record.get(key).and_then(date_from_value)
}

fn instant_field(record: &Record, key: &str) -> Option<DateTime<Utc>> {
    record.get(key).and_then(instant_from_value)
}

fn list_index_field(record: &Record) -> Option<u32> {
    record
        .get(keys::LIST_INDEX)
        .and_then(Value::as_u64)
        .and_then(|index| u32::try_from(index).ok())
}

fn optional_string(value: &Option<String>) -> Value {
    value.clone().map(Value::from).unwrap_or(Value::Null)
}

fn optional_date(value: Option<NaiveDate>) -> Value {
    value
        .map(|date| Value::from(format_date(date)))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn task_reads_server_shapes() {
        let task = Task::from_record(&record(json!({
            "id": 12,
            "title": " Quarterly review ",
            "status": "in_progress",
            "priority": "high",
            "dueDate": "2025-05-01T00:00:00.000Z",
            "keyAreaId": "ka-ops",
            "list_index": 2,
            "responsible": "Me"
        })));

        assert_eq!(task.id, "12");
        assert_eq!(task.title, "Quarterly review");
        assert_eq!(task.status, UiStatus::InProgress);
        assert_eq!(task.priority, PriorityLevel::High);
        assert_eq!(task.deadline, NaiveDate::from_ymd_opt(2025, 5, 1));
        assert_eq!(task.placement, Placement::KeyArea("ka-ops".into()));
        assert_eq!(task.list_index, Some(2));
        assert!(task.is_assigned_to_me());
        assert!(!task.is_dont_forget());
    }

    #[test]
    fn closed_and_archived_tasks_classify_as_completed() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        for status in ["archived", "Closed"] {
            let raw = record(json!({ "id": "t9", "status": status, "deadline": "2025-06-01" }));
            let task = Task::from_record(&raw);

            assert_eq!(task.status, UiStatus::Open);
            assert_eq!(task.server_status.as_deref(), Some(status));
            assert_eq!(task.quadrant(today), Quadrant::Urgent);
            assert_eq!(task.quadrant(today), classify(&QuadrantInput::from_record(&raw), today));
            assert_eq!(Task::from_record(&task.to_record()), task);
        }
    }

    #[test]
    fn task_without_key_area_is_dont_forget() {
        let task = Task::from_record(&record(json!({ "id": "t1", "title": "Renew passport" })));
        assert_eq!(task.placement, Placement::Backlog);
        assert!(task.is_dont_forget());
        assert_eq!(task.priority, PriorityLevel::Normal);
    }

    #[test]
    fn task_record_round_trips() {
        let mut task = Task::from_record(&record(json!({
            "id": "t1",
            "title": "Ship release",
            "description": "tag and publish",
            "status": "completed",
            "priority": 1,
            "startDate": "2025-01-01",
            "endDate": "2025-01-03",
            "deadline": "2025-01-04",
            "key_area_id": "ka",
            "goal_id": "g",
            "duration": "2h"
        })));
        task.completion_date = Some(Utc.with_ymd_and_hms(2025, 1, 3, 17, 5, 0).unwrap());

        assert_eq!(Task::from_record(&task.to_record()), task);
    }

    #[test]
    fn activity_priority_and_assignee_fall_back_to_parent() {
        let parent = Task::from_record(&record(json!({
            "id": "t1",
            "title": "Parent",
            "priority": "high",
            "assignee": "Dana"
        })));
        let inherits = Activity::from_record(&record(json!({ "id": "a1", "text": "Sub", "taskId": "t1" })));
        let overrides = Activity::from_record(&record(json!({
            "id": "a2",
            "text": "Sub",
            "taskId": "t1",
            "priority": "low",
            "assignee": "Lee"
        })));

        assert_eq!(inherits.priority, None);
        assert_eq!(inherits.effective_priority(Some(&parent)), PriorityLevel::High);
        assert_eq!(inherits.effective_assignee(Some(&parent)), Some("Dana"));
        assert_eq!(inherits.effective_priority(None), PriorityLevel::Normal);
        assert_eq!(overrides.effective_priority(Some(&parent)), PriorityLevel::Low);
        assert_eq!(overrides.effective_assignee(Some(&parent)), Some("Lee"));
    }

    #[test]
    fn activity_record_round_trips() {
        let activity = Activity::from_record(&record(json!({
            "activity_id": "a9",
            "activity_name": "Book venue",
            "task_id": "t3",
            "activity_status": "todo",
            "date_start": "2025-02-01",
            "created_task_id": "t10"
        })));
        assert_eq!(activity.id, "a9");
        assert!(activity.is_promoted());
        assert_eq!(Activity::from_record(&activity.to_record()), activity);
    }

    #[test]
    fn users_and_goals_read_loose_records() {
        let user = User::from_record(&record(json!({ "id": 5, "full_name": " Ada " })));
        assert_eq!(user, User { id: "5".into(), name: "Ada".into() });

        let goal = Goal::from_record(&record(json!({ "id": "g1", "name": "Grow revenue" })));
        assert_eq!(goal.title, "Grow revenue");
        assert_eq!(goal.status, None);
    }
}
