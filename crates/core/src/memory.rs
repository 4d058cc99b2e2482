//! In-process backend implementing every service contract.
//!
//! Stores records the way a permissive server would, applies update patches
//! over them, and can be told to reject calls so rollback paths are
//! reachable without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use ulid::Ulid;

use crate::dates::format_instant;
use crate::error::ServiceError;
use crate::model::{Activity, Goal, Task, User};
use crate::normalize::{keys, merge_patch, normalize_record, string_field, Record, STATUS_ALIASES};
use crate::services::{
    strip_assignee, ActivityFilter, ActivityService, GoalService, TaskFilter, TaskService,
    UsersService,
};
use crate::status::UiStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub id: Option<String>,
    pub payload: Option<Value>,
}

#[derive(Default)]
struct MemoryState {
    tasks: Vec<Record>,
    activities: Vec<Record>,
    users: Vec<Record>,
    goals: Vec<Record>,
    failures: HashMap<String, usize>,
    calls: Vec<RecordedCall>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_task(&self, record: Value) {
        self.seed(|state| &mut state.tasks, record);
    }

    pub fn seed_activity(&self, record: Value) {
        self.seed(|state| &mut state.activities, record);
    }

    pub fn seed_user(&self, record: Value) {
        self.seed(|state| &mut state.users, record);
    }

    pub fn seed_goal(&self, record: Value) {
        self.seed(|state| &mut state.goals, record);
    }

    fn seed(&self, table: impl FnOnce(&mut MemoryState) -> &mut Vec<Record>, record: Value) {
        let mut record = match record {
            Value::Object(map) => map,
            _ => return,
        };
        if string_field(&normalize_record(&record), keys::ID).is_none() {
            record.insert(keys::ID.into(), Value::from(Ulid::new().to_string()));
        }
        let mut state = self.state.lock();
        table(&mut *state).push(record);
    }

    /// Makes the next call to `endpoint` (for example `tasks.update`) fail.
    pub fn fail_next(&self, endpoint: &str) {
        *self
            .state
            .lock()
            .failures
            .entry(endpoint.to_string())
            .or_default() += 1;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Payload of the most recent call to `endpoint`.
    pub fn last_payload(&self, endpoint: &str) -> Option<Value> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find(|call| call.endpoint == endpoint)
            .and_then(|call| call.payload.clone())
    }

    pub fn stored_task(&self, id: &str) -> Option<Task> {
        find(&self.state.lock().tasks, id).map(Task::from_record)
    }

    pub fn stored_activity(&self, id: &str) -> Option<Activity> {
        find(&self.state.lock().activities, id).map(Activity::from_record)
    }

    /// Records the call and consumes a pending failure for its endpoint.
    fn begin(&self, endpoint: &str, id: Option<&str>, payload: Option<&Record>) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            endpoint: endpoint.to_string(),
            id: id.map(str::to_string),
            payload: payload.cloned().map(Value::Object),
        });
        if let Some(remaining) = state.failures.get_mut(endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                tracing::debug!(endpoint, "injected failure");
                return Err(ServiceError::Transport {
                    endpoint: endpoint.to_string(),
                    message: "injected failure".into(),
                });
            }
        }
        Ok(())
    }

    fn insert(
        &self,
        table: impl FnOnce(&mut MemoryState) -> &mut Vec<Record>,
        mut fields: Record,
    ) -> Record {
        fields.insert(keys::ID.into(), Value::from(Ulid::new().to_string()));
        stamp_completion(&mut fields);
        let mut state = self.state.lock();
        table(&mut *state).push(fields.clone());
        fields
    }

    fn patch(
        &self,
        entity: &'static str,
        table: impl FnOnce(&mut MemoryState) -> &mut Vec<Record>,
        id: &str,
        fields: &Record,
    ) -> Result<Record, ServiceError> {
        let mut state = self.state.lock();
        let record = table(&mut *state)
            .iter_mut()
            .find(|record| record_id(record).as_deref() == Some(id))
            .ok_or_else(|| ServiceError::not_found(entity, id))?;
        merge_patch(record, fields);
        if fields.keys().any(|key| STATUS_ALIASES.contains(&key.as_str())) {
            stamp_completion(record);
        }
        Ok(record.clone())
    }

    fn delete(
        &self,
        entity: &'static str,
        table: impl FnOnce(&mut MemoryState) -> &mut Vec<Record>,
        id: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let records = table(&mut *state);
        let before = records.len();
        records.retain(|record| record_id(record).as_deref() != Some(id));
        if records.len() == before {
            return Err(ServiceError::not_found(entity, id));
        }
        Ok(())
    }
}

fn record_id(record: &Record) -> Option<String> {
    string_field(&normalize_record(record), keys::ID)
}

fn find<'a>(records: &'a [Record], id: &str) -> Option<&'a Record> {
    records
        .iter()
        .find(|record| record_id(record).as_deref() == Some(id))
}

/// Sets or clears `completionDate` the way the server derives it from status.
fn stamp_completion(record: &mut Record) {
    let canonical = normalize_record(record);
    let done = canonical
        .get(keys::STATUS)
        .and_then(Value::as_str)
        .map(UiStatus::from_server)
        .is_some_and(|status| status.is_done());
    if !done {
        record.insert(keys::COMPLETION_DATE.into(), Value::Null);
    } else if string_field(&canonical, keys::COMPLETION_DATE).is_none() {
        record.insert(
            keys::COMPLETION_DATE.into(),
            Value::from(format_instant(Utc::now())),
        );
    }
}

#[async_trait]
impl TaskService for MemoryBackend {
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError> {
        self.begin("tasks.list", None, None)?;
        let tasks = self.state.lock().tasks.clone();
        Ok(tasks
            .iter()
            .map(Task::from_record)
            .filter(|task| filter.matches(task))
            .collect())
    }

    async fn create(&self, fields: Record) -> Result<Task, ServiceError> {
        self.begin("tasks.create", None, Some(&fields))?;
        Ok(Task::from_record(&self.insert(|state| &mut state.tasks, fields)))
    }

    async fn update(&self, id: &str, fields: Record) -> Result<Task, ServiceError> {
        self.begin("tasks.update", Some(id), Some(&fields))?;
        let record = self.patch("task", |state| &mut state.tasks, id, &fields)?;
        Ok(Task::from_record(&record))
    }

    async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        self.begin("tasks.remove", Some(id), None)?;
        self.delete("task", |state| &mut state.tasks, id)
    }
}

#[async_trait]
impl ActivityService for MemoryBackend {
    async fn list(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, ServiceError> {
        self.begin("activities.list", None, None)?;
        let activities = self.state.lock().activities.clone();
        Ok(activities
            .iter()
            .map(Activity::from_record)
            .filter(|activity| filter.matches(activity))
            .collect())
    }

    async fn create(&self, fields: Record) -> Result<Activity, ServiceError> {
        self.begin("activities.create", None, Some(&fields))?;
        Ok(Activity::from_record(
            &self.insert(|state| &mut state.activities, fields),
        ))
    }

    async fn update(&self, id: &str, mut fields: Record) -> Result<Activity, ServiceError> {
        self.begin("activities.update", Some(id), Some(&fields))?;
        strip_assignee(&mut fields);
        let record = self.patch("activity", |state| &mut state.activities, id, &fields)?;
        Ok(Activity::from_record(&record))
    }

    async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        self.begin("activities.remove", Some(id), None)?;
        self.delete("activity", |state| &mut state.activities, id)
    }
}

#[async_trait]
impl UsersService for MemoryBackend {
    async fn list(&self) -> Result<Vec<User>, ServiceError> {
        self.begin("users.list", None, None)?;
        Ok(self.state.lock().users.iter().map(User::from_record).collect())
    }
}

#[async_trait]
impl GoalService for MemoryBackend {
    async fn get_goals(&self) -> Result<Vec<Goal>, ServiceError> {
        self.begin("goals.list", None, None)?;
        Ok(self.state.lock().goals.iter().map(Goal::from_record).collect())
    }

    async fn get_goal_by_id(&self, id: &str) -> Result<Option<Goal>, ServiceError> {
        self.begin("goals.get", Some(id), None)?;
        Ok(find(&self.state.lock().goals, id).map(Goal::from_record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn created_records_get_fresh_ids() {
        let backend = MemoryBackend::new();
        let first = TaskService::create(&backend, fields(json!({ "title": "One" })))
            .await
            .unwrap();
        let second = TaskService::create(&backend, fields(json!({ "title": "Two" })))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 26);
    }

    #[tokio::test]
    async fn completing_stamps_a_completion_date() {
        let backend = MemoryBackend::new();
        backend.seed_task(json!({ "id": "t1", "title": "Done soon" }));

        let done = TaskService::update(&backend, "t1", fields(json!({ "status": "completed" })))
            .await
            .unwrap();
        assert!(done.completed);
        assert!(done.completion_date.is_some());

        let reopened = TaskService::update(&backend, "t1", fields(json!({ "status": "todo" })))
            .await
            .unwrap();
        assert!(!reopened.completed);
        assert_eq!(reopened.completion_date, None);
    }

    #[tokio::test]
    async fn activity_updates_drop_assignee() {
        let backend = MemoryBackend::new();
        backend.seed_activity(json!({ "id": "a1", "text": "Call", "assignee": "Dana" }));

        let updated = ActivityService::update(
            &backend,
            "a1",
            fields(json!({ "assignee": "Lee", "text": "Call back" })),
        )
        .await
        .unwrap();
        assert_eq!(updated.text, "Call back");
        assert_eq!(updated.assignee.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let backend = MemoryBackend::new();
        backend.seed_user(json!({ "id": 1, "name": "Ada" }));
        backend.fail_next("users.list");

        assert!(UsersService::list(&backend).await.is_err());
        assert_eq!(UsersService::list(&backend).await.unwrap().len(), 1);
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn goals_resolve_by_id() {
        let backend = MemoryBackend::new();
        backend.seed_goal(json!({ "id": "g1", "title": "Grow" }));

        assert_eq!(
            backend.get_goal_by_id("g1").await.unwrap().map(|goal| goal.title),
            Some("Grow".to_string())
        );
        assert_eq!(backend.get_goal_by_id("g2").await.unwrap(), None);
        assert_eq!(backend.get_goals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let backend = MemoryBackend::new();
        let err = TaskService::remove(&backend, "nope").await.unwrap_err();
        assert_eq!(err, ServiceError::not_found("task", "nope"));
    }
}
