//! Contracts for the remote collaborators the boards talk to.
//!
//! Every call is asynchronous and may fail; callers treat `Err` as the
//! rollback path and never panic on it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::{Activity, Goal, Task, User};
use crate::normalize::{Record, ASSIGNEE_ALIASES};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskFilter {
    #[default]
    All,
    /// Tasks with no key area.
    DontForget,
    KeyArea(String),
    Goal(String),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::DontForget => task.is_dont_forget(),
            TaskFilter::KeyArea(id) => task.key_area_id() == Some(id.as_str()),
            TaskFilter::Goal(id) => task.goal_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActivityFilter {
    #[default]
    All,
    Task(String),
}

impl ActivityFilter {
    pub fn matches(&self, activity: &Activity) -> bool {
        match self {
            ActivityFilter::All => true,
            ActivityFilter::Task(id) => activity.task_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError>;
    async fn create(&self, fields: Record) -> Result<Task, ServiceError>;
    async fn update(&self, id: &str, fields: Record) -> Result<Task, ServiceError>;
    async fn remove(&self, id: &str) -> Result<(), ServiceError>;
}

/// Activity updates never carry an assignee; see [`strip_assignee`].
#[async_trait]
pub trait ActivityService: Send + Sync {
    async fn list(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, ServiceError>;
    async fn create(&self, fields: Record) -> Result<Activity, ServiceError>;
    async fn update(&self, id: &str, fields: Record) -> Result<Activity, ServiceError>;
    async fn remove(&self, id: &str) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait UsersService: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, ServiceError>;
}

#[async_trait]
pub trait GoalService: Send + Sync {
    async fn get_goals(&self) -> Result<Vec<Goal>, ServiceError>;
    async fn get_goal_by_id(&self, id: &str) -> Result<Option<Goal>, ServiceError>;
}

/// Removes every assignee spelling from an activity payload.
pub fn strip_assignee(fields: &mut Record) {
    for alias in ASSIGNEE_ALIASES {
        fields.remove(*alias);
    }
}

/// The collaborators handed to boards and commands.
#[derive(Clone)]
pub struct Services {
    pub tasks: Arc<dyn TaskService>,
    pub activities: Arc<dyn ActivityService>,
    pub users: Arc<dyn UsersService>,
    pub goals: Arc<dyn GoalService>,
}

impl Services {
    /// Uses one backend for all four contracts.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TaskService + ActivityService + UsersService + GoalService + 'static,
    {
        Self {
            tasks: backend.clone(),
            activities: backend.clone(),
            users: backend.clone(),
            goals: backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(value: serde_json::Value) -> Task {
        Task::from_record(value.as_object().unwrap())
    }

    #[test]
    fn task_filters_select_backlog_and_key_areas() {
        let backlog = task(json!({ "id": "t1", "title": "Backlog" }));
        let planned = task(json!({ "id": "t2", "title": "Planned", "key_area_id": "ka", "goal_id": "g" }));

        assert!(TaskFilter::DontForget.matches(&backlog));
        assert!(!TaskFilter::DontForget.matches(&planned));
        assert!(TaskFilter::KeyArea("ka".into()).matches(&planned));
        assert!(!TaskFilter::KeyArea("other".into()).matches(&planned));
        assert!(TaskFilter::Goal("g".into()).matches(&planned));
        assert!(TaskFilter::All.matches(&backlog));
    }

    #[test]
    fn strip_assignee_removes_every_spelling() {
        let mut fields = json!({
            "text": "Call",
            "assignee": "Me",
            "responsible": "Me",
            "delegatedToUserId": "7"
        })
        .as_object()
        .cloned()
        .unwrap();
        strip_assignee(&mut fields);
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("text"));
    }
}
