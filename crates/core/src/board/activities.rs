use chrono::Utc;
use serde_json::Value;

use crate::dates::format_date;
use crate::error::{PromotionError, ServiceError};
use crate::events::{BoardEvent, EventBus};
use crate::model::{Activity, Task};
use crate::normalize::Record;
use crate::services::{strip_assignee, ActivityFilter, Services};
use crate::status::UiStatus;

use super::controller::{MoveDirection, MutationOutcome, OptimisticList};
use super::field::{completion_payload, FieldChange};

/// Local activity collection kept in step with the activity service.
pub struct ActivityBoard {
    list: OptimisticList<Activity>,
    services: Services,
}

impl ActivityBoard {
    pub fn new(services: Services, bus: EventBus) -> Self {
        Self {
            list: OptimisticList::new(bus),
            services,
        }
    }

    pub fn bus(&self) -> &EventBus {
        self.list.bus()
    }

    pub async fn load(&self, filter: &ActivityFilter) -> Result<usize, ServiceError> {
        let activities = self.services.activities.list(filter).await?;
        let count = activities.len();
        self.list.replace_all(activities);
        tracing::debug!(count, filter = ?filter, "activities loaded");
        let task_id = match filter {
            ActivityFilter::Task(id) => Some(id.clone()),
            ActivityFilter::All => None,
        };
        self.bus().publish(BoardEvent::ActivitiesUpdated { task_id });
        Ok(count)
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.list.items()
    }

    pub fn for_task(&self, task_id: &str) -> Vec<Activity> {
        self.list
            .items()
            .into_iter()
            .filter(|activity| activity.task_id.as_deref() == Some(task_id))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Activity> {
        self.list.get(id)
    }

    pub fn is_saving(&self, id: &str) -> bool {
        self.list.is_in_flight(id)
    }

    pub fn saving(&self) -> Vec<String> {
        self.list.in_flight()
    }

    /// Assignee edits go to [`ActivityBoard::assign`]; everything else is
    /// sent to the activity endpoint.
    pub async fn update_field(&self, id: &str, change: FieldChange) -> MutationOutcome {
        if let FieldChange::Assignee(assignee) = change {
            return self.assign(id, assignee).await;
        }

        let activities = self.services.activities.clone();
        let mut payload = change.activity_payload();
        strip_assignee(&mut payload);
        if payload.is_empty() {
            tracing::debug!(activity_id = id, change = change.label(), "no activity field to update");
            return match self.list.get(id) {
                Some(_) => MutationOutcome::Unchanged,
                None => MutationOutcome::Missing,
            };
        }
        let now = Utc::now();
        let outcome = self
            .list
            .mutate(
                id,
                change.label(),
                |activity| change.apply_to_activity(activity, now),
                |activity| async move { activities.update(&activity.id, payload).await },
            )
            .await;
        self.announce(id, &outcome);
        outcome
    }

    pub async fn toggle_completed(&self, id: &str) -> MutationOutcome {
        let activities = self.services.activities.clone();
        let now = Utc::now();
        let outcome = self
            .list
            .mutate(
                id,
                "toggle completed",
                |activity| {
                    let status = if activity.completed {
                        UiStatus::Open
                    } else {
                        UiStatus::Done
                    };
                    FieldChange::Status(status).apply_to_activity(activity, now);
                    activity.completion_date = status.is_done().then_some(now);
                },
                |activity| async move {
                    let payload = completion_payload(activity.completed, activity.completion_date);
                    activities.update(&activity.id, payload).await
                },
            )
            .await;
        self.announce(id, &outcome);
        outcome
    }

    /// The activity endpoint has no assignee field, so the parent task
    /// carries it. The local activity is patched to match once the task
    /// update lands.
    pub async fn assign(&self, id: &str, assignee: Option<String>) -> MutationOutcome {
        let tasks = self.services.tasks.clone();
        let change = FieldChange::Assignee(assignee);
        let payload = change.task_payload();
        let now = Utc::now();
        let parent = self.list.get(id).and_then(|activity| activity.task_id);

        let outcome = self
            .list
            .mutate(
                id,
                "assign",
                |activity| change.apply_to_activity(activity, now),
                |activity| async move {
                    let Some(parent) = activity.task_id.clone() else {
                        return Err(ServiceError::Rejected(format!(
                            "activity '{}' has no task to carry an assignee",
                            activity.id
                        )));
                    };
                    tasks.update(&parent, payload).await?;
                    Ok(activity)
                },
            )
            .await;

        if outcome.is_committed() {
            if let Some(parent) = parent {
                self.bus().publish(BoardEvent::TasksChanged { ids: vec![parent] });
            }
        }
        self.announce(id, &outcome);
        outcome
    }

    /// Turns an activity into a standalone task, at most once. Priority and
    /// assignee fall back to `parent` when the activity has none; the new
    /// task lands in the parent's key area, or the backlog without one.
    pub async fn promote(&self, id: &str, parent: Option<&Task>) -> Result<Task, PromotionError> {
        let activity = self
            .list
            .get(id)
            .ok_or_else(|| PromotionError::NotFound(id.to_string()))?;
        if let Some(task_id) = &activity.created_task_id {
            return Err(PromotionError::AlreadyPromoted {
                activity_id: activity.id.clone(),
                task_id: task_id.clone(),
            });
        }
        if !self.list.try_claim(id) {
            return Err(PromotionError::Busy(id.to_string()));
        }

        let result = self.promote_claimed(&activity, parent).await;
        self.list.release(id);

        match &result {
            Ok(task) => {
                tracing::info!(activity_id = id, task_id = task.id.as_str(), "activity promoted");
                self.bus().publish(BoardEvent::TasksChanged {
                    ids: vec![task.id.clone()],
                });
                self.bus().publish(BoardEvent::ActivitiesUpdated {
                    task_id: activity.task_id.clone(),
                });
            }
            Err(err) => tracing::warn!(activity_id = id, error = %err, "activity promotion failed"),
        }
        result
    }

    async fn promote_claimed(
        &self,
        activity: &Activity,
        parent: Option<&Task>,
    ) -> Result<Task, PromotionError> {
        let fields = promotion_fields(activity, parent);
        let task = self
            .services
            .tasks
            .create(fields)
            .await
            .map_err(PromotionError::Create)?;

        let mut link = Record::new();
        link.insert("createdTaskId".into(), Value::from(task.id.clone()));
        let linked = match self.services.activities.update(&activity.id, link).await {
            Ok(linked) => linked,
            Err(source) => {
                // The task exists either way; a retry must not create another.
                let mut promoted = activity.clone();
                promoted.created_task_id = Some(task.id.clone());
                self.list.upsert(promoted);
                return Err(PromotionError::Link {
                    task_id: task.id.clone(),
                    source,
                });
            }
        };

        let mut promoted = if linked.id.is_empty() {
            activity.clone()
        } else {
            linked
        };
        promoted.created_task_id = Some(task.id.clone());
        self.list.upsert(promoted);
        Ok(task)
    }

    pub fn move_item(&self, id: &str, direction: MoveDirection) -> bool {
        let moved = self.list.move_item(id, direction);
        if moved {
            let task_id = self.list.get(id).and_then(|activity| activity.task_id);
            self.bus().publish(BoardEvent::ActivitiesUpdated { task_id });
        }
        moved
    }

    pub async fn create(&self, fields: Record) -> Result<Activity, ServiceError> {
        let activity = self.services.activities.create(fields).await?;
        self.list.upsert(activity.clone());
        self.bus().publish(BoardEvent::ActivitiesUpdated {
            task_id: activity.task_id.clone(),
        });
        Ok(activity)
    }

    pub async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        if !self.list.try_claim(id) {
            return Err(ServiceError::Rejected(format!(
                "activity '{}' is still saving",
                id
            )));
        }
        let result = self.services.activities.remove(id).await;
        self.list.release(id);
        result?;
        let removed = self.list.remove_local(id);
        self.bus().publish(BoardEvent::ActivitiesUpdated {
            task_id: removed.and_then(|activity| activity.task_id),
        });
        Ok(())
    }

    fn announce(&self, id: &str, outcome: &MutationOutcome) {
        if matches!(outcome, MutationOutcome::Committed | MutationOutcome::RolledBack(_)) {
            let task_id = self.list.get(id).and_then(|activity| activity.task_id);
            self.bus().publish(BoardEvent::ActivitiesUpdated { task_id });
        }
    }
}

fn promotion_fields(activity: &Activity, parent: Option<&Task>) -> Record {
    let mut fields = Record::new();
    fields.insert("title".into(), Value::from(activity.text.clone()));
    fields.insert(
        "description".into(),
        activity.notes.clone().map(Value::from).unwrap_or(Value::Null),
    );
    fields.insert(
        "status".into(),
        Value::from(activity.status.to_server().as_str()),
    );
    fields.insert(
        "priority".into(),
        Value::from(activity.effective_priority(parent).level()),
    );
    if let Some(assignee) = activity.effective_assignee(parent) {
        fields.insert("assignee".into(), Value::from(assignee));
    }
    for (key, date) in [
        ("startDate", activity.start_date),
        ("endDate", activity.end_date),
        ("deadline", activity.deadline),
    ] {
        if let Some(date) = date {
            fields.insert(key.into(), Value::from(format_date(date)));
        }
    }
    if let Some(key_area) = parent.and_then(Task::key_area_id) {
        fields.insert("keyAreaId".into(), Value::from(key_area));
    }
    if let Some(duration) = &activity.duration {
        fields.insert("duration".into(), Value::from(duration.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::MemoryBackend;
    use crate::priority::PriorityLevel;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn seeded() -> (Arc<MemoryBackend>, ActivityBoard) {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_task(json!({ "id": "t1", "title": "Launch", "priority": 3, "assignee": "Dana" }));
        backend.seed_activity(json!({ "id": "a1", "text": "Draft copy", "taskId": "t1" }));
        backend.seed_activity(json!({ "id": "a2", "text": "Loose end" }));
        backend.seed_activity(json!({ "id": "a3", "text": "Review", "taskId": "t1" }));
        let board = ActivityBoard::new(Services::from_backend(backend.clone()), EventBus::new());
        (backend, board)
    }

    #[tokio::test]
    async fn assignee_edits_update_the_parent_task() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        let mut events = board.bus().subscribe();

        let outcome = board
            .update_field("a1", FieldChange::Assignee(Some("Me".into())))
            .await;

        assert!(outcome.is_committed());
        assert_eq!(board.get("a1").unwrap().assignee.as_deref(), Some("Me"));
        assert_eq!(
            backend.stored_task("t1").unwrap().assignee.as_deref(),
            Some("Me")
        );
        assert!(backend.last_payload("activities.update").is_none());
        assert_eq!(
            backend.last_payload("tasks.update"),
            Some(json!({ "assignee": "Me" }))
        );

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&BoardEvent::TasksChanged {
            ids: vec!["t1".into()]
        }));
    }

    #[tokio::test]
    async fn assignee_without_parent_task_rolls_back() {
        let (_backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        let before = board.activities();

        let outcome = board.assign("a2", Some("Lee".into())).await;

        assert!(matches!(outcome, MutationOutcome::RolledBack(ServiceError::Rejected(_))));
        assert_eq!(board.activities(), before);
        assert!(board.saving().is_empty());
    }

    #[tokio::test]
    async fn field_updates_never_send_an_assignee() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::Task("t1".into())).await.unwrap();
        assert_eq!(board.activities().len(), 2);

        board
            .update_field("a3", FieldChange::Priority(PriorityLevel::Low))
            .await;

        assert_eq!(
            backend.last_payload("activities.update"),
            Some(json!({ "priority": 1 }))
        );
        assert_eq!(board.get("a3").unwrap().priority, Some(PriorityLevel::Low));
    }

    #[tokio::test]
    async fn toggled_activity_rolls_back_on_failure() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        let before = board.activities();
        backend.fail_next("activities.update");

        let outcome = board.toggle_completed("a1").await;

        assert!(matches!(outcome, MutationOutcome::RolledBack(_)));
        assert_eq!(board.activities(), before);
    }

    #[tokio::test]
    async fn promotion_creates_a_task_once() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        let parent = backend.stored_task("t1");

        let task = board.promote("a1", parent.as_ref()).await.unwrap();

        assert_eq!(task.title, "Draft copy");
        assert_eq!(task.priority, PriorityLevel::High);
        assert_eq!(task.assignee.as_deref(), Some("Dana"));
        assert!(task.is_dont_forget());
        assert_eq!(
            board.get("a1").unwrap().created_task_id.as_deref(),
            Some(task.id.as_str())
        );

        let again = board.promote("a1", parent.as_ref()).await.unwrap_err();
        assert!(matches!(again, PromotionError::AlreadyPromoted { .. }));
    }

    #[tokio::test]
    async fn failed_link_still_blocks_a_second_promotion() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        backend.fail_next("activities.update");

        let err = board.promote("a2", None).await.unwrap_err();
        let PromotionError::Link { task_id, .. } = &err else {
            panic!("expected a link failure, got {err:?}");
        };
        assert_eq!(
            board.get("a2").unwrap().created_task_id.as_deref(),
            Some(task_id.as_str())
        );

        let again = board.promote("a2", None).await.unwrap_err();
        assert!(matches!(again, PromotionError::AlreadyPromoted { .. }));
        let creates = backend
            .calls()
            .iter()
            .filter(|call| call.endpoint == "tasks.create")
            .count();
        assert_eq!(creates, 1);
        assert!(board.saving().is_empty());
    }

    #[tokio::test]
    async fn task_only_fields_are_not_sent_for_activities() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        let before = board.get("a1");

        let outcome = board
            .update_field("a1", FieldChange::KeyArea(Some("ka-ops".into())))
            .await;

        assert_eq!(outcome, MutationOutcome::Unchanged);
        assert_eq!(board.get("a1"), before);
        assert!(backend.last_payload("activities.update").is_none());
        assert_eq!(
            board.update_field("nope", FieldChange::Goal(Some("g1".into()))).await,
            MutationOutcome::Missing
        );
    }

    #[tokio::test]
    async fn failed_task_creation_leaves_the_activity_unpromoted() {
        let (backend, board) = seeded();
        board.load(&ActivityFilter::All).await.unwrap();
        backend.fail_next("tasks.create");

        let err = board.promote("a2", None).await.unwrap_err();

        assert!(matches!(err, PromotionError::Create(_)));
        assert!(!board.get("a2").unwrap().is_promoted());
        assert!(board.saving().is_empty());
    }

    #[tokio::test]
    async fn unknown_activity_cannot_be_promoted() {
        let (_backend, board) = seeded();
        let err = board.promote("missing", None).await.unwrap_err();
        assert!(matches!(err, PromotionError::NotFound(_)));
    }
}
