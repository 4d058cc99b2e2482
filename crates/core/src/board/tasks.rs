use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::debounce::ListChangeNotifier;
use crate::error::ServiceError;
use crate::events::{BoardEvent, EventBus};
use crate::model::{Placement, Task};
use crate::normalize::Record;
use crate::quadrant::Quadrant;
use crate::services::{Services, TaskFilter};
use crate::status::UiStatus;

use super::controller::{MoveDirection, MutationOutcome, OptimisticList};
use super::field::{completion_payload, FieldChange};

/// Local task collection kept in step with the task service.
pub struct TaskBoard {
    list: OptimisticList<Task>,
    services: Services,
    list_changes: Option<ListChangeNotifier>,
}

impl TaskBoard {
    pub fn new(services: Services, bus: EventBus) -> Self {
        Self {
            list: OptimisticList::new(bus),
            services,
            list_changes: None,
        }
    }

    /// Also publishes a debounced `ListChanged` whenever tasks are loaded,
    /// added, removed or reordered. Must be called inside a tokio runtime.
    pub fn with_list_notifications(mut self, delay: Duration) -> Self {
        self.list_changes = Some(ListChangeNotifier::spawn(self.bus().clone(), delay));
        self
    }

    fn list_changed(&self) {
        if let Some(notifier) = &self.list_changes {
            notifier.notify(self.list.ids());
        }
    }

    pub fn bus(&self) -> &EventBus {
        self.list.bus()
    }

    pub async fn load(&self, filter: &TaskFilter) -> Result<usize, ServiceError> {
        let tasks = self.services.tasks.list(filter).await?;
        let count = tasks.len();
        let ids = tasks.iter().map(|task| task.id.clone()).collect();
        self.list.replace_all(tasks);
        tracing::debug!(count, filter = ?filter, "tasks loaded");
        self.bus().publish(BoardEvent::TasksChanged { ids });
        self.list_changed();
        Ok(count)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.list.items()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.list.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.list.ids()
    }

    pub fn is_saving(&self, id: &str) -> bool {
        self.list.is_in_flight(id)
    }

    pub fn saving(&self) -> Vec<String> {
        self.list.in_flight()
    }

    /// The "Don't Forget" backlog: tasks with no key area, in list order.
    pub fn dont_forget(&self) -> Vec<Task> {
        let mut backlog: Vec<_> = self
            .list
            .items()
            .into_iter()
            .filter(Task::is_dont_forget)
            .collect();
        backlog.sort_by_key(|task| task.list_index.unwrap_or(u32::MAX));
        backlog
    }

    pub fn by_key_area(&self) -> BTreeMap<String, Vec<Task>> {
        let mut groups: BTreeMap<String, Vec<Task>> = BTreeMap::new();
        for task in self.list.items() {
            if let Some(key_area) = task.key_area_id() {
                groups.entry(key_area.to_string()).or_default().push(task);
            }
        }
        groups
    }

    pub fn quadrants(&self, today: NaiveDate) -> BTreeMap<Quadrant, Vec<Task>> {
        let mut buckets: BTreeMap<Quadrant, Vec<Task>> =
            Quadrant::ALL.iter().map(|quadrant| (*quadrant, Vec::new())).collect();
        for task in self.list.items() {
            buckets.entry(task.quadrant(today)).or_default().push(task);
        }
        buckets
    }

    pub async fn update_field(&self, id: &str, change: FieldChange) -> MutationOutcome {
        let tasks = self.services.tasks.clone();
        let payload = change.task_payload();
        let now = Utc::now();
        self.list
            .mutate(
                id,
                change.label(),
                |task| change.apply_to_task(task, now),
                |task| async move { tasks.update(&task.id, payload).await },
            )
            .await
    }

    pub async fn toggle_completed(&self, id: &str) -> MutationOutcome {
        let tasks = self.services.tasks.clone();
        let now = Utc::now();
        self.list
            .mutate(
                id,
                "toggle completed",
                |task| {
                    let status = if task.completed {
                        UiStatus::Open
                    } else {
                        UiStatus::Done
                    };
                    FieldChange::Status(status).apply_to_task(task, now);
                    task.completion_date = status.is_done().then_some(now);
                },
                |task| async move {
                    let payload = completion_payload(task.completed, task.completion_date);
                    tasks.update(&task.id, payload).await
                },
            )
            .await
    }

    /// Moves a backlog task into a key area. The task sits in
    /// [`Placement::Moving`] until the service confirms.
    pub async fn move_to_key_area(&self, id: &str, key_area_id: &str) -> MutationOutcome {
        let tasks = self.services.tasks.clone();
        let target = key_area_id.to_string();
        let mut payload = Record::new();
        payload.insert("keyAreaId".into(), Value::from(target.clone()));
        payload.insert("listIndex".into(), Value::from(1));
        self.list
            .mutate(
                id,
                "move to key area",
                |task| {
                    task.placement = Placement::Moving(target);
                    task.list_index = Some(1);
                },
                |task| async move { tasks.update(&task.id, payload).await },
            )
            .await
    }

    pub fn move_item(&self, id: &str, direction: MoveDirection) -> bool {
        let moved = self.list.move_item(id, direction);
        if moved {
            self.bus().publish(BoardEvent::TasksChanged {
                ids: vec![id.to_string()],
            });
            self.list_changed();
        }
        moved
    }

    pub async fn create(&self, fields: Record) -> Result<Task, ServiceError> {
        let task = self.services.tasks.create(fields).await?;
        self.list.upsert(task.clone());
        self.bus().publish(BoardEvent::TasksChanged {
            ids: vec![task.id.clone()],
        });
        self.list_changed();
        Ok(task)
    }

    pub async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        if !self.list.try_claim(id) {
            return Err(ServiceError::Rejected(format!("task '{}' is still saving", id)));
        }
        let result = self.services.tasks.remove(id).await;
        self.list.release(id);
        result?;
        self.list.remove_local(id);
        self.bus().publish(BoardEvent::TasksChanged {
            ids: vec![id.to_string()],
        });
        self.list_changed();
        Ok(())
    }

    /// Re-reads a task the server changed behind this board's back.
    pub fn merge(&self, task: Task) {
        self.list.upsert(task);
    }
}
