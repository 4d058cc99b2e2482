//! Typed broadcast channel for board notifications.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Activity,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Activity => "activity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    MutationCommitted {
        kind: EntityKind,
        id: String,
        action: String,
    },
    MutationFailed {
        kind: EntityKind,
        id: String,
        action: String,
        error: String,
    },
    /// Activities belonging to `task_id` changed; `None` means unknown parent.
    ActivitiesUpdated { task_id: Option<String> },
    TasksChanged { ids: Vec<String> },
    /// Debounced, deduplicated snapshot of a list's member ids.
    ListChanged { ids: Vec<String> },
}

/// Fire-and-forget fan-out. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BoardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: BoardEvent) {
        match &event {
            BoardEvent::MutationCommitted { kind, id, action } => tracing::debug!(
                kind = kind.as_str(),
                id = id.as_str(),
                action = action.as_str(),
                "mutation committed"
            ),
            BoardEvent::MutationFailed {
                kind,
                id,
                action,
                error,
            } => tracing::warn!(
                kind = kind.as_str(),
                id = id.as_str(),
                action = action.as_str(),
                error = %error,
                "mutation rolled back"
            ),
            BoardEvent::ActivitiesUpdated { task_id } => {
                tracing::debug!(task_id = ?task_id, "activities updated")
            }
            BoardEvent::TasksChanged { ids } => {
                tracing::debug!(count = ids.len(), "tasks changed")
            }
            BoardEvent::ListChanged { ids } => {
                tracing::debug!(count = ids.len(), "list changed")
            }
        }
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(BoardEvent::ActivitiesUpdated {
            task_id: Some("t1".into()),
        });

        let expected = BoardEvent::ActivitiesUpdated {
            task_id: Some("t1".into()),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(BoardEvent::TasksChanged { ids: vec![] });
    }
}
