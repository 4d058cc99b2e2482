//! Coalesces bursts of list changes into one `ListChanged` notification.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{BoardEvent, EventBus};

pub const LIST_CHANGE_DELAY: Duration = Duration::from_millis(150);

/// Trailing debounce over id snapshots. A burst publishes once, after the
/// list has been quiet for `delay`, and only when the sorted id set differs
/// from the last one published.
pub struct ListChangeNotifier {
    sender: mpsc::UnboundedSender<Vec<String>>,
    worker: JoinHandle<()>,
}

impl ListChangeNotifier {
    /// Must be called inside a tokio runtime.
    pub fn spawn(bus: EventBus, delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(bus, delay, receiver));
        Self { sender, worker }
    }

    pub fn notify<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let snapshot = ids.into_iter().map(Into::into).collect();
        if self.sender.send(snapshot).is_err() {
            tracing::debug!("list change notifier already stopped");
        }
    }
}

impl Drop for ListChangeNotifier {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run(bus: EventBus, delay: Duration, mut receiver: mpsc::UnboundedReceiver<Vec<String>>) {
    let mut last_published: Option<Vec<String>> = None;

    while let Some(first) = receiver.recv().await {
        let mut pending = first;
        loop {
            tokio::select! {
                next = receiver.recv() => match next {
                    Some(snapshot) => pending = snapshot,
                    None => break,
                },
                _ = tokio::time::sleep(delay) => break,
            }
        }

        let ids = sorted_id_set(pending);
        if last_published.as_ref() == Some(&ids) {
            tracing::trace!(count = ids.len(), "list change suppressed");
            continue;
        }
        bus.publish(BoardEvent::ListChanged { ids: ids.clone() });
        last_published = Some(ids);
    }
}

fn sorted_id_set(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::timeout;

    fn list_changed(ids: &[&str]) -> BoardEvent {
        BoardEvent::ListChanged {
            ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_notification() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let notifier = ListChangeNotifier::spawn(bus.clone(), LIST_CHANGE_DELAY);

        notifier.notify(["b", "a"]);
        notifier.notify(["c", "a", "b"]);
        notifier.notify(["b", "c", "a", "a"]);

        assert_eq!(events.recv().await.unwrap(), list_changed(&["a", "b", "c"]));
        assert!(timeout(Duration::from_secs(1), events.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn identical_id_sets_are_not_repeated() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let notifier = ListChangeNotifier::spawn(bus.clone(), LIST_CHANGE_DELAY);

        notifier.notify(["t2", "t1"]);
        assert_eq!(events.recv().await.unwrap(), list_changed(&["t1", "t2"]));

        notifier.notify(["t1", "t2"]);
        assert!(timeout(Duration::from_secs(1), events.recv()).await.is_err());

        notifier.notify(["t1"]);
        assert_eq!(events.recv().await.unwrap(), list_changed(&["t1"]));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_the_quiet_period() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let notifier = ListChangeNotifier::spawn(bus.clone(), LIST_CHANGE_DELAY);

        notifier.notify(["x"]);
        assert!(timeout(Duration::from_millis(100), events.recv()).await.is_err());
        assert_eq!(events.recv().await.unwrap(), list_changed(&["x"]));
    }
}
