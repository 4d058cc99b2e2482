use std::collections::HashSet;
use std::future::Future;

use parking_lot::Mutex;

use crate::error::ServiceError;
use crate::events::{BoardEvent, EntityKind, EventBus};
use crate::model::{Activity, Task};

/// Something a board can hold and mutate optimistically.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Activity {
    const KIND: EntityKind = EntityKind::Activity;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted the change and its record replaced the local one.
    Committed,
    /// The server refused; the entity is back to its pre-mutation state.
    RolledBack(ServiceError),
    /// Another mutation for the same id was still in flight.
    Skipped,
    /// No entity with that id is loaded.
    Missing,
    /// The change has no remote field for this entity; nothing was sent.
    Unchanged,
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MutationOutcome::Committed => "saved",
            MutationOutcome::RolledBack(_) => "rolled back",
            MutationOutcome::Skipped => "skipped (still saving)",
            MutationOutcome::Missing => "not found",
            MutationOutcome::Unchanged => "nothing to save",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

struct ListState<E> {
    items: Vec<E>,
    in_flight: HashSet<String>,
}

/// Pending rollback data for one entity.
struct Snapshot<E> {
    index: usize,
    entity: E,
}

/// Ordered collection with per-id optimistic mutation.
///
/// The lock is never held across an await; the in-flight set is what keeps
/// two mutations of the same id from overlapping.
pub struct OptimisticList<E: Entity> {
    state: Mutex<ListState<E>>,
    bus: EventBus,
}

impl<E: Entity> OptimisticList<E> {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Mutex::new(ListState {
                items: Vec::new(),
                in_flight: HashSet::new(),
            }),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn replace_all(&self, items: Vec<E>) {
        self.state.lock().items = items;
    }

    pub fn items(&self) -> Vec<E> {
        self.state.lock().items.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.state
            .lock()
            .items
            .iter()
            .map(|item| item.id().to_string())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.state
            .lock()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.state.lock().in_flight.contains(id)
    }

    pub fn in_flight(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.state.lock().in_flight.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Replaces the entity with the same id, or appends it.
    pub fn upsert(&self, entity: E) {
        let mut state = self.state.lock();
        match state.items.iter_mut().find(|item| item.id() == entity.id()) {
            Some(slot) => *slot = entity,
            None => state.items.push(entity),
        }
    }

    pub fn remove_local(&self, id: &str) -> Option<E> {
        let mut state = self.state.lock();
        let index = state.items.iter().position(|item| item.id() == id)?;
        Some(state.items.remove(index))
    }

    /// Claims `id` for a non-optimistic operation. Returns false when a
    /// mutation already holds it.
    pub fn try_claim(&self, id: &str) -> bool {
        self.state.lock().in_flight.insert(id.to_string())
    }

    pub fn release(&self, id: &str) {
        self.state.lock().in_flight.remove(id);
    }

    /// Applies `apply` locally, sends the updated entity through `remote`,
    /// then either merges the server's answer or restores the entity.
    pub async fn mutate<A, R, Fut>(&self, id: &str, action: &str, apply: A, remote: R) -> MutationOutcome
    where
        A: FnOnce(&mut E),
        R: FnOnce(E) -> Fut,
        Fut: Future<Output = Result<E, ServiceError>>,
    {
        let (snapshot, optimistic) = {
            let mut state = self.state.lock();
            if state.in_flight.contains(id) {
                tracing::debug!(kind = E::KIND.as_str(), id, action, "mutation skipped; already saving");
                return MutationOutcome::Skipped;
            }
            let Some(index) = state.items.iter().position(|item| item.id() == id) else {
                return MutationOutcome::Missing;
            };
            let snapshot = Snapshot {
                index,
                entity: state.items[index].clone(),
            };
            apply(&mut state.items[index]);
            let optimistic = state.items[index].clone();
            state.in_flight.insert(id.to_string());
            (snapshot, optimistic)
        };

        let result = remote(optimistic).await;

        let mut state = self.state.lock();
        state.in_flight.remove(id);
        match result {
            Ok(confirmed) => {
                if !confirmed.id().is_empty() {
                    if let Some(slot) = state.items.iter_mut().find(|item| item.id() == id) {
                        *slot = confirmed;
                    }
                }
                drop(state);
                self.bus.publish(BoardEvent::MutationCommitted {
                    kind: E::KIND,
                    id: id.to_string(),
                    action: action.to_string(),
                });
                MutationOutcome::Committed
            }
            Err(error) => {
                restore(&mut state.items, snapshot);
                drop(state);
                self.bus.publish(BoardEvent::MutationFailed {
                    kind: E::KIND,
                    id: id.to_string(),
                    action: action.to_string(),
                    error: error.to_string(),
                });
                MutationOutcome::RolledBack(error)
            }
        }
    }

    /// Swaps the entity with its neighbour. Local only; false at either end.
    pub fn move_item(&self, id: &str, direction: MoveDirection) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state.items.iter().position(|item| item.id() == id) else {
            return false;
        };
        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < state.items.len() => index + 1,
            _ => return false,
        };
        state.items.swap(index, target);
        true
    }
}

fn restore<E: Entity>(items: &mut Vec<E>, snapshot: Snapshot<E>) {
    let id = snapshot.entity.id().to_string();
    match items.iter().position(|item| item.id() == id) {
        Some(current) if current == snapshot.index => items[current] = snapshot.entity,
        Some(current) => {
            items.remove(current);
            items.insert(snapshot.index.min(items.len()), snapshot.entity);
        }
        None => items.insert(snapshot.index.min(items.len()), snapshot.entity),
    }
}
