//! Optimistic editing of tasks and activities.
//!
//! Every edit is applied locally first, then sent to the owning service.
//! A rejected call restores the entity as it was and publishes
//! [`BoardEvent::MutationFailed`](crate::events::BoardEvent::MutationFailed).

mod activities;
mod controller;
mod field;
mod tasks;

pub use activities::ActivityBoard;
pub use controller::{Entity, MoveDirection, MutationOutcome, OptimisticList};
pub use field::{completion_payload, FieldChange};
pub use tasks::TaskBoard;
