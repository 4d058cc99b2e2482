pub mod board;
pub mod config;
pub mod dates;
pub mod debounce;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod priority;
pub mod quadrant;
pub mod services;
pub mod status;

pub use board::{ActivityBoard, FieldChange, MoveDirection, MutationOutcome, TaskBoard};
pub use config::AppConfig;
pub use debounce::{ListChangeNotifier, LIST_CHANGE_DELAY};
pub use error::{PromotionError, ServiceError};
pub use events::{BoardEvent, EntityKind, EventBus};
pub use memory::MemoryBackend;
pub use model::*;
pub use normalize::{normalize_record, Record};
pub use priority::{priority_level, PriorityLevel};
pub use quadrant::{classify, Quadrant, QuadrantInput};
pub use services::{
    ActivityFilter, ActivityService, GoalService, Services, TaskFilter, TaskService, UsersService,
};
pub use status::{server_to_ui, ui_to_server, ServerStatus, UiStatus};
