use thiserror::Error;

/// Failure reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("{endpoint} responded with status {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("activity '{0}' not found")]
    NotFound(String),
    #[error("activity '{activity_id}' was already promoted to task '{task_id}'")]
    AlreadyPromoted {
        activity_id: String,
        task_id: String,
    },
    #[error("activity '{0}' is still saving")]
    Busy(String),
    #[error("failed to create task from activity: {0}")]
    Create(#[source] ServiceError),
    #[error("task '{task_id}' was created but linking it to the activity failed: {source}")]
    Link {
        task_id: String,
        #[source]
        source: ServiceError,
    },
}
