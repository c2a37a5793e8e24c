use crate::infrastructure::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("user {user_id} does not own {entity} {id}")]
    Unauthorized {
        user_id: i64,
        entity: &'static str,
        id: i64,
    },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("invalid time range: {0}")]
    InvalidRange(String),
    #[error("too early to settle: {0}")]
    TooEarly(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
