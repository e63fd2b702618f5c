use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A guest caller already holds `limit` completed jobs of the requested kind.
    #[error("Preview limit of {limit} reached for guest '{guest_id}'")]
    QuotaExceeded { guest_id: String, limit: i64 },

    #[error("Internal error: {0}")]
    Internal(String),
}
