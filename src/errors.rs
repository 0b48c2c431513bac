use http::StatusCode;
use sea_orm::error::DbErr;
use serde::Serialize;

/// Error taxonomy returned to the (out-of-scope) web layer as typed
/// results. HTTP status mapping lives here as the single source of truth;
/// nothing in this crate retries on the caller's behalf.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    /// Underlying store failure during an atomic read or write. Callers
    /// may retry these at their discretion; the enclosing transaction has
    /// already rolled back.
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serial or order-code collision. With the counter rows serializing
    /// allocation this signals a concurrency-control bug, not a transient
    /// condition.
    #[error("Allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        ServiceError::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Maps a database error onto the taxonomy, surfacing unique-constraint
    /// violations (serial or code collisions) as `AllocationConflict`.
    pub fn from_write_error(err: DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::AllocationConflict(detail)
            }
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidLineItem(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AllocationConflict(_) => StatusCode::CONFLICT,
            Self::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            _ => self.to_string(),
        }
    }
}
