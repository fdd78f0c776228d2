//! Crate-wide error type.
//!
//! Every store, repository and controller returns [`AppResult`]; the
//! variants mirror how the dashboard reacts to a failure.

use thiserror::Error;

use crate::storage::StorageError;
use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    /// One or more task fields are invalid. Recovered inside the form.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A stale id was referenced.
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The backend was unreachable or rejected the request.
    #[error("could not save changes: {0}")]
    Persistence(String),

    /// No active session.
    #[error("sign in required")]
    AuthRequired,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Errors the user can act on without restarting: fix the input,
    /// refresh the view or retry the save.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::NotFound { .. } | AppError::Persistence(_)
        )
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Persistence("request timed out".to_string())
        } else if err.is_connect() {
            AppError::Persistence("backend unreachable".to_string())
        } else {
            AppError::Persistence(err.to_string())
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
