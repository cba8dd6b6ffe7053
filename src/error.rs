use thiserror::Error;

use crate::model::SessionStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Moderation(String),

    #[error("Unable to verify content. Please try again. ({0})")]
    ModerationUnavailable(String),

    #[error("The code {0} is already in use. Please generate a new one.")]
    DuplicateCode(String),

    #[error("This device has already joined the game.")]
    AlreadyJoined,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session is {actual}, expected {expected}")]
    InvalidStatus {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("Cannot draw winners: no players have joined")]
    EmptyRoster,

    #[error("Failed to record winner {player_id}: {reason}")]
    WinnerWrite { player_id: i32, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "ssr")]
impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => AppError::NotFound("Record".to_string()),
            other => AppError::Backend(other.to_string()),
        }
    }
}

#[cfg(feature = "ssr")]
impl From<diesel::ConnectionError> for AppError {
    fn from(err: diesel::ConnectionError) -> Self {
        AppError::Backend(err.to_string())
    }
}

#[cfg(feature = "ssr")]
impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::Backend(err.to_string())
    }
}

/// Returns true if the diesel error is a unique constraint violation.
#[cfg(feature = "ssr")]
pub fn is_unique_violation(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        )
    )
}
