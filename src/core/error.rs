//! Workflow errors

use crate::infrastructure::entities::{MeetingStatus, SuggestionStatus};
use crate::infrastructure::traits::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("suggestion or meeting not found")]
    NotFound,

    #[error("not permitted for this user")]
    Forbidden,

    #[error("cannot move a suggestion from {from} to {to}")]
    IllegalTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },

    #[error("suggestion was modified concurrently, reload and retry")]
    Conflict,

    #[error("meeting is {0}, feedback needs a completed meeting")]
    InvalidMeetingState(MeetingStatus),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("feedback for this meeting was already submitted")]
    AlreadySubmitted,

    #[error("party already takes part in another active suggestion")]
    ActiveSuggestionExists,

    #[error("database error: {0}")]
    Persistence(#[source] sqlx::Error),
}

impl From<RepositoryError> for SuggestionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict => SuggestionError::Conflict,
            RepositoryError::Duplicate => SuggestionError::AlreadySubmitted,
            RepositoryError::PartyBusy => SuggestionError::ActiveSuggestionExists,
            RepositoryError::Database(e) => SuggestionError::Persistence(e),
        }
    }
}
