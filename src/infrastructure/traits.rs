//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use crate::infrastructure::entities::{MeetingStatus, SuggestionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A compare-and-swap guard did not match the stored row.
    #[error("row was modified concurrently")]
    Conflict,
    #[error("row already exists")]
    Duplicate,
    /// A [`PartyGuard`] found another suggestion in one of its statuses.
    #[error("party already takes part in another suggestion")]
    PartyBusy,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A suggestion rewrite guarded by the status and version it was computed from.
///
/// The update and its history rows are written in one transaction, or not at all.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub expected_status: SuggestionStatus,
    pub expected_version: i64,
    pub updated: entities::Suggestion,
    pub events: Vec<entities::StatusHistoryEntry>,
    pub guard: Option<PartyGuard>,
}

/// Refuses a write while any of `party_ids` is a party to another suggestion in `statuses`.
///
/// Checked inside the write transaction, after the write lock is taken.
#[derive(Debug, Clone)]
pub struct PartyGuard {
    pub party_ids: Vec<Uuid>,
    pub statuses: Vec<SuggestionStatus>,
}

#[async_trait]
pub trait SuggestionRepository: Send + Sync {
    async fn find_suggestion(
        &self,
        suggestion_id: Uuid,
    ) -> Result<Option<entities::Suggestion>, RepositoryError>;

    /// Suggestions where the user is first party, second party or matchmaker.
    async fn list_suggestions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<entities::Suggestion>, RepositoryError>;

    /// Returns `Err(RepositoryError::PartyBusy)` if `guard` refuses the insert.
    async fn create_suggestion(
        &self,
        suggestion: entities::Suggestion,
        guard: PartyGuard,
    ) -> Result<entities::Suggestion, RepositoryError>;

    /// Returns `Err(RepositoryError::Conflict)` if the status or version no longer match and
    /// `Err(RepositoryError::PartyBusy)` if the update's party guard refuses it.
    async fn apply_status_update(
        &self,
        update: StatusUpdate,
    ) -> Result<entities::Suggestion, RepositoryError>;

    async fn list_status_history(
        &self,
        suggestion_id: Uuid,
    ) -> Result<Vec<entities::StatusHistoryEntry>, RepositoryError>;

    async fn create_meeting(
        &self,
        meeting: entities::Meeting,
    ) -> Result<entities::Meeting, RepositoryError>;

    async fn find_meeting(
        &self,
        meeting_id: Uuid,
    ) -> Result<Option<entities::Meeting>, RepositoryError>;

    async fn list_meetings(
        &self,
        suggestion_id: Uuid,
    ) -> Result<Vec<entities::Meeting>, RepositoryError>;

    /// Moves a meeting out of `expected`, optionally rewriting its suggestion in the same
    /// transaction.
    async fn update_meeting_status(
        &self,
        meeting_id: Uuid,
        expected: MeetingStatus,
        status: MeetingStatus,
        updated_at: DateTime<Utc>,
        suggestion_update: Option<StatusUpdate>,
    ) -> Result<(entities::Meeting, Option<entities::Suggestion>), RepositoryError>;

    async fn list_meeting_feedback(
        &self,
        meeting_id: Uuid,
    ) -> Result<Vec<entities::MeetingFeedback>, RepositoryError>;

    /// Inserts the feedback and applies `update`.
    ///
    /// Returns `Err(RepositoryError::Duplicate)` if the party already left feedback for the
    /// meeting.
    async fn record_feedback(
        &self,
        feedback: entities::MeetingFeedback,
        update: StatusUpdate,
    ) -> Result<(entities::MeetingFeedback, entities::Suggestion), RepositoryError>;
}
