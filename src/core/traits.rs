//! DI "Interfaces"

use crate::core::category::Category;
use crate::core::error::SuggestionError;
use crate::infrastructure::entities;
use crate::infrastructure::entities::{MeetingStatus, Priority, SuggestionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub first_party_id: Uuid,
    pub second_party_id: Uuid,
    pub priority: Priority,
    pub decision_deadline: Option<DateTime<Utc>>,
    pub matching_reason: Option<String>,
    pub internal_notes: Option<String>,
}

/// A status change requested by `acting_user_id`, whose identity was established by the caller.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub suggestion_id: Uuid,
    pub acting_user_id: Uuid,
    pub requested_status: SuggestionStatus,
    pub note: Option<String>,
    /// The `updated_at` the caller last saw; a mismatch is reported as a conflict.
    pub expected_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub scheduled_date: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedbackSubmission {
    pub suggestion_id: Uuid,
    pub meeting_id: Uuid,
    pub acting_user_id: Uuid,
    pub wants_second_date: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MeetingWithFeedback {
    pub meeting: entities::Meeting,
    pub feedback: Vec<entities::MeetingFeedback>,
}

/// The result of a meeting status change, with the authoritative suggestion.
#[derive(Debug, Clone)]
pub struct MeetingUpdate {
    pub meeting: entities::Meeting,
    pub suggestion: entities::Suggestion,
}

#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Creates a suggestion owned by `matchmaker_id`, waiting for the first party.
    ///
    /// Returns `Err(Validation)` if the parties are the same user or include the matchmaker.
    async fn create_suggestion(
        &self,
        matchmaker_id: Uuid,
        suggestion: NewSuggestion,
    ) -> Result<entities::Suggestion, SuggestionError>;

    /// Lists the suggestions the user takes part in, optionally limited to one category.
    async fn list_suggestions(
        &self,
        user_id: Uuid,
        category: Option<Category>,
    ) -> Result<Vec<entities::Suggestion>, SuggestionError>;

    /// Returns `Err(Forbidden)` if the user is not a participant.
    async fn get_suggestion(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<entities::Suggestion, SuggestionError>;

    /// Validates and applies a status change.
    ///
    /// Fails with `NotFound`, `Forbidden` (not a participant, or wrong role for the change),
    /// `Conflict` (stale or concurrently modified), `IllegalTransition` or
    /// `ActiveSuggestionExists`. Nothing is written on failure.
    async fn attempt_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<entities::Suggestion, SuggestionError>;

    /// The statuses the user may request right now.
    async fn available_actions(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Vec<SuggestionStatus>, SuggestionError>;

    async fn status_history(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Vec<entities::StatusHistoryEntry>, SuggestionError>;
}

#[async_trait]
pub trait MeetingService: Send + Sync {
    /// Schedules a meeting once contact details were shared.
    async fn schedule_meeting(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
        meeting: NewMeeting,
    ) -> Result<entities::Meeting, SuggestionError>;

    async fn list_meetings(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Vec<MeetingWithFeedback>, SuggestionError>;

    /// Completes or cancels a scheduled meeting.
    ///
    /// Completing the first meeting moves the suggestion to `AWAITING_FIRST_DATE_FEEDBACK`.
    async fn update_meeting_status(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
        meeting_id: Uuid,
        status: MeetingStatus,
    ) -> Result<MeetingUpdate, SuggestionError>;

    /// Records a party's feedback and derives the next suggestion status.
    ///
    /// Returns `Err(InvalidMeetingState)` unless the meeting is completed and
    /// `Err(AlreadySubmitted)` if the party already answered for this meeting.
    async fn submit_feedback(
        &self,
        submission: FeedbackSubmission,
    ) -> Result<entities::Suggestion, SuggestionError>;
}
