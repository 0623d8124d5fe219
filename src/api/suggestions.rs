//! Suggestion endpoints

use crate::api::suggestions::schemas::{
    ActionList, CreateMeeting, CreateSuggestion, HistoryList, ListQuery, MeetingList,
    SubmitFeedback, SuggestionList, SuggestionView, UpdateMeetingStatus, UpdateStatus,
};
use crate::api::{ApiError, ExtractUser};
use crate::core::category::Category;
use crate::core::traits::{
    FeedbackSubmission, MeetingService, NewMeeting, NewSuggestion, SuggestionService,
    TransitionRequest,
};
use crate::infrastructure::entities::{MeetingStatus, SuggestionStatus};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use di_axum::Inject;
use std::str::FromStr;
use uuid::Uuid;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suggestions).post(create_suggestion))
        .route("/:id", get(get_suggestion))
        .route("/:id/status", put(update_status))
        .route("/:id/actions", get(available_actions))
        .route("/:id/history", get(status_history))
        .route("/:id/meetings", get(list_meetings).post(schedule_meeting))
        .route(
            "/:id/meetings/:meeting_id/status",
            put(update_meeting_status),
        )
        .route("/:id/meetings/:meeting_id/feedback", post(submit_feedback))
}

async fn list_suggestions(
    Inject(suggestion_service): Inject<dyn SuggestionService>,
    ExtractUser(current_user): ExtractUser,
    Query(query): Query<ListQuery>,
) -> Result<(StatusCode, Json<SuggestionList>), ApiError> {
    let category = query
        .category
        .as_deref()
        .map(Category::from_str)
        .transpose()
        .map_err(ApiError::validation)?;

    let suggestions = suggestion_service
        .list_suggestions(current_user, category)
        .await?;

    Ok((
        StatusCode::OK,
        SuggestionList {
            suggestions: suggestions
                .into_iter()
                .map(|s| SuggestionView::for_viewer(s, current_user))
                .collect(),
        }
        .into(),
    ))
}

async fn create_suggestion(
    Inject(suggestion_service): Inject<dyn SuggestionService>,
    ExtractUser(current_user): ExtractUser,
    payload: Result<Json<CreateSuggestion>, JsonRejection>,
) -> Result<(StatusCode, Json<SuggestionView>), ApiError> {
    let Json(create) = payload?;

    let suggestion = suggestion_service
        .create_suggestion(
            current_user,
            NewSuggestion {
                first_party_id: create.first_party_id,
                second_party_id: create.second_party_id,
                priority: create.priority.unwrap_or_default(),
                decision_deadline: create.decision_deadline,
                matching_reason: create.matching_reason,
                internal_notes: create.internal_notes,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuggestionView::for_viewer(suggestion, current_user)),
    ))
}

async fn get_suggestion(
    Inject(suggestion_service): Inject<dyn SuggestionService>,
    ExtractUser(current_user): ExtractUser,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<SuggestionView>, ApiError> {
    let suggestion = suggestion_service
        .get_suggestion(current_user, suggestion_id)
        .await?;

    Ok(Json(SuggestionView::for_viewer(suggestion, current_user)))
}

async fn update_status(
    Inject(suggestion_service): Inject<dyn SuggestionService>,
    ExtractUser(current_user): ExtractUser,
    Path(suggestion_id): Path<Uuid>,
    payload: Result<Json<UpdateStatus>, JsonRejection>,
) -> Result<Json<SuggestionView>, ApiError> {
    let Json(update) = payload?;
    let requested_status = SuggestionStatus::from_str(&update.status)
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let suggestion = suggestion_service
        .attempt_transition(TransitionRequest {
            suggestion_id,
            acting_user_id: current_user,
            requested_status,
            note: update.note,
            expected_updated_at: update.expected_updated_at,
        })
        .await?;

    Ok(Json(SuggestionView::for_viewer(suggestion, current_user)))
}

async fn available_actions(
    Inject(suggestion_service): Inject<dyn SuggestionService>,
    ExtractUser(current_user): ExtractUser,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<ActionList>, ApiError> {
    let statuses = suggestion_service
        .available_actions(current_user, suggestion_id)
        .await?;

    Ok(Json(ActionList::from(statuses)))
}

async fn status_history(
    Inject(suggestion_service): Inject<dyn SuggestionService>,
    ExtractUser(current_user): ExtractUser,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<HistoryList>, ApiError> {
    let history = suggestion_service
        .status_history(current_user, suggestion_id)
        .await?;

    Ok(Json(HistoryList {
        history: history.into_iter().map(schemas::HistoryEntry::from).collect(),
    }))
}

async fn list_meetings(
    Inject(meeting_service): Inject<dyn MeetingService>,
    ExtractUser(current_user): ExtractUser,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<MeetingList>, ApiError> {
    let meetings = meeting_service
        .list_meetings(current_user, suggestion_id)
        .await?;

    Ok(Json(MeetingList {
        meetings: meetings.into_iter().map(schemas::Meeting::from).collect(),
    }))
}

async fn schedule_meeting(
    Inject(meeting_service): Inject<dyn MeetingService>,
    ExtractUser(current_user): ExtractUser,
    Path(suggestion_id): Path<Uuid>,
    payload: Result<Json<CreateMeeting>, JsonRejection>,
) -> Result<(StatusCode, Json<schemas::Meeting>), ApiError> {
    let Json(create) = payload?;

    let meeting = meeting_service
        .schedule_meeting(
            current_user,
            suggestion_id,
            NewMeeting {
                scheduled_date: create.scheduled_date,
                location: create.location,
                notes: create.notes,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(schemas::Meeting::without_feedback(meeting)),
    ))
}

async fn update_meeting_status(
    Inject(meeting_service): Inject<dyn MeetingService>,
    ExtractUser(current_user): ExtractUser,
    Path((suggestion_id, meeting_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateMeetingStatus>, JsonRejection>,
) -> Result<Json<schemas::MeetingUpdate>, ApiError> {
    let Json(update) = payload?;
    let status = match update.status.as_str() {
        "COMPLETED" => MeetingStatus::Completed,
        "CANCELLED" => MeetingStatus::Cancelled,
        other => {
            return Err(ApiError::validation(format!(
                "meeting status must be COMPLETED or CANCELLED, got `{other}`"
            )));
        }
    };

    let result = meeting_service
        .update_meeting_status(current_user, suggestion_id, meeting_id, status)
        .await?;

    Ok(Json(schemas::MeetingUpdate {
        meeting: schemas::Meeting::without_feedback(result.meeting),
        suggestion: SuggestionView::for_viewer(result.suggestion, current_user),
    }))
}

async fn submit_feedback(
    Inject(meeting_service): Inject<dyn MeetingService>,
    ExtractUser(current_user): ExtractUser,
    Path((suggestion_id, meeting_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<SubmitFeedback>, JsonRejection>,
) -> Result<Json<SuggestionView>, ApiError> {
    let Json(feedback) = payload?;

    let suggestion = meeting_service
        .submit_feedback(FeedbackSubmission {
            suggestion_id,
            meeting_id,
            acting_user_id: current_user,
            wants_second_date: feedback.wants_second_date,
            notes: feedback.notes,
        })
        .await?;

    Ok(Json(SuggestionView::for_viewer(suggestion, current_user)))
}

pub mod schemas {
    use crate::core::category::{self, Category};
    use crate::core::traits;
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::{
        ActorRole, MeetingStatus, PartyRole, Priority, SuggestionStatus,
    };
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Deserialize, Debug, Default)]
    pub struct ListQuery {
        pub category: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateSuggestion {
        pub first_party_id: Uuid,
        pub second_party_id: Uuid,
        pub priority: Option<Priority>,
        pub decision_deadline: Option<DateTime<Utc>>,
        pub matching_reason: Option<String>,
        pub internal_notes: Option<String>,
    }

    /// Status is taken as a raw string so unknown literals are reported as validation errors.
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateStatus {
        pub status: String,
        pub note: Option<String>,
        pub expected_updated_at: Option<DateTime<Utc>>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateMeeting {
        pub scheduled_date: DateTime<Utc>,
        pub location: Option<String>,
        pub notes: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub struct UpdateMeetingStatus {
        pub status: String,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct SubmitFeedback {
        pub wants_second_date: bool,
        pub notes: Option<String>,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct SuggestionView {
        pub id: Uuid,
        pub matchmaker_id: Uuid,
        pub first_party_id: Uuid,
        pub second_party_id: Uuid,
        pub status: SuggestionStatus,
        pub previous_status: Option<SuggestionStatus>,
        pub category: Category,
        pub priority: Priority,
        pub matching_reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub internal_notes: Option<String>,
        pub decision_deadline: Option<DateTime<Utc>>,
        pub first_party_responded_at: Option<DateTime<Utc>>,
        pub second_party_sent_at: Option<DateTime<Utc>>,
        pub second_party_responded_at: Option<DateTime<Utc>>,
        pub closed_at: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl SuggestionView {
        /// Internal notes are only shown to the matchmaker.
        pub fn for_viewer(suggestion: entities::Suggestion, viewer: Uuid) -> Self {
            let internal_notes = if suggestion.matchmaker_id == viewer {
                suggestion.internal_notes
            } else {
                None
            };

            SuggestionView {
                id: suggestion.id,
                matchmaker_id: suggestion.matchmaker_id,
                first_party_id: suggestion.first_party_id,
                second_party_id: suggestion.second_party_id,
                status: suggestion.status,
                previous_status: suggestion.previous_status,
                category: category::classify(suggestion.status),
                priority: suggestion.priority,
                matching_reason: suggestion.matching_reason,
                internal_notes,
                decision_deadline: suggestion.decision_deadline,
                first_party_responded_at: suggestion.first_party_responded_at,
                second_party_sent_at: suggestion.second_party_sent_at,
                second_party_responded_at: suggestion.second_party_responded_at,
                closed_at: suggestion.closed_at,
                created_at: suggestion.created_at,
                updated_at: suggestion.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct SuggestionList {
        pub suggestions: Vec<SuggestionView>,
    }

    #[derive(Serialize, Debug)]
    pub struct Action {
        pub status: SuggestionStatus,
    }

    #[derive(Serialize, Debug)]
    pub struct ActionList {
        pub actions: Vec<Action>,
    }

    impl From<Vec<SuggestionStatus>> for ActionList {
        fn from(statuses: Vec<SuggestionStatus>) -> Self {
            ActionList {
                actions: statuses
                    .into_iter()
                    .map(|status| Action { status })
                    .collect(),
            }
        }
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryEntry {
        pub id: Uuid,
        pub from_status: SuggestionStatus,
        pub to_status: SuggestionStatus,
        pub acting_role: ActorRole,
        pub note: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::StatusHistoryEntry> for HistoryEntry {
        fn from(entry: entities::StatusHistoryEntry) -> Self {
            HistoryEntry {
                id: entry.id,
                from_status: entry.from_status,
                to_status: entry.to_status,
                acting_role: entry.acting_role,
                note: entry.note,
                created_at: entry.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct HistoryList {
        pub history: Vec<HistoryEntry>,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Feedback {
        pub id: Uuid,
        pub author_role: PartyRole,
        pub wants_second_date: bool,
        pub notes: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::MeetingFeedback> for Feedback {
        fn from(feedback: entities::MeetingFeedback) -> Self {
            Feedback {
                id: feedback.id,
                author_role: feedback.author_role,
                wants_second_date: feedback.wants_second_date,
                notes: feedback.notes,
                created_at: feedback.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Meeting {
        pub id: Uuid,
        pub suggestion_id: Uuid,
        pub scheduled_date: DateTime<Utc>,
        pub location: Option<String>,
        pub notes: Option<String>,
        pub status: MeetingStatus,
        pub feedback: Vec<Feedback>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl Meeting {
        pub fn without_feedback(meeting: entities::Meeting) -> Self {
            traits::MeetingWithFeedback {
                meeting,
                feedback: Vec::new(),
            }
            .into()
        }
    }

    impl From<traits::MeetingWithFeedback> for Meeting {
        fn from(value: traits::MeetingWithFeedback) -> Self {
            let meeting = value.meeting;
            Meeting {
                id: meeting.id,
                suggestion_id: meeting.suggestion_id,
                scheduled_date: meeting.scheduled_date,
                location: meeting.location,
                notes: meeting.notes,
                status: meeting.status,
                feedback: value.feedback.into_iter().map(Feedback::from).collect(),
                created_at: meeting.created_at,
                updated_at: meeting.updated_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct MeetingList {
        pub meetings: Vec<Meeting>,
    }

    #[derive(Serialize, Debug)]
    pub struct MeetingUpdate {
        pub meeting: Meeting,
        pub suggestion: SuggestionView,
    }
}
