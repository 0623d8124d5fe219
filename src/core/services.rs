//! Implementations for the service the app needs.
//!

use crate::core::category::{self, Category};
use crate::core::error::SuggestionError;
use crate::core::feedback;
use crate::core::notifications::{NotificationDispatcher, TransitionEvent};
use crate::core::traits::{
    FeedbackSubmission, MeetingService, MeetingUpdate, MeetingWithFeedback, NewMeeting,
    NewSuggestion, SuggestionService, TransitionRequest,
};
use crate::core::workflow::{self, Refusal};
use crate::infrastructure::entities::{
    ActorRole, Meeting, MeetingFeedback, MeetingStatus, PartyRole, StatusHistoryEntry, Suggestion,
    SuggestionStatus,
};
use crate::infrastructure::traits::{PartyGuard, StatusUpdate, SuggestionRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, injectable};
use log::{debug, info};
use uuid::Uuid;

/// Suggestion statuses in which meetings can be arranged.
const MEETING_STATUSES: &[SuggestionStatus] = &[
    SuggestionStatus::ContactDetailsShared,
    SuggestionStatus::AwaitingFirstDateFeedback,
    SuggestionStatus::ThinkingAfterDate,
    SuggestionStatus::ProceedingToSecondDate,
    SuggestionStatus::Dating,
];

/// Builds the guarded rewrite of `current` after walking `steps`.
///
/// The version is bumped even when `steps` is empty, so concurrent writers based on the same
/// snapshot still collide.
fn stage_update(
    current: &Suggestion,
    steps: &[(SuggestionStatus, ActorRole)],
    note: Option<String>,
    now: DateTime<Utc>,
) -> StatusUpdate {
    let mut updated = current.clone();
    let mut events = Vec::with_capacity(steps.len());
    let mut note = note;

    for (to, role) in steps {
        let from = updated.status;

        match to {
            SuggestionStatus::FirstPartyApproved | SuggestionStatus::FirstPartyDeclined => {
                updated.first_party_responded_at = Some(now)
            }
            SuggestionStatus::PendingSecondParty => updated.second_party_sent_at = Some(now),
            SuggestionStatus::SecondPartyApproved | SuggestionStatus::SecondPartyDeclined => {
                updated.second_party_responded_at = Some(now)
            }
            _ => {}
        }
        if workflow::is_terminal(*to) {
            updated.closed_at = Some(now);
        }

        updated.previous_status = Some(from);
        updated.status = *to;

        events.push(StatusHistoryEntry {
            id: Uuid::new_v4(),
            suggestion_id: current.id,
            from_status: from,
            to_status: *to,
            acting_role: *role,
            note: note.take(),
            created_at: now,
        });
    }

    updated.version = current.version + 1;
    updated.updated_at = now;

    StatusUpdate {
        expected_status: current.status,
        expected_version: current.version,
        updated,
        events,
        guard: None,
    }
}

fn active_process_guard(party_ids: Vec<Uuid>) -> PartyGuard {
    PartyGuard {
        party_ids,
        statuses: workflow::ACTIVE_PROCESS.to_vec(),
    }
}

fn refused(from: SuggestionStatus, to: SuggestionStatus, refusal: Refusal) -> SuggestionError {
    match refusal {
        Refusal::Illegal => SuggestionError::IllegalTransition { from, to },
        Refusal::WrongRole => SuggestionError::Forbidden,
    }
}

fn announce(
    notifier: &dyn NotificationDispatcher,
    suggestion: &Suggestion,
    events: &[StatusHistoryEntry],
) {
    for event in events {
        info!(
            "suggestion {}: {} -> {} by {}",
            suggestion.id, event.from_status, event.to_status, event.acting_role
        );
        notifier.dispatch(TransitionEvent::new(suggestion, event));
    }
}

async fn load_for(
    repo: &dyn SuggestionRepository,
    user_id: Uuid,
    suggestion_id: Uuid,
) -> Result<(Suggestion, ActorRole), SuggestionError> {
    let suggestion = repo
        .find_suggestion(suggestion_id)
        .await?
        .ok_or(SuggestionError::NotFound)?;
    let role = suggestion
        .role_of(user_id)
        .ok_or(SuggestionError::Forbidden)?;

    Ok((suggestion, role))
}

async fn load_meeting(
    repo: &dyn SuggestionRepository,
    suggestion_id: Uuid,
    meeting_id: Uuid,
) -> Result<Meeting, SuggestionError> {
    repo.find_meeting(meeting_id)
        .await?
        .filter(|meeting| meeting.suggestion_id == suggestion_id)
        .ok_or(SuggestionError::NotFound)
}

#[injectable(SuggestionService)]
pub struct WorkflowSuggestionService {
    repo: Ref<dyn SuggestionRepository>,
    notifier: Ref<dyn NotificationDispatcher>,
}

impl WorkflowSuggestionService {
    pub fn new(
        repo: Ref<dyn SuggestionRepository>,
        notifier: Ref<dyn NotificationDispatcher>,
    ) -> Self {
        Self { repo, notifier }
    }
}

#[async_trait]
impl SuggestionService for WorkflowSuggestionService {
    async fn create_suggestion(
        &self,
        matchmaker_id: Uuid,
        suggestion: NewSuggestion,
    ) -> Result<Suggestion, SuggestionError> {
        if suggestion.first_party_id == suggestion.second_party_id {
            return Err(SuggestionError::Validation(
                "first and second party must be different users".to_owned(),
            ));
        }
        if matchmaker_id == suggestion.first_party_id || matchmaker_id == suggestion.second_party_id
        {
            return Err(SuggestionError::Validation(
                "the matchmaker cannot be a party of their own suggestion".to_owned(),
            ));
        }

        let guard = active_process_guard(vec![
            suggestion.first_party_id,
            suggestion.second_party_id,
        ]);
        let now = Utc::now();
        let created = self
            .repo
            .create_suggestion(
                Suggestion {
                    id: Uuid::new_v4(),
                    matchmaker_id,
                    first_party_id: suggestion.first_party_id,
                    second_party_id: suggestion.second_party_id,
                    status: SuggestionStatus::PendingFirstParty,
                    previous_status: None,
                    priority: suggestion.priority,
                    matching_reason: suggestion.matching_reason,
                    internal_notes: suggestion.internal_notes,
                    decision_deadline: suggestion.decision_deadline,
                    first_party_responded_at: None,
                    second_party_sent_at: None,
                    second_party_responded_at: None,
                    closed_at: None,
                    version: 0,
                    created_at: now,
                    updated_at: now,
                },
                guard,
            )
            .await?;

        info!(
            "suggestion {} created by matchmaker {}",
            created.id, created.matchmaker_id
        );

        Ok(created)
    }

    async fn list_suggestions(
        &self,
        user_id: Uuid,
        category: Option<Category>,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        let suggestions = self.repo.list_suggestions_for_user(user_id).await?;

        Ok(match category {
            Some(category) => suggestions
                .into_iter()
                .filter(|s| category::classify(s.status) == category)
                .collect(),
            None => suggestions,
        })
    }

    async fn get_suggestion(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Suggestion, SuggestionError> {
        let (suggestion, _) = load_for(&*self.repo, user_id, suggestion_id).await?;
        Ok(suggestion)
    }

    async fn attempt_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<Suggestion, SuggestionError> {
        let (current, role) =
            load_for(&*self.repo, request.acting_user_id, request.suggestion_id).await?;

        if let Some(expected) = request.expected_updated_at {
            if expected != current.updated_at {
                debug!(
                    "stale transition request on {}: expected {expected}, stored {}",
                    current.id, current.updated_at
                );
                return Err(SuggestionError::Conflict);
            }
        }

        let requested = request.requested_status;
        workflow::check(current.status, requested, role).map_err(|refusal| {
            debug!(
                "refused {} -> {} by {role} on {}",
                current.status, requested, current.id
            );
            refused(current.status, requested, refusal)
        })?;

        let mut steps = vec![(requested, role)];
        if let Some(next) = workflow::automatic_follow_up(requested) {
            steps.push((next, ActorRole::System));
        }

        let mut update = stage_update(&current, &steps, request.note, Utc::now());
        if matches!(
            requested,
            SuggestionStatus::FirstPartyApproved | SuggestionStatus::SecondPartyApproved
        ) {
            update.guard = Some(active_process_guard(vec![request.acting_user_id]));
        }
        let events = update.events.clone();
        let updated = self.repo.apply_status_update(update).await?;

        announce(&*self.notifier, &updated, &events);

        Ok(updated)
    }

    async fn available_actions(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Vec<SuggestionStatus>, SuggestionError> {
        let (suggestion, role) = load_for(&*self.repo, user_id, suggestion_id).await?;
        Ok(workflow::available_targets(suggestion.status, role))
    }

    async fn status_history(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, SuggestionError> {
        load_for(&*self.repo, user_id, suggestion_id).await?;
        Ok(self.repo.list_status_history(suggestion_id).await?)
    }
}

#[injectable(MeetingService)]
pub struct WorkflowMeetingService {
    repo: Ref<dyn SuggestionRepository>,
    notifier: Ref<dyn NotificationDispatcher>,
}

impl WorkflowMeetingService {
    pub fn new(
        repo: Ref<dyn SuggestionRepository>,
        notifier: Ref<dyn NotificationDispatcher>,
    ) -> Self {
        Self { repo, notifier }
    }
}

#[async_trait]
impl MeetingService for WorkflowMeetingService {
    async fn schedule_meeting(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
        meeting: NewMeeting,
    ) -> Result<Meeting, SuggestionError> {
        let (suggestion, _) = load_for(&*self.repo, user_id, suggestion_id).await?;

        if !MEETING_STATUSES.contains(&suggestion.status) {
            return Err(SuggestionError::Validation(format!(
                "meetings cannot be scheduled while the suggestion is {}",
                suggestion.status
            )));
        }

        let now = Utc::now();
        let meeting = self
            .repo
            .create_meeting(Meeting {
                id: Uuid::new_v4(),
                suggestion_id,
                scheduled_date: meeting.scheduled_date,
                location: meeting.location,
                notes: meeting.notes,
                status: MeetingStatus::Scheduled,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            "meeting {} scheduled for suggestion {} at {}",
            meeting.id, suggestion_id, meeting.scheduled_date
        );

        Ok(meeting)
    }

    async fn list_meetings(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<Vec<MeetingWithFeedback>, SuggestionError> {
        load_for(&*self.repo, user_id, suggestion_id).await?;

        let meetings = self.repo.list_meetings(suggestion_id).await?;
        let mut result = Vec::with_capacity(meetings.len());
        for meeting in meetings {
            let feedback = self.repo.list_meeting_feedback(meeting.id).await?;
            result.push(MeetingWithFeedback { meeting, feedback });
        }

        Ok(result)
    }

    async fn update_meeting_status(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
        meeting_id: Uuid,
        status: MeetingStatus,
    ) -> Result<MeetingUpdate, SuggestionError> {
        let (suggestion, _) = load_for(&*self.repo, user_id, suggestion_id).await?;
        let meeting = load_meeting(&*self.repo, suggestion_id, meeting_id).await?;

        if status == MeetingStatus::Scheduled {
            return Err(SuggestionError::Validation(
                "a meeting can only be completed or cancelled".to_owned(),
            ));
        }
        if meeting.status != MeetingStatus::Scheduled {
            return Err(SuggestionError::InvalidMeetingState(meeting.status));
        }

        let now = Utc::now();
        let suggestion_update = if status == MeetingStatus::Completed
            && suggestion.status == SuggestionStatus::ContactDetailsShared
        {
            let next = SuggestionStatus::AwaitingFirstDateFeedback;
            workflow::check(suggestion.status, next, ActorRole::System)
                .map_err(|refusal| refused(suggestion.status, next, refusal))?;
            Some(stage_update(
                &suggestion,
                &[(next, ActorRole::System)],
                Some("first meeting completed".to_owned()),
                now,
            ))
        } else {
            None
        };
        let events = suggestion_update
            .as_ref()
            .map(|update| update.events.clone())
            .unwrap_or_default();

        let (meeting, updated) = self
            .repo
            .update_meeting_status(
                meeting_id,
                MeetingStatus::Scheduled,
                status,
                now,
                suggestion_update,
            )
            .await?;

        info!("meeting {} is now {}", meeting.id, meeting.status);

        let suggestion = match updated {
            Some(updated) => {
                announce(&*self.notifier, &updated, &events);
                updated
            }
            None => suggestion,
        };

        Ok(MeetingUpdate {
            meeting,
            suggestion,
        })
    }

    async fn submit_feedback(
        &self,
        submission: FeedbackSubmission,
    ) -> Result<Suggestion, SuggestionError> {
        let (current, role) = load_for(
            &*self.repo,
            submission.acting_user_id,
            submission.suggestion_id,
        )
        .await?;

        let author_role = match role {
            ActorRole::First => PartyRole::First,
            ActorRole::Second => PartyRole::Second,
            ActorRole::Matchmaker | ActorRole::System => return Err(SuggestionError::Forbidden),
        };

        let meeting =
            load_meeting(&*self.repo, submission.suggestion_id, submission.meeting_id).await?;
        if meeting.status != MeetingStatus::Completed {
            return Err(SuggestionError::InvalidMeetingState(meeting.status));
        }

        let mut all_feedback = self.repo.list_meeting_feedback(meeting.id).await?;
        if all_feedback.iter().any(|f| f.author_role == author_role) {
            return Err(SuggestionError::AlreadySubmitted);
        }

        let now = Utc::now();
        let feedback = MeetingFeedback {
            id: Uuid::new_v4(),
            meeting_id: meeting.id,
            author_role,
            wants_second_date: submission.wants_second_date,
            notes: submission.notes,
            created_at: now,
        };
        all_feedback.push(feedback.clone());

        let target = feedback::decide(&all_feedback);
        let path = feedback::path(current.status, target).ok_or(
            SuggestionError::IllegalTransition {
                from: current.status,
                to: target,
            },
        )?;

        let mut from = current.status;
        for to in &path {
            workflow::check(from, *to, ActorRole::System)
                .map_err(|refusal| refused(from, *to, refusal))?;
            from = *to;
        }

        let steps: Vec<_> = path.into_iter().map(|to| (to, ActorRole::System)).collect();
        let note = format!("feedback from {} party", ActorRole::from(author_role));
        let update = stage_update(&current, &steps, Some(note), now);
        let events = update.events.clone();

        let (_, updated) = self.repo.record_feedback(feedback, update).await?;

        info!(
            "feedback from {} on meeting {} recorded, suggestion {} is {}",
            ActorRole::from(author_role),
            meeting.id,
            updated.id,
            updated.status
        );
        announce(&*self.notifier, &updated, &events);

        Ok(updated)
    }
}
