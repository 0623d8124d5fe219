//! Shared setup for workflow tests
#![allow(dead_code)]

use di::Ref;
use matchflow::core::notifications::{NotificationDispatcher, TransitionEvent};
use matchflow::core::services::{WorkflowMeetingService, WorkflowSuggestionService};
use matchflow::core::traits::{
    MeetingService, NewMeeting, NewSuggestion, SuggestionService, TransitionRequest,
};
use matchflow::infrastructure::database::DatabaseConnection;
use matchflow::infrastructure::entities::{MeetingStatus, Priority, Suggestion, SuggestionStatus};
use matchflow::infrastructure::repositories::DbSuggestionRepository;
use matchflow::infrastructure::traits::SuggestionRepository;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Single-connection in-memory database with migrations applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    DatabaseConnection::migrate(&pool).await.unwrap();
    pool
}

/// File-backed database shared by several pooled connections. Removed on drop.
pub struct FileDatabase {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl FileDatabase {
    pub async fn new(max_connections: u32) -> Self {
        let path = std::env::temp_dir().join(format!("matchflow-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let pool = DatabaseConnection::connect(&url, max_connections)
            .await
            .unwrap();
        DatabaseConnection::migrate(&pool).await.unwrap();
        FileDatabase { pool, path }
    }
}

impl Drop for FileDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<TransitionEvent>>,
}

impl RecordingDispatcher {
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: TransitionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub repo: Ref<dyn SuggestionRepository>,
    pub suggestions: WorkflowSuggestionService,
    pub meetings: WorkflowMeetingService,
    pub notifier: Ref<RecordingDispatcher>,
    pub matchmaker: Uuid,
    pub first: Uuid,
    pub second: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_pool(memory_pool().await)
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        let connection = Ref::new(DatabaseConnection::from_pool(pool.clone()));
        let repo: Ref<dyn SuggestionRepository> = Ref::new(DbSuggestionRepository::new(connection));
        let notifier = Ref::new(RecordingDispatcher::default());
        let dispatcher: Ref<dyn NotificationDispatcher> = notifier.clone();

        Harness {
            pool,
            suggestions: WorkflowSuggestionService::new(repo.clone(), dispatcher.clone()),
            meetings: WorkflowMeetingService::new(repo.clone(), dispatcher),
            repo,
            notifier,
            matchmaker: Uuid::new_v4(),
            first: Uuid::new_v4(),
            second: Uuid::new_v4(),
        }
    }

    pub async fn create(&self) -> Suggestion {
        self.create_between(self.first, self.second).await
    }

    pub async fn create_between(&self, first: Uuid, second: Uuid) -> Suggestion {
        self.try_create_between(first, second).await.unwrap()
    }

    pub async fn try_create_between(
        &self,
        first: Uuid,
        second: Uuid,
    ) -> Result<Suggestion, matchflow::core::error::SuggestionError> {
        self.suggestions
            .create_suggestion(
                self.matchmaker,
                NewSuggestion {
                    first_party_id: first,
                    second_party_id: second,
                    priority: Priority::High,
                    decision_deadline: Some(Utc::now() + Duration::days(7)),
                    matching_reason: Some("shared values".to_owned()),
                    internal_notes: Some("met both families".to_owned()),
                },
            )
            .await
    }

    pub async fn transition(
        &self,
        suggestion: &Suggestion,
        user: Uuid,
        status: SuggestionStatus,
    ) -> Result<Suggestion, matchflow::core::error::SuggestionError> {
        self.suggestions
            .attempt_transition(TransitionRequest {
                suggestion_id: suggestion.id,
                acting_user_id: user,
                requested_status: status,
                note: None,
                expected_updated_at: None,
            })
            .await
    }

    /// Creates a suggestion and walks it to `CONTACT_DETAILS_SHARED`.
    pub async fn with_contacts_shared(&self) -> Suggestion {
        let suggestion = self.create().await;
        let suggestion = self
            .transition(&suggestion, self.first, SuggestionStatus::FirstPartyApproved)
            .await
            .unwrap();
        let suggestion = self
            .transition(&suggestion, self.second, SuggestionStatus::SecondPartyApproved)
            .await
            .unwrap();
        self.transition(
            &suggestion,
            self.matchmaker,
            SuggestionStatus::ContactDetailsShared,
        )
        .await
        .unwrap()
    }

    /// Walks a fresh suggestion to `AWAITING_FIRST_DATE_FEEDBACK`, returning the completed meeting.
    pub async fn after_first_date(&self) -> (Suggestion, Uuid) {
        let suggestion = self.with_contacts_shared().await;
        let meeting = self
            .meetings
            .schedule_meeting(
                self.first,
                suggestion.id,
                NewMeeting {
                    scheduled_date: Utc::now() + Duration::days(2),
                    location: Some("Cafe Nordic".to_owned()),
                    notes: None,
                },
            )
            .await
            .unwrap();
        let update = self
            .meetings
            .update_meeting_status(
                self.matchmaker,
                suggestion.id,
                meeting.id,
                MeetingStatus::Completed,
            )
            .await
            .unwrap();

        (update.suggestion, meeting.id)
    }
}
