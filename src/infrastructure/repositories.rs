//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{
    Meeting, MeetingFeedback, MeetingStatus, StatusHistoryEntry, Suggestion, SuggestionStatus,
};
use crate::infrastructure::traits::{
    PartyGuard, RepositoryError, StatusUpdate, SuggestionRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, injectable};
use log::error;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, Transaction};
use uuid::Uuid;

#[injectable(SuggestionRepository)]
pub struct DbSuggestionRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbSuggestionRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Starts a transaction holding the database write lock, so guards read committed state.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, RepositoryError> {
        self.connection
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(database_error)
    }
}

fn database_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Duplicate,
        _ => {
            error!("{e}");
            RepositoryError::Database(e)
        }
    }
}

async fn check_guard(
    conn: &mut SqliteConnection,
    guard: &PartyGuard,
    excluding: Uuid,
) -> Result<(), RepositoryError> {
    if guard.party_ids.is_empty() || guard.statuses.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM suggestions WHERE id <> ");
    query.push_bind(excluding).push(" AND (");
    for (i, party_id) in guard.party_ids.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query
            .push("first_party_id = ")
            .push_bind(*party_id)
            .push(" OR second_party_id = ")
            .push_bind(*party_id);
    }
    query.push(") AND status IN (");

    let mut separated = query.separated(", ");
    for status in &guard.statuses {
        separated.push_bind(*status);
    }
    separated.push_unseparated(")");

    let busy = query
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await
        .map_err(database_error)?;

    if busy > 0 {
        Err(RepositoryError::PartyBusy)
    } else {
        Ok(())
    }
}

async fn write_status_update(
    conn: &mut SqliteConnection,
    update: StatusUpdate,
) -> Result<Suggestion, RepositoryError> {
    let updated = update.updated;

    if let Some(guard) = &update.guard {
        check_guard(conn, guard, updated.id).await?;
    }

    let suggestion: Option<Suggestion> = sqlx::query_as(
        "UPDATE suggestions SET status = ?, previous_status = ?, first_party_responded_at = ?, second_party_sent_at = ?, second_party_responded_at = ?, closed_at = ?, version = ?, updated_at = ? WHERE id = ? AND status = ? AND version = ? RETURNING *",
    )
        .bind(updated.status)
        .bind(updated.previous_status)
        .bind(updated.first_party_responded_at)
        .bind(updated.second_party_sent_at)
        .bind(updated.second_party_responded_at)
        .bind(updated.closed_at)
        .bind(updated.version)
        .bind(updated.updated_at)
        .bind(updated.id)
        .bind(update.expected_status)
        .bind(update.expected_version)
        .fetch_optional(&mut *conn)
        .await
        .map_err(database_error)?;

    let Some(suggestion) = suggestion else {
        return Err(RepositoryError::Conflict);
    };

    for event in update.events {
        sqlx::query(
            "INSERT INTO suggestion_status_history (id, suggestion_id, from_status, to_status, acting_role, note, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
            .bind(event.id)
            .bind(event.suggestion_id)
            .bind(event.from_status)
            .bind(event.to_status)
            .bind(event.acting_role)
            .bind(event.note)
            .bind(event.created_at)
            .execute(&mut *conn)
            .await
            .map_err(database_error)?;
    }

    Ok(suggestion)
}

#[async_trait]
impl SuggestionRepository for DbSuggestionRepository {
    async fn find_suggestion(
        &self,
        suggestion_id: Uuid,
    ) -> Result<Option<Suggestion>, RepositoryError> {
        sqlx::query_as("SELECT * FROM suggestions WHERE id = ?")
            .bind(suggestion_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn list_suggestions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        sqlx::query_as(
            "SELECT * FROM suggestions WHERE first_party_id = ? OR second_party_id = ? OR matchmaker_id = ? ORDER BY datetime(updated_at) DESC",
        )
            .bind(user_id)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn create_suggestion(
        &self,
        suggestion: Suggestion,
        guard: PartyGuard,
    ) -> Result<Suggestion, RepositoryError> {
        let mut tx = self.begin_write().await?;
        check_guard(&mut tx, &guard, suggestion.id).await?;

        let created = sqlx::query_as(
            "INSERT INTO suggestions (id, matchmaker_id, first_party_id, second_party_id, status, previous_status, priority, matching_reason, internal_notes, decision_deadline, first_party_responded_at, second_party_sent_at, second_party_responded_at, closed_at, version, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(suggestion.id)
            .bind(suggestion.matchmaker_id)
            .bind(suggestion.first_party_id)
            .bind(suggestion.second_party_id)
            .bind(suggestion.status)
            .bind(suggestion.previous_status)
            .bind(suggestion.priority)
            .bind(suggestion.matching_reason)
            .bind(suggestion.internal_notes)
            .bind(suggestion.decision_deadline)
            .bind(suggestion.first_party_responded_at)
            .bind(suggestion.second_party_sent_at)
            .bind(suggestion.second_party_responded_at)
            .bind(suggestion.closed_at)
            .bind(suggestion.version)
            .bind(suggestion.created_at)
            .bind(suggestion.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;

        Ok(created)
    }

    async fn apply_status_update(&self, update: StatusUpdate) -> Result<Suggestion, RepositoryError> {
        let mut tx = self.begin_write().await?;
        let suggestion = write_status_update(&mut tx, update).await?;
        tx.commit().await.map_err(database_error)?;

        Ok(suggestion)
    }

    async fn list_status_history(
        &self,
        suggestion_id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        sqlx::query_as(
            "SELECT * FROM suggestion_status_history WHERE suggestion_id = ? ORDER BY datetime(created_at) ASC, rowid ASC",
        )
            .bind(suggestion_id)
            .fetch_all(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn create_meeting(&self, meeting: Meeting) -> Result<Meeting, RepositoryError> {
        sqlx::query_as(
            "INSERT INTO meetings (id, suggestion_id, scheduled_date, location, notes, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(meeting.id)
            .bind(meeting.suggestion_id)
            .bind(meeting.scheduled_date)
            .bind(meeting.location)
            .bind(meeting.notes)
            .bind(meeting.status)
            .bind(meeting.created_at)
            .bind(meeting.updated_at)
            .fetch_one(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn find_meeting(&self, meeting_id: Uuid) -> Result<Option<Meeting>, RepositoryError> {
        sqlx::query_as("SELECT * FROM meetings WHERE id = ?")
            .bind(meeting_id)
            .fetch_optional(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn list_meetings(&self, suggestion_id: Uuid) -> Result<Vec<Meeting>, RepositoryError> {
        sqlx::query_as(
            "SELECT * FROM meetings WHERE suggestion_id = ? ORDER BY datetime(scheduled_date) ASC",
        )
            .bind(suggestion_id)
            .fetch_all(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn update_meeting_status(
        &self,
        meeting_id: Uuid,
        expected: MeetingStatus,
        status: MeetingStatus,
        updated_at: DateTime<Utc>,
        suggestion_update: Option<StatusUpdate>,
    ) -> Result<(Meeting, Option<Suggestion>), RepositoryError> {
        let mut tx = self.begin_write().await?;

        let meeting: Option<Meeting> = sqlx::query_as(
            "UPDATE meetings SET status = ?, updated_at = ? WHERE id = ? AND status = ? RETURNING *",
        )
            .bind(status)
            .bind(updated_at)
            .bind(meeting_id)
            .bind(expected)
            .fetch_optional(&mut *tx)
            .await
            .map_err(database_error)?;

        let Some(meeting) = meeting else {
            return Err(RepositoryError::Conflict);
        };

        let suggestion = match suggestion_update {
            Some(update) => Some(write_status_update(&mut tx, update).await?),
            None => None,
        };

        tx.commit().await.map_err(database_error)?;

        Ok((meeting, suggestion))
    }

    async fn list_meeting_feedback(
        &self,
        meeting_id: Uuid,
    ) -> Result<Vec<MeetingFeedback>, RepositoryError> {
        sqlx::query_as(
            "SELECT * FROM meeting_feedback WHERE meeting_id = ? ORDER BY datetime(created_at) ASC",
        )
            .bind(meeting_id)
            .fetch_all(&**self.connection)
            .await
            .map_err(database_error)
    }

    async fn record_feedback(
        &self,
        feedback: MeetingFeedback,
        update: StatusUpdate,
    ) -> Result<(MeetingFeedback, Suggestion), RepositoryError> {
        let mut tx = self.begin_write().await?;

        let feedback: MeetingFeedback = sqlx::query_as(
            "INSERT INTO meeting_feedback (id, meeting_id, author_role, wants_second_date, notes, created_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
        )
            .bind(feedback.id)
            .bind(feedback.meeting_id)
            .bind(feedback.author_role)
            .bind(feedback.wants_second_date)
            .bind(feedback.notes)
            .bind(feedback.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(database_error)?;

        let suggestion = write_status_update(&mut tx, update).await?;

        tx.commit().await.map_err(database_error)?;

        Ok((feedback, suggestion))
    }
}
