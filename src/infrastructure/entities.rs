//! Database entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a suggestion, stored and exchanged as the literal upper-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionStatus {
    PendingFirstParty,
    FirstPartyApproved,
    FirstPartyDeclined,
    PendingSecondParty,
    SecondPartyApproved,
    SecondPartyDeclined,
    ContactDetailsShared,
    AwaitingFirstDateFeedback,
    ThinkingAfterDate,
    ProceedingToSecondDate,
    Dating,
    EndedAfterFirstDate,
    Engaged,
    Married,
    Cancelled,
    Closed,
}

impl SuggestionStatus {
    pub const ALL: [SuggestionStatus; 16] = [
        SuggestionStatus::PendingFirstParty,
        SuggestionStatus::FirstPartyApproved,
        SuggestionStatus::FirstPartyDeclined,
        SuggestionStatus::PendingSecondParty,
        SuggestionStatus::SecondPartyApproved,
        SuggestionStatus::SecondPartyDeclined,
        SuggestionStatus::ContactDetailsShared,
        SuggestionStatus::AwaitingFirstDateFeedback,
        SuggestionStatus::ThinkingAfterDate,
        SuggestionStatus::ProceedingToSecondDate,
        SuggestionStatus::Dating,
        SuggestionStatus::EndedAfterFirstDate,
        SuggestionStatus::Engaged,
        SuggestionStatus::Married,
        SuggestionStatus::Cancelled,
        SuggestionStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionStatus::PendingFirstParty => "PENDING_FIRST_PARTY",
            SuggestionStatus::FirstPartyApproved => "FIRST_PARTY_APPROVED",
            SuggestionStatus::FirstPartyDeclined => "FIRST_PARTY_DECLINED",
            SuggestionStatus::PendingSecondParty => "PENDING_SECOND_PARTY",
            SuggestionStatus::SecondPartyApproved => "SECOND_PARTY_APPROVED",
            SuggestionStatus::SecondPartyDeclined => "SECOND_PARTY_DECLINED",
            SuggestionStatus::ContactDetailsShared => "CONTACT_DETAILS_SHARED",
            SuggestionStatus::AwaitingFirstDateFeedback => "AWAITING_FIRST_DATE_FEEDBACK",
            SuggestionStatus::ThinkingAfterDate => "THINKING_AFTER_DATE",
            SuggestionStatus::ProceedingToSecondDate => "PROCEEDING_TO_SECOND_DATE",
            SuggestionStatus::Dating => "DATING",
            SuggestionStatus::EndedAfterFirstDate => "ENDED_AFTER_FIRST_DATE",
            SuggestionStatus::Engaged => "ENGAGED",
            SuggestionStatus::Married => "MARRIED",
            SuggestionStatus::Cancelled => "CANCELLED",
            SuggestionStatus::Closed => "CLOSED",
        }
    }
}

impl Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown suggestion status `{}`", self.0)
    }
}

impl FromStr for SuggestionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SuggestionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

/// Who performed a transition. `System` is never resolved from a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    First,
    Second,
    Matchmaker,
    System,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActorRole::First => "first",
            ActorRole::Second => "second",
            ActorRole::Matchmaker => "matchmaker",
            ActorRole::System => "system",
        })
    }
}

/// One of the two candidates of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    First,
    Second,
}

impl From<PartyRole> for ActorRole {
    fn from(role: PartyRole) -> Self {
        match role {
            PartyRole::First => ActorRole::First,
            PartyRole::Second => ActorRole::Second,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MeetingStatus::Scheduled => "SCHEDULED",
            MeetingStatus::Completed => "COMPLETED",
            MeetingStatus::Cancelled => "CANCELLED",
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Suggestion {
    pub id: Uuid,
    pub matchmaker_id: Uuid,
    pub first_party_id: Uuid,
    pub second_party_id: Uuid,
    pub status: SuggestionStatus,
    pub previous_status: Option<SuggestionStatus>,
    pub priority: Priority,
    pub matching_reason: Option<String>,
    pub internal_notes: Option<String>,
    pub decision_deadline: Option<DateTime<Utc>>,
    pub first_party_responded_at: Option<DateTime<Utc>>,
    pub second_party_sent_at: Option<DateTime<Utc>>,
    pub second_party_responded_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Suggestion {
    /// Resolves which role `user_id` plays in this suggestion, if any.
    pub fn role_of(&self, user_id: Uuid) -> Option<ActorRole> {
        if user_id == self.first_party_id {
            Some(ActorRole::First)
        } else if user_id == self.second_party_id {
            Some(ActorRole::Second)
        } else if user_id == self.matchmaker_id {
            Some(ActorRole::Matchmaker)
        } else {
            None
        }
    }
}

/// A persisted transition event.
#[derive(Debug, Clone, FromRow)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub suggestion_id: Uuid,
    pub from_status: SuggestionStatus,
    pub to_status: SuggestionStatus,
    pub acting_role: ActorRole,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Meeting {
    pub id: Uuid,
    pub suggestion_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MeetingFeedback {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub author_role: PartyRole,
    pub wants_second_date: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
