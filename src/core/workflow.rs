//! Legal-transition table for suggestion statuses.
//!
//! The table is a strict allow-list: a status change is legal only if its `(from, to)` pair is
//! listed, and only for the roles the entry names. Terminal statuses are exactly the statuses
//! with no outgoing entry.

use crate::infrastructure::entities::ActorRole;
use crate::infrastructure::entities::SuggestionStatus;

/// Who may request a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Only the listed roles.
    Roles(&'static [ActorRole]),
    /// Any resolved role, including the system.
    Automatic,
}

impl Gate {
    pub fn permits(self, role: ActorRole) -> bool {
        match self {
            Gate::Roles(roles) => roles.contains(&role),
            Gate::Automatic => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SuggestionStatus,
    pub to: SuggestionStatus,
    pub gate: Gate,
}

/// Why a requested transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The `(from, to)` pair is not in the table.
    Illegal,
    /// The pair exists but the role may not request it.
    WrongRole,
}

const FIRST: &[ActorRole] = &[ActorRole::First];
const SECOND: &[ActorRole] = &[ActorRole::Second];
const MATCHMAKER: &[ActorRole] = &[ActorRole::Matchmaker];
const MATCHMAKER_OR_SYSTEM: &[ActorRole] = &[ActorRole::Matchmaker, ActorRole::System];
const ANY_PARTICIPANT_OR_SYSTEM: &[ActorRole] = &[
    ActorRole::First,
    ActorRole::Second,
    ActorRole::Matchmaker,
    ActorRole::System,
];

const fn entry(from: SuggestionStatus, to: SuggestionStatus, gate: Gate) -> Transition {
    Transition { from, to, gate }
}

use SuggestionStatus::*;

pub const TRANSITIONS: &[Transition] = &[
    entry(PendingFirstParty, FirstPartyApproved, Gate::Roles(FIRST)),
    entry(PendingFirstParty, FirstPartyDeclined, Gate::Roles(FIRST)),
    entry(PendingFirstParty, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(FirstPartyApproved, PendingSecondParty, Gate::Automatic),
    entry(FirstPartyApproved, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(PendingSecondParty, SecondPartyApproved, Gate::Roles(SECOND)),
    entry(PendingSecondParty, SecondPartyDeclined, Gate::Roles(SECOND)),
    entry(PendingSecondParty, Cancelled, Gate::Roles(MATCHMAKER)),
    // contact sharing is always a deliberate matchmaker action
    entry(SecondPartyApproved, ContactDetailsShared, Gate::Roles(MATCHMAKER)),
    entry(SecondPartyApproved, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(
        ContactDetailsShared,
        AwaitingFirstDateFeedback,
        Gate::Roles(ANY_PARTICIPANT_OR_SYSTEM),
    ),
    entry(ContactDetailsShared, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(
        AwaitingFirstDateFeedback,
        ThinkingAfterDate,
        Gate::Roles(MATCHMAKER_OR_SYSTEM),
    ),
    entry(
        AwaitingFirstDateFeedback,
        EndedAfterFirstDate,
        Gate::Roles(MATCHMAKER_OR_SYSTEM),
    ),
    entry(AwaitingFirstDateFeedback, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(
        ThinkingAfterDate,
        ProceedingToSecondDate,
        Gate::Roles(MATCHMAKER_OR_SYSTEM),
    ),
    entry(
        ThinkingAfterDate,
        EndedAfterFirstDate,
        Gate::Roles(MATCHMAKER_OR_SYSTEM),
    ),
    entry(ThinkingAfterDate, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(ProceedingToSecondDate, Dating, Gate::Roles(MATCHMAKER)),
    entry(ProceedingToSecondDate, Cancelled, Gate::Roles(MATCHMAKER)),
    entry(Dating, Engaged, Gate::Roles(MATCHMAKER)),
    entry(Dating, Married, Gate::Roles(MATCHMAKER)),
    entry(Dating, Closed, Gate::Roles(MATCHMAKER)),
    entry(Dating, Cancelled, Gate::Roles(MATCHMAKER)),
];

pub fn find(from: SuggestionStatus, to: SuggestionStatus) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| t.from == from && t.to == to)
}

/// Checks whether `role` may move a suggestion from `from` to `to`.
pub fn check(
    from: SuggestionStatus,
    to: SuggestionStatus,
    role: ActorRole,
) -> Result<&'static Transition, Refusal> {
    let transition = find(from, to).ok_or(Refusal::Illegal)?;
    if transition.gate.permits(role) {
        Ok(transition)
    } else {
        Err(Refusal::WrongRole)
    }
}

/// Statuses in which a party counts as taken. Blocks new suggestions and approvals elsewhere.
pub const ACTIVE_PROCESS: &[SuggestionStatus] = &[
    FirstPartyApproved,
    SecondPartyApproved,
    ContactDetailsShared,
    AwaitingFirstDateFeedback,
    ThinkingAfterDate,
    ProceedingToSecondDate,
    Dating,
    Engaged,
];

pub fn is_terminal(status: SuggestionStatus) -> bool {
    !TRANSITIONS.iter().any(|t| t.from == status)
}

/// Statuses `role` may request from `from`, in table order.
///
/// Automatic entries are only listed for the system role.
pub fn available_targets(from: SuggestionStatus, role: ActorRole) -> Vec<SuggestionStatus> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == from)
        .filter(|t| match t.gate {
            Gate::Roles(roles) => roles.contains(&role),
            Gate::Automatic => role == ActorRole::System,
        })
        .map(|t| t.to)
        .collect()
}

/// The step applied right after entering `status` without anybody asking for it.
pub fn automatic_follow_up(status: SuggestionStatus) -> Option<SuggestionStatus> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == status && t.gate == Gate::Automatic)
        .map(|t| t.to)
}
