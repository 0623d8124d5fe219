//! Post-meeting feedback policy.

use crate::infrastructure::entities::{MeetingFeedback, PartyRole, SuggestionStatus};

/// The status the suggestion should reach given the feedback recorded for one meeting.
///
/// One answer puts the suggestion in a thinking period. Once both parties answered, the
/// suggestion proceeds only if both want a second date; a single "no" ends it.
pub fn decide(feedback: &[MeetingFeedback]) -> SuggestionStatus {
    let answer = |role: PartyRole| {
        feedback
            .iter()
            .find(|f| f.author_role == role)
            .map(|f| f.wants_second_date)
    };

    match (answer(PartyRole::First), answer(PartyRole::Second)) {
        (Some(true), Some(true)) => SuggestionStatus::ProceedingToSecondDate,
        (Some(_), Some(_)) => SuggestionStatus::EndedAfterFirstDate,
        _ => SuggestionStatus::ThinkingAfterDate,
    }
}

/// Statuses visited to get from `current` to `target`.
///
/// Returns `None` when feedback cannot move a suggestion in `current`.
pub fn path(current: SuggestionStatus, target: SuggestionStatus) -> Option<Vec<SuggestionStatus>> {
    use SuggestionStatus::*;

    match (current, target) {
        (AwaitingFirstDateFeedback, ThinkingAfterDate) => Some(vec![ThinkingAfterDate]),
        (AwaitingFirstDateFeedback, EndedAfterFirstDate) => Some(vec![EndedAfterFirstDate]),
        (AwaitingFirstDateFeedback, ProceedingToSecondDate) => {
            Some(vec![ThinkingAfterDate, ProceedingToSecondDate])
        }
        (ThinkingAfterDate, ThinkingAfterDate) => Some(vec![]),
        (ThinkingAfterDate, ProceedingToSecondDate) => Some(vec![ProceedingToSecondDate]),
        (ThinkingAfterDate, EndedAfterFirstDate) => Some(vec![EndedAfterFirstDate]),
        _ => None,
    }
}
