//! Dashboard grouping of suggestion statuses.

use crate::infrastructure::entities::SuggestionStatus;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Active,
    Pending,
    History,
}

impl Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Active => "ACTIVE",
            Category::Pending => "PENDING",
            Category::History => "HISTORY",
        })
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Category::Active),
            "PENDING" => Ok(Category::Pending),
            "HISTORY" => Ok(Category::History),
            other => Err(format!("unknown category `{other}`")),
        }
    }
}

/// Derives the category of a status. Never stored.
pub fn classify(status: SuggestionStatus) -> Category {
    match status {
        SuggestionStatus::PendingFirstParty | SuggestionStatus::PendingSecondParty => {
            Category::Pending
        }

        SuggestionStatus::FirstPartyApproved
        | SuggestionStatus::SecondPartyApproved
        | SuggestionStatus::ContactDetailsShared
        | SuggestionStatus::AwaitingFirstDateFeedback
        | SuggestionStatus::ThinkingAfterDate
        | SuggestionStatus::ProceedingToSecondDate
        | SuggestionStatus::Dating => Category::Active,

        SuggestionStatus::FirstPartyDeclined
        | SuggestionStatus::SecondPartyDeclined
        | SuggestionStatus::EndedAfterFirstDate
        | SuggestionStatus::Engaged
        | SuggestionStatus::Married
        | SuggestionStatus::Cancelled
        | SuggestionStatus::Closed => Category::History,
    }
}

/// All statuses that fall into `category`.
pub fn statuses_in(category: Category) -> Vec<SuggestionStatus> {
    SuggestionStatus::ALL
        .into_iter()
        .filter(|status| classify(*status) == category)
        .collect()
}
