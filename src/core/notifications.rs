//! Transition notifications.
//!
//! Services hand every committed transition to a [`NotificationDispatcher`]. The default
//! dispatcher pushes events onto a bounded queue drained by [`background_task`] and drops them
//! when the queue is full.

use crate::NOTIFICATION_SENDER;
use crate::infrastructure::entities::{ActorRole, StatusHistoryEntry, Suggestion, SuggestionStatus};
use chrono::{DateTime, Utc};
use di::{inject, injectable};
use log::{debug, error, info, warn};
use minijinja::{Environment, context};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    pub suggestion_id: Uuid,
    pub from_status: SuggestionStatus,
    pub to_status: SuggestionStatus,
    pub acting_role: ActorRole,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
    pub first_party_id: Uuid,
    pub second_party_id: Uuid,
    pub matchmaker_id: Uuid,
}

impl TransitionEvent {
    pub fn new(suggestion: &Suggestion, entry: &StatusHistoryEntry) -> Self {
        TransitionEvent {
            suggestion_id: suggestion.id,
            from_status: entry.from_status,
            to_status: entry.to_status,
            acting_role: entry.acting_role,
            timestamp: entry.created_at,
            note: entry.note.clone(),
            first_party_id: suggestion.first_party_id,
            second_party_id: suggestion.second_party_id,
            matchmaker_id: suggestion.matchmaker_id,
        }
    }

    fn user_for(&self, role: ActorRole) -> Option<Uuid> {
        match role {
            ActorRole::First => Some(self.first_party_id),
            ActorRole::Second => Some(self.second_party_id),
            ActorRole::Matchmaker => Some(self.matchmaker_id),
            ActorRole::System => None,
        }
    }
}

pub trait NotificationDispatcher: Send + Sync {
    /// Queues `event` for delivery. Must not block.
    fn dispatch(&self, event: TransitionEvent);
}

pub struct ChannelNotificationDispatcher {
    sender: Option<mpsc::Sender<TransitionEvent>>,
}

#[injectable(NotificationDispatcher)]
impl ChannelNotificationDispatcher {
    #[inject]
    pub fn create() -> Self {
        ChannelNotificationDispatcher {
            sender: NOTIFICATION_SENDER.get().cloned(),
        }
    }
}

impl ChannelNotificationDispatcher {
    pub fn with_sender(sender: mpsc::Sender<TransitionEvent>) -> Self {
        ChannelNotificationDispatcher {
            sender: Some(sender),
        }
    }
}

impl NotificationDispatcher for ChannelNotificationDispatcher {
    fn dispatch(&self, event: TransitionEvent) {
        let Some(sender) = &self.sender else {
            debug!(
                "no notification queue, dropping {} -> {} for {}",
                event.from_status, event.to_status, event.suggestion_id
            );
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(
                "notification queue full, dropping {} -> {} for {}",
                event.from_status, event.to_status, event.suggestion_id
            ),
            Err(TrySendError::Closed(event)) => warn!(
                "notification queue closed, dropping {} -> {} for {}",
                event.from_status, event.to_status, event.suggestion_id
            ),
        }
    }
}

/// Who hears about a suggestion entering `status`.
pub fn recipients(status: SuggestionStatus) -> &'static [ActorRole] {
    use SuggestionStatus::*;

    match status {
        PendingFirstParty => &[ActorRole::First],
        PendingSecondParty => &[ActorRole::Second, ActorRole::Matchmaker],
        FirstPartyApproved | FirstPartyDeclined | SecondPartyApproved | SecondPartyDeclined => {
            &[ActorRole::Matchmaker]
        }
        ContactDetailsShared | AwaitingFirstDateFeedback => &[ActorRole::First, ActorRole::Second],
        ThinkingAfterDate | ProceedingToSecondDate | EndedAfterFirstDate | Dating | Engaged
        | Married | Cancelled | Closed => &[ActorRole::First, ActorRole::Second, ActorRole::Matchmaker],
    }
}

const TRANSITION_TEMPLATE: &str = "Suggestion {{ suggestion_id }} moved from {{ from_status }} to {{ to_status }} ({{ acting_role }}).{% if note %} Note: {{ note }}{% endif %}";

/// A rendered message for one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient_role: ActorRole,
    pub recipient_id: Uuid,
    pub text: String,
}

pub fn template_environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("transition", TRANSITION_TEMPLATE)?;
    Ok(env)
}

pub fn render(
    env: &Environment<'_>,
    event: &TransitionEvent,
) -> Result<Vec<Notification>, minijinja::Error> {
    let template = env.get_template("transition")?;
    let text = template.render(context! {
        suggestion_id => event.suggestion_id.to_string(),
        from_status => event.from_status.as_str(),
        to_status => event.to_status.as_str(),
        acting_role => event.acting_role.to_string(),
        note => event.note.as_deref(),
    })?;

    Ok(recipients(event.to_status)
        .iter()
        .filter_map(|role| {
            event.user_for(*role).map(|recipient_id| Notification {
                recipient_role: *role,
                recipient_id,
                text: text.clone(),
            })
        })
        .collect())
}

pub async fn background_task(mut receiver: mpsc::Receiver<TransitionEvent>) {
    let env = match template_environment() {
        Ok(env) => env,
        Err(e) => {
            error!("cannot load notification templates: {e}");
            return;
        }
    };

    info!("notification dispatcher started");

    while let Some(event) = receiver.recv().await {
        match render(&env, &event) {
            Ok(notifications) => {
                for notification in notifications {
                    info!(
                        "notify {} {}: {}",
                        notification.recipient_role, notification.recipient_id, notification.text
                    );
                }
            }
            Err(e) => warn!(
                "cannot render notification for {}: {e}",
                event.suggestion_id
            ),
        }
    }

    info!("notification dispatcher stopped");
}
