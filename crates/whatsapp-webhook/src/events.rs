//! Extraction of typed events from a webhook envelope.

use chrono::DateTime;
use conversation_store::{iso_timestamp, ConversationStore, Message, MessageKind, MessageStatus};
use tracing::{debug, warn};

use crate::envelope::{ChangeValue, InboundMessage, StatusNotification, WebhookPayload};

/// A validated event ready to be applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A message received from a WhatsApp user.
    Message(Message),
    /// A status change for a message previously sent by the business.
    Status { id: String, status: MessageStatus },
}

impl WebhookEvent {
    /// Apply the event to the store.
    pub fn apply(self, store: &ConversationStore) {
        match self {
            WebhookEvent::Message(message) => store.insert_message(message),
            WebhookEvent::Status { id, status } => store.update_message_status(&id, status),
        }
    }
}

/// Counts of events applied from one webhook delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub messages: usize,
    pub statuses: usize,
}

/// Apply every event in order and report how many of each were applied.
pub fn dispatch(events: Vec<WebhookEvent>, store: &ConversationStore) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    for event in events {
        match &event {
            WebhookEvent::Message(_) => summary.messages += 1,
            WebhookEvent::Status { .. } => summary.statuses += 1,
        }
        event.apply(store);
    }
    summary
}

/// Map a provider message type onto the store's closed set of kinds.
pub fn kind_from_provider(kind: &str) -> MessageKind {
    match kind {
        "template" => MessageKind::Template,
        "image" | "sticker" => MessageKind::Image,
        "document" | "audio" | "video" => MessageKind::Document,
        _ => MessageKind::Text,
    }
}

/// Convert a unix-seconds string into an ISO-8601 timestamp.
fn provider_timestamp(raw: &str) -> Option<String> {
    let seconds = raw.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0).map(iso_timestamp)
}

fn message_event(value: &ChangeValue, message: &InboundMessage) -> Option<WebhookEvent> {
    let (Some(id), Some(from)) = (message.id.as_ref(), message.from.as_ref()) else {
        warn!("Skipping inbound message without id or sender");
        return None;
    };
    let Some(metadata) = value.metadata.as_ref() else {
        warn!(id = %id, "Skipping inbound message without metadata");
        return None;
    };
    let Some(timestamp) = provider_timestamp(&message.timestamp) else {
        warn!(id = %id, timestamp = %message.timestamp, "Skipping inbound message with bad timestamp");
        return None;
    };

    let text = message
        .text
        .as_ref()
        .map(|t| t.body.clone())
        .unwrap_or_default();

    Some(WebhookEvent::Message(
        Message::inbound(id.as_str(), from.as_str(), metadata.phone_number_id.as_str(), text)
            .with_kind(kind_from_provider(&message.kind))
            .with_timestamp(timestamp)
            .with_status(MessageStatus::Delivered),
    ))
}

fn status_event(notification: &StatusNotification) -> Option<WebhookEvent> {
    let Some(id) = notification.id.as_ref() else {
        warn!("Skipping status without message id");
        return None;
    };
    match notification.status.parse::<MessageStatus>() {
        Ok(status) => Some(WebhookEvent::Status {
            id: id.clone(),
            status,
        }),
        Err(err) => {
            debug!(id = %id, "Skipping status: {}", err);
            None
        }
    }
}

impl WebhookPayload {
    /// Extract events in delivery order: all inbound messages, then all
    /// statuses.
    ///
    /// Messages are only taken from WhatsApp Business account notifications;
    /// statuses are taken from any `messages` change.
    pub fn events(&self) -> Vec<WebhookEvent> {
        let mut events = Vec::new();

        if self.is_business_account() {
            for value in self.message_changes() {
                events.extend(
                    value
                        .messages
                        .iter()
                        .filter_map(|message| message_event(value, message)),
                );
            }
        }

        for value in self.message_changes() {
            events.extend(value.statuses.iter().filter_map(status_event));
        }

        events
    }
}
