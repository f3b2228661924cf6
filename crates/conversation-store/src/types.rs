//! Message and contact types held by the conversation store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Template,
    Image,
    Document,
}

impl MessageKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Template => "template",
            MessageKind::Image => "image",
            MessageKind::Document => "document",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a message.
///
/// The store overwrites status unconditionally, so no ordering between the
/// variants is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not one of the four known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown message status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for MessageStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Provider or locally generated message id.
    pub id: String,
    /// Sender phone number.
    pub from: String,
    /// Recipient phone number (or phone number id for inbound messages).
    pub to: String,
    /// Message body, empty for non-text content.
    #[serde(default)]
    pub text: String,
    /// ISO-8601 timestamp. Compared lexically.
    pub timestamp: String,
    /// Content kind.
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Delivery status.
    pub status: MessageStatus,
    /// True when composed locally, false when received via webhook.
    pub is_from_user: bool,
}

impl Message {
    /// Create an inbound (received) text message stamped with the current time.
    pub fn inbound(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            text: text.into(),
            timestamp: iso_timestamp(Utc::now()),
            kind: MessageKind::Text,
            status: MessageStatus::Delivered,
            is_from_user: false,
        }
    }

    /// Create an outbound (locally composed) text message with status `sent`.
    pub fn outbound(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            text: text.into(),
            timestamp: iso_timestamp(Utc::now()),
            kind: MessageKind::Text,
            status: MessageStatus::Sent,
            is_from_user: true,
        }
    }

    /// Set the content kind.
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the timestamp string.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Phone number of the other party in the conversation.
    pub fn counterpart(&self) -> &str {
        if self.is_from_user {
            &self.to
        } else {
            &self.from
        }
    }

    /// Whether `phone` is either the sender or the recipient.
    pub fn involves(&self, phone: &str) -> bool {
        self.from == phone || self.to == phone
    }
}

/// A conversation counterpart, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub last_message: String,
    /// Time of day of the last activity, for display only.
    pub timestamp: String,
    pub unread_count: u32,
    /// Instant of the last activity.
    pub last_activity: DateTime<Utc>,
}

impl Contact {
    pub(crate) fn new(phone: &str, last_message: &str, unread_count: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("Contact +{}", phone),
            phone: phone.to_string(),
            last_message: last_message.to_string(),
            timestamp: time_of_day(now),
            unread_count,
            last_activity: now,
        }
    }

    pub(crate) fn touch(&mut self, last_message: &str, now: DateTime<Utc>) {
        self.last_message = last_message.to_string();
        self.timestamp = time_of_day(now);
        self.last_activity = now;
    }
}

/// Aggregate counters over the store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total_messages: usize,
    /// Messages composed locally.
    pub sent_messages: usize,
    /// Messages with status delivered or read.
    pub delivered_messages: usize,
    pub read_messages: usize,
    pub contact_count: usize,
    pub unread_total: u64,
    /// Contacts with at least one unread message.
    pub active_chats: usize,
}

/// Format an instant as an RFC 3339 UTC string with millisecond precision.
pub fn iso_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn time_of_day(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%H:%M").to_string()
}
