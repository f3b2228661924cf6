//! Webhook envelope types posted by the WhatsApp Cloud API.
//!
//! Every field is optional on the wire. Absent or `null` collections
//! deserialize as empty, and scalar fields of the wrong type read as absent,
//! so a sparse or odd body simply yields no events.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::WebhookError;

/// `object` value the provider uses for WhatsApp Business notifications.
pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

/// `field` value of changes that carry messages and statuses.
pub const MESSAGES_FIELD: &str = "messages";

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Strings and numbers as text; anything else as absent.
fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar(Value::deserialize(deserializer)?))
}

/// Top-level webhook body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Notification object type (e.g., "whatsapp_business_account").
    #[serde(default, deserialize_with = "lenient")]
    pub object: String,

    /// Per-account entries.
    #[serde(default, deserialize_with = "nullable")]
    pub entry: Vec<Entry>,
}

impl WebhookPayload {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, WebhookError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Whether this notification comes from a WhatsApp Business account.
    pub fn is_business_account(&self) -> bool {
        self.object == BUSINESS_ACCOUNT_OBJECT
    }

    /// Iterate over all `messages` changes with a value.
    pub(crate) fn message_changes(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter(|change| change.field == MESSAGES_FIELD)
            .filter_map(|change| change.value.as_ref())
    }
}

/// An entry for one business account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    /// WhatsApp Business account id.
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,

    #[serde(default, deserialize_with = "nullable")]
    pub changes: Vec<Change>,
}

/// A single change notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    #[serde(default, deserialize_with = "lenient")]
    pub field: String,

    #[serde(default)]
    pub value: Option<ChangeValue>,
}

/// Payload of a `messages` change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default, deserialize_with = "lenient")]
    pub messaging_product: String,

    /// Business phone number the change belongs to.
    #[serde(default)]
    pub metadata: Option<Metadata>,

    /// Sender profiles for the messages in this change.
    #[serde(default, deserialize_with = "nullable")]
    pub contacts: Vec<ProfileContact>,

    /// Inbound messages.
    #[serde(default, deserialize_with = "nullable")]
    pub messages: Vec<InboundMessage>,

    /// Delivery and read receipts for outbound messages.
    #[serde(default, deserialize_with = "nullable")]
    pub statuses: Vec<StatusNotification>,
}

/// Business phone number metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient")]
    pub display_phone_number: String,

    #[serde(default, deserialize_with = "lenient")]
    pub phone_number_id: String,
}

/// Sender profile attached to a change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileContact {
    #[serde(default, deserialize_with = "lenient")]
    pub wa_id: String,

    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
}

/// An inbound message as delivered by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider message id (`wamid.*`).
    #[serde(default, deserialize_with = "lenient_opt")]
    pub id: Option<String>,

    /// Sender phone number.
    #[serde(default, deserialize_with = "lenient_opt")]
    pub from: Option<String>,

    /// Unix seconds, as a decimal string.
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: String,

    /// Provider message type ("text", "image", "sticker", ...).
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: String,

    /// Text content for `text` messages.
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextBody {
    #[serde(default, deserialize_with = "lenient")]
    pub body: String,
}

/// Status receipt for a previously sent message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusNotification {
    /// Id of the message the status refers to.
    #[serde(default, deserialize_with = "lenient_opt")]
    pub id: Option<String>,

    /// "sent", "delivered", "read", "failed" (others are possible).
    #[serde(default, deserialize_with = "lenient")]
    pub status: String,

    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: String,

    #[serde(default, deserialize_with = "lenient_opt")]
    pub recipient_id: Option<String>,
}
