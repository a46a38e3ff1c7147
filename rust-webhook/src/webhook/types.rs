//! WhatsApp Cloud API webhook envelope types.
//!
//! The provider batches notifications as `entry[] → changes[] → value`.
//! Every level here is lenient: a missing key, `null`, or a value of the
//! wrong JSON type deserializes to an empty collection or `None`, and a
//! malformed element inside a collection is dropped without affecting its
//! siblings.

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ingest::IngestError;

/// `change.field` value that carries message statuses.
pub const MESSAGES_FIELD: &str = "messages";

// =============================================================================
// Provider Envelope
// =============================================================================

/// Top-level webhook body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    /// Always `whatsapp_business_account` for WhatsApp deliveries
    #[serde(default, deserialize_with = "lenient")]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub entry: Vec<Entry>,
}

/// One business account entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    /// WhatsApp Business Account ID
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub changes: Vec<Change>,
}

/// A single change notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default, deserialize_with = "lenient")]
    pub field: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub value: ChangeValue,
}

impl Change {
    /// Whether this change belongs to the `messages` field.
    pub fn is_messages(&self) -> bool {
        self.field.as_deref() == Some(MESSAGES_FIELD)
    }
}

/// Payload of a change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default, deserialize_with = "lenient")]
    pub messaging_product: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<Metadata>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub statuses: Vec<StatusRecord>,
    /// Inbound user messages; only counted, never stored
    #[serde(default, deserialize_with = "lenient_vec")]
    pub messages: Vec<Value>,
}

/// Business phone number the change was delivered for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient")]
    pub display_phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub phone_number_id: Option<String>,
}

/// Raw status entry as sent by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRecord {
    /// Provider-assigned message ID (`wamid.…`)
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    /// Unix epoch seconds, as a string
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recipient_id: Option<String>,
}

impl WebhookPayload {
    /// Parse a raw request body.
    ///
    /// The body must be a JSON object; anything below the top level is
    /// tolerated.
    pub fn from_slice(body: &[u8]) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(IngestError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_type_name(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| IngestError::InvalidPayload(e.to_string()))
    }

    /// Iterate over changes whose field is `messages`.
    pub fn message_changes(&self) -> impl Iterator<Item = &Change> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter(|change| change.is_messages())
    }
}

// =============================================================================
// Status Events
// =============================================================================

/// Delivery state of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
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

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// A validated status transition for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub message_id: String,
    pub status: MessageStatus,
    pub timestamp: String,
}

/// Why a status record could not become a [`StatusEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    MissingStatus,
    UnknownStatus(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingId => f.write_str("missing_id"),
            SkipReason::MissingStatus => f.write_str("missing_status"),
            SkipReason::UnknownStatus(s) => write!(f, "unknown_status:{}", s),
        }
    }
}

impl StatusRecord {
    /// Validate this record into a status event.
    pub fn to_event(&self) -> Result<StatusEvent, SkipReason> {
        let message_id = match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(SkipReason::MissingId),
        };

        let status = match self.status.as_deref() {
            Some(raw) => raw.parse().map_err(SkipReason::UnknownStatus)?,
            None => return Err(SkipReason::MissingStatus),
        };

        Ok(StatusEvent {
            message_id,
            status,
            timestamp: self.timestamp.clone().unwrap_or_default(),
        })
    }
}

// =============================================================================
// Lenient Deserializers
// =============================================================================

/// Deserialize any JSON value into `T`, falling back to `T::default()`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize a JSON array, dropping elements that don't fit `T`.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
