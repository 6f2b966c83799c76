//! Webhook payload model of the WhatsApp Cloud API.
//!
//! Only the fields the conversation engine consumes are modelled; everything
//! else in the payload is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use turnero_types::InboundMessage;

use crate::error::Result;

/// Query string of the subscription verification request
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl VerifyQuery {
    /// The challenge to echo when the request is a subscription with the right token
    pub fn accept(&self, expected_token: &str) -> Option<&str> {
        match (&self.mode, &self.verify_token) {
            (Some(mode), Some(token)) if mode == "subscribe" && token == expected_token => {
                Some(self.challenge.as_deref().unwrap_or_default())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub messages: Vec<WaMessage>,
    /// Delivery/read receipts, not conversation turns
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaMessage {
    pub from: String,
    pub id: String,
    /// Unix seconds, as a string
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<WaText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaText {
    pub body: String,
}

impl WaMessage {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Message events of every change, in payload order.
    ///
    /// Changes without `metadata.phone_number_id` and messages with an
    /// unreadable timestamp are skipped with a warning.
    pub fn inbound_messages(&self) -> Vec<InboundMessage> {
        let mut events = Vec::new();

        for change in self.entry.iter().flat_map(|e| e.changes.iter()) {
            let value = &change.value;
            if value.messages.is_empty() {
                continue;
            }
            let Some(metadata) = &value.metadata else {
                warn!(count = value.messages.len(), "Dropping messages without channel metadata");
                continue;
            };

            for message in &value.messages {
                let Some(timestamp) = message.timestamp() else {
                    warn!(
                        message_id = %message.id,
                        timestamp = %message.timestamp,
                        "Dropping message with invalid timestamp"
                    );
                    continue;
                };

                let text = if message.kind == "text" {
                    message.text.as_ref().map(|t| t.body.clone())
                } else {
                    None
                };

                events.push(InboundMessage {
                    message_id: message.id.clone(),
                    sender_number: message.from.clone(),
                    phone_number_id: metadata.phone_number_id.clone(),
                    kind: message.kind.clone(),
                    text,
                    timestamp,
                });
            }
        }

        events
    }

    /// Number of status callbacks carried by the payload
    pub fn status_count(&self) -> usize {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .map(|c| c.value.statuses.len())
            .sum()
    }
}
