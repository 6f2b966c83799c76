use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One inbound message event, already extracted from the transport payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Identifier assigned by the channel provider, used for idempotency
    pub message_id: String,
    /// Sender number as reported by the channel
    pub sender_number: String,
    /// Business phone-number id the event was delivered to
    pub phone_number_id: String,
    /// Provider message type ("text", "image", ...)
    pub kind: String,
    /// Text body, `None` for non-text messages
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn text(
        message_id: impl Into<String>,
        sender_number: impl Into<String>,
        phone_number_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender_number: sender_number.into(),
            phone_number_id: phone_number_id.into(),
            kind: "text".to_string(),
            text: Some(text.into()),
            timestamp,
        }
    }

    /// Whether the event is older than `max_age` relative to `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.timestamp) > max_age
    }
}
