use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Audit record of one inbound or outbound text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub contact_id: String,
    /// External id of the thread the text was exchanged on
    pub thread_id: Option<String>,
    pub from_bot: bool,
    pub text: String,
    /// Provider id of the inbound message, when there is one
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn inbound(
        contact_id: impl Into<String>,
        text: impl Into<String>,
        provider_message_id: impl Into<String>,
    ) -> Self {
        Self {
            id: super::new_id(),
            contact_id: contact_id.into(),
            thread_id: None,
            from_bot: false,
            text: text.into(),
            provider_message_id: Some(provider_message_id.into()),
            created_at: Utc::now(),
        }
    }

    pub fn outbound(contact_id: impl Into<String>, thread_id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            contact_id: contact_id.into(),
            thread_id,
            from_bot: true,
            text: text.into(),
            provider_message_id: None,
            created_at: Utc::now(),
        }
    }
}
