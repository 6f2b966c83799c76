use async_trait::async_trait;
use turnero_types::ChannelCredentials;

use crate::error::Result;

/// Provider acknowledgement of an outbound message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentMessage {
    pub message_id: Option<String>,
}

/// Outbound side of the channel
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send `text` to `to` on behalf of the business owning `credentials`.
    /// The recipient is normalized with the channel's numbering convention.
    async fn send_text(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        text: &str,
    ) -> Result<SentMessage>;
}
