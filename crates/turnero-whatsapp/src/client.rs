// WhatsApp Cloud API sender

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use turnero_types::ChannelCredentials;

use crate::error::{ChannelError, Result};
use crate::normalize::normalize_recipient;
use crate::traits::{ReplySender, SentMessage};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v20.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Timeout of one send request
    #[serde(default = "default_send_timeout", with = "millis")]
    pub send_timeout: Duration,
    /// Extra attempts after a connect-level failure
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_backoff", with = "millis")]
    pub retry_backoff: Duration,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_retries() -> u32 {
    2
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(250)
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            send_timeout: default_send_timeout(),
            connect_retries: default_connect_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl WhatsAppConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_connect_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.connect_retries = retries;
        self.retry_backoff = backoff;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentId>,
}

#[derive(Debug, Deserialize)]
struct SentId {
    id: String,
}

/// Sends text replies through the Graph API `/{phone_number_id}/messages` endpoint
pub struct WhatsAppClient {
    http_client: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.send_timeout)
            .build()
            .map_err(|e| ChannelError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, config })
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            phone_number_id
        )
    }

    async fn send_once(
        &self,
        url: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<SentMessage> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // the message was accepted; an unreadable ack is not a failure
        let message_id = match response.json::<SendResponse>().await {
            Ok(ack) => ack.messages.into_iter().next().map(|m| m.id),
            Err(e) => {
                debug!(error = %e, "Unreadable send acknowledgement");
                None
            }
        };
        Ok(SentMessage { message_id })
    }
}

#[async_trait]
impl ReplySender for WhatsAppClient {
    async fn send_text(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        text: &str,
    ) -> Result<SentMessage> {
        let recipient = normalize_recipient(to, credentials.strip_digit_at);
        let url = self.messages_url(&credentials.phone_number_id);
        let body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": recipient,
            "type": "text",
            "text": { "preview_url": false, "body": text },
        });

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &credentials.access_token, &body).await {
                Err(e) if e.is_retryable() && attempt < self.config.connect_retries => {
                    attempt += 1;
                    warn!(
                        phone_number_id = %credentials.phone_number_id,
                        attempt,
                        error = %e,
                        "Send did not reach the API, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                result => return result,
            }
        }
    }
}
