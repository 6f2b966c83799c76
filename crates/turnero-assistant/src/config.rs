use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BETA_HEADER: &str = "assistants=v2";

/// Connection settings for the assistant service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub api_key: String,
    /// Base URL of the API, defaults to https://api.openai.com/v1
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Value of the `OpenAI-Beta` header sent on every call
    #[serde(default = "default_beta")]
    pub beta: String,
    /// Timeout applied to each HTTP request
    #[serde(default = "default_request_timeout", with = "secs")]
    pub request_timeout: Duration,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_beta() -> String {
    DEFAULT_BETA_HEADER.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

impl AssistantConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            beta: default_beta(),
            request_timeout: default_request_timeout(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_beta(mut self, beta: impl Into<String>) -> Self {
        self.beta = beta.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
