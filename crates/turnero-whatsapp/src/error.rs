use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Invalid webhook signature: {0}")]
    Signature(String),

    #[error("Invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The request never reached the API (connect failure, DNS, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Send timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with a non-success status
    #[error("WhatsApp API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ChannelError {
    /// Only failures where the API certainly did not receive the message
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::Transport(_))
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ChannelError::Transport(err.to_string())
        } else if err.is_timeout() {
            ChannelError::Timeout(err.to_string())
        } else if err.is_builder() {
            ChannelError::Config(err.to_string())
        } else {
            ChannelError::Http(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
