use std::sync::Arc;
use turnero_engine::Engine;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Token expected in the `hub.verify_token` subscription challenge
    pub verify_token: String,
    /// When set, webhook bodies must carry a valid `x-hub-signature-256`
    pub app_secret: Option<String>,
    /// Inbound events older than this are dropped
    pub max_event_age: chrono::Duration,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, verify_token: impl Into<String>) -> Self {
        Self {
            engine,
            verify_token: verify_token.into(),
            app_secret: None,
            max_event_age: chrono::Duration::minutes(5),
        }
    }

    pub fn with_app_secret(mut self, secret: Option<String>) -> Self {
        self.app_secret = secret;
        self
    }

    pub fn with_max_event_age(mut self, max_age: chrono::Duration) -> Self {
        self.max_event_age = max_age;
        self
    }
}
