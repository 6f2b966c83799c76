use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds of the run polling loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Delay before the first status poll
    pub poll_interval: Duration,
    /// Upper bound for the backed-off delay between polls
    pub max_poll_interval: Duration,
    /// Timeout of a single status request
    pub poll_timeout: Duration,
    /// Wall-clock budget for the whole run; exceeding it expires the run
    pub run_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(10),
            run_timeout: Duration::from_secs(60),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Delay after `attempt` polls: doubles from `poll_interval`, capped at `max_poll_interval`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.poll_interval
            .checked_mul(factor)
            .unwrap_or(self.max_poll_interval)
            .min(self.max_poll_interval)
    }
}

/// Fixed texts sent to the user when there is no assistant answer to relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyTexts {
    pub failure: String,
    pub expired: String,
    pub unsupported: String,
}

impl Default for ReplyTexts {
    fn default() -> Self {
        Self {
            failure: "Perdón, tuvimos un problema procesando tu mensaje. Por favor escribinos de nuevo en unos minutos.".to_string(),
            expired: "Perdón, estoy tardando más de lo normal. ¿Podés intentar de nuevo?".to_string(),
            unsupported: "Por ahora solo puedo leer mensajes de texto.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Maximum thread age before a new thread is started for the contact
    pub staleness_window: Duration,
    pub run: RunConfig,
    pub replies: ReplyTexts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_window: Duration::from_secs(12 * 60 * 60),
            run: RunConfig::default(),
            replies: ReplyTexts::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_run(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    pub fn with_replies(mut self, replies: ReplyTexts) -> Self {
        self.replies = replies;
        self
    }
}
