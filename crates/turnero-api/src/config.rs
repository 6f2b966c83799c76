use config::{Config as ConfigLoader, ConfigError, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use turnero_assistant::AssistantConfig;
use turnero_types::{EngineConfig, ReplyTexts, RunConfig};
use turnero_whatsapp::WhatsAppConfig;

/// Environment prefixes and the section each one overrides
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("SERVER", "server"),
    ("MONGODB", "mongodb"),
    ("ASSISTANT", "assistant"),
    ("WHATSAPP", "whatsapp"),
    ("CONVERSATION", "conversation"),
    ("LOG", "logging"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub mongodb: MongoDbConfig,
    pub assistant: AssistantSection,
    pub conversation: ConversationConfig,
    pub whatsapp: WhatsAppSection,
    pub replies: RepliesConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(skip)]
    pub mongodb_uri: String,
    #[serde(skip)]
    pub openai_api_key: String,
    #[serde(skip)]
    pub whatsapp_verify_token: String,
    #[serde(skip)]
    pub whatsapp_app_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub database: String,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            database: "turnero".to_string(),
        }
    }
}

/// Assistant service endpoint and run polling policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantSection {
    pub base_url: String,
    pub beta: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    pub poll_timeout_secs: u64,
    /// Wall-clock budget of one run
    pub run_timeout_secs: u64,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            base_url: turnero_assistant::config::DEFAULT_BASE_URL.to_string(),
            beta: turnero_assistant::config::DEFAULT_BETA_HEADER.to_string(),
            request_timeout_secs: 15,
            poll_interval_ms: 500,
            max_poll_interval_ms: 2_000,
            poll_timeout_secs: 10,
            run_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Threads older than this are replaced on the next message
    pub staleness_hours: u64,
    /// Inbound events older than this are dropped at ingress
    pub max_event_age_secs: i64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            staleness_hours: 12,
            max_event_age_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppSection {
    pub base_url: String,
    pub api_version: String,
    pub send_timeout_ms: u64,
    pub connect_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for WhatsAppSection {
    fn default() -> Self {
        let defaults = WhatsAppConfig::default();
        Self {
            base_url: defaults.base_url,
            api_version: defaults.api_version,
            send_timeout_ms: defaults.send_timeout.as_millis() as u64,
            connect_retries: defaults.connect_retries,
            retry_backoff_ms: defaults.retry_backoff.as_millis() as u64,
        }
    }
}

/// Overrides of the fixed reply texts; unset entries keep the built-in wording
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepliesConfig {
    pub failure: Option<String>,
    pub expired: Option<String>,
    pub unsupported: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (ENV defaults to `dev`)
    /// 3. Environment variables with SERVER_, MONGODB_, ASSISTANT_, WHATSAPP_,
    ///    CONVERSATION_ and LOG_ prefixes
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from("config", &env, std::env::vars())
    }

    /// Same layering as [`Config::load`] with an explicit directory and variable set
    pub fn load_from(
        dir: impl AsRef<Path>,
        env: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join(env).to_string_lossy()).required(false));

        for (key, value) in env_overrides(&vars) {
            builder = builder.set_override(key, value)?;
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets are never read from files
        cfg.mongodb_uri = required(&vars, "MONGODB_URI")?;
        cfg.openai_api_key = required(&vars, "OPENAI_API_KEY")?;
        cfg.whatsapp_verify_token = required(&vars, "WHATSAPP_VERIFY_TOKEN")?;
        cfg.whatsapp_app_secret = vars
            .get("WHATSAPP_APP_SECRET")
            .filter(|s| !s.is_empty())
            .cloned();

        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn max_event_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.conversation.max_event_age_secs)
    }

    pub fn assistant_config(&self) -> AssistantConfig {
        AssistantConfig::new(self.openai_api_key.clone())
            .with_base_url(self.assistant.base_url.clone())
            .with_beta(self.assistant.beta.clone())
            .with_request_timeout(Duration::from_secs(self.assistant.request_timeout_secs))
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::new()
            .with_poll_interval(Duration::from_millis(self.assistant.poll_interval_ms))
            .with_max_poll_interval(Duration::from_millis(self.assistant.max_poll_interval_ms))
            .with_poll_timeout(Duration::from_secs(self.assistant.poll_timeout_secs))
            .with_run_timeout(Duration::from_secs(self.assistant.run_timeout_secs))
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut replies = ReplyTexts::default();
        if let Some(text) = &self.replies.failure {
            replies.failure = text.clone();
        }
        if let Some(text) = &self.replies.expired {
            replies.expired = text.clone();
        }
        if let Some(text) = &self.replies.unsupported {
            replies.unsupported = text.clone();
        }

        EngineConfig::new()
            .with_staleness_window(Duration::from_secs(self.conversation.staleness_hours * 3600))
            .with_run(self.run_config())
            .with_replies(replies)
    }

    pub fn whatsapp_config(&self) -> WhatsAppConfig {
        WhatsAppConfig::default()
            .with_base_url(self.whatsapp.base_url.clone())
            .with_api_version(self.whatsapp.api_version.clone())
            .with_send_timeout(Duration::from_millis(self.whatsapp.send_timeout_ms))
            .with_connect_retries(
                self.whatsapp.connect_retries,
                Duration::from_millis(self.whatsapp.retry_backoff_ms),
            )
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::Message(format!("{} environment variable is required", name)))
}

/// `SERVER_REQUEST_TIMEOUT_SECS=5` becomes `server.request_timeout_secs = "5"`
fn env_overrides(vars: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut overrides = Vec::new();
    for (name, value) in vars {
        for (prefix, section) in ENV_SECTIONS {
            let Some(rest) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };
            if !rest.is_empty() {
                overrides.push((format!("{}.{}", section, rest.to_lowercase()), value.clone()));
            }
        }
    }
    overrides.sort();
    overrides
}
