#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use turnero_api::{router, AppState};
use turnero_assistant::{AssistantClient, MessageRole, Run, RunRequest, RunStatus, ToolOutput};
use turnero_engine::Engine;
use turnero_persist::{
    Assistant, Business, ChannelDirectory, ChannelRecord, IdempotencyStore, MemoryStore,
};
use turnero_types::{CalendarPolicy, ChannelCredentials, EngineConfig, RunConfig};
use turnero_whatsapp::{normalize_recipient, ChannelError, ReplySender, SentMessage};

pub const PHONE_NUMBER_ID: &str = "106540352242922";
pub const VERIFY_TOKEN: &str = "verify-me";
pub const APP_SECRET: &str = "app-secret";
pub const ANSWER: &str = "Hola! ¿En qué te puedo ayudar?";

/// Assistant whose runs complete immediately with a fixed answer
pub struct InstantAssistant;

impl InstantAssistant {
    fn run(thread_id: &str) -> Run {
        Run {
            id: "run_1".to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: "asst_abc123".to_string(),
            status: RunStatus::Completed,
            required_action: None,
            last_error: None,
            created_at: 0,
        }
    }
}

#[async_trait]
impl AssistantClient for InstantAssistant {
    async fn create_thread(&self) -> Result<String> {
        Ok("thread_1".to_string())
    }

    async fn add_message(&self, _thread_id: &str, _role: MessageRole, _content: &str) -> Result<()> {
        Ok(())
    }

    async fn start_run(&self, thread_id: &str, _request: RunRequest) -> Result<Run> {
        Ok(Self::run(thread_id))
    }

    async fn get_run(&self, thread_id: &str, _run_id: &str) -> Result<Run> {
        Ok(Self::run(thread_id))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        _run_id: &str,
        _outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        Ok(Self::run(thread_id))
    }

    async fn cancel_run(&self, thread_id: &str, _run_id: &str) -> Result<Run> {
        Ok(Self::run(thread_id))
    }

    async fn latest_assistant_message(
        &self,
        _thread_id: &str,
        _run_id: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(Some(ANSWER.to_string()))
    }
}

/// Reply sender that records `(normalized recipient, text)`
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn send_text(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        text: &str,
    ) -> Result<SentMessage, ChannelError> {
        let recipient = normalize_recipient(to, credentials.strip_digit_at);
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        Ok(SentMessage::default())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<RecordingSender>,
}

impl TestApp {
    pub async fn new(app_secret: Option<&str>) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.save_channel(channel_record()).await.unwrap();
        let sender = Arc::new(RecordingSender::default());

        let engine = Engine::builder()
            .store(store.clone())
            .assistant(Arc::new(InstantAssistant))
            .sender(sender.clone())
            .config(EngineConfig::new().with_run(
                RunConfig::new()
                    .with_poll_interval(Duration::from_millis(2))
                    .with_run_timeout(Duration::from_millis(500)),
            ))
            .build()
            .unwrap();

        let state = Arc::new(
            AppState::new(Arc::new(engine), VERIFY_TOKEN)
                .with_app_secret(app_secret.map(str::to_string))
                .with_max_event_age(chrono::Duration::minutes(5)),
        );

        Self { state, store, sender }
    }

    pub fn router(&self) -> axum::Router {
        router(Arc::clone(&self.state))
    }

    /// Wait until the engine has taken `message_id` through the idempotency gate
    pub async fn wait_seen(&self, message_id: &str) -> bool {
        for _ in 0..100 {
            if self.store.seen_before(message_id).await.unwrap() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Wait until `count` replies have been sent
    pub async fn wait_sent(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            let sent = self.sender.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sender.sent()
    }
}

pub fn channel_record() -> ChannelRecord {
    ChannelRecord {
        phone_number_id: PHONE_NUMBER_ID.to_string(),
        business: Business {
            id: "biz_1".to_string(),
            name: "Consultorio Palermo".to_string(),
            credentials: ChannelCredentials {
                phone_number_id: PHONE_NUMBER_ID.to_string(),
                access_token: "wa-token".to_string(),
                strip_digit_at: Some(7),
            },
            calendar: CalendarPolicy::default(),
        },
        assistant: Assistant {
            id: "asst_internal".to_string(),
            external_id: "asst_abc123".to_string(),
            name: "Recepción".to_string(),
            model: None,
            instructions: None,
        },
    }
}

/// Webhook body carrying one text message
pub fn text_payload(message_id: &str, text: &str, timestamp: i64) -> String {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA_ID",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550001111",
                        "phone_number_id": PHONE_NUMBER_ID
                    },
                    "contacts": [{ "profile": { "name": "Ana" }, "wa_id": "5491122334455" }],
                    "messages": [{
                        "from": "5491122334455",
                        "id": message_id,
                        "timestamp": timestamp.to_string(),
                        "type": "text",
                        "text": { "body": text }
                    }]
                }
            }]
        }]
    })
    .to_string()
}
