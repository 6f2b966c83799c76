#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use turnero_assistant::{
    AssistantClient, MessageRole, RequiredAction, Run, RunRequest, RunStatus, SubmitToolOutputs,
    ToolCall, ToolOutput,
};
use turnero_engine::{Engine, ToolContext};
use turnero_persist::{
    Assistant, Business, ChannelDirectory, ChannelRecord, Contact, ContactStore, Event, EventStore,
    IdempotencyStore, MemoryStore, Message, MessageStore, PersistError, Thread, ThreadStore,
};
use turnero_types::{
    CalendarPolicy, ChannelCredentials, EngineConfig, InboundMessage, RunConfig,
};
use turnero_whatsapp::{normalize_recipient, ChannelError, ReplySender, SentMessage};

pub const PHONE_NUMBER_ID: &str = "106540352242922";
pub const ASSISTANT_ID: &str = "asst_internal";
pub const SENDER: &str = "5491122334455";

/// Step returned by successive `get_run` polls
#[derive(Clone)]
pub enum Step {
    Status(RunStatus),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Default)]
struct State {
    steps: VecDeque<Step>,
    pending: HashMap<String, Vec<ToolCall>>,
    submitted: Vec<(String, Vec<ToolOutput>)>,
    messages: Vec<(String, MessageRole, String)>,
    runs: Vec<(String, RunRequest)>,
    cancelled: Vec<String>,
}

/// In-test assistant service following a fixed script of run states
pub struct ScriptedAssistant {
    state: Mutex<State>,
    threads_created: AtomicUsize,
    runs_started: AtomicUsize,
    get_run_calls: AtomicUsize,
    failing_polls: AtomicUsize,
    /// Status served once the script is exhausted
    idle_status: RunStatus,
    answer: Option<String>,
    fail_submit: bool,
    fail_create_thread: bool,
    create_delay: Duration,
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            threads_created: AtomicUsize::new(0),
            runs_started: AtomicUsize::new(0),
            get_run_calls: AtomicUsize::new(0),
            failing_polls: AtomicUsize::new(0),
            idle_status: RunStatus::Completed,
            answer: Some("Hola! ¿En qué te puedo ayudar?".to_string()),
            fail_submit: false,
            fail_create_thread: false,
            create_delay: Duration::ZERO,
        }
    }

    pub fn with_steps(self, steps: Vec<Step>) -> Self {
        self.state.lock().unwrap().steps = steps.into();
        self
    }

    /// Runs never leave `in_progress`
    pub fn hanging(mut self) -> Self {
        self.idle_status = RunStatus::InProgress;
        self
    }

    pub fn with_answer(mut self, answer: Option<&str>) -> Self {
        self.answer = answer.map(str::to_string);
        self
    }

    pub fn failing_polls(self, count: usize) -> Self {
        self.failing_polls.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    pub fn failing_create_thread(mut self) -> Self {
        self.fail_create_thread = true;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn threads_created(&self) -> usize {
        self.threads_created.load(Ordering::SeqCst)
    }

    pub fn runs_started(&self) -> usize {
        self.runs_started.load(Ordering::SeqCst)
    }

    pub fn get_run_calls(&self) -> usize {
        self.get_run_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<(String, Vec<ToolOutput>)> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn messages(&self) -> Vec<(String, MessageRole, String)> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn run_requests(&self) -> Vec<(String, RunRequest)> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    fn run(thread_id: &str, run_id: &str, status: RunStatus, calls: Option<Vec<ToolCall>>) -> Run {
        Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: String::new(),
            status,
            required_action: calls.map(|tool_calls| RequiredAction {
                action_type: "submit_tool_outputs".to_string(),
                submit_tool_outputs: SubmitToolOutputs { tool_calls },
            }),
            last_error: None,
            created_at: Utc::now().timestamp(),
        }
    }
}

#[async_trait]
impl AssistantClient for ScriptedAssistant {
    async fn create_thread(&self) -> Result<String> {
        if self.fail_create_thread {
            bail!("Assistant API error on /threads (500): boom");
        }
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("thread_{}", n))
    }

    async fn add_message(&self, thread_id: &str, role: MessageRole, content: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .messages
            .push((thread_id.to_string(), role, content.to_string()));
        Ok(())
    }

    async fn start_run(&self, thread_id: &str, request: RunRequest) -> Result<Run> {
        let n = self.runs_started.fetch_add(1, Ordering::SeqCst) + 1;
        let run_id = format!("run_{}", n);
        self.state
            .lock()
            .unwrap()
            .runs
            .push((thread_id.to_string(), request));
        Ok(Self::run(thread_id, &run_id, RunStatus::Queued, None))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.get_run_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_polls.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_polls.store(failing - 1, Ordering::SeqCst);
            bail!("Assistant API error on /runs (503): upstream unavailable");
        }

        let mut state = self.state.lock().unwrap();
        if let Some(calls) = state.pending.get(run_id) {
            return Ok(Self::run(thread_id, run_id, RunStatus::RequiresAction, Some(calls.clone())));
        }
        match state.steps.pop_front() {
            Some(Step::Status(status)) => Ok(Self::run(thread_id, run_id, status, None)),
            Some(Step::ToolCalls(calls)) => {
                state.pending.insert(run_id.to_string(), calls.clone());
                Ok(Self::run(thread_id, run_id, RunStatus::RequiresAction, Some(calls)))
            }
            None => Ok(Self::run(thread_id, run_id, self.idle_status, None)),
        }
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        if self.fail_submit {
            bail!("Assistant API error on /submit_tool_outputs (500): boom");
        }
        let mut state = self.state.lock().unwrap();
        state.submitted.push((run_id.to_string(), outputs.clone()));

        let Some(calls) = state.pending.get(run_id).cloned() else {
            bail!("Assistant API error (400): run {} is not waiting for tool outputs", run_id);
        };
        let expected: HashSet<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        let given: HashSet<&str> = outputs.iter().map(|o| o.tool_call_id.as_str()).collect();

        // the service keeps the run in requires_action until every call is answered
        if expected != given || outputs.len() != calls.len() {
            return Ok(Self::run(thread_id, run_id, RunStatus::RequiresAction, Some(calls)));
        }
        state.pending.remove(run_id);
        Ok(Self::run(thread_id, run_id, RunStatus::InProgress, None))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.state.lock().unwrap().cancelled.push(run_id.to_string());
        Ok(Self::run(thread_id, run_id, RunStatus::Cancelling, None))
    }

    async fn latest_assistant_message(
        &self,
        _thread_id: &str,
        run_id: Option<&str>,
    ) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        let outputs: Vec<String> = state
            .submitted
            .iter()
            .filter(|(id, _)| Some(id.as_str()) == run_id)
            .flat_map(|(_, outputs)| outputs.iter().map(|o| o.output.clone()))
            .collect();
        if outputs.is_empty() {
            Ok(self.answer.clone())
        } else {
            Ok(Some(format!("Listo! {}", outputs.join("; "))))
        }
    }
}

/// Reply sender that records instead of sending
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// `(normalized recipient, text)` in send order
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
        if self.fail {
            return Err(ChannelError::Api {
                status: 400,
                body: r#"{"error":{"message":"Recipient phone number not in allowed list"}}"#.to_string(),
            });
        }
        let recipient = normalize_recipient(to, credentials.strip_digit_at);
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        Ok(SentMessage {
            message_id: Some(format!("wamid.out.{}", self.sent.lock().unwrap().len())),
        })
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
            id: ASSISTANT_ID.to_string(),
            external_id: "asst_abc123".to_string(),
            name: "Recepción".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            instructions: None,
        },
    }
}

pub async fn provisioned_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.save_channel(channel_record()).await.unwrap();
    store
}

/// Memory store whose message log or contact table can be made to fail
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    fail_messages: AtomicBool,
    fail_contacts: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_messages: AtomicBool::new(false),
            fail_contacts: AtomicBool::new(false),
        }
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_contacts(&self, fail: bool) {
        self.fail_contacts.store(fail, Ordering::SeqCst);
    }

    fn outage() -> PersistError {
        PersistError::Connection("server selection timeout".to_string())
    }
}

#[async_trait]
impl IdempotencyStore for FaultyStore {
    async fn try_mark_seen(&self, message_id: &str) -> turnero_persist::Result<bool> {
        self.inner.try_mark_seen(message_id).await
    }

    async fn seen_before(&self, message_id: &str) -> turnero_persist::Result<bool> {
        self.inner.seen_before(message_id).await
    }

    async fn release_mark(&self, message_id: &str) -> turnero_persist::Result<()> {
        self.inner.release_mark(message_id).await
    }
}

#[async_trait]
impl ChannelDirectory for FaultyStore {
    async fn find_channel(&self, phone_number_id: &str) -> turnero_persist::Result<Option<ChannelRecord>> {
        self.inner.find_channel(phone_number_id).await
    }

    async fn save_channel(&self, channel: ChannelRecord) -> turnero_persist::Result<()> {
        self.inner.save_channel(channel).await
    }
}

#[async_trait]
impl ContactStore for FaultyStore {
    async fn upsert_contact(&self, phone_number_id: &str, number: &str) -> turnero_persist::Result<Contact> {
        if self.fail_contacts.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.upsert_contact(phone_number_id, number).await
    }

    async fn get_contact(&self, contact_id: &str) -> turnero_persist::Result<Option<Contact>> {
        self.inner.get_contact(contact_id).await
    }

    async fn set_blocked(&self, contact_id: &str, blocked: bool) -> turnero_persist::Result<()> {
        self.inner.set_blocked(contact_id, blocked).await
    }

    async fn soft_delete_contact(&self, contact_id: &str) -> turnero_persist::Result<()> {
        self.inner.soft_delete_contact(contact_id).await
    }

    async fn restore_contact(&self, contact_id: &str) -> turnero_persist::Result<()> {
        self.inner.restore_contact(contact_id).await
    }
}

#[async_trait]
impl ThreadStore for FaultyStore {
    async fn active_thread(&self, contact_id: &str) -> turnero_persist::Result<Option<Thread>> {
        self.inner.active_thread(contact_id).await
    }

    async fn activate_thread(
        &self,
        contact_id: &str,
        external_id: &str,
        created_at: chrono::DateTime<Utc>,
    ) -> turnero_persist::Result<Thread> {
        self.inner.activate_thread(contact_id, external_id, created_at).await
    }

    async fn list_threads(&self, contact_id: &str) -> turnero_persist::Result<Vec<Thread>> {
        self.inner.list_threads(contact_id).await
    }
}

#[async_trait]
impl MessageStore for FaultyStore {
    async fn save_message(&self, message: Message) -> turnero_persist::Result<()> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.save_message(message).await
    }

    async fn list_messages(&self, contact_id: &str, limit: usize) -> turnero_persist::Result<Vec<Message>> {
        self.inner.list_messages(contact_id, limit).await
    }
}

#[async_trait]
impl EventStore for FaultyStore {
    async fn create_event(&self, event: Event) -> turnero_persist::Result<Event> {
        self.inner.create_event(event).await
    }

    async fn find_by_code(&self, assistant_id: &str, code_event: &str) -> turnero_persist::Result<Option<Event>> {
        self.inner.find_by_code(assistant_id, code_event).await
    }

    async fn code_exists(&self, code_event: &str) -> turnero_persist::Result<bool> {
        self.inner.code_exists(code_event).await
    }

    async fn list_for_contact(
        &self,
        contact_id: &str,
        assistant_id: &str,
        date: Option<NaiveDate>,
    ) -> turnero_persist::Result<Vec<Event>> {
        self.inner.list_for_contact(contact_id, assistant_id, date).await
    }

    async fn list_for_assistant_on(&self, assistant_id: &str, date: NaiveDate) -> turnero_persist::Result<Vec<Event>> {
        self.inner.list_for_assistant_on(assistant_id, date).await
    }

    async fn update_event(&self, event: &Event) -> turnero_persist::Result<()> {
        self.inner.update_event(event).await
    }

    async fn cancel_event(&self, event_id: &str) -> turnero_persist::Result<()> {
        self.inner.cancel_event(event_id).await
    }
}

pub fn fast_run_config() -> RunConfig {
    RunConfig::new()
        .with_poll_interval(Duration::from_millis(2))
        .with_max_poll_interval(Duration::from_millis(10))
        .with_poll_timeout(Duration::from_millis(200))
        .with_run_timeout(Duration::from_millis(500))
}

pub fn engine(
    store: Arc<MemoryStore>,
    assistant: Arc<ScriptedAssistant>,
    sender: Arc<RecordingSender>,
    config: EngineConfig,
) -> Engine {
    Engine::builder()
        .store(store)
        .assistant(assistant)
        .sender(sender)
        .config(config)
        .build()
        .unwrap()
}

pub fn test_config() -> EngineConfig {
    EngineConfig::new().with_run(fast_run_config())
}

pub fn text_event(message_id: &str, text: &str) -> InboundMessage {
    InboundMessage::text(message_id, SENDER, PHONE_NUMBER_ID, text, Utc::now())
}

/// Tomorrow at the business, as `YYYY-MM-DD`
pub fn tomorrow() -> NaiveDate {
    let policy = CalendarPolicy::default();
    policy.local(Utc::now() + ChronoDuration::days(1)).date()
}

pub fn tool_context(contact_id: &str) -> ToolContext {
    ToolContext {
        contact_id: contact_id.to_string(),
        assistant_id: ASSISTANT_ID.to_string(),
        calendar: CalendarPolicy::default(),
        now: Utc::now(),
    }
}
