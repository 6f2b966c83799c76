use crate::types::{MessageRole, Run, ToolOutput};
use anyhow::Result;
use async_trait::async_trait;

/// Contract of the hosted assistant service
///
/// A thread holds the conversation; a run executes the assistant over it. Tool
/// calls surface on the run as `requires_action` and are answered with
/// `submit_tool_outputs`.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Create an empty thread and return its id
    async fn create_thread(&self) -> Result<String>;

    /// Append a message to a thread
    async fn add_message(&self, thread_id: &str, role: MessageRole, content: &str) -> Result<()>;

    /// Start a run of `request.assistant_id` over the thread
    async fn start_run(&self, thread_id: &str, request: RunRequest) -> Result<Run>;

    /// Retrieve the current state of a run
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Answer the pending tool calls of a run in one batch
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run>;

    /// Ask the service to cancel a run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Text of the most recent assistant message, optionally restricted to one run
    async fn latest_assistant_message(
        &self,
        thread_id: &str,
        run_id: Option<&str>,
    ) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub assistant_id: String,
    /// Overrides the model configured on the assistant
    pub model: Option<String>,
    /// Overrides the assistant's instructions
    pub instructions: Option<String>,
    /// Appended to the instructions for this run only
    pub additional_instructions: Option<String>,
}

impl RunRequest {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn additional_instructions(mut self, text: impl Into<String>) -> Self {
        self.additional_instructions = Some(text.into());
        self
    }
}
