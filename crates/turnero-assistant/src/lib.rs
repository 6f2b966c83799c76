pub mod types;
pub mod traits;
pub mod config;
pub mod openai;

pub use traits::{AssistantClient, RunRequest};
pub use config::AssistantConfig;
pub use openai::OpenAIAssistantsClient;
pub use types::{
    FunctionCall, MessageRole, RequiredAction, Run, RunError, RunStatus, SubmitToolOutputs,
    ThreadMessage, ToolCall, ToolOutput,
};
