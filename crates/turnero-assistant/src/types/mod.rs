pub mod message;
pub mod run;
pub mod tool;

pub use message::{MessageContent, MessageRole, TextAnnotation, TextValue, ThreadMessage};
pub use run::{RequiredAction, Run, RunError, RunStatus, SubmitToolOutputs};
pub use tool::{FunctionCall, ToolCall, ToolOutput};
