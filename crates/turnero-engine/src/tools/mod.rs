mod args;
mod calendar;

pub use args::ToolError;
pub use calendar::CalendarTools;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use turnero_assistant::ToolCall;
use turnero_types::CalendarPolicy;

/// Closed table of functions the assistant may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFunction {
    InsertEvent,
    GetEvents,
    UpdateEvent,
    DeleteEvent,
}

impl ToolFunction {
    pub const ALL: [ToolFunction; 4] = [
        ToolFunction::InsertEvent,
        ToolFunction::GetEvents,
        ToolFunction::UpdateEvent,
        ToolFunction::DeleteEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolFunction::InsertEvent => "insertEvent",
            ToolFunction::GetEvents => "getEvents",
            ToolFunction::UpdateEvent => "updateEvent",
            ToolFunction::DeleteEvent => "deleteEvent",
        }
    }
}

impl fmt::Display for ToolFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolFunction {
    type Err = ToolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolFunction::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| ToolError::UnknownFunction(name.to_string()))
    }
}

/// Who a tool call acts for
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub contact_id: String,
    /// Internal id of the assistant owning the calendar
    pub assistant_id: String,
    pub calendar: CalendarPolicy,
    pub now: DateTime<Utc>,
}

/// Resolves one tool call to the output string submitted to the run.
///
/// Never fails: problems are reported inside the output so the assistant can
/// recover conversationally.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    async fn resolve(&self, ctx: &ToolContext, call: &ToolCall) -> String;
}
