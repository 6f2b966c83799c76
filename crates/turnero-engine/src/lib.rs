pub mod builder;
pub mod locks;
pub mod pipeline;
pub mod resolver;
pub mod run;
pub mod threads;
pub mod tools;

pub use builder::EngineBuilder;
pub use locks::{ContactGuard, ContactLocks, KeyedLocks};
pub use pipeline::Engine;
pub use resolver::{ContextResolver, ResolveError, ResolvedContext};
pub use run::{RunOrchestrator, RunOutcome, TOOL_TIMEOUT_OUTPUT};
pub use threads::{ThreadHandle, ThreadManager};
pub use tools::{CalendarTools, ToolContext, ToolError, ToolFunction, ToolResolver};
