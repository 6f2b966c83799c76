use anyhow::{anyhow, Result};
use std::sync::Arc;
use turnero_assistant::AssistantClient;
use turnero_persist::PersistenceClient;
use turnero_types::EngineConfig;
use turnero_whatsapp::ReplySender;

use crate::pipeline::Engine;
use crate::run::RunOrchestrator;
use crate::tools::{CalendarTools, ToolResolver};

/// Builder for constructing an Engine with optional components
pub struct EngineBuilder {
    store: Option<Arc<dyn PersistenceClient>>,
    assistant: Option<Arc<dyn AssistantClient>>,
    sender: Option<Arc<dyn ReplySender>>,
    tools: Option<Arc<dyn ToolResolver>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            assistant: None,
            sender: None,
            tools: None,
            config: EngineConfig::default(),
        }
    }

    /// Set the persistence client
    pub fn store(mut self, store: Arc<dyn PersistenceClient>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the assistant service client
    pub fn assistant(mut self, assistant: Arc<dyn AssistantClient>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Set the channel used for replies
    pub fn sender(mut self, sender: Arc<dyn ReplySender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Replace the calendar tools backed by the store
    pub fn tools(mut self, tools: Arc<dyn ToolResolver>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let store = self.store.ok_or_else(|| anyhow!("Persistence client is required"))?;
        let assistant = self
            .assistant
            .ok_or_else(|| anyhow!("Assistant client is required"))?;
        let sender = self.sender.ok_or_else(|| anyhow!("Reply sender is required"))?;
        let tools: Arc<dyn ToolResolver> = match self.tools {
            Some(tools) => tools,
            None => Arc::new(CalendarTools::new(Arc::clone(&store))),
        };

        let orchestrator = RunOrchestrator::new(Arc::clone(&assistant), tools, self.config.run.clone());
        Ok(Engine::new(store, assistant, sender, orchestrator, self.config))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
