//! Processing of one accepted inbound event, from idempotency gate to reply.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use turnero_assistant::{AssistantClient, MessageRole, Run, RunRequest};
use turnero_persist::{Message, PersistenceClient};
use turnero_types::{EngineConfig, InboundMessage, TurnOutcome};
use turnero_whatsapp::ReplySender;

use crate::locks::ContactLocks;
use crate::resolver::{ContextResolver, ResolveError, ResolvedContext};
use crate::run::{RunOrchestrator, RunOutcome};
use crate::threads::ThreadManager;
use crate::tools::ToolContext;

/// Reply chosen for a turn
struct Reply {
    text: String,
    thread_id: Option<String>,
    run_id: Option<String>,
    answered: bool,
}

pub struct Engine {
    store: Arc<dyn PersistenceClient>,
    assistant: Arc<dyn AssistantClient>,
    sender: Arc<dyn ReplySender>,
    resolver: ContextResolver,
    threads: ThreadManager,
    orchestrator: RunOrchestrator,
    config: EngineConfig,
}

impl Engine {
    pub(crate) fn new(
        store: Arc<dyn PersistenceClient>,
        assistant: Arc<dyn AssistantClient>,
        sender: Arc<dyn ReplySender>,
        orchestrator: RunOrchestrator,
        config: EngineConfig,
    ) -> Self {
        let locks = Arc::new(ContactLocks::new());
        Self {
            resolver: ContextResolver::new(Arc::clone(&store)),
            threads: ThreadManager::new(
                Arc::clone(&store),
                Arc::clone(&assistant),
                locks,
                config.staleness_window,
            ),
            store,
            assistant,
            sender,
            orchestrator,
            config,
        }
    }

    /// Create a builder for fluent construction
    pub fn builder() -> crate::builder::EngineBuilder {
        crate::builder::EngineBuilder::new()
    }

    pub fn threads(&self) -> &ThreadManager {
        &self.threads
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one inbound event end to end.
    ///
    /// Errors are storage failures before the contact is known. The message
    /// mark is released on those so a redelivery is processed again. Once the
    /// contact is resolved every failure still ends in a reply.
    pub async fn handle(&self, event: InboundMessage) -> Result<TurnOutcome> {
        if !self
            .store
            .try_mark_seen(&event.message_id)
            .await
            .context("Idempotency check failed")?
        {
            info!(message_id = %event.message_id, "Duplicate delivery ignored");
            return Ok(TurnOutcome::Duplicate);
        }

        let ctx = match self
            .resolver
            .resolve(&event.phone_number_id, &event.sender_number)
            .await
        {
            Ok(ctx) => ctx,
            Err(ResolveError::NotProvisioned(phone_number_id)) => {
                warn!(
                    message_id = %event.message_id,
                    phone_number_id = %phone_number_id,
                    "Dropping event for unprovisioned channel"
                );
                return Ok(TurnOutcome::NotProvisioned);
            }
            Err(e) => {
                if let Err(release) = self.store.release_mark(&event.message_id).await {
                    warn!(
                        message_id = %event.message_id,
                        error = %release,
                        "Failed to release message mark"
                    );
                }
                return Err(e).context("Failed to resolve context");
            }
        };

        if ctx.contact.blocked {
            info!(
                message_id = %event.message_id,
                contact_id = %ctx.contact.id,
                "Ignoring message from blocked contact"
            );
            return Ok(TurnOutcome::Ignored);
        }

        let reply = match event.text.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(text) => {
                let inbound = Message::inbound(&ctx.contact.id, text, &event.message_id);
                if let Err(e) = self.store.save_message(inbound).await {
                    warn!(
                        message_id = %event.message_id,
                        contact_id = %ctx.contact.id,
                        error = %e,
                        "Failed to store inbound message"
                    );
                }
                self.converse(&event, &ctx, text).await
            }
            None => {
                info!(
                    message_id = %event.message_id,
                    contact_id = %ctx.contact.id,
                    kind = %event.kind,
                    "Unsupported message type"
                );
                Reply {
                    text: self.config.replies.unsupported.clone(),
                    thread_id: None,
                    run_id: None,
                    answered: false,
                }
            }
        };

        Ok(self.deliver(&event, &ctx, reply).await)
    }

    /// Thread, run and tool calls for one text message
    async fn converse(&self, event: &InboundMessage, ctx: &ResolvedContext, text: &str) -> Reply {
        let started = self.start_run(ctx, text).await;
        let (thread_id, run) = match started {
            Ok(started) => started,
            Err(e) => {
                error!(
                    message_id = %event.message_id,
                    contact_id = %ctx.contact.id,
                    error = ?e,
                    "Failed to start run"
                );
                return Reply {
                    text: self.config.replies.failure.clone(),
                    thread_id: None,
                    run_id: None,
                    answered: false,
                };
            }
        };

        let tool_ctx = ToolContext {
            contact_id: ctx.contact.id.clone(),
            assistant_id: ctx.channel.assistant.id.clone(),
            calendar: ctx.channel.business.calendar.clone(),
            now: Utc::now(),
        };
        let outcome = self.orchestrator.drive(&thread_id, run, &tool_ctx).await;

        let (text, answered) = match (&outcome, outcome.answer()) {
            (_, Some(answer)) => (answer.to_string(), true),
            (RunOutcome::Expired { .. }, None) => (self.config.replies.expired.clone(), false),
            (_, None) => {
                if let RunOutcome::Completed { run_id, .. } = &outcome {
                    warn!(
                        message_id = %event.message_id,
                        contact_id = %ctx.contact.id,
                        thread_id = %thread_id,
                        run_id = %run_id,
                        "Run completed without an answer"
                    );
                }
                (self.config.replies.failure.clone(), false)
            }
        };

        Reply {
            text,
            run_id: Some(outcome.run_id().to_string()),
            thread_id: Some(thread_id),
            answered,
        }
    }

    /// Critical section: thread reuse or creation, message append and run
    /// start happen under the contact's lock
    async fn start_run(&self, ctx: &ResolvedContext, text: &str) -> Result<(String, Run)> {
        let guard = self.threads.locks().acquire(&ctx.contact.id).await;
        let handle = self.threads.get_or_create_held(&guard).await?;
        let thread_id = handle.thread.external_id;

        self.assistant
            .add_message(&thread_id, MessageRole::User, text)
            .await
            .with_context(|| format!("Failed to add message to thread {}", thread_id))?;

        let run = self
            .assistant
            .start_run(&thread_id, self.run_request(ctx))
            .await
            .with_context(|| format!("Failed to start run on thread {}", thread_id))?;
        drop(guard);

        info!(
            contact_id = %ctx.contact.id,
            thread_id = %thread_id,
            run_id = %run.id,
            new_thread = handle.created,
            "Run started"
        );
        Ok((thread_id, run))
    }

    fn run_request(&self, ctx: &ResolvedContext) -> RunRequest {
        let assistant = &ctx.channel.assistant;
        let local = ctx.channel.business.calendar.local(Utc::now());

        let mut request = RunRequest::new(&assistant.external_id).additional_instructions(format!(
            "Current date and time at the business: {} ({}).",
            local.format("%Y-%m-%d %H:%M"),
            local.format("%A")
        ));
        if let Some(model) = &assistant.model {
            request = request.model(model);
        }
        if let Some(instructions) = &assistant.instructions {
            request = request.instructions(instructions);
        }
        request
    }

    async fn deliver(&self, event: &InboundMessage, ctx: &ResolvedContext, reply: Reply) -> TurnOutcome {
        let credentials = &ctx.channel.business.credentials;

        match self
            .sender
            .send_text(credentials, &ctx.contact.number, &reply.text)
            .await
        {
            Ok(sent) => {
                let outbound = Message::outbound(&ctx.contact.id, reply.thread_id.clone(), &reply.text);
                if let Err(e) = self.store.save_message(outbound).await {
                    warn!(contact_id = %ctx.contact.id, error = %e, "Failed to store outbound message");
                }
                info!(
                    message_id = %event.message_id,
                    contact_id = %ctx.contact.id,
                    thread_id = reply.thread_id.as_deref().unwrap_or("-"),
                    run_id = reply.run_id.as_deref().unwrap_or("-"),
                    outbound_id = sent.message_id.as_deref().unwrap_or("-"),
                    answered = reply.answered,
                    "Reply sent"
                );
                TurnOutcome::Replied {
                    thread_id: reply.thread_id,
                    run_id: reply.run_id,
                    answered: reply.answered,
                }
            }
            Err(e) => {
                error!(
                    message_id = %event.message_id,
                    contact_id = %ctx.contact.id,
                    thread_id = reply.thread_id.as_deref().unwrap_or("-"),
                    run_id = reply.run_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Failed to send reply"
                );
                TurnOutcome::SendFailed {
                    thread_id: reply.thread_id,
                    run_id: reply.run_id,
                }
            }
        }
    }
}
