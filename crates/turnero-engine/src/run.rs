//! Drives one assistant run from start to a terminal state.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};
use turnero_assistant::{AssistantClient, Run, RunStatus, ToolCall, ToolOutput};
use turnero_types::RunConfig;

use crate::tools::{ToolContext, ToolResolver};

/// Output submitted for a tool call that did not finish within its budget
pub const TOOL_TIMEOUT_OUTPUT: &str =
    "error: tool timed out, check with getEvents before trying again";

/// How a run ended, from the engine's point of view
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run completed; `answer` is its final assistant message, if any
    Completed { run_id: String, answer: Option<String> },
    /// The run reached `failed`, `cancelled` or `incomplete`, or could not be driven
    Failed { run_id: String, status: RunStatus, reason: String },
    /// No terminal state within the run budget
    Expired { run_id: String },
}

impl RunOutcome {
    pub fn run_id(&self) -> &str {
        match self {
            RunOutcome::Completed { run_id, .. }
            | RunOutcome::Failed { run_id, .. }
            | RunOutcome::Expired { run_id } => run_id,
        }
    }

    /// The assistant's answer, when there is one to relay
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { answer, .. } => answer.as_deref().filter(|a| !a.trim().is_empty()),
            _ => None,
        }
    }
}

pub struct RunOrchestrator {
    assistant: Arc<dyn AssistantClient>,
    tools: Arc<dyn ToolResolver>,
    config: RunConfig,
}

impl RunOrchestrator {
    pub fn new(
        assistant: Arc<dyn AssistantClient>,
        tools: Arc<dyn ToolResolver>,
        config: RunConfig,
    ) -> Self {
        Self {
            assistant,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Poll `run` until it is terminal, answering every tool call exactly once.
    ///
    /// Bounded by `run_timeout` overall and `poll_timeout` per request and per
    /// tool call. Status poll failures are retried inside the budget; a failed
    /// tool-output submission ends the run.
    pub async fn drive(&self, thread_id: &str, run: Run, ctx: &ToolContext) -> RunOutcome {
        let deadline = Instant::now() + self.config.run_timeout;
        let run_id = run.id.clone();
        let mut answered: HashSet<String> = HashSet::new();
        let mut current = run;
        let mut attempt: u32 = 0;

        loop {
            match current.status {
                RunStatus::Completed => return self.completed(thread_id, &run_id).await,
                RunStatus::Expired => {
                    warn!(thread_id = %thread_id, run_id = %run_id, "Run expired on the assistant service");
                    return RunOutcome::Expired { run_id };
                }
                status if status.is_terminal() => {
                    let reason = current
                        .last_error
                        .as_ref()
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_else(|| format!("run ended as {}", status));
                    error!(
                        contact_id = %ctx.contact_id,
                        thread_id = %thread_id,
                        run_id = %run_id,
                        status = %status,
                        reason = %reason,
                        "Run failed"
                    );
                    return RunOutcome::Failed { run_id, status, reason };
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return self.expire(thread_id, &run_id, ctx).await;
            }

            if current.status == RunStatus::RequiresAction {
                let pending: Vec<ToolCall> = current
                    .pending_tool_calls()
                    .iter()
                    .filter(|call| !answered.contains(&call.id))
                    .cloned()
                    .collect();

                if !pending.is_empty() {
                    let outputs = self.resolve_calls(thread_id, &run_id, ctx, &pending, deadline).await;
                    let ids: Vec<String> = outputs.iter().map(|o| o.tool_call_id.clone()).collect();

                    let submitted = timeout(
                        self.config.poll_timeout,
                        self.assistant.submit_tool_outputs(thread_id, &run_id, outputs),
                    )
                    .await;

                    match submitted {
                        Ok(Ok(run)) => {
                            answered.extend(ids);
                            debug!(run_id = %run_id, status = %run.status, "Tool outputs submitted");
                            current = run;
                            attempt = 0;
                            continue;
                        }
                        Ok(Err(e)) => {
                            return self.submit_failed(thread_id, &run_id, ctx, &ids, e.to_string());
                        }
                        Err(_) => {
                            return self.submit_failed(
                                thread_id,
                                &run_id,
                                ctx,
                                &ids,
                                "submission timed out".to_string(),
                            );
                        }
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.config.backoff(attempt).min(remaining)).await;
            attempt = attempt.saturating_add(1);

            let poll_budget = self
                .config
                .poll_timeout
                .min(deadline.saturating_duration_since(Instant::now()));
            match timeout(poll_budget, self.assistant.get_run(thread_id, &run_id)).await {
                Ok(Ok(run)) => current = run,
                Ok(Err(e)) => {
                    warn!(thread_id = %thread_id, run_id = %run_id, error = %e, "Run status poll failed, retrying");
                }
                Err(_) => {
                    warn!(thread_id = %thread_id, run_id = %run_id, "Run status poll timed out, retrying");
                }
            }
        }
    }

    /// One output per call, in request order.
    ///
    /// Each call gets `poll_timeout` capped by what is left of the run budget;
    /// a call that does not finish in time is answered with an error output.
    async fn resolve_calls(
        &self,
        thread_id: &str,
        run_id: &str,
        ctx: &ToolContext,
        calls: &[ToolCall],
        deadline: Instant,
    ) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let budget = self
                .config
                .poll_timeout
                .min(deadline.saturating_duration_since(Instant::now()));
            let output = match timeout(budget, self.tools.resolve(ctx, call)).await {
                Ok(output) => output,
                Err(_) => {
                    error!(
                        contact_id = %ctx.contact_id,
                        thread_id = %thread_id,
                        run_id = %run_id,
                        tool_call_id = %call.id,
                        function = %call.function.name,
                        budget_ms = budget.as_millis() as u64,
                        "Tool call timed out"
                    );
                    TOOL_TIMEOUT_OUTPUT.to_string()
                }
            };
            outputs.push(ToolOutput::new(call.id.clone(), output));
        }
        outputs
    }

    async fn completed(&self, thread_id: &str, run_id: &str) -> RunOutcome {
        let message = timeout(
            self.config.poll_timeout,
            self.assistant.latest_assistant_message(thread_id, Some(run_id)),
        )
        .await;

        match message {
            Ok(Ok(answer)) => {
                info!(thread_id = %thread_id, run_id = %run_id, "Run completed");
                RunOutcome::Completed {
                    run_id: run_id.to_string(),
                    answer,
                }
            }
            Ok(Err(e)) => self.unreadable_answer(thread_id, run_id, e.to_string()),
            Err(_) => self.unreadable_answer(thread_id, run_id, "message read timed out".to_string()),
        }
    }

    fn unreadable_answer(&self, thread_id: &str, run_id: &str, reason: String) -> RunOutcome {
        error!(thread_id = %thread_id, run_id = %run_id, error = %reason, "Failed to read run answer");
        RunOutcome::Failed {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
            reason,
        }
    }

    fn submit_failed(
        &self,
        thread_id: &str,
        run_id: &str,
        ctx: &ToolContext,
        tool_call_ids: &[String],
        reason: String,
    ) -> RunOutcome {
        error!(
            contact_id = %ctx.contact_id,
            thread_id = %thread_id,
            run_id = %run_id,
            tool_call_ids = ?tool_call_ids,
            error = %reason,
            "Failed to submit tool outputs"
        );
        RunOutcome::Failed {
            run_id: run_id.to_string(),
            status: RunStatus::RequiresAction,
            reason,
        }
    }

    /// Give up on the run and ask the service to cancel it so the thread is
    /// released on its side
    async fn expire(&self, thread_id: &str, run_id: &str, ctx: &ToolContext) -> RunOutcome {
        error!(
            contact_id = %ctx.contact_id,
            thread_id = %thread_id,
            run_id = %run_id,
            budget_ms = self.config.run_timeout.as_millis() as u64,
            "Run exceeded its budget"
        );

        match timeout(self.config.poll_timeout, self.assistant.cancel_run(thread_id, run_id)).await {
            Ok(Ok(run)) => debug!(run_id = %run_id, status = %run.status, "Cancel requested"),
            Ok(Err(e)) => warn!(run_id = %run_id, error = %e, "Cancel request failed"),
            Err(_) => warn!(run_id = %run_id, "Cancel request timed out"),
        }

        RunOutcome::Expired {
            run_id: run_id.to_string(),
        }
    }
}
