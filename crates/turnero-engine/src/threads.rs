use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use turnero_assistant::AssistantClient;
use turnero_persist::{PersistenceClient, Thread};

use crate::locks::{ContactGuard, ContactLocks};

/// Thread returned by the lifecycle manager
#[derive(Debug, Clone)]
pub struct ThreadHandle {
    pub thread: Thread,
    /// Whether a new external thread was created for this call
    pub created: bool,
}

/// Keeps at most one active assistant thread per contact, rotating threads
/// older than the staleness window
pub struct ThreadManager {
    store: Arc<dyn PersistenceClient>,
    assistant: Arc<dyn AssistantClient>,
    locks: Arc<ContactLocks>,
    staleness_window: Duration,
}

impl ThreadManager {
    pub fn new(
        store: Arc<dyn PersistenceClient>,
        assistant: Arc<dyn AssistantClient>,
        locks: Arc<ContactLocks>,
        staleness_window: Duration,
    ) -> Self {
        Self {
            store,
            assistant,
            locks,
            staleness_window,
        }
    }

    pub fn locks(&self) -> &Arc<ContactLocks> {
        &self.locks
    }

    /// Get or create the contact's thread under its lock
    pub async fn get_or_create(&self, contact_id: &str) -> Result<ThreadHandle> {
        let guard = self.locks.acquire(contact_id).await;
        self.get_or_create_held(&guard).await
    }

    /// Same as [`get_or_create`](Self::get_or_create) for a caller already
    /// holding the contact's lock
    pub async fn get_or_create_held(&self, guard: &ContactGuard) -> Result<ThreadHandle> {
        let contact_id = guard.contact_id();
        let now = Utc::now();

        let current = self
            .store
            .active_thread(contact_id)
            .await
            .context("Failed to load active thread")?;

        if let Some(thread) = current.as_ref() {
            if !thread.is_stale(now, self.staleness_window) {
                return Ok(ThreadHandle {
                    thread: thread.clone(),
                    created: false,
                });
            }
        }

        let external_id = self
            .assistant
            .create_thread()
            .await
            .context("Failed to create assistant thread")?;
        if external_id.is_empty() {
            bail!("Assistant service returned an empty thread id");
        }

        let thread = self
            .store
            .activate_thread(contact_id, &external_id, now)
            .await
            .context("Failed to activate thread")?;

        info!(
            contact_id = %contact_id,
            thread_id = %thread.external_id,
            superseded = current.as_ref().map(|t| t.external_id.as_str()).unwrap_or("none"),
            "Started new thread"
        );

        let created = thread.external_id == external_id;
        Ok(ThreadHandle { thread, created })
    }
}
