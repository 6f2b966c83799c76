use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Assistant-service thread bound to a contact
///
/// At most one thread per contact has `active == true`. Superseded threads are
/// deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    /// Opaque id issued by the assistant service
    pub external_id: String,
    pub contact_id: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Thread {
    pub fn new(contact_id: impl Into<String>, external_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: super::new_id(),
            external_id: external_id.into(),
            contact_id: contact_id.into(),
            active: true,
            created_at,
            deactivated_at: None,
        }
    }

    /// Whether the thread is older than `window` at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now.signed_duration_since(self.created_at) >= window,
            Err(_) => false,
        }
    }
}
