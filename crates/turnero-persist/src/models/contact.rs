use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// End user of one business phone number
///
/// Unique per `(phone_number_id, number)`. Never hard-deleted so message
/// history stays attributable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub phone_number_id: String,
    pub number: String,
    /// External id of the contact's active assistant thread, if any
    pub current_thread_id: Option<String>,
    pub blocked: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(phone_number_id: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            phone_number_id: phone_number_id.into(),
            number: number.into(),
            current_thread_id: None,
            blocked: false,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
