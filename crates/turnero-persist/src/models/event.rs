use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Cancelled,
}

/// Calendar booking owned by an assistant and a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Business-unique human-readable code, e.g. `EVT-4F2A9C`
    pub code_event: String,
    pub assistant_id: String,
    pub contact_id: String,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "turnero_types::channel::hhmm")]
    pub start: NaiveTime,
    #[serde(with = "turnero_types::channel::hhmm")]
    pub end: NaiveTime,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_scheduled(&self) -> bool {
        self.status == EventStatus::Scheduled
    }

    /// Whether `[start, end)` on `date` intersects this event
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.date == date && start < self.end && self.start < end
    }
}
