use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{ChannelRecord, Contact, Event, Message, Thread};

/// Gate against processing the same provider message id twice
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically record `message_id`. Returns `false` if it was already recorded.
    async fn try_mark_seen(&self, message_id: &str) -> Result<bool>;

    /// Whether `message_id` has been recorded
    async fn seen_before(&self, message_id: &str) -> Result<bool>;

    /// Drop the record of `message_id` so a redelivery is processed again
    async fn release_mark(&self, message_id: &str) -> Result<()>;
}

/// Lookup of provisioned phone numbers
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn find_channel(&self, phone_number_id: &str) -> Result<Option<ChannelRecord>>;

    /// Insert or replace the record for `channel.phone_number_id`
    async fn save_channel(&self, channel: ChannelRecord) -> Result<()>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Fetch the contact for `(phone_number_id, number)`, creating it atomically if missing
    async fn upsert_contact(&self, phone_number_id: &str, number: &str) -> Result<Contact>;

    async fn get_contact(&self, contact_id: &str) -> Result<Option<Contact>>;

    async fn set_blocked(&self, contact_id: &str, blocked: bool) -> Result<()>;

    async fn soft_delete_contact(&self, contact_id: &str) -> Result<()>;

    /// Clear the deletion mark of a soft-deleted contact
    async fn restore_contact(&self, contact_id: &str) -> Result<()>;
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// The contact's thread with `active == true`, if any
    async fn active_thread(&self, contact_id: &str) -> Result<Option<Thread>>;

    /// Deactivate the contact's current thread (if any) and store `external_id` as the
    /// new active one. When a concurrent writer activated another thread in
    /// between, that thread is returned instead.
    async fn activate_thread(
        &self,
        contact_id: &str,
        external_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Thread>;

    /// All threads of a contact, newest first
    async fn list_threads(&self, contact_id: &str) -> Result<Vec<Thread>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save_message(&self, message: Message) -> Result<()>;

    /// Most recent messages of a contact in chronological order
    async fn list_messages(&self, contact_id: &str, limit: usize) -> Result<Vec<Message>>;
}

/// Calendar collaborator
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Store a new event. Fails with `DuplicateKey` if `code_event` is taken
    /// and with `SlotTaken` if another scheduled event of the assistant starts
    /// at the same date and time.
    async fn create_event(&self, event: Event) -> Result<Event>;

    async fn find_by_code(&self, assistant_id: &str, code_event: &str) -> Result<Option<Event>>;

    async fn code_exists(&self, code_event: &str) -> Result<bool>;

    /// Scheduled events of a contact with an assistant, optionally on one date
    async fn list_for_contact(
        &self,
        contact_id: &str,
        assistant_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Event>>;

    /// Scheduled events of an assistant on a date, across contacts
    async fn list_for_assistant_on(&self, assistant_id: &str, date: NaiveDate) -> Result<Vec<Event>>;

    /// Replace date, times, title and description of an existing event.
    /// Fails with `SlotTaken` like `create_event`.
    async fn update_event(&self, event: &Event) -> Result<()>;

    async fn cancel_event(&self, event_id: &str) -> Result<()>;
}

/// Everything the conversation engine reads and writes
pub trait PersistenceClient:
    IdempotencyStore + ChannelDirectory + ContactStore + ThreadStore + MessageStore + EventStore
{
}

impl<T> PersistenceClient for T where
    T: IdempotencyStore + ChannelDirectory + ContactStore + ThreadStore + MessageStore + EventStore
{
}
