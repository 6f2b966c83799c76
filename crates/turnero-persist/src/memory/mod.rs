//! In-process store implementing every persistence trait.
//!
//! Holds the same invariants as the MongoDB backend (unique contact per
//! channel and number, single active thread per contact, unique event codes,
//! atomic idempotency marks) behind one lock, so each operation is atomic.
//! Data lives only as long as the process.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{ChannelRecord, Contact, Event, EventStatus, Message, Thread};
use crate::trait_client::{
    ChannelDirectory, ContactStore, EventStore, IdempotencyStore, MessageStore, ThreadStore,
};

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    channels: HashMap<String, ChannelRecord>,
    contacts: HashMap<String, Contact>,
    contact_index: HashMap<(String, String), String>,
    threads: Vec<Thread>,
    messages: Vec<Message>,
    events: HashMap<String, Event>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a thread as-is, keeping the single-active invariant
    pub async fn insert_thread(&self, thread: Thread) -> Result<()> {
        let mut inner = self.inner.write().await;
        if thread.active
            && inner
                .threads
                .iter()
                .any(|t| t.active && t.contact_id == thread.contact_id)
        {
            return Err(PersistError::ActiveThreadConflict(thread.contact_id));
        }
        if thread.active {
            if let Some(contact) = inner.contacts.get_mut(&thread.contact_id) {
                contact.current_thread_id = Some(thread.external_id.clone());
            }
        }
        inner.threads.push(thread);
        Ok(())
    }

    /// All events, including cancelled ones
    pub async fn all_events(&self) -> Vec<Event> {
        self.inner.read().await.events.values().cloned().collect()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn try_mark_seen(&self, message_id: &str) -> Result<bool> {
        Ok(self.inner.write().await.seen.insert(message_id.to_string()))
    }

    async fn seen_before(&self, message_id: &str) -> Result<bool> {
        Ok(self.inner.read().await.seen.contains(message_id))
    }

    async fn release_mark(&self, message_id: &str) -> Result<()> {
        self.inner.write().await.seen.remove(message_id);
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for MemoryStore {
    async fn find_channel(&self, phone_number_id: &str) -> Result<Option<ChannelRecord>> {
        Ok(self.inner.read().await.channels.get(phone_number_id).cloned())
    }

    async fn save_channel(&self, channel: ChannelRecord) -> Result<()> {
        self.inner
            .write()
            .await
            .channels
            .insert(channel.phone_number_id.clone(), channel);
        Ok(())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn upsert_contact(&self, phone_number_id: &str, number: &str) -> Result<Contact> {
        let mut inner = self.inner.write().await;
        let key = (phone_number_id.to_string(), number.to_string());

        if let Some(id) = inner.contact_index.get(&key) {
            if let Some(contact) = inner.contacts.get(id) {
                return Ok(contact.clone());
            }
        }

        let contact = Contact::new(phone_number_id, number);
        inner.contact_index.insert(key, contact.id.clone());
        inner.contacts.insert(contact.id.clone(), contact.clone());
        Ok(contact)
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<Contact>> {
        Ok(self.inner.read().await.contacts.get(contact_id).cloned())
    }

    async fn set_blocked(&self, contact_id: &str, blocked: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        let contact = inner
            .contacts
            .get_mut(contact_id)
            .ok_or_else(|| PersistError::ContactNotFound(contact_id.to_string()))?;
        contact.blocked = blocked;
        Ok(())
    }

    async fn soft_delete_contact(&self, contact_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let contact = inner
            .contacts
            .get_mut(contact_id)
            .ok_or_else(|| PersistError::ContactNotFound(contact_id.to_string()))?;
        contact.deleted_at.get_or_insert_with(Utc::now);
        Ok(())
    }

    async fn restore_contact(&self, contact_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let contact = inner
            .contacts
            .get_mut(contact_id)
            .ok_or_else(|| PersistError::ContactNotFound(contact_id.to_string()))?;
        contact.deleted_at = None;
        Ok(())
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn active_thread(&self, contact_id: &str) -> Result<Option<Thread>> {
        Ok(self
            .inner
            .read()
            .await
            .threads
            .iter()
            .find(|t| t.active && t.contact_id == contact_id)
            .cloned())
    }

    async fn activate_thread(
        &self,
        contact_id: &str,
        external_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Thread> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        for thread in inner
            .threads
            .iter_mut()
            .filter(|t| t.active && t.contact_id == contact_id)
        {
            thread.active = false;
            thread.deactivated_at = Some(now);
        }

        let thread = Thread::new(contact_id, external_id, created_at);
        inner.threads.push(thread.clone());

        if let Some(contact) = inner.contacts.get_mut(contact_id) {
            contact.current_thread_id = Some(external_id.to_string());
        }

        Ok(thread)
    }

    async fn list_threads(&self, contact_id: &str) -> Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = self
            .inner
            .read()
            .await
            .threads
            .iter()
            .filter(|t| t.contact_id == contact_id)
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save_message(&self, message: Message) -> Result<()> {
        self.inner.write().await.messages.push(message);
        Ok(())
    }

    async fn list_messages(&self, contact_id: &str, limit: usize) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.contact_id == contact_id)
            .take(limit)
            .cloned()
            .collect();
        messages.reverse();
        Ok(messages)
    }
}

/// Another scheduled event of the same assistant starts at the same date and time
fn slot_taken<'a>(mut events: impl Iterator<Item = &'a Event>, event: &Event) -> bool {
    events.any(|e| {
        e.id != event.id
            && e.is_scheduled()
            && e.assistant_id == event.assistant_id
            && e.date == event.date
            && e.start == event.start
    })
}

fn slot_label(event: &Event) -> String {
    format!("{} {} {}", event.assistant_id, event.date, event.start.format("%H:%M"))
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(&self, event: Event) -> Result<Event> {
        let mut inner = self.inner.write().await;
        if inner.events.values().any(|e| e.code_event == event.code_event) {
            return Err(PersistError::DuplicateKey(event.code_event));
        }
        if event.is_scheduled() && slot_taken(inner.events.values(), &event) {
            return Err(PersistError::SlotTaken(slot_label(&event)));
        }
        inner.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn find_by_code(&self, assistant_id: &str, code_event: &str) -> Result<Option<Event>> {
        Ok(self
            .inner
            .read()
            .await
            .events
            .values()
            .find(|e| e.assistant_id == assistant_id && e.code_event.eq_ignore_ascii_case(code_event))
            .cloned())
    }

    async fn code_exists(&self, code_event: &str) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .events
            .values()
            .any(|e| e.code_event == code_event))
    }

    async fn list_for_contact(
        &self,
        contact_id: &str,
        assistant_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .inner
            .read()
            .await
            .events
            .values()
            .filter(|e| {
                e.is_scheduled()
                    && e.contact_id == contact_id
                    && e.assistant_id == assistant_id
                    && date.map_or(true, |d| e.date == d)
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date, e.start));
        Ok(events)
    }

    async fn list_for_assistant_on(&self, assistant_id: &str, date: NaiveDate) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .inner
            .read()
            .await
            .events
            .values()
            .filter(|e| e.is_scheduled() && e.assistant_id == assistant_id && e.date == date)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        let mut inner = self.inner.write().await;
        let scheduled = inner
            .events
            .get(&event.id)
            .ok_or_else(|| PersistError::EventNotFound(event.id.clone()))?
            .is_scheduled();
        if scheduled && slot_taken(inner.events.values(), event) {
            return Err(PersistError::SlotTaken(slot_label(event)));
        }
        let stored = inner
            .events
            .get_mut(&event.id)
            .ok_or_else(|| PersistError::EventNotFound(event.id.clone()))?;
        stored.title = event.title.clone();
        stored.description = event.description.clone();
        stored.date = event.date;
        stored.start = event.start;
        stored.end = event.end;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel_event(&self, event_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .events
            .get_mut(event_id)
            .ok_or_else(|| PersistError::EventNotFound(event_id.to_string()))?;
        stored.status = EventStatus::Cancelled;
        stored.updated_at = Utc::now();
        Ok(())
    }
}
