use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::{bson::doc, Client};
use tracing::{info, warn};

use crate::dbs::mongo::models::{MongoEvent, MongoMessage};
use crate::dbs::mongo::parse_oid;
use crate::dbs::mongo::repositories::{
    MongoChannelRepository, MongoContactRepository, MongoEventRepository, MongoMessageRepository,
    MongoProcessedRepository, MongoThreadRepository,
};
use crate::error::{PersistError, Result};
use crate::models::{ChannelRecord, Contact, Event, Message, Thread};
use crate::trait_client::{
    ChannelDirectory, ContactStore, EventStore, IdempotencyStore, MessageStore, ThreadStore,
};

pub struct MongoPersistenceClient {
    client: Client,
    database: String,
    processed: MongoProcessedRepository,
    channels: MongoChannelRepository,
    contacts: MongoContactRepository,
    threads: MongoThreadRepository,
    messages: MongoMessageRepository,
    events: MongoEventRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            processed: MongoProcessedRepository::new(&client, database),
            channels: MongoChannelRepository::new(&client, database),
            contacts: MongoContactRepository::new(&client, database),
            threads: MongoThreadRepository::new(&client, database),
            messages: MongoMessageRepository::new(&client, database),
            events: MongoEventRepository::new(&client, database),
            database: database.to_string(),
            client,
        })
    }

    /// Create the unique and lookup indexes every invariant relies on
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.processed.ensure_indexes().await?;
        self.channels.ensure_indexes().await?;
        self.contacts.ensure_indexes().await?;
        self.threads.ensure_indexes().await?;
        self.messages.ensure_indexes().await?;
        self.events.ensure_indexes().await?;
        info!(database = %self.database, "MongoDB indexes ensured");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for MongoPersistenceClient {
    async fn try_mark_seen(&self, message_id: &str) -> Result<bool> {
        self.processed.try_mark(message_id).await
    }

    async fn seen_before(&self, message_id: &str) -> Result<bool> {
        self.processed.exists(message_id).await
    }

    async fn release_mark(&self, message_id: &str) -> Result<()> {
        self.processed.remove(message_id).await
    }
}

#[async_trait]
impl ChannelDirectory for MongoPersistenceClient {
    async fn find_channel(&self, phone_number_id: &str) -> Result<Option<ChannelRecord>> {
        self.channels.find(phone_number_id).await
    }

    async fn save_channel(&self, channel: ChannelRecord) -> Result<()> {
        self.channels.save(&channel).await
    }
}

#[async_trait]
impl ContactStore for MongoPersistenceClient {
    async fn upsert_contact(&self, phone_number_id: &str, number: &str) -> Result<Contact> {
        let contact = self.contacts.upsert(phone_number_id, number).await?;
        Ok(contact.into())
    }

    async fn get_contact(&self, contact_id: &str) -> Result<Option<Contact>> {
        let contact = self.contacts.get(parse_oid(contact_id)?).await?;
        Ok(contact.map(|c| c.into()))
    }

    async fn set_blocked(&self, contact_id: &str, blocked: bool) -> Result<()> {
        self.contacts.set_blocked(parse_oid(contact_id)?, blocked).await
    }

    async fn soft_delete_contact(&self, contact_id: &str) -> Result<()> {
        self.contacts.set_deleted_at(parse_oid(contact_id)?, true).await
    }

    async fn restore_contact(&self, contact_id: &str) -> Result<()> {
        self.contacts.set_deleted_at(parse_oid(contact_id)?, false).await
    }
}

#[async_trait]
impl ThreadStore for MongoPersistenceClient {
    async fn active_thread(&self, contact_id: &str) -> Result<Option<Thread>> {
        let thread = self.threads.find_active(parse_oid(contact_id)?).await?;
        Ok(thread.map(|t| t.into()))
    }

    async fn activate_thread(
        &self,
        contact_id: &str,
        external_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Thread> {
        let contact_oid = parse_oid(contact_id)?;
        self.threads.deactivate_all(contact_oid).await?;
        let thread = match self
            .threads
            .insert_active(contact_oid, external_id, created_at)
            .await
        {
            Ok(thread) => thread,
            Err(PersistError::ActiveThreadConflict(_)) => {
                // another process activated a thread in between; it wins
                let winner = self.threads.find_active(contact_oid).await?.ok_or_else(|| {
                    PersistError::ActiveThreadConflict(contact_id.to_string())
                })?;
                warn!(
                    contact_id = %contact_id,
                    discarded = %external_id,
                    winner = %winner.external_id,
                    "Concurrent thread activation, keeping the winner"
                );
                return Ok(winner.into());
            }
            Err(e) => return Err(e),
        };
        self.contacts.set_current_thread(contact_oid, external_id).await?;
        Ok(thread.into())
    }

    async fn list_threads(&self, contact_id: &str) -> Result<Vec<Thread>> {
        let threads = self.threads.list(parse_oid(contact_id)?).await?;
        Ok(threads.into_iter().map(|t| t.into()).collect())
    }
}

#[async_trait]
impl MessageStore for MongoPersistenceClient {
    async fn save_message(&self, message: Message) -> Result<()> {
        let mongo_message = MongoMessage::try_from(message)?;
        self.messages.save_message(mongo_message).await?;
        Ok(())
    }

    async fn list_messages(&self, contact_id: &str, limit: usize) -> Result<Vec<Message>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let messages = self.messages.latest(parse_oid(contact_id)?, limit).await?;
        Ok(messages.into_iter().map(|m| m.into()).collect())
    }
}

#[async_trait]
impl EventStore for MongoPersistenceClient {
    async fn create_event(&self, event: Event) -> Result<Event> {
        let stored = self.events.insert(MongoEvent::try_from(event)?).await?;
        Ok(stored.into())
    }

    async fn find_by_code(&self, assistant_id: &str, code_event: &str) -> Result<Option<Event>> {
        let event = self.events.find_by_code(assistant_id, code_event).await?;
        Ok(event.map(|e| e.into()))
    }

    async fn code_exists(&self, code_event: &str) -> Result<bool> {
        self.events.code_exists(code_event).await
    }

    async fn list_for_contact(
        &self,
        contact_id: &str,
        assistant_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Event>> {
        let filter = MongoEventRepository::contact_filter(parse_oid(contact_id)?, assistant_id, date);
        let events = self.events.list_scheduled(filter).await?;
        Ok(events.into_iter().map(|e| e.into()).collect())
    }

    async fn list_for_assistant_on(&self, assistant_id: &str, date: NaiveDate) -> Result<Vec<Event>> {
        let filter = doc! { "assistant_id": assistant_id, "date": date.to_string() };
        let events = self.events.list_scheduled(filter).await?;
        Ok(events.into_iter().map(|e| e.into()).collect())
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        self.events.update(event).await
    }

    async fn cancel_event(&self, event_id: &str) -> Result<()> {
        self.events.cancel(parse_oid(event_id)?).await
    }
}
