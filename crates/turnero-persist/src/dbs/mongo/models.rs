use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::parse_oid;
use crate::error::{PersistError, Result};
use crate::models::{Contact, Event, EventStatus, Message, Thread};

/// MongoDB-specific Contact model (uses ObjectId)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoContact {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub phone_number_id: String,
    pub number: String,
    #[serde(default)]
    pub current_thread_id: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// MongoDB-specific Thread model (uses ObjectId)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub external_id: String,
    pub contact_id: ObjectId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub contact_id: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub from_bot: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEvent {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub code_event: String,
    pub assistant_id: String,
    pub contact_id: ObjectId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
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

/// Idempotency mark for one provider message id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedMessage {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub message_id: String,
    pub processed_at: DateTime<Utc>,
}

// Conversions between database-agnostic and MongoDB-specific models.
// Agnostic ids that are not ObjectIds (fresh uuids) get a new ObjectId;
// references to other documents must already be valid.

fn oid_or_new(id: &str) -> ObjectId {
    ObjectId::parse_str(id).unwrap_or_else(|_| ObjectId::new())
}

impl From<MongoContact> for Contact {
    fn from(contact: MongoContact) -> Self {
        Self {
            id: contact.id.to_hex(),
            phone_number_id: contact.phone_number_id,
            number: contact.number,
            current_thread_id: contact.current_thread_id,
            blocked: contact.blocked,
            deleted_at: contact.deleted_at,
            created_at: contact.created_at,
        }
    }
}

impl From<MongoThread> for Thread {
    fn from(thread: MongoThread) -> Self {
        Self {
            id: thread.id.to_hex(),
            external_id: thread.external_id,
            contact_id: thread.contact_id.to_hex(),
            active: thread.active,
            created_at: thread.created_at,
            deactivated_at: thread.deactivated_at,
        }
    }
}

impl TryFrom<Message> for MongoMessage {
    type Error = PersistError;

    fn try_from(msg: Message) -> Result<Self> {
        Ok(Self {
            id: oid_or_new(&msg.id),
            contact_id: parse_oid(&msg.contact_id)?,
            thread_id: msg.thread_id,
            from_bot: msg.from_bot,
            text: msg.text,
            provider_message_id: msg.provider_message_id,
            created_at: msg.created_at,
        })
    }
}

impl From<MongoMessage> for Message {
    fn from(msg: MongoMessage) -> Self {
        Self {
            id: msg.id.to_hex(),
            contact_id: msg.contact_id.to_hex(),
            thread_id: msg.thread_id,
            from_bot: msg.from_bot,
            text: msg.text,
            provider_message_id: msg.provider_message_id,
            created_at: msg.created_at,
        }
    }
}

impl TryFrom<Event> for MongoEvent {
    type Error = PersistError;

    fn try_from(event: Event) -> Result<Self> {
        Ok(Self {
            id: oid_or_new(&event.id),
            code_event: event.code_event.to_ascii_uppercase(),
            assistant_id: event.assistant_id,
            contact_id: parse_oid(&event.contact_id)?,
            title: event.title,
            description: event.description,
            date: event.date,
            start: event.start,
            end: event.end,
            status: event.status,
            created_at: event.created_at,
            updated_at: event.updated_at,
        })
    }
}

impl From<MongoEvent> for Event {
    fn from(event: MongoEvent) -> Self {
        Self {
            id: event.id.to_hex(),
            code_event: event.code_event,
            assistant_id: event.assistant_id,
            contact_id: event.contact_id.to_hex(),
            title: event.title,
            description: event.description,
            date: event.date,
            start: event.start,
            end: event.end,
            status: event.status,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}
