use chrono::{NaiveDate, NaiveTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::IndexOptions,
    Client, Collection, IndexModel,
};

use crate::dbs::mongo::{is_duplicate_key, violates_index};
use crate::dbs::mongo::models::MongoEvent;
use crate::error::{PersistError, Result};
use crate::models::{Event, EventStatus};

const TIME_FORMAT: &str = "%H:%M";
/// At most one scheduled event per assistant, date and start time
const SLOT_INDEX: &str = "scheduled_slot";

#[derive(Clone)]
pub struct MongoEventRepository {
    collection: Collection<MongoEvent>,
}

impl MongoEventRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("events");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let code = IndexModel::builder()
            .keys(doc! { "code_event": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let by_contact = IndexModel::builder()
            .keys(doc! { "contact_id": 1, "date": 1 })
            .build();
        let by_assistant = IndexModel::builder()
            .keys(doc! { "assistant_id": 1, "date": 1 })
            .build();
        let slot = IndexModel::builder()
            .keys(doc! { "assistant_id": 1, "date": 1, "start": 1 })
            .options(
                IndexOptions::builder()
                    .name(SLOT_INDEX.to_string())
                    .unique(true)
                    .partial_filter_expression(doc! {
                        "status": bson::to_bson(&EventStatus::Scheduled)?,
                    })
                    .build(),
            )
            .build();

        self.collection.create_index(code).await?;
        self.collection.create_index(by_contact).await?;
        self.collection.create_index(by_assistant).await?;
        self.collection.create_index(slot).await?;
        Ok(())
    }

    pub async fn insert(&self, event: MongoEvent) -> Result<MongoEvent> {
        match self.collection.insert_one(&event).await {
            Ok(_) => Ok(event),
            Err(e) if violates_index(&e, SLOT_INDEX) => {
                Err(PersistError::SlotTaken(slot_label(&event.assistant_id, event.date, event.start)))
            }
            Err(e) if is_duplicate_key(&e) => Err(PersistError::DuplicateKey(event.code_event)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_code(&self, assistant_id: &str, code_event: &str) -> Result<Option<MongoEvent>> {
        let filter = doc! {
            "assistant_id": assistant_id,
            "code_event": code_event.to_ascii_uppercase(),
        };
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn code_exists(&self, code_event: &str) -> Result<bool> {
        let count = self
            .collection
            .count_documents(doc! { "code_event": code_event.to_ascii_uppercase() })
            .await?;
        Ok(count > 0)
    }

    /// Scheduled events matching `filter`, in calendar order
    pub async fn list_scheduled(&self, mut filter: Document) -> Result<Vec<MongoEvent>> {
        filter.insert("status", bson::to_bson(&EventStatus::Scheduled)?);
        let events = self
            .collection
            .find(filter)
            .sort(doc! { "date": 1, "start": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(events)
    }

    pub fn contact_filter(contact_id: ObjectId, assistant_id: &str, date: Option<NaiveDate>) -> Document {
        let mut filter = doc! { "contact_id": contact_id, "assistant_id": assistant_id };
        if let Some(date) = date {
            filter.insert("date", date.to_string());
        }
        filter
    }

    pub async fn update(&self, event: &Event) -> Result<()> {
        let id = crate::dbs::mongo::parse_oid(&event.id)?;
        let update = doc! {
            "$set": {
                "title": &event.title,
                "description": bson::to_bson(&event.description)?,
                "date": event.date.to_string(),
                "start": event.start.format(TIME_FORMAT).to_string(),
                "end": event.end.format(TIME_FORMAT).to_string(),
                "updated_at": bson::to_bson(&Utc::now())?,
            }
        };
        match self.update_one(id, update).await {
            Err(PersistError::Database(e)) if violates_index(&e, SLOT_INDEX) => {
                Err(PersistError::SlotTaken(slot_label(&event.assistant_id, event.date, event.start)))
            }
            other => other,
        }
    }

    pub async fn cancel(&self, event_id: ObjectId) -> Result<()> {
        let update = doc! {
            "$set": {
                "status": bson::to_bson(&EventStatus::Cancelled)?,
                "updated_at": bson::to_bson(&Utc::now())?,
            }
        };
        self.update_one(event_id, update).await
    }

    async fn update_one(&self, id: ObjectId, update: Document) -> Result<()> {
        let result = self.collection.update_one(doc! { "_id": id }, update).await?;
        if result.matched_count == 0 {
            return Err(PersistError::EventNotFound(id.to_hex()));
        }
        Ok(())
    }
}

fn slot_label(assistant_id: &str, date: NaiveDate, start: NaiveTime) -> String {
    format!("{} {} {}", assistant_id, date, start.format(TIME_FORMAT))
}
