use chrono::Utc;
use mongodb::{bson::doc, bson::oid::ObjectId, options::IndexOptions, Client, Collection, IndexModel};

use crate::dbs::mongo::is_duplicate_key;
use crate::dbs::mongo::models::ProcessedMessage;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoProcessedRepository {
    collection: Collection<ProcessedMessage>,
}

impl MongoProcessedRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("processed_messages");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "message_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    /// Insert the mark; the unique index decides the winner
    pub async fn try_mark(&self, message_id: &str) -> Result<bool> {
        let mark = ProcessedMessage {
            id: ObjectId::new(),
            message_id: message_id.to_string(),
            processed_at: Utc::now(),
        };

        match self.collection.insert_one(&mark).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, message_id: &str) -> Result<bool> {
        let found = self
            .collection
            .find_one(doc! { "message_id": message_id })
            .await?;
        Ok(found.is_some())
    }

    pub async fn remove(&self, message_id: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "message_id": message_id })
            .await?;
        Ok(())
    }
}
