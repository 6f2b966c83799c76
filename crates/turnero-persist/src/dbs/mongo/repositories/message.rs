use futures::TryStreamExt;
use mongodb::{bson::doc, bson::oid::ObjectId, Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoMessage;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoMessageRepository {
    collection: Collection<MongoMessage>,
}

impl MongoMessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("messages");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "contact_id": 1, "_id": -1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn save_message(&self, message: MongoMessage) -> Result<ObjectId> {
        self.collection.insert_one(&message).await?;
        Ok(message.id)
    }

    /// Latest `limit` messages of a contact, oldest first
    pub async fn latest(&self, contact_id: ObjectId, limit: i64) -> Result<Vec<MongoMessage>> {
        let mut messages: Vec<MongoMessage> = self
            .collection
            .find(doc! { "contact_id": contact_id })
            .sort(doc! { "_id": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        messages.reverse();
        Ok(messages)
    }
}
