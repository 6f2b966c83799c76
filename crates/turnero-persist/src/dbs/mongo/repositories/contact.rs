use chrono::Utc;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};

use crate::dbs::mongo::is_duplicate_key;
use crate::dbs::mongo::models::MongoContact;
use crate::error::{PersistError, Result};

#[derive(Clone)]
pub struct MongoContactRepository {
    collection: Collection<MongoContact>,
}

impl MongoContactRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("contacts");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "phone_number_id": 1, "number": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    /// Find-or-create in one round trip
    pub async fn upsert(&self, phone_number_id: &str, number: &str) -> Result<MongoContact> {
        let filter = doc! { "phone_number_id": phone_number_id, "number": number };
        let update = doc! {
            "$setOnInsert": {
                "current_thread_id": Bson::Null,
                "blocked": false,
                "deleted_at": Bson::Null,
                "created_at": bson::to_bson(&Utc::now())?,
            }
        };

        let upserted = self
            .collection
            .find_one_and_update(filter.clone(), update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        let contact = match upserted {
            Ok(contact) => contact,
            // two concurrent upserts: the loser re-reads the winner's document
            Err(e) if is_duplicate_key(&e) => self.collection.find_one(filter).await?,
            Err(e) => return Err(e.into()),
        };

        contact.ok_or_else(|| {
            PersistError::Internal(format!("upsert returned no contact for {}", number))
        })
    }

    pub async fn get(&self, contact_id: ObjectId) -> Result<Option<MongoContact>> {
        Ok(self.collection.find_one(doc! { "_id": contact_id }).await?)
    }

    async fn set(&self, contact_id: ObjectId, fields: bson::Document) -> Result<()> {
        let result = self
            .collection
            .update_one(doc! { "_id": contact_id }, doc! { "$set": fields })
            .await?;
        if result.matched_count == 0 {
            return Err(PersistError::ContactNotFound(contact_id.to_hex()));
        }
        Ok(())
    }

    pub async fn set_blocked(&self, contact_id: ObjectId, blocked: bool) -> Result<()> {
        self.set(contact_id, doc! { "blocked": blocked }).await
    }

    pub async fn set_deleted_at(&self, contact_id: ObjectId, deleted: bool) -> Result<()> {
        let deleted_at = if deleted {
            bson::to_bson(&Utc::now())?
        } else {
            Bson::Null
        };
        self.set(contact_id, doc! { "deleted_at": deleted_at }).await
    }

    pub async fn set_current_thread(&self, contact_id: ObjectId, external_id: &str) -> Result<()> {
        self.set(contact_id, doc! { "current_thread_id": external_id }).await
    }
}
