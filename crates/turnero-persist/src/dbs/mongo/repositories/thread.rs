use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId},
    options::IndexOptions,
    Client, Collection, IndexModel,
};

use crate::dbs::mongo::is_duplicate_key;
use crate::dbs::mongo::models::MongoThread;
use crate::error::{PersistError, Result};

#[derive(Clone)]
pub struct MongoThreadRepository {
    collection: Collection<MongoThread>,
}

impl MongoThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("threads");
        Self { collection }
    }

    /// At most one `active: true` document per contact
    pub async fn ensure_indexes(&self) -> Result<()> {
        let single_active = IndexModel::builder()
            .keys(doc! { "contact_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("single_active_thread".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "active": true })
                    .build(),
            )
            .build();
        let by_contact = IndexModel::builder()
            .keys(doc! { "contact_id": 1, "created_at": -1 })
            .build();

        self.collection.create_index(single_active).await?;
        self.collection.create_index(by_contact).await?;
        Ok(())
    }

    pub async fn find_active(&self, contact_id: ObjectId) -> Result<Option<MongoThread>> {
        Ok(self
            .collection
            .find_one(doc! { "contact_id": contact_id, "active": true })
            .await?)
    }

    pub async fn deactivate_all(&self, contact_id: ObjectId) -> Result<()> {
        let update = doc! {
            "$set": { "active": false, "deactivated_at": bson::to_bson(&Utc::now())? }
        };
        self.collection
            .update_many(doc! { "contact_id": contact_id, "active": true }, update)
            .await?;
        Ok(())
    }

    /// Insert a new active thread. A concurrent activation surfaces as
    /// `ActiveThreadConflict`.
    pub async fn insert_active(
        &self,
        contact_id: ObjectId,
        external_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<MongoThread> {
        let thread = MongoThread {
            id: ObjectId::new(),
            external_id: external_id.to_string(),
            contact_id,
            active: true,
            created_at,
            deactivated_at: None,
        };

        match self.collection.insert_one(&thread).await {
            Ok(_) => Ok(thread),
            Err(e) if is_duplicate_key(&e) => {
                Err(PersistError::ActiveThreadConflict(contact_id.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, contact_id: ObjectId) -> Result<Vec<MongoThread>> {
        let threads = self
            .collection
            .find(doc! { "contact_id": contact_id })
            .sort(doc! { "_id": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }
}
