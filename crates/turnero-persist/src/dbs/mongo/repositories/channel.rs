use mongodb::{bson::doc, options::IndexOptions, Client, Collection, IndexModel};

use crate::error::Result;
use crate::models::ChannelRecord;

/// Provisioning records, one document per phone-number id
#[derive(Clone)]
pub struct MongoChannelRepository {
    collection: Collection<ChannelRecord>,
}

impl MongoChannelRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("channels");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "phone_number_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn find(&self, phone_number_id: &str) -> Result<Option<ChannelRecord>> {
        Ok(self
            .collection
            .find_one(doc! { "phone_number_id": phone_number_id })
            .await?)
    }

    pub async fn save(&self, channel: &ChannelRecord) -> Result<()> {
        self.collection
            .replace_one(doc! { "phone_number_id": &channel.phone_number_id }, channel)
            .upsert(true)
            .await?;
        Ok(())
    }
}
