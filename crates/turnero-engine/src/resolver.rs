use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use turnero_persist::{ChannelRecord, Contact, PersistError, PersistenceClient};

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The phone-number id is not mapped to a business assistant
    #[error("Channel {0} is not provisioned")]
    NotProvisioned(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Everything a turn needs to know about who wrote and who answers
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    pub contact: Contact,
    pub channel: ChannelRecord,
}

pub struct ContextResolver {
    store: Arc<dyn PersistenceClient>,
}

impl ContextResolver {
    pub fn new(store: Arc<dyn PersistenceClient>) -> Self {
        Self { store }
    }

    /// Map `(phone_number_id, sender_number)` to contact, assistant and business,
    /// creating the contact on first contact
    pub async fn resolve(
        &self,
        phone_number_id: &str,
        sender_number: &str,
    ) -> Result<ResolvedContext, ResolveError> {
        let channel = self
            .store
            .find_channel(phone_number_id)
            .await?
            .ok_or_else(|| ResolveError::NotProvisioned(phone_number_id.to_string()))?;

        let mut contact = self.store.upsert_contact(phone_number_id, sender_number).await?;
        debug!(
            contact_id = %contact.id,
            phone_number_id = %phone_number_id,
            assistant_id = %channel.assistant.id,
            "Resolved context"
        );

        if contact.is_deleted() {
            self.store.restore_contact(&contact.id).await?;
            contact.deleted_at = None;
            info!(contact_id = %contact.id, "Restored soft-deleted contact");
        }

        Ok(ResolvedContext { contact, channel })
    }
}
