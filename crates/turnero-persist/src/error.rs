use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[cfg(feature = "mongodb")]
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON deserialization error: {0}")]
    BsonDeserialization(#[from] bson::de::Error),

    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Contact {0} already has an active thread")]
    ActiveThreadConflict(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Slot already taken: {0}")]
    SlotTaken(String),

    #[error("Invalid object ID: {0}")]
    InvalidObjectId(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;
