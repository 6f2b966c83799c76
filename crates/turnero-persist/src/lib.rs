pub mod models;
pub mod trait_client;
pub mod error;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod dbs;

pub use models::{
    Assistant, Business, ChannelRecord, Contact, Event, EventStatus, Message, Thread,
};
pub use trait_client::{
    ChannelDirectory, ContactStore, EventStore, IdempotencyStore, MessageStore,
    PersistenceClient, ThreadStore,
};
pub use error::{PersistError, Result};
pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;
