mod channel;
mod contact;
mod event;
mod message;
mod thread;

// Export database-agnostic models
pub use channel::{Assistant, Business, ChannelRecord};
pub use contact::Contact;
pub use event::{Event, EventStatus};
pub use message::Message;
pub use thread::Thread;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
