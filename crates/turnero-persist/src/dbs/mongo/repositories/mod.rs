pub mod channel;
pub mod contact;
pub mod event;
pub mod message;
pub mod processed;
pub mod thread;

pub use channel::MongoChannelRepository;
pub use contact::MongoContactRepository;
pub use event::MongoEventRepository;
pub use message::MongoMessageRepository;
pub use processed::MongoProcessedRepository;
pub use thread::MongoThreadRepository;
