pub mod channel;
pub mod config;
pub mod inbound;
pub mod outcome;

pub use channel::{CalendarPolicy, ChannelCredentials};
pub use config::{EngineConfig, ReplyTexts, RunConfig};
pub use inbound::InboundMessage;
pub use outcome::TurnOutcome;
