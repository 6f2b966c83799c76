pub mod client;
pub mod error;
pub mod normalize;
pub mod signature;
pub mod traits;
pub mod webhook;

pub use client::{WhatsAppClient, WhatsAppConfig};
pub use error::{ChannelError, Result};
pub use normalize::normalize_recipient;
pub use signature::{sign_payload, verify_signature, SIGNATURE_HEADER};
pub use traits::{ReplySender, SentMessage};
pub use webhook::{WebhookPayload, VerifyQuery};
