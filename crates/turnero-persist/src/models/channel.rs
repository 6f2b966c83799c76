use serde::{Deserialize, Serialize};
use turnero_types::{CalendarPolicy, ChannelCredentials};

/// Business owning a phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub credentials: ChannelCredentials,
    #[serde(default)]
    pub calendar: CalendarPolicy,
}

/// Assistant configured for a phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    /// Id of the assistant on the assistant service (`asst_...`)
    pub external_id: String,
    pub name: String,
    /// Model override for runs
    #[serde(default)]
    pub model: Option<String>,
    /// Instructions override for runs
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Mapping of one provider phone-number id to its business and assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub phone_number_id: String,
    pub business: Business,
    pub assistant: Assistant,
}
