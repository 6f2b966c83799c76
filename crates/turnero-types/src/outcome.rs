use serde::{Deserialize, Serialize};

/// How the processing of one inbound event ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Message id already processed
    Duplicate,
    /// Channel not mapped to an assistant
    NotProvisioned,
    /// Contact is blocked
    Ignored,
    /// A reply was delivered to the contact
    Replied {
        thread_id: Option<String>,
        run_id: Option<String>,
        /// Whether the reply was the assistant's answer rather than a fixed notice
        answered: bool,
    },
    /// The reply could not be delivered
    SendFailed {
        thread_id: Option<String>,
        run_id: Option<String>,
    },
}

impl TurnOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::NotProvisioned => "not_provisioned",
            Self::Ignored => "ignored",
            Self::Replied { .. } => "replied",
            Self::SendFailed { .. } => "send_failed",
        }
    }
}
