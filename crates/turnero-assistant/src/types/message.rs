use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Message stored on a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl ThreadMessage {
    /// Concatenate the text parts, dropping annotation markers (file citations and the like)
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.without_annotations()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<TextAnnotation>,
}

impl TextValue {
    pub fn without_annotations(&self) -> String {
        self.annotations
            .iter()
            .filter(|a| !a.text.is_empty())
            .fold(self.value.clone(), |acc, a| acc.replace(&a.text, ""))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnnotation {
    /// Exact substring of `value` the annotation refers to
    #[serde(default)]
    pub text: String,
}

/// Page returned by the list-messages endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessageList {
    pub data: Vec<ThreadMessage>,
}
