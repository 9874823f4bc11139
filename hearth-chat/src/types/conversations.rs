//! Conversation type: an ordered, append-only list of messages plus metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ids::{ConversationId, MessageId};
use crate::types::messages::{Message, MessageRole};

/// Title given to conversations until the first user message renames them.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Longest title derived from a first user message, in characters.
pub const AUTO_TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Model this conversation was started with, if any.
    #[serde(default)]
    pub model_id: Option<String>,
}

impl Conversation {
    pub fn new(title: impl Into<String>, model_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            model_id,
        }
    }

    /// Append a message and refresh `updated_at`. Returns the message id.
    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id;
        if message.role == MessageRole::User && self.title == DEFAULT_TITLE {
            if let Some(title) = derive_title(&message.content) {
                self.title = title;
            }
        }
        self.messages.push(message);
        self.updated_at = Utc::now();
        id
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == *id)
    }
}

/// First non-blank line of `content`, cut to [`AUTO_TITLE_MAX_CHARS`].
fn derive_title(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(AUTO_TITLE_MAX_CHARS).collect())
}
