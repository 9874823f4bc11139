//! Message types for chat interactions.
//!
//! A [`Message`] is created once per turn. Assistant messages start empty
//! and only their `content` (and, once, their `metrics`) change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::generation::GenerationMetrics;
use crate::types::ids::MessageId;

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Raw attachment bytes plus their mime type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn image_png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    pub fn image_jpeg(data: Vec<u8>) -> Self {
        Self::new("image/jpeg", data)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

// Blob contents stay out of log lines.
impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<GenerationMetrics>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            metrics: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// The empty assistant message that streaming output is written into.
    pub fn assistant_placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new())
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn has_images(&self) -> bool {
        self.attachments.iter().any(Attachment::is_image)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_empty_assistant() {
        let message = Message::assistant_placeholder();
        assert_eq!(message.role, MessageRole::Assistant);
        assert!(message.content.is_empty());
        assert!(message.metrics.is_none());
    }

    #[test]
    fn test_attachment_bytes_serialize_as_base64() {
        let message =
            Message::user("look").with_attachments(vec![Attachment::image_png(vec![1, 2, 3])]);
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"AQID\""));
        assert!(json.contains("\"role\":\"user\""));

        let decoded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.attachments[0].data, vec![1, 2, 3]);
        assert!(decoded.has_images());
    }

    #[test]
    fn test_attachment_debug_hides_bytes() {
        let attachment = Attachment::image_jpeg(vec![0u8; 2048]);
        let debug = format!("{:?}", attachment);
        assert!(debug.contains("2048"));
        assert!(!debug.contains("0, 0, 0"));
    }

    #[test]
    fn test_non_image_attachment() {
        let attachment = Attachment::new("text/plain", b"notes".to_vec());
        assert!(!attachment.is_image());
        assert!(!Message::user("x")
            .with_attachments(vec![attachment])
            .has_images());
    }
}
