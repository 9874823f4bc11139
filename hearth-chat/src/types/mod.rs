//! Core types for the chat engine.

pub mod conversations;
pub mod errors;
pub mod generation;
pub mod ids;
pub mod messages;

pub use conversations::{Conversation, AUTO_TITLE_MAX_CHARS, DEFAULT_TITLE};
pub use errors::{ChatError, ConfigError, RuntimeError, StoreError};
pub use generation::{
    ChatTurn, FinishReason, GenerationMetrics, GenerationRequest, StreamChunk, TurnImage,
};
pub use ids::{ConversationId, GenerationId, MessageId};
pub use messages::{Attachment, Message, MessageRole};
