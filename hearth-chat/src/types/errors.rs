//! Error types for the chat core.
//!
//! Only [`ChatError::ModelNotLoaded`] and [`ChatError::AttachmentUnsupported`]
//! reach callers during normal use; failures after a generation has started
//! are absorbed into the final message state.

use hearth_common::error::{ErrorCategory, HearthError};
use thiserror::Error;

use crate::types::ids::ConversationId;

/// Top-level errors returned by the orchestrator.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No model is loaded")]
    ModelNotLoaded,

    #[error("Model {model} cannot read images; {dropped} attachment(s) were not sent")]
    AttachmentUnsupported { model: String, dropped: usize },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Conversation store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised at the model runtime boundary or by its worker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("No model is loaded")]
    ModelNotLoaded,

    #[error("Model load failed: {0}")]
    LoadFailed(String),

    #[error("Prompt preparation failed: {0}")]
    PrepareFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Runtime worker is not running")]
    WorkerUnavailable,

    #[error("Runtime queue is full")]
    QueueFull,
}

/// Errors raised by a conversation store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: format!("{}: {}", context, err),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl HearthError for ChatError {
    fn category(&self) -> ErrorCategory {
        match self {
            ChatError::ModelNotLoaded => ErrorCategory::User,
            ChatError::AttachmentUnsupported { .. } => ErrorCategory::User,
            ChatError::EmptyMessage => ErrorCategory::User,
            ChatError::ConversationNotFound(_) => ErrorCategory::User,
            ChatError::UnknownModel(_) => ErrorCategory::User,
            ChatError::Runtime(runtime_error) => runtime_error.category(),
            ChatError::Store(store_error) => store_error.category(),
            ChatError::Config(_) => ErrorCategory::User,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ChatError::ModelNotLoaded => "CHAT_MODEL_NOT_LOADED",
            ChatError::AttachmentUnsupported { .. } => "CHAT_ATTACHMENT_UNSUPPORTED",
            ChatError::EmptyMessage => "CHAT_EMPTY_MESSAGE",
            ChatError::ConversationNotFound(_) => "CHAT_CONVERSATION_NOT_FOUND",
            ChatError::UnknownModel(_) => "CHAT_UNKNOWN_MODEL",
            ChatError::Runtime(_) => "CHAT_RUNTIME",
            ChatError::Store(_) => "CHAT_STORE",
            ChatError::Config(_) => "CHAT_CONFIG",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ChatError::ModelNotLoaded => {
                "No model is loaded\n💡 Load a model before sending a message".to_string()
            }
            ChatError::EmptyMessage => {
                "Message is empty\n💡 Type some text or attach an image".to_string()
            }
            ChatError::AttachmentUnsupported { model, dropped } => format!(
                "{} can't read images, so {} attachment(s) were left out\n💡 Switch to a vision model to send images",
                model, dropped
            ),
            ChatError::Runtime(runtime_error) => runtime_error.user_friendly_message(),
            _ => format!("{}", self),
        }
    }
}

impl HearthError for RuntimeError {
    fn category(&self) -> ErrorCategory {
        match self {
            RuntimeError::ModelNotLoaded => ErrorCategory::User,
            RuntimeError::LoadFailed(_) => ErrorCategory::External,
            RuntimeError::PrepareFailed(_) => ErrorCategory::External,
            RuntimeError::GenerationFailed(_) => ErrorCategory::External,
            RuntimeError::WorkerUnavailable => ErrorCategory::Internal,
            RuntimeError::QueueFull => ErrorCategory::System,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::ModelNotLoaded => "RUNTIME_MODEL_NOT_LOADED",
            RuntimeError::LoadFailed(_) => "RUNTIME_LOAD_FAILED",
            RuntimeError::PrepareFailed(_) => "RUNTIME_PREPARE_FAILED",
            RuntimeError::GenerationFailed(_) => "RUNTIME_GENERATION_FAILED",
            RuntimeError::WorkerUnavailable => "RUNTIME_WORKER_UNAVAILABLE",
            RuntimeError::QueueFull => "RUNTIME_QUEUE_FULL",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RuntimeError::ModelNotLoaded => {
                "No model is loaded\n💡 Pick a model and wait for it to finish loading".to_string()
            }
            RuntimeError::LoadFailed(msg) => {
                format!("Model load failed: {}\n💡 Check free memory and that the model files are present", msg)
            }
            RuntimeError::QueueFull => {
                "The model is busy\n💡 Wait for the current reply to finish and try again".to_string()
            }
            _ => format!("{}", self),
        }
    }
}

impl HearthError for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::Io { .. } => ErrorCategory::System,
            StoreError::Serialization(_) => ErrorCategory::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "STORE_IO",
            StoreError::Serialization(_) => "STORE_SERIALIZATION",
        }
    }
}

impl HearthError for ConfigError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::User
    }

    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "CONFIG_INVALID",
            ConfigError::Load(_) => "CONFIG_LOAD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surfaced_errors_are_user_category() {
        assert!(ChatError::ModelNotLoaded.is_user_error());
        let err = ChatError::AttachmentUnsupported {
            model: "Text Model".to_string(),
            dropped: 1,
        };
        assert!(err.is_user_error());
        assert_eq!(err.error_code(), "CHAT_ATTACHMENT_UNSUPPORTED");
        assert!(err.user_friendly_message().contains("Text Model"));
    }

    #[test]
    fn test_display_is_single_line() {
        for err in [ChatError::ModelNotLoaded, ChatError::EmptyMessage] {
            assert!(!err.to_string().contains('\n'), "{:?}", err);
            assert!(err.user_friendly_message().contains("💡"));
        }
        assert!(!RuntimeError::QueueFull.to_string().contains('\n'));
    }

    #[test]
    fn test_runtime_errors_delegate_category() {
        let err = ChatError::from(RuntimeError::GenerationFailed("nan logits".to_string()));
        assert_eq!(err.category(), ErrorCategory::External);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_store_io_error_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = StoreError::io("saving conversation", io);
        match &err {
            StoreError::Io { kind, message } => {
                assert_eq!(*kind, std::io::ErrorKind::PermissionDenied);
                assert!(message.contains("saving conversation"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.category(), ErrorCategory::System);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            ChatError::ModelNotLoaded.error_code(),
            ChatError::EmptyMessage.error_code(),
            ChatError::UnknownModel("x".to_string()).error_code(),
            RuntimeError::QueueFull.error_code(),
            RuntimeError::WorkerUnavailable.error_code(),
            ConfigError::Invalid("x".to_string()).error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
