//! Text generation request and response types.
//!
//! These types cross the boundary between the orchestrator and the model
//! runtime worker: the request carries already-bounded chat turns, the
//! response side is a stream of cumulative [`StreamChunk`]s.

use serde::{Deserialize, Serialize};

use crate::types::ids::GenerationId;
use crate::types::messages::MessageRole;

/// An image forwarded to the model runtime, already downsized.
#[derive(Clone, PartialEq, Eq)]
pub struct TurnImage {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for TurnImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnImage")
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One chat turn as the model runtime sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub text: String,
    pub images: Vec<TurnImage>,
}

impl ChatTurn {
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            images: Vec::new(),
        }
    }
}

/// Request for one generation against the shared model runtime.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub generation_id: GenerationId,
    pub system_prompt: String,
    pub turns: Vec<ChatTurn>,
    pub max_tokens: Option<usize>,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, turns: Vec<ChatTurn>) -> Self {
        Self {
            generation_id: GenerationId::new(),
            system_prompt: system_prompt.into(),
            turns,
            max_tokens: None,
            temperature: 0.7,
            top_p: 0.9,
        }
    }

    /// Set max_tokens using builder pattern
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature using builder pattern
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top_p using builder pattern
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }
}

/// Reason why a generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FinishReason {
    /// The runtime ran to its natural end.
    Completed,
    /// The max-token stopper ended generation.
    MaxTokens,
    /// `cancel_generation` (or a preempting send) stopped the task.
    Cancelled,
    /// A newer generation took over the runtime before this one finished.
    Superseded,
    /// The runtime failed mid-stream; partial output is kept.
    Failed(String),
    /// The runtime finished without producing any text.
    Empty,
}

impl FinishReason {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FinishReason::Cancelled | FinishReason::Superseded)
    }
}

/// A chunk of streaming output.
///
/// `text` is cumulative: every chunk carries the whole decoded output so
/// far, not just the newly produced delta.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub text: String,
    pub token_count: usize,
    pub is_complete: bool,
    /// Finish reason, only present when is_complete is true
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn progress(text: impl Into<String>, token_count: usize) -> Self {
        Self {
            text: text.into(),
            token_count,
            is_complete: false,
            finish_reason: None,
        }
    }

    pub fn finished(text: impl Into<String>, token_count: usize, reason: FinishReason) -> Self {
        Self {
            text: text.into(),
            token_count,
            is_complete: true,
            finish_reason: Some(reason),
        }
    }
}

/// Latency and throughput figures for one assistant message.
///
/// Every field is optional: a generation cancelled before its first token
/// has no time-to-first-token and no throughput.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    pub time_to_first_token_ms: Option<f64>,
    pub tokens_per_second: Option<f64>,
    pub total_tokens: Option<usize>,
    pub total_time_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("be brief", vec![ChatTurn::text(MessageRole::User, "hi")])
            .with_max_tokens(64)
            .with_temperature(0.2)
            .with_top_p(0.5);
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.top_p, 0.5);
        assert_eq!(request.turns.len(), 1);
    }

    #[test]
    fn test_finish_reason_cancel_classification() {
        assert!(FinishReason::Cancelled.is_cancelled());
        assert!(FinishReason::Superseded.is_cancelled());
        assert!(!FinishReason::Completed.is_cancelled());
        assert!(!FinishReason::Failed("boom".to_string()).is_cancelled());
    }

    #[test]
    fn test_finish_reason_serialization() {
        let json = serde_json::to_string(&FinishReason::Failed("oom".to_string())).unwrap();
        assert_eq!(json, r#"{"kind":"failed","detail":"oom"}"#);
        let json = serde_json::to_string(&FinishReason::Completed).unwrap();
        assert_eq!(json, r#"{"kind":"completed"}"#);
    }

    #[test]
    fn test_stream_chunk_constructors() {
        let chunk = StreamChunk::progress("Hel", 1);
        assert!(!chunk.is_complete);
        assert!(chunk.finish_reason.is_none());

        let done = StreamChunk::finished("Hello", 2, FinishReason::Completed);
        assert!(done.is_complete);
        assert_eq!(done.finish_reason, Some(FinishReason::Completed));
    }

    #[test]
    fn test_turn_image_debug_hides_bytes() {
        let image = TurnImage {
            mime_type: "image/jpeg".to_string(),
            data: vec![7; 300],
            width: 10,
            height: 20,
        };
        let debug = format!("{:?}", image);
        assert!(debug.contains("300"));
        assert!(debug.contains("width: 10"));
    }
}
