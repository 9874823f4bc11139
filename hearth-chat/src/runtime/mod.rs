//! The model runtime boundary.
//!
//! The on-device inference engine is reached only through [`ModelRuntime`].
//! It is a single, non-reentrant resource, so every load and generation
//! goes through the one [`RuntimeWorker`] task that owns it.
//!
//! - [`ModelRuntime`] - blocking interface implemented by an inference engine
//! - [`RuntimeWorker`] - serializes loads and generations, streams chunks
//! - [`ScriptedRuntime`] - deterministic runtime replaying scripted tokens

use crate::registry::ModelCapabilities;
use crate::types::{ChatTurn, RuntimeError};

pub mod scripted;
pub mod worker;

pub use scripted::{Script, ScriptFixture, ScriptedRuntime};
pub use worker::{RuntimeWorker, WorkerStats};

/// Prompt ready for generation, produced by [`ModelRuntime::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub model_id: String,
    pub system_prompt: String,
    pub turns: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// State reported to the step callback after each new token.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    /// Tokens produced so far in this generation.
    pub token_count: usize,
    /// Entire decoded output so far, not just the new token.
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Continue,
    Stop,
}

/// Blocking interface to an on-device inference engine.
///
/// Methods take `&self`; implementations keep their state behind interior
/// mutability. [`RuntimeWorker`] guarantees that `load`, `prepare` and
/// `generate` are never called concurrently. `cancel_current` may be called
/// from any thread at any time.
pub trait ModelRuntime: Send + Sync {
    /// Id of the loaded model, if any.
    fn loaded_model(&self) -> Option<String>;

    fn is_loaded(&self) -> bool {
        self.loaded_model().is_some()
    }

    fn load(&self, model: &ModelCapabilities) -> Result<(), RuntimeError>;

    /// Build the prompt. Fails with [`RuntimeError::ModelNotLoaded`] when no
    /// model is loaded and [`RuntimeError::PrepareFailed`] when the turns
    /// cannot be turned into a prompt.
    fn prepare(&self, system_prompt: &str, turns: &[ChatTurn])
        -> Result<PreparedInput, RuntimeError>;

    /// Generate until the model finishes or `on_step` returns
    /// [`StepDecision::Stop`]. Returns the cumulative decoded text.
    fn generate(
        &self,
        input: PreparedInput,
        sampling: SamplingParams,
        on_step: &mut dyn FnMut(&Step<'_>) -> StepDecision,
    ) -> Result<String, RuntimeError>;

    /// Best-effort request to abandon the in-flight generation.
    fn cancel_current(&self);
}
