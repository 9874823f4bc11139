//! Deterministic model runtime that replays scripted tokens.
//!
//! Used by tests and demos to drive the whole generation path without model
//! files. Scripts can be built in code or loaded from JSON fixtures:
//!
//! ```json
//! {
//!   "model": "llama-3.2-1b",
//!   "scripts": [
//!     { "tokens": ["Hel", "lo", "!"], "step_delay_ms": 5 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

use super::{ModelRuntime, PreparedInput, SamplingParams, Step, StepDecision};
use crate::registry::ModelCapabilities;
use crate::types::{ChatTurn, RuntimeError};

/// One scripted generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Decoded text of each token, in order.
    pub tokens: Vec<String>,
    /// Pause before each token.
    #[serde(default)]
    pub step_delay_ms: u64,
    /// Park after this many tokens until `cancel_current` is called.
    #[serde(default)]
    pub hold_after: Option<usize>,
    /// Fail with a generation error after this many tokens.
    #[serde(default)]
    pub fail_after: Option<usize>,
}

impl Script {
    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// `count` tokens named `t0 `, `t1 `, ...
    pub fn numbered(count: usize) -> Self {
        Self::tokens((0..count).map(|i| format!("t{i} ")))
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn hold_after(mut self, tokens: usize) -> Self {
        self.hold_after = Some(tokens);
        self
    }

    pub fn fail_after(mut self, tokens: usize) -> Self {
        self.fail_after = Some(tokens);
        self
    }

    /// Cumulative text after the first `tokens` tokens.
    pub fn text_after(&self, tokens: usize) -> String {
        self.tokens.iter().take(tokens).map(String::as_str).collect()
    }
}

/// JSON fixture holding scripts played in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFixture {
    /// Model to report as loaded.
    #[serde(default)]
    pub model: Option<String>,
    pub scripts: Vec<Script>,
}

#[derive(Debug, Default)]
struct AbandonSignal {
    abandoned: Mutex<bool>,
    wake: Condvar,
}

impl AbandonSignal {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.abandoned.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset(&self) {
        *self.lock() = false;
    }

    fn raise(&self) {
        *self.lock() = true;
        self.wake.notify_all();
    }

    fn is_raised(&self) -> bool {
        *self.lock()
    }

    /// Sleep for `timeout`, or forever when `None`. Returns true if abandoned.
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let guard = self.lock();
        match timeout {
            Some(timeout) => {
                let (guard, _) = self
                    .wake
                    .wait_timeout_while(guard, timeout, |abandoned| !*abandoned)
                    .unwrap_or_else(|e| e.into_inner());
                *guard
            }
            None => {
                let guard = self
                    .wake
                    .wait_while(guard, |abandoned| !*abandoned)
                    .unwrap_or_else(|e| e.into_inner());
                *guard
            }
        }
    }
}

/// [`ModelRuntime`] replaying [`Script`]s.
///
/// Queued scripts are consumed one per generation; once the queue is empty
/// the default script is replayed.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    default_script: Script,
    queued: Mutex<VecDeque<Script>>,
    loaded: Mutex<Option<String>>,
    prepared: Mutex<Vec<PreparedInput>>,
    abandon: AbandonSignal,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedRuntime {
    pub fn new(default_script: Script) -> Self {
        Self {
            default_script,
            ..Default::default()
        }
    }

    /// Load a fixture from a JSON file.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::LoadFailed(format!("Failed to read fixture at {:?}: {}", path, e))
        })?;
        let fixture: ScriptFixture = serde_json::from_str(&content).map_err(|e| {
            RuntimeError::LoadFailed(format!("Failed to parse fixture JSON at {:?}: {}", path, e))
        })?;
        Ok(Self::from(fixture))
    }

    /// Mark `model_id` as loaded without going through `load`.
    pub fn with_loaded_model(self, model_id: impl Into<String>) -> Self {
        *lock(&self.loaded) = Some(model_id.into());
        self
    }

    /// Queue a script for the next generation.
    pub fn push_script(&self, script: Script) {
        lock(&self.queued).push_back(script);
    }

    /// Every input passed to `generate`, oldest first.
    pub fn prepared_inputs(&self) -> Vec<PreparedInput> {
        lock(&self.prepared).clone()
    }

    pub fn last_prepared(&self) -> Option<PreparedInput> {
        lock(&self.prepared).last().cloned()
    }

    fn next_script(&self) -> Script {
        lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone())
    }
}

impl From<ScriptFixture> for ScriptedRuntime {
    fn from(fixture: ScriptFixture) -> Self {
        let mut scripts: VecDeque<Script> = fixture.scripts.into();
        let default_script = scripts.pop_back().unwrap_or_default();
        let runtime = Self {
            default_script,
            queued: Mutex::new(scripts),
            ..Default::default()
        };
        match fixture.model {
            Some(model) => runtime.with_loaded_model(model),
            None => runtime,
        }
    }
}

impl ModelRuntime for ScriptedRuntime {
    fn loaded_model(&self) -> Option<String> {
        lock(&self.loaded).clone()
    }

    fn load(&self, model: &ModelCapabilities) -> Result<(), RuntimeError> {
        debug!("ScriptedRuntime loading model {}", model.id);
        *lock(&self.loaded) = Some(model.id.clone());
        Ok(())
    }

    fn prepare(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<PreparedInput, RuntimeError> {
        let model_id = self.loaded_model().ok_or(RuntimeError::ModelNotLoaded)?;
        if turns.is_empty() {
            return Err(RuntimeError::PrepareFailed(
                "prompt has no turns".to_string(),
            ));
        }
        Ok(PreparedInput {
            model_id,
            system_prompt: system_prompt.to_string(),
            turns: turns.to_vec(),
        })
    }

    fn generate(
        &self,
        input: PreparedInput,
        _sampling: SamplingParams,
        on_step: &mut dyn FnMut(&Step<'_>) -> StepDecision,
    ) -> Result<String, RuntimeError> {
        self.abandon.reset();
        lock(&self.prepared).push(input);

        let script = self.next_script();
        let delay = (script.step_delay_ms > 0).then(|| Duration::from_millis(script.step_delay_ms));
        let mut text = String::new();

        for (index, token) in script.tokens.iter().enumerate() {
            if script.hold_after == Some(index) {
                debug!("ScriptedRuntime holding after {} tokens", index);
                self.abandon.wait(None);
                return Ok(text);
            }
            if script.fail_after == Some(index) {
                return Err(RuntimeError::GenerationFailed(format!(
                    "scripted failure after {} tokens",
                    index
                )));
            }
            if let Some(delay) = delay {
                if self.abandon.wait(Some(delay)) {
                    return Ok(text);
                }
            } else if self.abandon.is_raised() {
                return Ok(text);
            }

            text.push_str(token);
            trace!("ScriptedRuntime token {}: {:?}", index + 1, token);
            let step = Step {
                token_count: index + 1,
                text: &text,
            };
            if on_step(&step) == StepDecision::Stop {
                break;
            }
        }

        if script.hold_after == Some(script.tokens.len()) {
            self.abandon.wait(None);
        }
        Ok(text)
    }

    fn cancel_current(&self) {
        self.abandon.raise();
    }
}
