//! Configuration for the chat core, loaded with Figment.
//!
//! Sources are layered in precedence order (later sources override earlier
//! ones):
//! 1. Serialized defaults
//! 2. An optional TOML / YAML / JSON file, chosen by extension
//! 3. `HEARTH_` environment variables, nested keys separated by `__`
//!    (`HEARTH_HISTORY__TEXT_HISTORY_LIMIT=12`)

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use hearth_common::config::ValidatedConfig;
use hearth_common::Pretty;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::ConfigError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "HEARTH_";

/// Sampling and length limits applied to every generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Hard cap on generated tokens; the max-tokens stopper enforces it.
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

impl ValidatedConfig for GenerationConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "generation.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.max_tokens > 100_000 {
            return Err(ConfigError::Invalid(
                "generation.max_tokens cannot exceed 100,000".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "generation.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::Invalid(
                "generation.top_p must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    fn merge_with_defaults(self, defaults: Self) -> Self {
        Self {
            max_tokens: if self.max_tokens != 0 {
                self.max_tokens
            } else {
                defaults.max_tokens
            },
            ..self
        }
    }

    fn description() -> &'static str {
        "Sampling parameters and token limit for each generation"
    }
}

/// History truncation and image forwarding policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Most recent messages forwarded to a text-only model.
    pub text_history_limit: usize,
    /// Most recent messages forwarded to an image-capable model.
    pub vision_history_limit: usize,
    /// Longest image edge, in pixels, after downsizing.
    pub max_image_dimension: u32,
    /// Text standing in for images that are not forwarded.
    pub image_placeholder: String,
    /// Instruction used when a turn has images but no text.
    pub default_image_prompt: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            text_history_limit: 20,
            vision_history_limit: 4,
            max_image_dimension: 1024,
            image_placeholder: "[Image]".to_string(),
            default_image_prompt: "Describe this image.".to_string(),
        }
    }
}

impl ValidatedConfig for HistoryConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.text_history_limit == 0 || self.vision_history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history limits must be greater than 0".to_string(),
            ));
        }
        if self.max_image_dimension < 64 {
            return Err(ConfigError::Invalid(
                "history.max_image_dimension must be at least 64 pixels".to_string(),
            ));
        }
        if self.default_image_prompt.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "history.default_image_prompt cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn merge_with_defaults(self, defaults: Self) -> Self {
        Self {
            text_history_limit: if self.text_history_limit != 0 {
                self.text_history_limit
            } else {
                defaults.text_history_limit
            },
            vision_history_limit: if self.vision_history_limit != 0 {
                self.vision_history_limit
            } else {
                defaults.vision_history_limit
            },
            max_image_dimension: if self.max_image_dimension != 0 {
                self.max_image_dimension
            } else {
                defaults.max_image_dimension
            },
            image_placeholder: if !self.image_placeholder.is_empty() {
                self.image_placeholder
            } else {
                defaults.image_placeholder
            },
            default_image_prompt: if !self.default_image_prompt.is_empty() {
                self.default_image_prompt
            } else {
                defaults.default_image_prompt
            },
        }
    }

    fn description() -> &'static str {
        "How much conversation history and which images reach the model"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub conversations_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            conversations_dir: PathBuf::from(".hearth-conversations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs (loads and generations) allowed to wait for the runtime.
    pub max_pending_jobs: usize,
    /// Chunks buffered between the runtime and the orchestrator.
    pub stream_buffer: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_pending_jobs: 8,
            stream_buffer: 100,
        }
    }
}

impl ValidatedConfig for WorkerConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.max_pending_jobs == 0 || self.stream_buffer == 0 {
            return Err(ConfigError::Invalid(
                "worker.max_pending_jobs and worker.stream_buffer must be greater than 0"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn merge_with_defaults(self, defaults: Self) -> Self {
        Self {
            max_pending_jobs: if self.max_pending_jobs != 0 {
                self.max_pending_jobs
            } else {
                defaults.max_pending_jobs
            },
            stream_buffer: if self.stream_buffer != 0 {
                self.stream_buffer
            } else {
                defaults.stream_buffer
            },
        }
    }

    fn description() -> &'static str {
        "Queue sizes for the single model runtime worker"
    }
}

/// Top-level configuration for the chat core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    /// Shown instead of an empty reply when the model produced nothing.
    pub fallback_message: String,
    pub generation: GenerationConfig,
    pub history: HistoryConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant running entirely on this device. \
                            Answer clearly and concisely."
                .to_string(),
            fallback_message: "The model didn't produce a response. Try rephrasing your message."
                .to_string(),
            generation: GenerationConfig::default(),
            history: HistoryConfig::default(),
            storage: StorageConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl ValidatedConfig for ChatConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.fallback_message.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fallback_message cannot be empty".to_string(),
            ));
        }
        self.generation.validate()?;
        self.history.validate()?;
        self.worker.validate()?;
        Ok(())
    }

    fn merge_with_defaults(self, defaults: Self) -> Self {
        Self {
            system_prompt: if !self.system_prompt.is_empty() {
                self.system_prompt
            } else {
                defaults.system_prompt
            },
            fallback_message: if !self.fallback_message.is_empty() {
                self.fallback_message
            } else {
                defaults.fallback_message
            },
            generation: self.generation.merge_with_defaults(defaults.generation),
            history: self.history.merge_with_defaults(defaults.history),
            storage: self.storage,
            worker: self.worker.merge_with_defaults(defaults.worker),
        }
    }

    fn description() -> &'static str {
        "On-device chat: prompts, generation limits, history policy, storage"
    }
}

impl ChatConfig {
    /// Load configuration from defaults, an optional file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let figment = Self::build_figment(path)?;
        let config = figment
            .extract::<ChatConfig>()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .merge_with_defaults(ChatConfig::default());

        config.validate()?;
        info!("Loaded chat configuration: {}", Pretty(&config));
        Ok(config)
    }

    fn build_figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(ChatConfig::default()));

        if let Some(path) = path {
            debug!("Merging configuration file {}", path.display());
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => {
                    return Err(ConfigError::Load(format!(
                        "unsupported configuration format: {}",
                        path.display()
                    )))
                }
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }
}
