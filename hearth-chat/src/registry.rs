//! Model presets as a data table: id -> capability record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::HistoryConfig;
use crate::types::ChatError;

/// Memory class of a model, which decides how much history it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    Text,
    Vision,
}

impl ModelClass {
    /// Truncation window for this class under the given history policy.
    pub fn history_limit(&self, history: &HistoryConfig) -> usize {
        match self {
            ModelClass::Text => history.text_history_limit,
            ModelClass::Vision => history.vision_history_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub id: String,
    pub display_name: String,
    pub supports_images: bool,
    pub class: ModelClass,
    pub context_tokens: usize,
}

struct ModelPreset {
    id: &'static str,
    display_name: &'static str,
    supports_images: bool,
    class: ModelClass,
    context_tokens: usize,
}

const BUILTIN_MODELS: &[ModelPreset] = &[
    ModelPreset {
        id: "llama-3.2-1b",
        display_name: "Llama 3.2 1B Instruct",
        supports_images: false,
        class: ModelClass::Text,
        context_tokens: 4096,
    },
    ModelPreset {
        id: "llama-3.2-3b",
        display_name: "Llama 3.2 3B Instruct",
        supports_images: false,
        class: ModelClass::Text,
        context_tokens: 8192,
    },
    ModelPreset {
        id: "qwen2.5-1.5b",
        display_name: "Qwen 2.5 1.5B Instruct",
        supports_images: false,
        class: ModelClass::Text,
        context_tokens: 8192,
    },
    ModelPreset {
        id: "qwen2-vl-2b",
        display_name: "Qwen2-VL 2B Instruct",
        supports_images: true,
        class: ModelClass::Vision,
        context_tokens: 4096,
    },
    ModelPreset {
        id: "smolvlm-500m",
        display_name: "SmolVLM 500M Instruct",
        supports_images: true,
        class: ModelClass::Vision,
        context_tokens: 2048,
    },
];

impl From<&ModelPreset> for ModelCapabilities {
    fn from(preset: &ModelPreset) -> Self {
        Self {
            id: preset.id.to_string(),
            display_name: preset.display_name.to_string(),
            supports_images: preset.supports_images,
            class: preset.class,
            context_tokens: preset.context_tokens,
        }
    }
}

/// Lookup table of the models the application knows how to run.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, ModelCapabilities>,
    order: Vec<String>,
}

impl ModelRegistry {
    /// Registry holding the built-in presets.
    pub fn builtin() -> Self {
        Self::with_models(BUILTIN_MODELS.iter().map(ModelCapabilities::from))
    }

    /// Registry holding a custom table. Later entries replace earlier ones
    /// with the same id.
    pub fn with_models(models: impl IntoIterator<Item = ModelCapabilities>) -> Self {
        let mut registry = Self {
            models: HashMap::new(),
            order: Vec::new(),
        };
        for model in models {
            if !registry.models.contains_key(&model.id) {
                registry.order.push(model.id.clone());
            }
            registry.models.insert(model.id.clone(), model);
        }
        registry
    }

    pub fn get(&self, id: &str) -> Option<&ModelCapabilities> {
        self.models.get(id)
    }

    pub fn resolve(&self, id: &str) -> Result<&ModelCapabilities, ChatError> {
        self.get(id)
            .ok_or_else(|| ChatError::UnknownModel(id.to_string()))
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &ModelCapabilities> {
        self.order.iter().filter_map(|id| self.models.get(id))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lookup() {
        let registry = ModelRegistry::builtin();
        assert!(!registry.is_empty());

        let vision = registry.get("qwen2-vl-2b").unwrap();
        assert!(vision.supports_images);
        assert_eq!(vision.class, ModelClass::Vision);

        let text = registry.get("llama-3.2-1b").unwrap();
        assert!(!text.supports_images);
        assert_eq!(text.class, ModelClass::Text);
    }

    #[test]
    fn test_unknown_model_is_reported() {
        let registry = ModelRegistry::builtin();
        let err = registry.resolve("gpt-17").unwrap_err();
        assert!(matches!(err, ChatError::UnknownModel(id) if id == "gpt-17"));
    }

    #[test]
    fn test_class_selects_history_limit() {
        let history = HistoryConfig::default();
        assert_eq!(ModelClass::Text.history_limit(&history), 20);
        assert_eq!(ModelClass::Vision.history_limit(&history), 4);
    }

    #[test]
    fn test_custom_table_keeps_order_and_replaces_duplicates() {
        let registry = ModelRegistry::with_models(vec![
            ModelCapabilities {
                id: "b".to_string(),
                display_name: "B".to_string(),
                supports_images: false,
                class: ModelClass::Text,
                context_tokens: 1024,
            },
            ModelCapabilities {
                id: "a".to_string(),
                display_name: "A".to_string(),
                supports_images: true,
                class: ModelClass::Vision,
                context_tokens: 1024,
            },
            ModelCapabilities {
                id: "b".to_string(),
                display_name: "B v2".to_string(),
                supports_images: false,
                class: ModelClass::Text,
                context_tokens: 2048,
            },
        ]);

        let ids: Vec<_> = registry.models().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(registry.get("b").unwrap().display_name, "B v2");
        assert_eq!(registry.len(), 2);
    }
}
