//! Configuration trait for validated, consistent configuration across crates

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for configuration types that can be validated and have defaults
///
/// Every configuration section in the workspace implements this so that a
/// layered load (defaults, file, environment) always ends in one
/// `validate` call before the value is handed to a component.
pub trait ValidatedConfig:
    Send + Sync + Clone + Debug + Serialize + for<'de> Deserialize<'de>
{
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate the configuration, returning an error if invalid
    fn validate(&self) -> Result<(), Self::Error>;

    /// Merge this configuration with defaults, preferring this config's values
    fn merge_with_defaults(self, defaults: Self) -> Self;

    /// Get a description of what this configuration controls
    fn description() -> &'static str;
}

/// Helper trait for configurations that can be created with sensible defaults
pub trait DefaultConfig: ValidatedConfig + Default {
    /// Create a validated default configuration
    fn validated_default() -> Result<Self, Self::Error> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }
}

// Blanket implementation for any ValidatedConfig that also implements Default
impl<T> DefaultConfig for T where T: ValidatedConfig + Default {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct WindowConfig {
        history_limit: usize,
        label: String,
    }

    #[derive(Error, Debug)]
    enum WindowConfigError {
        #[error("history_limit must be greater than 0")]
        ZeroLimit,
        #[error("label cannot be empty")]
        EmptyLabel,
    }

    impl ValidatedConfig for WindowConfig {
        type Error = WindowConfigError;

        fn validate(&self) -> Result<(), Self::Error> {
            if self.history_limit == 0 {
                return Err(WindowConfigError::ZeroLimit);
            }
            if self.label.is_empty() {
                return Err(WindowConfigError::EmptyLabel);
            }
            Ok(())
        }

        fn merge_with_defaults(self, defaults: Self) -> Self {
            Self {
                history_limit: if self.history_limit != 0 {
                    self.history_limit
                } else {
                    defaults.history_limit
                },
                label: if !self.label.is_empty() {
                    self.label
                } else {
                    defaults.label
                },
            }
        }

        fn description() -> &'static str {
            "Sample window configuration"
        }
    }

    impl Default for WindowConfig {
        fn default() -> Self {
            Self {
                history_limit: 8,
                label: "default".to_string(),
            }
        }
    }

    #[test]
    fn test_valid_config() {
        let config = WindowConfig {
            history_limit: 4,
            label: "vision".to_string(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = WindowConfig {
            history_limit: 0,
            label: "text".to_string(),
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            WindowConfigError::ZeroLimit
        ));
    }

    #[test]
    fn test_empty_label_rejected() {
        let config = WindowConfig {
            history_limit: 4,
            label: String::new(),
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            WindowConfigError::EmptyLabel
        ));
    }

    #[test]
    fn test_merge_with_defaults() {
        let partial = WindowConfig {
            history_limit: 0,
            label: "custom".to_string(),
        };
        let merged = partial.merge_with_defaults(WindowConfig::default());
        assert_eq!(merged.history_limit, 8);
        assert_eq!(merged.label, "custom");
    }

    #[test]
    fn test_validated_default() {
        let config = WindowConfig::validated_default().unwrap();
        assert_eq!(config.history_limit, 8);
        assert_eq!(WindowConfig::description(), "Sample window configuration");
    }
}
