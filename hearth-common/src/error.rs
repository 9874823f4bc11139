//! Shared error traits for consistent error handling across crates

use std::fmt::Debug;

/// Category of error for consistent handling and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input or configuration error - can be fixed by user
    User,
    /// System resource or environmental error - may be temporary
    System,
    /// Internal logic error - indicates a bug
    Internal,
    /// Failure inside a collaborator we do not own (model runtime, disk)
    External,
}

impl ErrorCategory {
    /// Short lowercase label used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::User => "user",
            ErrorCategory::System => "system",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
        }
    }
}

/// Trait for all errors in the hearth workspace
///
/// This trait provides a consistent interface for error handling
/// and lets the UI layer decide what to show without matching on
/// every concrete error enum.
pub trait HearthError: std::error::Error + Send + Sync + Debug {
    /// Get the error category for proper handling
    fn category(&self) -> ErrorCategory;

    /// Get a unique error code for this error type
    fn error_code(&self) -> &'static str;

    /// Check if this is a user-correctable error
    fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this error is potentially retriable
    fn is_retriable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::System | ErrorCategory::External
        )
    }

    /// Get a user-friendly error message with actionable advice
    fn user_friendly_message(&self) -> String {
        format!("{}", self)
    }

    /// Get suggested recovery actions for this error
    fn recovery_suggestions(&self) -> Vec<String> {
        match self.category() {
            ErrorCategory::User => vec![
                "Check your input".to_string(),
                "Review configuration settings".to_string(),
            ],
            ErrorCategory::System => vec![
                "Check device resources (memory, disk space)".to_string(),
                "Retry the operation".to_string(),
            ],
            ErrorCategory::External => vec![
                "Reload the model".to_string(),
                "Retry after a brief delay".to_string(),
            ],
            ErrorCategory::Internal => vec![
                "Report this as a bug".to_string(),
                "Include error details and reproduction steps".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum SampleError {
        #[error("bad input: {0}")]
        BadInput(String),
        #[error("disk full")]
        DiskFull,
        #[error("runtime crashed")]
        Crashed,
        #[error("invariant broken")]
        Broken,
    }

    impl HearthError for SampleError {
        fn category(&self) -> ErrorCategory {
            match self {
                SampleError::BadInput(_) => ErrorCategory::User,
                SampleError::DiskFull => ErrorCategory::System,
                SampleError::Crashed => ErrorCategory::External,
                SampleError::Broken => ErrorCategory::Internal,
            }
        }

        fn error_code(&self) -> &'static str {
            match self {
                SampleError::BadInput(_) => "SAMPLE_BAD_INPUT",
                SampleError::DiskFull => "SAMPLE_DISK_FULL",
                SampleError::Crashed => "SAMPLE_CRASHED",
                SampleError::Broken => "SAMPLE_BROKEN",
            }
        }
    }

    #[test]
    fn test_error_categories() {
        let user = SampleError::BadInput("empty".to_string());
        assert_eq!(user.category(), ErrorCategory::User);
        assert!(user.is_user_error());
        assert!(!user.is_retriable());

        assert!(SampleError::DiskFull.is_retriable());
        assert!(SampleError::Crashed.is_retriable());
        assert!(!SampleError::Broken.is_retriable());
        assert!(!SampleError::Broken.is_user_error());
    }

    #[test]
    fn test_default_user_friendly_message_is_display() {
        let err = SampleError::BadInput("empty".to_string());
        assert_eq!(err.user_friendly_message(), "bad input: empty");
        assert_eq!(err.error_code(), "SAMPLE_BAD_INPUT");
    }

    #[test]
    fn test_recovery_suggestions() {
        let suggestions = SampleError::BadInput("x".to_string()).recovery_suggestions();
        assert!(suggestions.iter().any(|s| s.contains("configuration")));

        let suggestions = SampleError::Crashed.recovery_suggestions();
        assert!(suggestions.iter().any(|s| s.contains("model")));
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(ErrorCategory::User.as_str(), "user");
        assert_eq!(ErrorCategory::External.as_str(), "external");
    }
}
