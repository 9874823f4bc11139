//! # Hearth Common
//!
//! Shared types, traits, and utilities for the hearth workspace.
//! Every crate in the workspace reports errors through [`HearthError`],
//! validates configuration through [`ValidatedConfig`], and logs through
//! the helpers in [`logging`].

pub mod config;
pub mod error;
pub mod logging;

// Re-export main traits for convenience
pub use config::{DefaultConfig, ValidatedConfig};
pub use error::{ErrorCategory, HearthError};
pub use logging::{init_tracing, Pretty};
