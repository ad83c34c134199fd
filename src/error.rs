//! Error types for swap progress tracking

use thiserror::Error;

/// Main error type for progress tracking
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgressError {
    #[error("Cannot derive step key for step type {step_type:?}: {reason}")]
    KeyDerivation { step_type: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event parsing error: {0}")]
    EventParsing(String),

    #[error("Progress engine is no longer running")]
    EngineClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProgressError {
    /// Check if the error was caused by the caller's payload
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ProgressError::KeyDerivation { .. } | ProgressError::EventParsing(_)
        )
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressError::KeyDerivation { .. } => "key_derivation",
            ProgressError::Config(_) => "config",
            ProgressError::EventParsing(_) => "event_parsing",
            ProgressError::EngineClosed => "engine_closed",
            ProgressError::Internal(_) => "internal",
        }
    }
}

/// Result type for progress operations
pub type ProgressResult<T> = Result<T, ProgressError>;
