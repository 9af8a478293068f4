//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the citation checking engine, providing
//! structured error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from various system components
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Configuration, Corpus, LLM, Storage, Validation
//!
//! ## Key Features
//! - Hierarchical error types with detailed context
//! - Automatic error conversion and chaining
//! - Recoverability classification for retry decisions
//! - Structured logging integration

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, CheckError>;

/// Comprehensive error types for the citation checking engine
#[derive(Debug, Error)]
pub enum CheckError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Rule corpus file could not be read
    #[error("Rule corpus unavailable at {path}: {details}")]
    CorpusLoad { path: String, details: String },

    /// Rule corpus JSON did not match the expected shape
    #[error("Malformed rule corpus: {details}")]
    CorpusFormat { details: String },

    /// LLM transport failure (network, HTTP status, timeout)
    #[error("LLM transport error: {details}")]
    LlmTransport { details: String },

    /// LLM produced output the boundary decoder could not parse
    #[error("LLM response could not be parsed: {details}")]
    LlmParse { details: String },

    /// A citation check could not produce any result at all
    #[error("Citation check failed for footnote {footnote}: {details}")]
    CheckFailed { footnote: u32, details: String },

    /// Rate limiting errors
    #[error("Rate limit exceeded for {service}")]
    RateLimitExceeded {
        service: String,
        retry_after_seconds: Option<u64>,
    },

    /// Database errors
    #[error("Database error at {db_path}: {reason}")]
    Storage { db_path: String, reason: String },

    /// Serialization/deserialization errors
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CheckError {
    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CheckError::LlmTransport { .. } | CheckError::RateLimitExceeded { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            CheckError::Config { .. } => "configuration",
            CheckError::CorpusLoad { .. } | CheckError::CorpusFormat { .. } => "corpus",
            CheckError::LlmTransport { .. }
            | CheckError::LlmParse { .. }
            | CheckError::RateLimitExceeded { .. } => "llm",
            CheckError::CheckFailed { .. } => "validation",
            CheckError::Storage { .. } | CheckError::SerializationFailed { .. } => "storage",
            CheckError::ValidationFailed { .. } | CheckError::Internal { .. } => "generic",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for CheckError {
    fn from(err: std::io::Error) -> Self {
        CheckError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(err: serde_json::Error) -> Self {
        CheckError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        CheckError::LlmTransport {
            details: err.to_string(),
        }
    }
}

impl From<bincode::Error> for CheckError {
    fn from(err: bincode::Error) -> Self {
        CheckError::SerializationFailed {
            message: format!("Binary serialization error: {}", err),
        }
    }
}

impl From<toml::de::Error> for CheckError {
    fn from(err: toml::de::Error) -> Self {
        CheckError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}

impl From<sled::Error> for CheckError {
    fn from(err: sled::Error) -> Self {
        CheckError::Storage {
            db_path: String::new(),
            reason: err.to_string(),
        }
    }
}

/// Macro for internal errors with formatted messages
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::errors::CheckError::Internal {
            message: $msg.to_string(),
        }
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::CheckError::Internal {
            message: format!($fmt, $($arg)*),
        }
    };
}
