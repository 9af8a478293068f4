//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration management for the citation checking engine,
//! supporting TOML files and environment variable overrides with validation
//! and type-safe access to all system settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! ## Usage
//! ```rust,ignore
//! use citecheck::config::Config;
//!
//! // Load from default locations
//! let config = Config::load()?;
//!
//! // Load from specific file
//! let config = Config::from_file("custom.toml")?;
//!
//! // Access configuration
//! println!("Rule corpus: {:?}", config.corpus.path);
//! ```

use crate::errors::{CheckError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rule corpus location and retrieval quotas
    pub corpus: CorpusConfig,
    /// LLM completion capability settings
    pub llm: LlmConfig,
    /// Result persistence settings
    pub storage: StorageConfig,
    /// Logging and monitoring
    pub logging: LoggingConfig,
    /// Performance tuning
    pub performance: PerformanceConfig,
}

/// Rule corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Path to the rule corpus JSON document
    pub path: PathBuf,
    /// Maximum local-style rules retrieved per citation
    pub max_local_rules: usize,
    /// Maximum general-style rules retrieved per citation
    pub max_general_rules: usize,
}

/// LLM completion capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint URL (OpenAI-compatible)
    pub api_url: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Model identifier sent with each request
    pub model: String,
    /// Maximum tokens requested for the completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
    /// Transport-level retry attempts
    pub retry_attempts: u32,
    /// Delay between retries in seconds
    pub retry_delay_seconds: u64,
    /// Rate limiting applied across all validations in this process
    pub rate_limit: RateLimitConfig,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum completion requests per minute
    pub requests_per_minute: u32,
    /// Minimum delay between consecutive requests (ms)
    pub min_delay_ms: u64,
}

/// Result persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Enable persistent result storage
    pub enabled: bool,
    /// Database file path
    pub db_path: PathBuf,
}

/// Logging and monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

/// Performance tuning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum citations validated concurrently in batch mode
    pub max_concurrent_validations: usize,
    /// Maximum entries in the in-memory result cache
    pub result_cache_size: usize,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| CheckError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| CheckError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(corpus_path) = std::env::var("CITECHECK_CORPUS_PATH") {
            self.corpus.path = PathBuf::from(corpus_path);
        }
        if let Ok(api_url) = std::env::var("CITECHECK_LLM_API_URL") {
            self.llm.api_url = api_url;
        }
        if let Ok(api_key) = std::env::var("CITECHECK_LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }
        if let Ok(model) = std::env::var("CITECHECK_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(db_path) = std::env::var("CITECHECK_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(level) = std::env::var("CITECHECK_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.corpus.max_local_rules == 0 && self.corpus.max_general_rules == 0 {
            return Err(CheckError::ValidationFailed {
                field: "corpus.max_local_rules".to_string(),
                reason: "At least one retrieval quota must be nonzero".to_string(),
            });
        }

        if self.llm.api_url.is_empty() {
            return Err(CheckError::ValidationFailed {
                field: "llm.api_url".to_string(),
                reason: "LLM endpoint URL cannot be empty".to_string(),
            });
        }

        if self.llm.rate_limit.requests_per_minute == 0 {
            return Err(CheckError::ValidationFailed {
                field: "llm.rate_limit.requests_per_minute".to_string(),
                reason: "Rate limit must be greater than zero".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(CheckError::ValidationFailed {
                field: "llm.temperature".to_string(),
                reason: "Temperature must be between 0.0 and 2.0".to_string(),
            });
        }

        if self.performance.max_concurrent_validations == 0 {
            return Err(CheckError::ValidationFailed {
                field: "performance.max_concurrent_validations".to_string(),
                reason: "Concurrency must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CheckError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig {
                path: PathBuf::from("./data/rule_corpus.json"),
                max_local_rules: 8,
                max_general_rules: 12,
            },
            llm: LlmConfig {
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: None,
                model: "gpt-4o".to_string(),
                max_tokens: 2048,
                temperature: 0.0,
                request_timeout_seconds: 60,
                retry_attempts: 3,
                retry_delay_seconds: 5,
                rate_limit: RateLimitConfig {
                    requests_per_minute: 60,
                    min_delay_ms: 250,
                },
            },
            storage: StorageConfig {
                enabled: false,
                db_path: PathBuf::from("./data/citecheck.db"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
            performance: PerformanceConfig {
                max_concurrent_validations: num_cpus::get(),
                result_cache_size: 10_000,
            },
        }
    }
}
