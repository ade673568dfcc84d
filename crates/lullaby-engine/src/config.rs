//! Configuration types for the Lullaby story engine.
//!
//! Configuration is read from `lullaby.json` in the working directory (or
//! a path given on the command line). Every field has a default so an
//! absent file yields a working configuration. The OpenAI API key is
//! deliberately not part of the file; it comes from the `OPENAI_API_KEY`
//! environment variable.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "lullaby.json";

/// Default bound on request text length, in characters.
const fn default_max_input_chars() -> usize {
    1000
}

/// Default retry budget: retries beyond the first attempt.
const fn default_max_retries() -> u32 {
    2
}

/// Default rate-limit window in seconds.
const fn default_rate_limit_window_seconds() -> u64 {
    60
}

/// Default request allowance per client per window.
const fn default_rate_limit_max_requests() -> u32 {
    30
}

/// Default allowed CORS origins.
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Default model name.
fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

/// Default API base URL.
fn default_base_url() -> String {
    lullaby_llm::openai::DEFAULT_BASE_URL.to_string()
}

/// Default per-call timeout in seconds.
const fn default_timeout_seconds() -> f64 {
    30.0
}

/// Default token budget per call.
const fn default_max_tokens() -> u32 {
    3000
}

/// Default sampling temperature.
const fn default_temperature() -> f64 {
    0.1
}

/// Main configuration for the story engine and its HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Maximum accepted request length in characters.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Retries after the first generation attempt (total attempts is
    /// `max_retries + 1`).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Length of the per-client rate-limit window in seconds.
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    /// Requests allowed per client within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Origins allowed by the gateway's CORS layer. `"*"` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Remote model settings shared by all three call types.
    #[serde(default)]
    pub model: ModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_retries: default_max_retries(),
            rate_limit_window_seconds: default_rate_limit_window_seconds(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            cors_origins: default_cors_origins(),
            model: ModelConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `lullaby.json` in the current directory. If found, loads
    /// and validates the configuration. If not found, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            EngineError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConfigParseError` if the file exists but is
    /// not valid JSON, or `EngineError::ConfigValidationError` if the
    /// values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(EngineError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| EngineError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.max_input_chars == 0 {
            return Err(EngineError::config_validation(
                "maxInputChars must be greater than 0",
                "Set maxInputChars to at least 1 in your lullaby.json",
            ));
        }

        if self.rate_limit_window_seconds == 0 {
            return Err(EngineError::config_validation(
                "rateLimitWindowSeconds must be greater than 0",
                "Set rateLimitWindowSeconds to at least 1 in your lullaby.json",
            ));
        }

        if self.rate_limit_max_requests == 0 {
            return Err(EngineError::config_validation(
                "rateLimitMaxRequests must be greater than 0",
                "Set rateLimitMaxRequests to at least 1 in your lullaby.json",
            ));
        }

        self.model.validate()
    }

    /// Returns the rate-limit window as a `Duration`.
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }
}

/// Remote model settings.
///
/// One set of knobs covers classification, generation, and judgment
/// calls; they all go to the same model with the same budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Model name sent with every request.
    #[serde(default = "default_model_name")]
    pub name: String,

    /// API base URL (overridable for self-hosted gateways and tests).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Token budget per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ModelConfig {
    /// Returns the per-call timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::config_validation(
                "model.name must not be empty",
                "Provide a model name in your lullaby.json",
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(EngineError::config_validation(
                "model.baseUrl must not be empty",
                "Provide an API base URL in your lullaby.json",
            ));
        }

        if self.timeout_seconds <= 0.0 {
            return Err(EngineError::config_validation(
                "model.timeoutSeconds must be greater than 0",
                "Set model.timeoutSeconds to a positive number in your lullaby.json",
            ));
        }

        if self.max_tokens == 0 {
            return Err(EngineError::config_validation(
                "model.maxTokens must be greater than 0",
                "Set model.maxTokens to at least 1 in your lullaby.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EngineError::config_validation(
                "model.temperature must be between 0 and 2",
                "Set model.temperature to a value in [0, 2] in your lullaby.json",
            ));
        }

        Ok(())
    }
}
