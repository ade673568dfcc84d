//! Lullaby LLM boundary
//!
//! The invocation seam between the story pipeline and a remote
//! text-completion service. The pipeline only ever sees [`ModelInvoker`]:
//! a prompt pair goes out, raw text comes back, and every failure is one
//! of three [`InvokeError`] kinds. No content validation happens here;
//! that is the pipeline's job.

use std::time::Duration;

use async_trait::async_trait;

pub mod openai;

pub use openai::OpenAiInvoker;

/// Errors that can occur when invoking the model service.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The call did not complete within the configured timeout.
    #[error("model call timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout that was exceeded, in seconds.
        timeout_secs: f64,
    },

    /// The service could not be reached or returned a failure status.
    #[error("model service unavailable: {message}")]
    Unavailable {
        /// Description of the transport or HTTP failure.
        message: String,
    },

    /// The service responded, but the body was not a usable completion.
    #[error("invalid model response: {message}")]
    InvalidResponse {
        /// Description of what was wrong with the response.
        message: String,
    },
}

impl InvokeError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is transient and a later attempt may
    /// succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

/// A single blocking completion request.
///
/// Carries everything one remote call needs: the prompt pair, a token
/// budget, a sampling temperature, and a per-call timeout.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Optional system prompt establishing the model's role.
    pub system_prompt: Option<String>,
    /// The user prompt to complete.
    pub user_prompt: String,
    /// Maximum number of tokens the model may generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// How long to wait for the call before giving up.
    pub timeout: Duration,
}

impl InvokeRequest {
    /// Creates a request with the given user prompt and no system prompt.
    #[must_use]
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            max_tokens: 3000,
            temperature: 0.1,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Sets the token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A remote text-completion capability.
///
/// One call in, raw text out. Implementations must not retry internally;
/// the pipeline owns the attempt budget.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Performs one completion call and returns the raw response text.
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError>;
}
