//! OpenAI-backed model invoker.
//!
//! Wraps one chat-completions call per [`ModelInvoker::invoke`]. The base
//! URL is injectable so tests can point the invoker at a local mock server.

use std::time::Instant;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{InvokeError, InvokeRequest, ModelInvoker};

/// Default API base URL for the real OpenAI service.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model invoker backed by the OpenAI chat-completions API.
pub struct OpenAiInvoker {
    /// Pre-computed `"Bearer <key>"` header value.
    auth_header: Option<String>,
    /// API base URL without a trailing slash.
    base_url: String,
    /// Model name sent with every request.
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiInvoker {
    /// Creates an invoker for the given model.
    ///
    /// `api_key` is optional so the invoker can be constructed in
    /// environments without credentials; calls will fail with
    /// `InvokeError::Unavailable` until a key is provided.
    #[must_use]
    pub fn new(api_key: Option<&str>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Creates an invoker pointed at a custom API base URL.
    #[must_use]
    pub fn with_base_url(
        api_key: Option<&str>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            auth_header: api_key.map(|key| format!("Bearer {key}")),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            client: Client::new(),
        }
    }

    fn build_request(&self, request: &InvokeRequest) -> ChatRequest {
        let capacity = if request.system_prompt.is_some() { 2 } else { 1 };
        let mut messages = Vec::with_capacity(capacity);

        if let Some(ref system) = request.system_prompt {
            messages.push(Message {
                role: "system",
                content: system.clone(),
            });
        }

        messages.push(Message {
            role: "user",
            content: request.user_prompt.clone(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn map_transport_error(error: &reqwest::Error, timeout_secs: f64) -> InvokeError {
        if error.is_timeout() {
            InvokeError::Timeout { timeout_secs }
        } else {
            InvokeError::unavailable(error.to_string())
        }
    }
}

#[async_trait::async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        let auth_header = self
            .auth_header
            .as_ref()
            .ok_or_else(|| InvokeError::unavailable("OpenAI API key not set"))?;

        let timeout_secs = request.timeout.as_secs_f64();
        let body = self.build_request(request);

        debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            timeout_secs,
            "llm_call_start"
        );
        let started_at = Instant::now();

        let result = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", auth_header)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await;

        let latency_ms = started_at.elapsed().as_millis();
        debug!(model = %self.model, latency_ms, "llm_call_end");

        let response = result.map_err(|e| Self::map_transport_error(&e, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "llm_call_failed");
            return Err(InvokeError::unavailable(format!("{status}: {detail}")));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::invalid_response(format!("undecodable body: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| InvokeError::invalid_response("response contained no completion text"))
    }
}
