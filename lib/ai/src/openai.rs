//! Adapter for OpenAI-compatible chat-completions endpoints.

use crate::backend::{CompletionProvider, CompletionRequest};
use crate::error::{FailureKind, ProviderError};
use crate::prompt::{ChatMessage, chat_messages};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Default endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
/// Default model name.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection and sampling settings for [`OpenAiCompatibleProvider`].
#[derive(Clone, PartialEq)]
pub struct OpenAiConfig {
    /// Endpoint root; `/v1/chat/completions` is appended.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Sampling temperature, 0.0 to 2.0.
    pub temperature: f32,
    pub max_tokens: u32,
    /// HTTP deadline for one call. Keep it within
    /// [`RetryPolicy::attempt_timeout`](crate::RetryPolicy::attempt_timeout).
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Creates a configuration for the public endpoint with default settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout: Duration::from_secs(15),
        }
    }

    /// Points the adapter at another compatible endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// A [`CompletionProvider`] speaking the chat-completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
    endpoint: String,
}

impl OpenAiCompatibleProvider {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` failure if the API key is blank or the
    /// client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::failed(
                FailureKind::Configuration,
                "API key is required",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::failed(FailureKind::Configuration, e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint(),
            client,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn send_error(&self, e: &reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                after: self.config.timeout,
            }
        } else {
            ProviderError::failed(FailureKind::Network, e.to_string())
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: chat_messages(request),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            endpoint = %self.endpoint,
            model = %self.config.model,
            turns = request.history.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, endpoint = %self.endpoint, "completion request failed");
                self.send_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_else(|e| {
                debug!(error = %e, endpoint = %self.endpoint, "failed to read error body");
                String::new()
            });
            warn!(
                endpoint = %self.endpoint,
                status = %status,
                body = %body,
                "completion endpoint returned error"
            );
            return Err(classify_status(status, retry_after, &body));
        }

        let bytes = response.bytes().await.map_err(|e| self.send_error(&e))?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, endpoint = %self.endpoint, "failed to parse completion response");
            ProviderError::failed(FailureKind::MalformedResponse, e.to_string())
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::failed(FailureKind::EmptyResponse, "response contained no text")
            })
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Maps a non-success status to a provider error.
#[must_use]
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let reason = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::failed(FailureKind::Unauthorized, reason)
        }
        StatusCode::REQUEST_TIMEOUT => ProviderError::failed(FailureKind::ServerError, reason),
        s if s.is_server_error() => ProviderError::failed(FailureKind::ServerError, reason),
        _ => ProviderError::failed(FailureKind::InvalidRequest, reason),
    }
}

/// Reads a `Retry-After` header given in whole seconds.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
