//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys:
//!
//! | Variable | Default |
//! |---|---|
//! | `ENVIRONMENT` | `development` |
//! | `BIND_ADDR` | `127.0.0.1:3000` |
//! | `DATABASE_URL` | unset (in-memory store) |
//! | `STATIC_DIR` | unset |
//! | `REQUEST_TIMEOUT_MS` | `60000` |
//! | `PROVIDER__API_KEY` | required |
//! | `PROVIDER__BASE_URL` | `https://api.openai.com` |
//! | `PROVIDER__MODEL` | `gpt-4o-mini` |
//! | `PROVIDER__TEMPERATURE` | `0.7` |
//! | `PROVIDER__MAX_TOKENS` | `500` |
//! | `PROVIDER__TIMEOUT_MS` | `10000` |
//! | `RETRY__MAX_ATTEMPTS` | `3` |
//! | `RETRY__INITIAL_BACKOFF_MS` | `500` |
//! | `RETRY__MAX_BACKOFF_MS` | `4000` |
//! | `RETRY__ATTEMPT_TIMEOUT_MS` | `15000` |
//! | `DEBATE__STANCE` | built-in debater persona |
//! | `DEBATE__TOPIC_MAX_CHARS` | `80` |

use contrarian_ai::{OpenAiConfig, RetryPolicy, Stance};
use contrarian_conversation::TruncatedTopic;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Deployment profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Log filter used when `RUST_LOG` is not set.
    #[must_use]
    pub const fn default_log_filter(&self) -> &'static str {
        match self {
            Self::Development => "debug,tower_http=debug",
            Self::Production => "info,tower_http=info",
            Self::Testing => "warn",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection URL. Without it conversations live in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Directory of static frontend assets served at `/`.
    #[serde(default)]
    pub static_dir: Option<String>,

    /// Deadline for a whole HTTP request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub debate: DebateConfig,
}

/// Completion provider settings.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP deadline inside the adapter. Must not exceed
    /// `retry.attempt_timeout_ms`.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Retry settings for provider calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Deadline the orchestrator applies to each provider call. Every
    /// attempt plus the delays between them must fit in `request_timeout_ms`.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

/// Debate persona and topic settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DebateConfig {
    /// Replaces the built-in stance instruction.
    #[serde(default)]
    pub stance: Option<String>,

    #[serde(default = "default_topic_max_chars")]
    pub topic_max_chars: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_base_url() -> String {
    contrarian_ai::openai::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    contrarian_ai::openai::DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    4_000
}

fn default_attempt_timeout_ms() -> u64 {
    15_000
}

fn default_topic_max_chars() -> usize {
    TruncatedTopic::DEFAULT_MAX_CHARS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            stance: None,
            topic_max_chars: default_topic_max_chars(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its field.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(None)
    }

    /// Loads configuration from an explicit variable map instead of the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its field.
    pub fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()
    }

    /// Checks the settings, returning every violation found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.provider.api_key.trim().is_empty() {
            violations.push("PROVIDER__API_KEY is required".to_string());
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            violations.push(format!(
                "PROVIDER__TEMPERATURE must be between 0 and 2, got {}",
                self.provider.temperature
            ));
        }
        if self.provider.max_tokens == 0 {
            violations.push("PROVIDER__MAX_TOKENS must be positive".to_string());
        }
        if self.retry.max_attempts == 0 {
            violations.push("RETRY__MAX_ATTEMPTS must be at least 1".to_string());
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            violations.push(
                "RETRY__INITIAL_BACKOFF_MS must not exceed RETRY__MAX_BACKOFF_MS".to_string(),
            );
        }
        if self.retry.attempt_timeout_ms >= self.request_timeout_ms {
            violations.push(format!(
                "RETRY__ATTEMPT_TIMEOUT_MS ({}) must be shorter than REQUEST_TIMEOUT_MS ({})",
                self.retry.attempt_timeout_ms, self.request_timeout_ms
            ));
        }
        if self.provider.timeout_ms > self.retry.attempt_timeout_ms {
            violations.push(format!(
                "PROVIDER__TIMEOUT_MS ({}) must not exceed RETRY__ATTEMPT_TIMEOUT_MS ({})",
                self.provider.timeout_ms, self.retry.attempt_timeout_ms
            ));
        }
        let worst_case = self.retry_policy().worst_case();
        if worst_case >= self.request_timeout() {
            violations.push(format!(
                "retry budget ({}ms with every attempt timing out) must be shorter than \
                 REQUEST_TIMEOUT_MS ({})",
                worst_case.as_millis(),
                self.request_timeout_ms
            ));
        }
        if self
            .debate
            .stance
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            violations.push("DEBATE__STANCE must not be blank when set".to_string());
        }
        if self.environment == Environment::Production
            && self.database_url.as_deref().is_none_or(str::is_empty)
        {
            violations.push("DATABASE_URL is required in production".to_string());
        }

        violations
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.retry.max_attempts)
            .with_backoff(
                Duration::from_millis(self.retry.initial_backoff_ms),
                Duration::from_millis(self.retry.max_backoff_ms),
            )
            .with_attempt_timeout(Duration::from_millis(self.retry.attempt_timeout_ms))
    }

    #[must_use]
    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig::new(self.provider.api_key.clone())
            .with_base_url(self.provider.base_url.clone())
            .with_model(self.provider.model.clone())
            .with_temperature(self.provider.temperature)
            .with_max_tokens(self.provider.max_tokens)
            .with_timeout(Duration::from_millis(self.provider.timeout_ms))
    }

    #[must_use]
    pub fn stance(&self) -> Stance {
        self.debate
            .stance
            .as_deref()
            .map_or_else(Stance::default, Stance::new)
    }

    #[must_use]
    pub fn topic_deriver(&self) -> TruncatedTopic {
        TruncatedTopic::new(self.debate.topic_max_chars)
    }
}
