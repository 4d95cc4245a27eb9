//! Error types for completion providers.
//!
//! - `ProviderError`: a single provider call failed
//! - `FailureKind`: the fixed transient/non-transient classification of a failure
//! - `RetryExhausted`: every attempt allowed by a `RetryPolicy` failed

use std::fmt;
use std::time::Duration;

/// Classification of a provider failure that is neither a timeout nor throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The connection failed or was reset.
    Network,
    /// The upstream answered with a 5xx status.
    ServerError,
    /// The upstream answered successfully but produced no text.
    EmptyResponse,
    /// The upstream rejected the request shape (400, 404, 422).
    InvalidRequest,
    /// The credentials were rejected (401, 403).
    Unauthorized,
    /// The response body could not be decoded.
    MalformedResponse,
    /// The provider is misconfigured locally.
    Configuration,
}

impl FailureKind {
    /// Returns true if another attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::ServerError | Self::EmptyResponse)
    }

    /// Returns a short label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::ServerError => "server_error",
            Self::EmptyResponse => "empty_response",
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::MalformedResponse => "malformed_response",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a single completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The call exceeded its deadline.
    Timeout { after: Duration },
    /// The upstream signalled throttling.
    RateLimited { retry_after: Option<Duration> },
    /// Any other upstream failure.
    Failed { kind: FailureKind, reason: String },
}

impl ProviderError {
    /// Builds a `Failed` error.
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns true if the call may be attempted again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Failed { kind, .. } => kind.is_transient(),
        }
    }

    /// The upstream's requested wait, if it sent one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns a short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Failed { kind, .. } => kind.as_str(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after } => {
                write!(f, "completion timed out after {}ms", after.as_millis())
            }
            Self::RateLimited { retry_after } => {
                if let Some(wait) = retry_after {
                    write!(f, "rate limited, retry after {}s", wait.as_secs())
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::Failed { kind, reason } => {
                write!(f, "completion failed ({kind}): {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Every attempt allowed by the retry policy failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    /// Number of attempts made.
    pub attempts: u32,
    /// The error from the final attempt.
    pub last: ProviderError,
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "completion failed after {} attempt(s): {}",
            self.attempts, self.last
        )
    }
}

impl std::error::Error for RetryExhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(FailureKind::Network.is_transient());
        assert!(FailureKind::ServerError.is_transient());
        assert!(FailureKind::EmptyResponse.is_transient());
        assert!(!FailureKind::InvalidRequest.is_transient());
        assert!(!FailureKind::Unauthorized.is_transient());
        assert!(!FailureKind::MalformedResponse.is_transient());
        assert!(!FailureKind::Configuration.is_transient());
    }

    #[test]
    fn timeouts_and_throttling_are_retryable() {
        assert!(
            ProviderError::Timeout {
                after: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(!ProviderError::failed(FailureKind::Unauthorized, "bad key").is_retryable());
    }

    #[test]
    fn retry_after_only_on_rate_limit() {
        let hint = Duration::from_secs(3);
        assert_eq!(
            ProviderError::RateLimited {
                retry_after: Some(hint)
            }
            .retry_after(),
            Some(hint)
        );
        assert_eq!(
            ProviderError::failed(FailureKind::Network, "reset").retry_after(),
            None
        );
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::failed(FailureKind::ServerError, "status 503");
        assert_eq!(err.to_string(), "completion failed (server_error): status 503");

        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(err.to_string().contains("2s"));
    }

    #[test]
    fn retry_exhausted_exposes_last_error() {
        use std::error::Error as _;
        let err = RetryExhausted {
            attempts: 3,
            last: ProviderError::Timeout {
                after: Duration::from_millis(250),
            },
        };
        assert!(err.to_string().contains("3 attempt(s)"));
        assert!(err.source().is_some());
    }
}
