//! Bounded retries around a completion provider.
//!
//! Each attempt runs under its own deadline. Only failures classified as
//! retryable ([`ProviderError::is_retryable`]) are attempted again; the
//! delay between attempts doubles from `initial_backoff` up to
//! `max_backoff`.

use crate::backend::{CompletionProvider, CompletionRequest};
use crate::error::{FailureKind, ProviderError, RetryExhausted};
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to call a provider and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Deadline for a single provider call.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Sets the initial and maximum backoff.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Exponential delay after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Delay after the `attempt`-th failure, honouring a throttling hint up
    /// to `max_backoff`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32, error: &ProviderError) -> Duration {
        let backoff = self.backoff_for(attempt);
        error
            .retry_after()
            .map_or(backoff, |hint| hint.max(backoff))
            .min(self.max_backoff)
    }

    /// Longest a [`complete_with_retry`] call can take: every attempt hits
    /// its deadline and every delay between attempts is at `max_backoff`.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempts();
        self.attempt_timeout
            .saturating_mul(attempts)
            .saturating_add(self.max_backoff.saturating_mul(attempts - 1))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Calls `provider` until it succeeds, fails with a non-retryable error, or
/// the attempt budget runs out.
///
/// A call that outlives `attempt_timeout` is abandoned and counts as
/// [`ProviderError::Timeout`]. A reply that is blank after trimming counts
/// as [`FailureKind::EmptyResponse`].
///
/// # Errors
///
/// Returns [`RetryExhausted`] carrying the last error and the number of
/// attempts made.
pub async fn complete_with_retry<P>(
    provider: &P,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<Completion, RetryExhausted>
where
    P: CompletionProvider + ?Sized,
{
    let budget = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome =
            match tokio::time::timeout(policy.attempt_timeout, provider.complete(request)).await {
                Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::failed(
                    FailureKind::EmptyResponse,
                    "provider returned blank text",
                )),
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    after: policy.attempt_timeout,
                }),
            };

        let error = match outcome {
            Ok(text) => {
                debug!(provider = provider.name(), attempt, "completion succeeded");
                return Ok(Completion {
                    text,
                    attempts: attempt,
                });
            }
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= budget {
            warn!(
                provider = provider.name(),
                attempt,
                error = %error,
                retryable = error.is_retryable(),
                "giving up on completion"
            );
            return Err(RetryExhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.delay_after(attempt, &error);
        warn!(
            provider = provider.name(),
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "completion failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatTurn;
    use crate::mock::{Outcome, ScriptedProvider};
    use tokio::time::Instant;

    fn request() -> CompletionRequest {
        CompletionRequest::new("disagree").with_turn(ChatTurn::user("The sky is blue"))
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(3)
            .with_backoff(Duration::from_millis(100), Duration::from_secs(1))
            .with_attempt_timeout(Duration::from_secs(5))
    }

    fn timeout() -> Outcome {
        Outcome::Fail(ProviderError::Timeout {
            after: Duration::from_secs(5),
        })
    }

    #[test]
    fn worst_case_counts_every_deadline_and_delay() {
        assert_eq!(policy().worst_case(), Duration::from_millis(17_000));
        assert_eq!(
            policy().with_max_attempts(0).worst_case(),
            Duration::from_secs(5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_provider_gives_up_within_worst_case() {
        let provider = ScriptedProvider::always(Outcome::Stall);
        let policy = policy();
        let started = Instant::now();

        let err = complete_with_retry(&provider, &request(), &policy)
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert!(started.elapsed() <= policy.worst_case());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(5), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn retry_after_hint_is_capped() {
        let policy = policy();
        let short = ProviderError::RateLimited {
            retry_after: Some(Duration::from_millis(10)),
        };
        let long = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        let mid = ProviderError::RateLimited {
            retry_after: Some(Duration::from_millis(700)),
        };
        assert_eq!(policy.delay_after(1, &short), Duration::from_millis(100));
        assert_eq!(policy.delay_after(1, &mid), Duration::from_millis(700));
        assert_eq!(policy.delay_after(1, &long), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let provider = ScriptedProvider::always(Outcome::reply("No, it is not."))
            .with_steps([
                timeout(),
                Outcome::Fail(ProviderError::failed(FailureKind::ServerError, "502")),
            ]);

        let completion = complete_with_retry(&provider, &request(), &policy())
            .await
            .expect("third attempt succeeds");
        assert_eq!(completion.text, "No, it is not.");
        assert_eq!(completion.attempts, 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn always_timing_out_exhausts_the_budget() {
        let provider = ScriptedProvider::always(timeout());

        let err = complete_with_retry(&provider, &request(), &policy())
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last, ProviderError::Timeout { .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_errors_are_tried_once() {
        let provider = ScriptedProvider::always(Outcome::Fail(ProviderError::failed(
            FailureKind::InvalidRequest,
            "bad payload",
        )));

        let err = complete_with_retry(&provider, &request(), &policy())
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_is_classified_as_timeout() {
        let provider = ScriptedProvider::always(Outcome::Stall);
        let policy = policy().with_attempt_timeout(Duration::from_millis(250));

        let err = complete_with_retry(&provider, &request(), &policy)
            .await
            .unwrap_err();
        assert_eq!(
            err.last,
            ProviderError::Timeout {
                after: Duration::from_millis(250)
            }
        );
        assert_eq!(err.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_reply_counts_as_empty_response() {
        let provider = ScriptedProvider::always(Outcome::reply("  \n"));

        let err = complete_with_retry(&provider, &request(), &policy())
            .await
            .unwrap_err();
        assert!(matches!(
            err.last,
            ProviderError::Failed {
                kind: FailureKind::EmptyResponse,
                ..
            }
        ));
        assert_eq!(err.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let provider = ScriptedProvider::always(timeout());
        let started = Instant::now();

        complete_with_retry(&provider, &request(), &policy())
            .await
            .unwrap_err();
        assert_eq!(started.elapsed(), Duration::from_millis(100 + 200));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let provider = ScriptedProvider::new();
        let completion = complete_with_retry(&provider, &request(), &policy().with_max_attempts(0))
            .await
            .expect("reply");
        assert_eq!(completion.attempts, 1);
        assert_eq!(completion.text, "I disagree: The sky is blue");
    }
}
