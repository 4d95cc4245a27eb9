//! Scripted completion provider for tests.

use crate::backend::{CompletionProvider, CompletionRequest};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted call does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Return this text.
    Reply(String),
    /// Fail with this error.
    Fail(ProviderError),
    /// Never return.
    Stall,
    /// Disagree with the pending turn: `"I disagree: <text>"`.
    Rebut,
}

impl Outcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }
}

#[derive(Debug)]
struct Script {
    steps: VecDeque<Outcome>,
    fallback: Outcome,
    requests: Vec<CompletionRequest>,
}

/// A provider that plays back a fixed sequence of outcomes and records every
/// request it receives. Once the script runs out, every call uses the
/// fallback outcome ([`Outcome::Rebut`] unless set with
/// [`ScriptedProvider::always`]).
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
    latency: Duration,
}

impl ScriptedProvider {
    /// Creates a provider that rebuts every turn.
    #[must_use]
    pub fn new() -> Self {
        Self::always(Outcome::Rebut)
    }

    /// Creates a provider that produces `outcome` on every call.
    #[must_use]
    pub fn always(outcome: Outcome) -> Self {
        Self {
            script: Mutex::new(Script {
                steps: VecDeque::new(),
                fallback: outcome,
                requests: Vec::new(),
            }),
            latency: Duration::ZERO,
        }
    }

    /// Queues outcomes played before the fallback.
    #[must_use]
    pub fn with_steps(self, steps: impl IntoIterator<Item = Outcome>) -> Self {
        self.lock().steps.extend(steps);
        self
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_outcome(&self, request: &CompletionRequest) -> Outcome {
        let mut script = self.lock();
        script.requests.push(request.clone());
        script
            .steps
            .pop_front()
            .unwrap_or_else(|| script.fallback.clone())
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let outcome = self.next_outcome(request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match outcome {
            Outcome::Reply(text) => Ok(text),
            Outcome::Fail(err) => Err(err),
            Outcome::Stall => std::future::pending().await,
            Outcome::Rebut => {
                let pending = request.pending().map_or("", |turn| turn.text.as_str());
                Ok(format!("I disagree: {pending}"))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
