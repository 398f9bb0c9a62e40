//! Bounded retry with exponential backoff around the execution engine.
//!
//! Rate-limit failures are retried; every other failure is permanent. Neither
//! kind ever reaches the user verbatim: the caller always ends with a reply,
//! either the engine's or one of the fixed fallbacks below.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, info, warn};

use crate::{
    error::{Error, ExecutionError, Result},
    model::{AgentExecutor, ChatMessage},
    variant::AgentVariant,
};

/// Reply after retries are exhausted under rate limiting.
pub const HIGH_DEMAND_FALLBACK: &str =
    "We're experiencing high demand right now. Please try again in a few minutes.";

/// Reply after a permanent engine failure.
pub const PERMANENT_FAILURE_FALLBACK: &str =
    "I apologize, but I encountered an error. Please try again later.";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total engine calls, including the first.
    pub max_attempts: u32,
    /// Sleep before the second call; doubles before each later one.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Delay after `previous`: the initial delay first, then doubling.
    #[must_use]
    pub fn next_delay(&self, previous: Option<Duration>) -> Duration {
        previous
            .map(|d| d.checked_mul(2).unwrap_or(Duration::MAX))
            .unwrap_or(self.initial_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Every attempt was rate limited.
    Exhausted,
    /// A non-retryable failure (auth, transport, empty reply).
    Permanent,
}

/// Observable result of one [`BackoffCaller::invoke_detailed`] call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub reply: String,
    pub outcome: Outcome,
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

#[derive(Clone)]
pub struct BackoffCaller {
    executor: Arc<dyn AgentExecutor>,
    policy: RetryPolicy,
}

impl BackoffCaller {
    pub fn new(executor: Arc<dyn AgentExecutor>, policy: RetryPolicy) -> Self {
        Self {
            executor,
            policy: RetryPolicy::new(policy.max_attempts, policy.initial_delay),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `variant` on `messages`, returning the reply or a fixed fallback.
    ///
    /// Fails only when the variant name or the message list is empty.
    pub async fn invoke(&self, variant: &AgentVariant, messages: &[ChatMessage]) -> Result<String> {
        self.invoke_detailed(variant, messages)
            .await
            .map(|inv| inv.reply)
    }

    pub async fn invoke_detailed(
        &self,
        variant: &AgentVariant,
        messages: &[ChatMessage],
    ) -> Result<Invocation> {
        if variant.name.trim().is_empty() {
            return Err(Error::invalid_invocation("variant name is empty"));
        }
        if messages.is_empty() {
            return Err(Error::invalid_invocation("no messages to send"));
        }

        let mut delays = Vec::new();
        let mut backoff: Option<Duration> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.executor.run(variant, messages).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let err = match result {
                Ok(reply) if !reply.trim().is_empty() => {
                    info!(
                        variant = %variant.name,
                        executor = self.executor.id(),
                        attempt,
                        latency_ms,
                        reply_len = reply.len(),
                        "agent call succeeded"
                    );
                    return Ok(Invocation {
                        reply,
                        outcome: Outcome::Success,
                        attempts: attempt,
                        delays,
                    });
                },
                Ok(_) => ExecutionError::transport("engine returned an empty reply"),
                Err(e) => e,
            };

            if !err.is_rate_limited() {
                error!(
                    variant = %variant.name,
                    executor = self.executor.id(),
                    attempt,
                    latency_ms,
                    error = %err,
                    "agent call failed permanently"
                );
                return Ok(Invocation {
                    reply: PERMANENT_FAILURE_FALLBACK.to_string(),
                    outcome: Outcome::Permanent,
                    attempts: attempt,
                    delays,
                });
            }

            if attempt >= self.policy.max_attempts {
                warn!(
                    variant = %variant.name,
                    executor = self.executor.id(),
                    attempt,
                    latency_ms,
                    error = %err,
                    "rate limit retries exhausted"
                );
                return Ok(Invocation {
                    reply: HIGH_DEMAND_FALLBACK.to_string(),
                    outcome: Outcome::Exhausted,
                    attempts: attempt,
                    delays,
                });
            }

            let delay = self.policy.next_delay(backoff);
            backoff = Some(delay);
            warn!(
                variant = %variant.name,
                executor = self.executor.id(),
                attempt,
                latency_ms,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "rate limited, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            delays.push(delay);
        }
    }
}
