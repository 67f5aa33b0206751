//! Bounded retry of teardown attempts.
use std::{num::NonZeroU32, time::Duration};

use snafu::prelude::*;

use crate::{
    classify::ProviderError,
    teardown::{Deleted, ResourceTeardown, TeardownOutcome, TeardownProvider, TeardownRequest},
};

/// How many times to attempt a teardown, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawRetryPolicy", into = "RawRetryPolicy")]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    delay: Duration,
}

impl Default for RetryPolicy {
    /// A single attempt.
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, crate::Error> {
        let max_attempts =
            NonZeroU32::new(max_attempts).context(crate::InvalidPolicySnafu { max_attempts })?;
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// One attempt, no retries.
    pub const fn once() -> Self {
        Self {
            max_attempts: NonZeroU32::MIN,
            delay: Duration::ZERO,
        }
    }

    /// Three attempts thirty seconds apart, the schedule used for ACM
    /// certificates that may still be attached to a load balancer.
    pub const fn certificate() -> Self {
        Self {
            max_attempts: match NonZeroU32::new(3) {
                Some(n) => n,
                None => NonZeroU32::MIN,
            },
            delay: Duration::from_secs(30),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RawRetryPolicy {
    max_attempts: u32,
    #[serde(default)]
    delay_secs: u64,
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = crate::Error;

    fn try_from(raw: RawRetryPolicy) -> Result<Self, Self::Error> {
        RetryPolicy::new(raw.max_attempts, Duration::from_secs(raw.delay_secs))
    }
}

impl From<RetryPolicy> for RawRetryPolicy {
    fn from(policy: RetryPolicy) -> Self {
        RawRetryPolicy {
            max_attempts: policy.max_attempts(),
            delay_secs: policy.delay.as_secs(),
        }
    }
}

/// How a successful teardown settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Deleted(Deleted),
    AlreadyAbsent,
}

/// A teardown that reached a successful terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success {
    pub settled: Settled,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// A teardown that reached a failed terminal state.
#[derive(Debug, Snafu)]
pub enum TeardownError {
    #[snafu(display("Could not delete {request}: {source}"))]
    Fatal {
        request: TeardownRequest,
        source: ProviderError,
    },

    #[snafu(display("Could not delete {request} after {attempts} attempts: {reason}"))]
    BusyExhausted {
        request: TeardownRequest,
        attempts: u32,
        reason: String,
    },
}

impl TeardownError {
    pub fn request(&self) -> &TeardownRequest {
        match self {
            TeardownError::Fatal { request, .. } | TeardownError::BusyExhausted { request, .. } => {
                request
            }
        }
    }
}

/// Drives [`ResourceTeardown`] attempts on a fixed schedule.
///
/// Only [`TeardownOutcome::Busy`] is retried. The wait between attempts is an
/// async sleep, so dropping the future returned by [`run`](Self::run)
/// cancels a pending retry.
pub struct BoundedRetryExecutor<P> {
    teardown: ResourceTeardown<P>,
}

impl<P: TeardownProvider> BoundedRetryExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            teardown: ResourceTeardown::new(provider),
        }
    }

    pub fn teardown(&self) -> &ResourceTeardown<P> {
        &self.teardown
    }

    pub async fn run(
        &self,
        request: &TeardownRequest,
        policy: &RetryPolicy,
    ) -> Result<Success, TeardownError> {
        let max_attempts = policy.max_attempts();
        let mut attempt = 1;
        loop {
            log::debug!("attempt {attempt} of {max_attempts} to delete {request}");
            let reason = match self.teardown.attempt(request).await {
                TeardownOutcome::Deleted(deleted) => {
                    return Ok(Success {
                        settled: Settled::Deleted(deleted),
                        attempts: attempt,
                    });
                }
                TeardownOutcome::AlreadyAbsent => {
                    return Ok(Success {
                        settled: Settled::AlreadyAbsent,
                        attempts: attempt,
                    });
                }
                TeardownOutcome::Fatal(source) => {
                    return Err(TeardownError::Fatal {
                        request: request.clone(),
                        source,
                    });
                }
                TeardownOutcome::Busy(reason) => reason,
            };

            if attempt >= max_attempts {
                return BusyExhaustedSnafu {
                    request: request.clone(),
                    attempts: attempt,
                    reason,
                }
                .fail();
            }

            log::info!(
                "  retrying {request} in {}s ({attempt}/{max_attempts} attempts used)",
                policy.delay().as_secs()
            );
            tokio::time::sleep(policy.delay()).await;
            attempt += 1;
        }
    }
}
