//! Caller-side retry for key allocation.
//!
//! [`KeyGenerator`] never retries on its own; a caller that wants to ride out
//! a flaky key authority wraps `new_key` with [`new_key_with_retry`].

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::debug;

use super::KeyGenerator;
use crate::Result;
use crate::config::RetryConfig;
use crate::entity::Key;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Whether retries are enabled
    pub enabled: bool,
    /// Maximum attempts, the first one included
    pub max_attempts: u32,
    /// Initial backoff
    pub initial_backoff: Duration,
    /// Maximum backoff
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Create from config
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Draw a key, retrying retryable source failures per `policy`.
///
/// # Errors
///
/// Returns the last error once attempts run out, or the first
/// non-retryable error immediately.
pub async fn new_key_with_retry(generator: &KeyGenerator, policy: &RetryPolicy) -> Result<Key> {
    if !policy.enabled {
        return generator.new_key().await;
    }

    (|| generator.new_key())
        .retry(policy.backoff())
        .when(crate::Error::is_retryable)
        .notify(|err, delay| {
            debug!(
                error = %err,
                delay_ms = delay.as_millis(),
                "Retrying key allocation after backoff"
            );
        })
        .await
}
