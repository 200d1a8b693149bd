//! Single-retry policy for failed pipeline stages
//!
//! A failed upload or publish stage is retried at most once, and only when
//! the active policy accepts the failure. The second outcome is final.

use crate::core::traits::UploadFailure;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Attempts per stage per package, retry included
pub const MAX_STAGE_ATTEMPTS: u32 = 2;

/// Network error patterns treated as transient
const TRANSIENT_PATTERNS: &[&str] = &[
    "ECONNREFUSED",
    "ENOTFOUND",
    "ETIMEDOUT",
    "ECONNRESET",
    "socket hang up",
    "network error",
    "timeout",
    "timed out",
    "connection refused",
    "connection reset",
    "connection closed",
    "dns error",
];

/// Predicate deciding whether a failed stage gets one more attempt
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, failure: &UploadFailure) -> bool;
}

impl<F> RetryPolicy for F
where
    F: Fn(&UploadFailure) -> bool + Send + Sync,
{
    fn should_retry(&self, failure: &UploadFailure) -> bool {
        self(failure)
    }
}

/// Never retry (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn should_retry(&self, _failure: &UploadFailure) -> bool {
        false
    }
}

/// Retry every failed stage once
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnce;

impl RetryPolicy for RetryOnce {
    fn should_retry(&self, _failure: &UploadFailure) -> bool {
        true
    }
}

/// Retry network failures only
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientRetry;

impl RetryPolicy for TransientRetry {
    fn should_retry(&self, failure: &UploadFailure) -> bool {
        if failure.error_code == "TRANSPORT_ERROR" {
            return true;
        }

        let detail = failure.error_detail.to_lowercase();
        TRANSIENT_PATTERNS
            .iter()
            .any(|pattern| detail.contains(&pattern.to_lowercase()))
    }
}

/// Retry policy selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    #[default]
    Never,
    Always,
    Transient,
}

impl RetryMode {
    pub fn policy(self) -> Arc<dyn RetryPolicy> {
        match self {
            Self::Never => Arc::new(NeverRetry),
            Self::Always => Arc::new(RetryOnce),
            Self::Transient => Arc::new(TransientRetry),
        }
    }
}

/// Options for retry behavior
#[derive(Debug, Clone, Default)]
pub struct RetryOptions {
    /// Pause before the second attempt
    pub delay: Duration,
}

/// Retry manager running a stage with at most one extra attempt
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use webstore_publisher::core::{RetryManager, RetryOnce, RetryOptions};
///
/// # async fn example() {
/// let manager = RetryManager::new(Arc::new(RetryOnce), RetryOptions::default());
///
/// let outcome = manager
///     .retry(|attempt| async move { Ok::<_, webstore_publisher::core::UploadFailure>(attempt) }, |_| {})
///     .await;
/// assert_eq!(outcome.ok(), Some(1));
/// # }
/// ```
#[derive(Clone)]
pub struct RetryManager {
    policy: Arc<dyn RetryPolicy>,
    options: RetryOptions,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(Arc::new(NeverRetry), RetryOptions::default())
    }
}

impl RetryManager {
    pub fn new(policy: Arc<dyn RetryPolicy>, options: RetryOptions) -> Self {
        Self { policy, options }
    }

    /// Run one stage, retrying it once if the policy accepts the failure
    ///
    /// `operation` receives the 1-based attempt number. `on_retry` sees the
    /// first failure right before the second attempt starts.
    pub async fn retry<F, Fut, T, R>(
        &self,
        mut operation: F,
        mut on_retry: R,
    ) -> Result<T, UploadFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UploadFailure>>,
        R: FnMut(&UploadFailure),
    {
        let failure = match operation(1).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        if !self.policy.should_retry(&failure) {
            return Err(failure);
        }

        on_retry(&failure);

        if !self.options.delay.is_zero() {
            sleep(self.options.delay).await;
        }

        // The second outcome replaces the first unconditionally
        operation(MAX_STAGE_ATTEMPTS).await
    }
}
