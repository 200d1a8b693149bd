//! Batch Publisher - Runs the selected packages in bounded chunks
//!
//! Features:
//! - Token acquisition once per account before any upload
//! - Chunks processed strictly in sequence
//! - Packages within a chunk run concurrently on the current task
//! - Per-package, error and completion hooks

use crate::core::config::{DEFAULT_CHUNK_SIZE, UploadConfig};
use crate::core::error::UploadError;
use crate::core::retry::{RetryManager, RetryOptions};
use crate::core::traits::{CredentialProvider, RunHooks, TransportClient, UploadResult};
use crate::orchestration::aggregator::{ResultAggregator, RunResult, hook_failed};
use crate::orchestration::package_publisher::PackagePublisher;
use crate::orchestration::selection::Selection;
use crate::security::token_manager::AccountTokens;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

/// Batch publishing options
#[derive(Debug, Clone)]
pub struct BatchPublishOptions {
    /// Packages processed concurrently per chunk (default: 5)
    pub chunk_size: usize,
}

impl Default for BatchPublishOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl BatchPublishOptions {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            chunk_size: config.chunk_size(),
        }
    }
}

/// BatchPublisher - Schedules package pipelines chunk by chunk
pub struct BatchPublisher {
    transport: Arc<dyn TransportClient>,
    credentials: Arc<dyn CredentialProvider>,
    retry: RetryManager,
    options: BatchPublishOptions,
}

impl BatchPublisher {
    /// Create a new BatchPublisher that never retries
    pub fn new(
        transport: Arc<dyn TransportClient>,
        credentials: Arc<dyn CredentialProvider>,
        options: BatchPublishOptions,
    ) -> Self {
        Self {
            transport,
            credentials,
            retry: RetryManager::default(),
            options,
        }
    }

    /// Create a BatchPublisher with chunk size and retry policy from configuration
    pub fn from_config(
        config: &UploadConfig,
        transport: Arc<dyn TransportClient>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self::new(transport, credentials, BatchPublishOptions::from_config(config)).with_retry(
            RetryManager::new(
                config.retry_mode().policy(),
                RetryOptions {
                    delay: config.retry_delay(),
                },
            ),
        )
    }

    pub fn with_retry(mut self, retry: RetryManager) -> Self {
        self.retry = retry;
        self
    }

    /// Run every selected package and aggregate the results
    ///
    /// # Returns
    ///
    /// The ordered run result, or a fatal error (configuration or hook)
    pub async fn run(
        &self,
        selection: Selection,
        hooks: &dyn RunHooks,
    ) -> Result<RunResult, UploadError> {
        if self.options.chunk_size == 0 {
            return Err(UploadError::config(
                "options.chunkSize",
                "chunkSize must be at least 1",
            ));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = selection.packages.len();
        let chunk_count = total.div_ceil(self.options.chunk_size);

        tracing::info!(
            %run_id,
            packages = total,
            chunks = chunk_count,
            chunk_size = self.options.chunk_size,
            transport = self.transport.name(),
            "starting run"
        );

        let tokens =
            AccountTokens::acquire(selection.referenced_accounts(), self.credentials.as_ref()).await;

        let publisher = &PackagePublisher::new(self.transport.as_ref(), &self.retry);
        let tokens = &tokens;
        let mut results: Vec<UploadResult> = Vec::with_capacity(total);

        for (index, chunk) in selection.packages.chunks(self.options.chunk_size).enumerate() {
            tracing::debug!(chunk = index + 1, of = chunk_count, size = chunk.len(), "chunk started");

            // Barrier: every pipeline of the chunk is terminal before the next chunk
            let outcomes = join_all(chunk.iter().map(|package| async move {
                let result = publisher.run(package, tokens).await;
                let hook = hooks.on_package_finished(&result).await;
                (result, hook)
            }))
            .await;

            let mut hook_error = None;
            for (result, hook) in outcomes {
                if let Err(error) = hook
                    && hook_error.is_none()
                {
                    hook_error = Some(error);
                }
                results.push(result);
            }

            if let Some(error) = hook_error {
                tracing::error!(chunk = index + 1, "package hook failed, aborting run");
                return Err(hook_failed("onPackageFinished", error));
            }

            tracing::debug!(chunk = index + 1, of = chunk_count, "chunk settled");
        }

        let run = RunResult {
            run_id,
            message: selection.message,
            started_at,
            finished_at: Utc::now(),
            results,
        };

        ResultAggregator::new(hooks).finish(&run).await?;

        Ok(run)
    }
}
