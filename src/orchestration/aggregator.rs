//! Result aggregation and post-flight hooks

use crate::core::error::UploadError;
use crate::core::traits::{RunHooks, UploadFailure, UploadResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Final outcome of a run: one result per selected package, in selection order
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<UploadResult>,
}

impl RunResult {
    pub fn succeeded(&self) -> impl Iterator<Item = &UploadResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadFailure> {
        self.results.iter().filter_map(UploadResult::as_failure)
    }

    pub fn published_count(&self) -> usize {
        self.results.iter().filter(|r| r.published()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Invokes the post-flight hooks once all chunks settled
pub struct ResultAggregator<'a> {
    hooks: &'a dyn RunHooks,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(hooks: &'a dyn RunHooks) -> Self {
        Self { hooks }
    }

    /// Run `on_error` per failure in order, then `on_complete` once
    ///
    /// Each error hook is awaited before the next starts. Any hook error is
    /// fatal for the run.
    pub async fn finish(&self, run: &RunResult) -> Result<(), UploadError> {
        for failure in run.failures() {
            self.hooks
                .on_error(failure)
                .await
                .map_err(|e| hook_failed("onError", e))?;
        }

        self.hooks
            .on_complete(&run.results, run.message.as_deref())
            .await
            .map_err(|e| hook_failed("onComplete", e))?;

        tracing::info!(
            run_id = %run.run_id,
            total = run.results.len(),
            failed = run.failures().count(),
            published = run.published_count(),
            "run complete"
        );

        Ok(())
    }
}

pub(crate) fn hook_failed(hook: &str, error: anyhow::Error) -> UploadError {
    UploadError::HookFailed {
        hook: hook.to_string(),
        message: format!("{:#}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Stage;
    use crate::core::traits::UploadSuccess;
    use crate::test_support::RecordingHooks;
    use std::path::PathBuf;

    fn success(name: &str) -> UploadResult {
        UploadResult::Success(UploadSuccess {
            package_name: name.to_string(),
            package_id: format!("{name}-id"),
            archive_used: PathBuf::from(format!("{name}.zip")),
            published: true,
            response: None,
        })
    }

    fn failure(name: &str) -> UploadResult {
        UploadResult::Failure(UploadFailure {
            package_name: name.to_string(),
            package_id: format!("{name}-id"),
            archive_used: PathBuf::from(format!("{name}.zip")),
            stage: Stage::Upload,
            error_code: "UPLOAD_REJECTED".to_string(),
            error_detail: "rejected".to_string(),
            raw_response: None,
        })
    }

    fn run(results: Vec<UploadResult>) -> RunResult {
        RunResult {
            run_id: Uuid::new_v4(),
            message: Some("release 1.2".to_string()),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results,
        }
    }

    #[tokio::test]
    async fn test_error_hooks_run_in_order_before_complete() {
        let hooks = RecordingHooks::new();
        let run = run(vec![failure("a"), success("b"), failure("c")]);

        ResultAggregator::new(&hooks).finish(&run).await.unwrap();

        assert_eq!(hooks.log(), vec!["error a", "error c", "complete 3"]);
        assert_eq!(
            hooks.completions(),
            vec![(
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                Some("release 1.2".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_error_hook_failure_is_fatal() {
        let hooks = RecordingHooks::new().failing("error");
        let run = run(vec![failure("a"), failure("b")]);

        let error = ResultAggregator::new(&hooks).finish(&run).await.unwrap_err();

        assert_eq!(error.code(), "HOOK_FAILED");
        assert_eq!(error.subject(), "onError");
        // Aborted at the first failing hook
        assert_eq!(hooks.log(), vec!["error a"]);
    }

    #[tokio::test]
    async fn test_complete_hook_failure_is_fatal() {
        let hooks = RecordingHooks::new().failing("complete");
        let run = run(vec![success("a")]);

        let error = ResultAggregator::new(&hooks).finish(&run).await.unwrap_err();

        assert!(error.is_fatal());
        assert_eq!(error.subject(), "onComplete");
    }

    #[test]
    fn test_run_result_counts() {
        let run = run(vec![success("a"), failure("b")]);

        assert!(run.has_failures());
        assert_eq!(run.succeeded().count(), 1);
        assert_eq!(run.published_count(), 1);
        assert!(run.duration_ms() >= 0);
    }
}
