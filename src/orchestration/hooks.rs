//! Host hooks shipped with the crate
//!
//! - `ConsoleReporter` prints progress and a run summary
//! - `JsonReportWriter` writes the results as JSON
//! - `CommandHooks` runs configured commands with the payload on stdin
//! - `HookChain` composes hooks in order

use crate::core::config::{DEFAULT_HOOK_TIMEOUT_SECS, HookCommand, HooksConfig};
use crate::core::traits::{RunHooks, UploadFailure, UploadResult};
use crate::security::command_executor::SafeCommandExecutor;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Payload of the completion hooks, snake_case like the results it carries
#[derive(Debug, Serialize)]
struct CompletionReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    generated_at: chrono::DateTime<Utc>,
    total: usize,
    failed: usize,
    results: &'a [UploadResult],
}

impl<'a> CompletionReport<'a> {
    fn new(results: &'a [UploadResult], message: Option<&'a str>) -> Self {
        Self {
            message,
            generated_at: Utc::now(),
            total: results.len(),
            failed: results.iter().filter(|r| !r.is_success()).count(),
            results,
        }
    }
}

// ============================================================================
// Console
// ============================================================================

/// Prints per-package lines and a final summary to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn format_line(result: &UploadResult) -> String {
        match result {
            UploadResult::Success(s) if s.published => {
                format!("✅ {}: uploaded and published ({})", s.package_name, s.package_id)
            }
            UploadResult::Success(s) => {
                format!("✅ {}: uploaded ({})", s.package_name, s.package_id)
            }
            UploadResult::Failure(f) => format!(
                "❌ {}: {} failed - [{}] {}",
                f.package_name, f.stage, f.error_code, f.error_detail
            ),
        }
    }

    /// Format the run summary
    pub fn format_summary(results: &[UploadResult], message: Option<&str>) -> String {
        let failures: Vec<&UploadFailure> =
            results.iter().filter_map(UploadResult::as_failure).collect();
        let succeeded: Vec<&UploadResult> = results.iter().filter(|r| r.is_success()).collect();

        let mut lines = vec![
            String::new(),
            "=".repeat(60),
            "📊 Upload Summary".to_string(),
            "=".repeat(60),
        ];

        if let Some(message) = message {
            lines.push(format!("\n📝 {}", message));
        }

        lines.push(format!("\n✅ Succeeded: {}", succeeded.len()));
        for result in &succeeded {
            let published = if result.published() { " (published)" } else { "" };
            lines.push(format!(
                "   - {} <- {}{}",
                result.package_name(),
                result.archive_used().display(),
                published
            ));
        }

        lines.push(format!("\n❌ Failed: {}", failures.len()));
        for failure in &failures {
            lines.push(format!(
                "   - {} ({}): [{}] {}",
                failure.package_name, failure.stage, failure.error_code, failure.error_detail
            ));
        }

        lines.push(format!("\n{}", "=".repeat(60)));
        lines.push(format!(
            "Overall Status: {}",
            if failures.is_empty() { "✅ SUCCESS" } else { "❌ FAILED" }
        ));
        lines.push("=".repeat(60));

        lines.join("\n")
    }
}

#[async_trait]
impl RunHooks for ConsoleReporter {
    async fn on_package_finished(&self, result: &UploadResult) -> anyhow::Result<()> {
        println!("{}", Self::format_line(result));
        Ok(())
    }

    async fn on_complete(&self, results: &[UploadResult], message: Option<&str>) -> anyhow::Result<()> {
        println!("{}\n", Self::format_summary(results, message));
        Ok(())
    }
}

// ============================================================================
// JSON report
// ============================================================================

/// Writes all results as pretty JSON once the run completes
#[derive(Debug)]
pub struct JsonReportWriter {
    path: PathBuf,
}

impl JsonReportWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RunHooks for JsonReportWriter {
    async fn on_complete(&self, results: &[UploadResult], message: Option<&str>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&CompletionReport::new(results, message))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), "report written");
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Runs the commands of the `hooks` configuration section
pub struct CommandHooks {
    config: HooksConfig,
    base_dir: PathBuf,
}

impl CommandHooks {
    /// Relative working directories are resolved against `base_dir`
    pub fn new<P: Into<PathBuf>>(config: HooksConfig, base_dir: P) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
        }
    }

    async fn run_all(
        &self,
        hook: &str,
        commands: Option<&Vec<HookCommand>>,
        payload: &(impl Serialize + Sync),
    ) -> anyhow::Result<()> {
        let Some(commands) = commands.filter(|c| !c.is_empty()) else {
            return Ok(());
        };

        let input = serde_json::to_vec(payload)?;

        for command in commands {
            let working_dir = match &command.working_directory {
                Some(dir) => self.base_dir.join(dir),
                None => self.base_dir.clone(),
            };

            let mut executor = SafeCommandExecutor::new(&working_dir)?;
            executor.set_timeout(Duration::from_secs(
                command.timeout.unwrap_or(DEFAULT_HOOK_TIMEOUT_SECS),
            ));

            tracing::debug!(hook, command = %command.command, "running hook command");

            executor
                .execute(&command.command, &input)
                .await
                .with_context(|| format!("{} command '{}'", hook, command.command))?;
        }

        Ok(())
    }
}

#[async_trait]
impl RunHooks for CommandHooks {
    async fn on_package_finished(&self, result: &UploadResult) -> anyhow::Result<()> {
        self.run_all(
            "onPackageFinished",
            self.config.on_package_finished.as_ref(),
            result,
        )
        .await
    }

    async fn on_error(&self, failure: &UploadFailure) -> anyhow::Result<()> {
        self.run_all("onError", self.config.on_error.as_ref(), failure)
            .await
    }

    async fn on_complete(&self, results: &[UploadResult], message: Option<&str>) -> anyhow::Result<()> {
        self.run_all(
            "onComplete",
            self.config.on_complete.as_ref(),
            &CompletionReport::new(results, message),
        )
        .await
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Calls each hook in order; the first error stops the chain
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn RunHooks>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn RunHooks>) -> Self {
        self.hooks.push(hook);
        self
    }
}

#[async_trait]
impl RunHooks for HookChain {
    async fn on_package_finished(&self, result: &UploadResult) -> anyhow::Result<()> {
        for hook in &self.hooks {
            hook.on_package_finished(result).await?;
        }
        Ok(())
    }

    async fn on_error(&self, failure: &UploadFailure) -> anyhow::Result<()> {
        for hook in &self.hooks {
            hook.on_error(failure).await?;
        }
        Ok(())
    }

    async fn on_complete(&self, results: &[UploadResult], message: Option<&str>) -> anyhow::Result<()> {
        for hook in &self.hooks {
            hook.on_complete(results, message).await?;
        }
        Ok(())
    }
}
