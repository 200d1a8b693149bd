//! Package Publisher - Drives one package through upload and publish
//!
//! Manages the per-package workflow:
//! - Archive resolution and token lookup (no network on failure)
//! - Upload with at most one retry
//! - Publish when the resolved publish flag is set, with at most one retry
//! - Classification into a single `UploadResult`

use crate::core::error::UploadError;
use crate::core::package::Package;
use crate::core::retry::RetryManager;
use crate::core::state_machine::{PackageStateMachine, PipelineState};
use crate::core::traits::{
    PublishRequest, TransportClient, UploadFailure, UploadRequest, UploadResult, UploadSuccess,
};
use crate::security::token_manager::AccountTokens;
use crate::validation::archive_resolver::resolve_archive;
use secrecy::SecretString;
use serde_json::Value;
use std::path::Path;

/// Runs the pipeline of a single package
pub struct PackagePublisher<'a> {
    transport: &'a dyn TransportClient,
    retry: &'a RetryManager,
}

impl<'a> PackagePublisher<'a> {
    pub fn new(transport: &'a dyn TransportClient, retry: &'a RetryManager) -> Self {
        Self { transport, retry }
    }

    /// Run the package to its terminal state
    ///
    /// Never fails: every package-level error is captured in the result.
    pub async fn run(&self, package: &Package, tokens: &AccountTokens) -> UploadResult {
        let mut machine = PackageStateMachine::new(&package.name);

        // 1. Pre-flight
        let archive = match resolve_archive(package) {
            Ok(archive) => archive,
            Err(error) => return Self::preflight_failure(&mut machine, package, &error),
        };

        let token = match tokens.get(&package.account) {
            Ok(token) => token,
            Err(error) => return Self::preflight_failure(&mut machine, package, &error),
        };

        // 2. Upload
        let uploaded = self
            .retry
            .retry(
                |attempt| {
                    if attempt > 1 {
                        machine.transition(PipelineState::UploadFailed);
                    }
                    machine.transition(PipelineState::Uploading);
                    self.upload_once(package, &archive, token, tokens, attempt)
                },
                |failure| Self::log_retry(failure),
            )
            .await;

        let upload_response = match uploaded {
            Ok(response) => {
                machine.transition(PipelineState::UploadSucceeded);
                response
            }
            Err(failure) => {
                machine.transition(PipelineState::UploadFailed);
                return Self::finish(&machine, UploadResult::Failure(failure));
            }
        };

        if !package.publish {
            tracing::info!(package = %package.name, "uploaded, publish not requested");
            return Self::finish(
                &machine,
                UploadResult::Success(Self::success(package, &archive, false, upload_response)),
            );
        }

        // 3. Publish
        let published = self
            .retry
            .retry(
                |attempt| {
                    if attempt > 1 {
                        machine.transition(PipelineState::PublishFailed);
                    }
                    machine.transition(PipelineState::Publishing);
                    self.publish_once(package, &archive, token, tokens, attempt)
                },
                |failure| Self::log_retry(failure),
            )
            .await;

        match published {
            Ok(response) => {
                machine.transition(PipelineState::Published);
                Self::finish(
                    &machine,
                    UploadResult::Success(Self::success(package, &archive, true, response)),
                )
            }
            Err(failure) => {
                machine.transition(PipelineState::PublishFailed);
                Self::finish(&machine, UploadResult::Failure(failure))
            }
        }
    }

    async fn upload_once(
        &self,
        package: &Package,
        archive: &Path,
        token: &SecretString,
        tokens: &AccountTokens,
        attempt: u32,
    ) -> Result<Value, UploadFailure> {
        tracing::info!(
            package = %package.name,
            archive = %archive.display(),
            attempt,
            transport = self.transport.name(),
            "uploading"
        );

        let request = UploadRequest {
            package,
            archive,
            token,
        };

        self.transport
            .upload(request)
            .await
            .map_err(|error| Self::failure(package, archive, tokens, &error))
    }

    async fn publish_once(
        &self,
        package: &Package,
        archive: &Path,
        token: &SecretString,
        tokens: &AccountTokens,
        attempt: u32,
    ) -> Result<Value, UploadFailure> {
        tracing::info!(
            package = %package.name,
            item_id = %package.item_id,
            target = package.publish_target.as_deref().unwrap_or("default"),
            attempt,
            "publishing"
        );

        self.transport
            .publish(PublishRequest { package, token })
            .await
            .map_err(|error| Self::failure(package, archive, tokens, &error))
    }

    fn failure(
        package: &Package,
        archive: &Path,
        tokens: &AccountTokens,
        error: &UploadError,
    ) -> UploadFailure {
        let mut failure = UploadFailure::from_error(package, archive, error);
        failure.error_detail = tokens.mask_tokens_in_string(&failure.error_detail);
        failure.raw_response = failure
            .raw_response
            .map(|raw| tokens.mask_tokens_in_string(&raw));

        tracing::warn!(
            package = %package.name,
            stage = %failure.stage,
            code = %failure.error_code,
            detail = %failure.error_detail,
            "stage failed"
        );

        failure
    }

    fn preflight_failure(
        machine: &mut PackageStateMachine,
        package: &Package,
        error: &UploadError,
    ) -> UploadResult {
        tracing::warn!(package = %package.name, error = %error, "pre-flight check failed");
        machine.transition(PipelineState::UploadFailed);
        UploadResult::Failure(UploadFailure::from_error(package, &package.archive, error))
    }

    fn success(package: &Package, archive: &Path, published: bool, response: Value) -> UploadSuccess {
        UploadSuccess {
            package_name: package.name.clone(),
            package_id: package.item_id.clone(),
            archive_used: archive.to_path_buf(),
            published,
            response: Some(response),
        }
    }

    fn log_retry(failure: &UploadFailure) {
        tracing::warn!(
            package = %failure.package_name,
            stage = %failure.stage,
            "retrying once after failure"
        );
    }

    fn finish(machine: &PackageStateMachine, result: UploadResult) -> UploadResult {
        tracing::debug!(
            package = %result.package_name(),
            state = ?machine.get_state(),
            elapsed_ms = machine.get_elapsed_time(),
            history = %machine.get_history(),
            "pipeline finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Stage;
    use crate::core::retry::{RetryOnce, RetryOptions};
    use crate::test_support::{FakeTransport, Scripted, package};
    use std::fs::File;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tokens() -> AccountTokens {
        let mut tokens = AccountTokens::new();
        tokens.insert("default", Ok(SecretString::new("token-default".into())));
        tokens
    }

    fn archive(temp_dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = temp_dir.path().join(name);
        File::create(&path).unwrap();
        path
    }

    fn retry_once() -> RetryManager {
        RetryManager::new(Arc::new(RetryOnce), RetryOptions::default())
    }

    #[tokio::test]
    async fn test_upload_without_publish() {
        let temp_dir = TempDir::new().unwrap();
        let package = package("test1", &archive(&temp_dir, "test1.zip"));
        let transport = FakeTransport::new();
        let retry = RetryManager::default();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        assert!(result.is_success());
        assert!(!result.published());
        assert_eq!(transport.calls(Stage::Upload, "test1"), 1);
        assert_eq!(transport.total_calls(Stage::Publish), 0);
    }

    #[tokio::test]
    async fn test_upload_and_publish() {
        let temp_dir = TempDir::new().unwrap();
        let mut package = package("test1", &archive(&temp_dir, "test1.zip"));
        package.publish = true;
        let transport = FakeTransport::new();
        let retry = RetryManager::default();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        assert!(result.published());
        assert_eq!(
            transport.events(),
            vec![
                "start upload test1",
                "end upload test1",
                "start publish test1",
                "end publish test1"
            ]
        );
    }

    #[tokio::test]
    async fn test_directory_without_zip_makes_no_network_call() {
        let temp_dir = TempDir::new().unwrap();
        archive(&temp_dir, "readme.txt");
        let package = package("X", temp_dir.path());
        let transport = FakeTransport::new();
        let retry = retry_once();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.error_code, "ARCHIVE_NOT_FOUND");
        assert_eq!(failure.stage, Stage::Preflight);
        assert!(transport.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_is_authentication_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut package = package("test1", &archive(&temp_dir, "test1.zip"));
        package.account = "other".to_string();
        let transport = FakeTransport::new();
        let retry = RetryManager::default();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        assert_eq!(result.as_failure().unwrap().error_code, "AUTHENTICATION_FAILED");
        assert!(transport.events().is_empty());
    }

    #[tokio::test]
    async fn test_publish_retry_uses_second_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let mut package = package("Y", &archive(&temp_dir, "y.zip"));
        package.publish = true;
        let transport = FakeTransport::new().script(Stage::Publish, "Y", &[Scripted::Reject]);
        let retry = retry_once();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        assert!(result.is_success());
        assert!(result.published());
        assert_eq!(transport.calls(Stage::Publish, "Y"), 2);
        assert_eq!(transport.calls(Stage::Upload, "Y"), 1);
    }

    #[tokio::test]
    async fn test_publish_fails_twice() {
        let temp_dir = TempDir::new().unwrap();
        let mut package = package("Y", &archive(&temp_dir, "y.zip"));
        package.publish = true;
        let transport = FakeTransport::new().script(
            Stage::Publish,
            "Y",
            &[Scripted::Drop, Scripted::Reject, Scripted::Reject],
        );
        let retry = retry_once();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        let failure = result.as_failure().unwrap();
        // Second attempt was a rejection, the first a transport error
        assert_eq!(failure.error_code, "PUBLISH_REJECTED");
        assert!(failure.raw_response.is_some());
        assert!(!result.published());
        assert_eq!(transport.calls(Stage::Publish, "Y"), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_without_retry_skips_publish() {
        let temp_dir = TempDir::new().unwrap();
        let mut package = package("test1", &archive(&temp_dir, "test1.zip"));
        package.publish = true;
        let transport = FakeTransport::new().script(Stage::Upload, "test1", &[Scripted::Drop]);
        let retry = RetryManager::default();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.error_code, "TRANSPORT_ERROR");
        assert_eq!(failure.stage, Stage::Upload);
        assert_eq!(transport.calls(Stage::Upload, "test1"), 1);
        assert_eq!(transport.total_calls(Stage::Publish), 0);
    }

    #[tokio::test]
    async fn test_upload_retry_then_publish() {
        let temp_dir = TempDir::new().unwrap();
        let mut package = package("test1", &archive(&temp_dir, "test1.zip"));
        package.publish = true;
        let transport = FakeTransport::new().script(Stage::Upload, "test1", &[Scripted::Reject]);
        let retry = retry_once();

        let result = PackagePublisher::new(&transport, &retry)
            .run(&package, &tokens())
            .await;

        assert!(result.published());
        assert_eq!(transport.calls(Stage::Upload, "test1"), 2);
        assert_eq!(transport.calls(Stage::Publish, "test1"), 1);
    }
}
