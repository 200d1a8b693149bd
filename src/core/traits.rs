//! Core traits and types for store uploads
//!
//! This module defines the upload result type and the narrow interfaces the
//! orchestrator uses to reach the store, the credential endpoint and the
//! host's hooks.

use crate::core::error::{Stage, UploadError};
use crate::core::package::{Account, Package};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Results
// ============================================================================

/// Terminal outcome of a successful pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSuccess {
    pub package_name: String,
    pub package_id: String,
    pub archive_used: PathBuf,
    /// True only when a publish call actually succeeded
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

/// Terminal outcome of a failed pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub package_name: String,
    pub package_id: String,
    pub archive_used: PathBuf,
    pub stage: Stage,
    pub error_code: String,
    pub error_detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl UploadFailure {
    /// Capture a package-level error as a failure result
    pub fn from_error(package: &Package, archive_used: &Path, error: &UploadError) -> Self {
        Self {
            package_name: package.name.clone(),
            package_id: package.item_id.clone(),
            archive_used: archive_used.to_path_buf(),
            stage: error.stage(),
            error_code: error.code().to_string(),
            error_detail: error.detail(),
            raw_response: error.raw_response().map(str::to_string),
        }
    }

    /// A failure is never published
    pub fn published(&self) -> bool {
        false
    }
}

/// Outcome of one package's pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadResult {
    Success(UploadSuccess),
    Failure(UploadFailure),
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn package_name(&self) -> &str {
        match self {
            Self::Success(s) => &s.package_name,
            Self::Failure(f) => &f.package_name,
        }
    }

    pub fn package_id(&self) -> &str {
        match self {
            Self::Success(s) => &s.package_id,
            Self::Failure(f) => &f.package_id,
        }
    }

    pub fn archive_used(&self) -> &Path {
        match self {
            Self::Success(s) => &s.archive_used,
            Self::Failure(f) => &f.archive_used,
        }
    }

    pub fn published(&self) -> bool {
        match self {
            Self::Success(s) => s.published,
            Self::Failure(f) => f.published(),
        }
    }

    pub fn as_failure(&self) -> Option<&UploadFailure> {
        match self {
            Self::Failure(f) => Some(f),
            Self::Success(_) => None,
        }
    }
}

// ============================================================================
// Store transport
// ============================================================================

/// Upload of one archive to an item
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub package: &'a Package,
    /// Resolved archive file
    pub archive: &'a Path,
    pub token: &'a SecretString,
}

/// Publish request for an uploaded item
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub package: &'a Package,
    pub token: &'a SecretString,
}

/// The two remote operations of the store
///
/// Implementations classify every failure as `UploadError::Transport` or
/// `UploadError::RemoteRejection`; the pipeline turns them into results.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Transport name used in logs (e.g., "webstore", "simulated")
    fn name(&self) -> &str;

    /// Upload the archive, returning the store's payload on success
    async fn upload(&self, request: UploadRequest<'_>) -> Result<serde_json::Value, UploadError>;

    /// Publish the item, returning the store's payload on success
    async fn publish(&self, request: PublishRequest<'_>)
    -> Result<serde_json::Value, UploadError>;
}

// ============================================================================
// Credentials
// ============================================================================

/// Source of bearer tokens for accounts
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtain a bearer token for the account
    ///
    /// Errors are `UploadError::AuthenticationFailed` and only affect the
    /// packages of that account.
    async fn acquire_token(&self, account: &Account) -> Result<SecretString, UploadError>;
}

// ============================================================================
// Host hooks
// ============================================================================

/// Callbacks the host receives during and after a run
///
/// Every hook is awaited before the run proceeds. Returning an error aborts
/// the run fatally.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called once per package right after it reached its terminal state
    async fn on_package_finished(&self, _result: &UploadResult) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per failed package, in selection order, after all chunks
    async fn on_error(&self, _failure: &UploadFailure) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once with every result after all error hooks acknowledged
    async fn on_complete(
        &self,
        _results: &[UploadResult],
        _message: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RunHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> UploadResult {
        UploadResult::Failure(UploadFailure {
            package_name: "test1".to_string(),
            package_id: "jcbeonnlikcefedeaijjln".to_string(),
            archive_used: PathBuf::from("test/files/test1.zip"),
            stage: Stage::Upload,
            error_code: "UPLOAD_REJECTED".to_string(),
            error_detail: "Invalid package".to_string(),
            raw_response: None,
        })
    }

    #[test]
    fn test_failure_is_never_published() {
        let result = failure();

        assert!(!result.is_success());
        assert!(!result.published());
        assert_eq!(result.package_name(), "test1");
        assert!(result.as_failure().is_some());
    }

    #[test]
    fn test_success_accessors() {
        let result = UploadResult::Success(UploadSuccess {
            package_name: "test2".to_string(),
            package_id: "jcbeonnlplijjln".to_string(),
            archive_used: PathBuf::from("dist/test2.zip"),
            published: true,
            response: None,
        });

        assert!(result.is_success());
        assert!(result.published());
        assert_eq!(result.package_id(), "jcbeonnlplijjln");
        assert_eq!(result.archive_used(), Path::new("dist/test2.zip"));
        assert!(result.as_failure().is_none());
    }

    #[test]
    fn test_result_serialization_is_tagged() {
        let json = serde_json::to_value(failure()).unwrap();

        assert_eq!(json["status"], "failure");
        assert_eq!(json["error_code"], "UPLOAD_REJECTED");
        assert_eq!(json["stage"], "upload");
        assert!(json.get("raw_response").is_none());
    }

    #[test]
    fn test_failure_from_error() {
        let package = Package {
            name: "test1".to_string(),
            item_id: "abc".to_string(),
            archive: PathBuf::from("dist"),
            account: "default".to_string(),
            publish: true,
            publish_target: None,
            group: None,
            simulation: Default::default(),
        };
        let error = UploadError::RemoteRejection {
            package: "test1".to_string(),
            stage: Stage::Publish,
            message: "Item not found".to_string(),
            raw: Some("{}".to_string()),
        };

        let failure = UploadFailure::from_error(&package, Path::new("dist/a.zip"), &error);

        assert_eq!(failure.error_code, "PUBLISH_REJECTED");
        assert_eq!(failure.stage, Stage::Publish);
        assert_eq!(failure.error_detail, "Item not found");
        assert_eq!(failure.raw_response.as_deref(), Some("{}"));
        assert_eq!(failure.archive_used, PathBuf::from("dist/a.zip"));
    }
}
