//! Error handling for store uploads
//!
//! This module provides the error taxonomy of a run with recovery guidance,
//! using the thiserror crate for ergonomic error handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error or result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Checks made before any network call
    Preflight,
    Upload,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Upload => "upload",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for upload runs
#[derive(Error, Debug)]
pub enum UploadError {
    // Pre-flight errors
    #[error("[{field}] configuration error: {message}")]
    ConfigError { field: String, message: String },

    #[error("[{package}] archive not found: {}", .path.display())]
    ArchiveNotFound { package: String, path: PathBuf },

    // Credential errors
    #[error("[{account}] authentication failed: {message}")]
    AuthenticationFailed { account: String, message: String },

    // Network errors
    #[error("[{package}] network error during {stage}: {message}")]
    Transport {
        package: String,
        stage: Stage,
        message: String,
    },

    #[error("[{package}] {stage} rejected by the store: {message}")]
    RemoteRejection {
        package: String,
        stage: Stage,
        message: String,
        raw: Option<String>,
    },

    // Aggregation errors
    #[error("{hook} hook failed: {message}")]
    HookFailed { hook: String, message: String },
}

impl UploadError {
    /// Shorthand for a configuration error on the given field
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the package, account, field or hook name this error is about
    pub fn subject(&self) -> &str {
        match self {
            Self::ConfigError { field, .. } => field,
            Self::ArchiveNotFound { package, .. }
            | Self::Transport { package, .. }
            | Self::RemoteRejection { package, .. } => package,
            Self::AuthenticationFailed { account, .. } => account,
            Self::HookFailed { hook, .. } => hook,
        }
    }

    /// Check if this error aborts the whole run
    ///
    /// Everything else is recovered into a per-package failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::HookFailed { .. })
    }

    /// Stage the error happened in, for package-level errors
    pub fn stage(&self) -> Stage {
        match self {
            Self::Transport { stage, .. } | Self::RemoteRejection { stage, .. } => *stage,
            _ => Stage::Preflight,
        }
    }

    /// Raw remote payload, when the store answered with one
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::RemoteRejection { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }

    /// Human-readable detail without the subject prefix
    pub fn detail(&self) -> String {
        match self {
            Self::ConfigError { message, .. }
            | Self::AuthenticationFailed { message, .. }
            | Self::Transport { message, .. }
            | Self::RemoteRejection { message, .. }
            | Self::HookFailed { message, .. } => message.clone(),
            Self::ArchiveNotFound { path, .. } => {
                format!("no archive found at {}", path.display())
            }
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::ConfigError { .. } => vec![
                "Check the configuration file",
                "Run `webstore-publisher check` to validate it",
            ],
            Self::ArchiveNotFound { .. } => vec![
                "Build the archive before uploading",
                "Point `zip` at a file or at a directory containing .zip files",
            ],
            Self::AuthenticationFailed { .. } => vec![
                "Check clientId and clientSecret of the account",
                "Refresh tokens expire when revoked, run `webstore-publisher auth <account>`",
            ],
            Self::Transport { .. } => vec![
                "Check the network connection",
                "Retry later or enable `options.retry.mode: transient`",
            ],
            Self::RemoteRejection { stage: Stage::Publish, .. } => vec![
                "Check the item configuration at the Developer Dashboard",
                "Check the publishTarget value",
            ],
            Self::RemoteRejection { .. } => vec![
                "Check the error detail returned by the store",
                "Make sure the manifest version was bumped",
            ],
            Self::HookFailed { .. } => vec!["Check the hook command and its output"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::ArchiveNotFound { .. } => "ARCHIVE_NOT_FOUND",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::RemoteRejection {
                stage: Stage::Publish,
                ..
            } => "PUBLISH_REJECTED",
            Self::RemoteRejection { .. } => "UPLOAD_REJECTED",
            Self::HookFailed { .. } => "HOOK_FAILED",
        }
    }
}
