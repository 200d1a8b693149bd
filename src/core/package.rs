//! Packages and accounts as seen by the orchestrator
//!
//! Both are resolved from configuration during selection and stay immutable
//! for the rest of the run.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Account used when a package does not name one
pub const DEFAULT_ACCOUNT: &str = "default";

/// Simulated publish outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatedPublish {
    Good,
    Bad,
}

/// Which store calls are simulated instead of sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulation {
    pub upload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<SimulatedPublish>,
}

impl Simulation {
    pub fn is_active(&self) -> bool {
        self.upload || self.publish.is_some()
    }

    fn is_inactive(&self) -> bool {
        !self.is_active()
    }
}

/// A distributable archive plus its catalog identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    /// Configuration key of the package
    pub name: String,
    /// Item id in the store catalog
    pub item_id: String,
    /// Archive file, or directory holding archives
    pub archive: PathBuf,
    /// Account the package is uploaded with
    pub account: String,
    /// Resolved publish flag (package overrides account)
    pub publish: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Simulation::is_inactive")]
    pub simulation: Simulation,
}

/// Publisher identity bearing OAuth client credentials
#[derive(Debug)]
pub struct Account {
    pub name: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Account-level default publish flag
    pub publish: Option<bool>,
    /// Interactive code flow allowed when no refresh token is configured
    pub cli_auth: bool,
}

impl Account {
    /// Resolve the publish flag of a package on this account
    ///
    /// The package-level value wins; without either, nothing is published.
    pub fn resolve_publish(&self, package_publish: Option<bool>) -> bool {
        package_publish.or(self.publish).unwrap_or(false)
    }
}
