//! Package selection
//!
//! Turns the configuration plus the caller's filters into the ordered list of
//! packages a run processes and the accounts they use.

use crate::core::config::{AccountConfig, ExtensionConfig, UploadConfig};
use crate::core::error::UploadError;
use crate::core::package::{Account, DEFAULT_ACCOUNT, Package, SimulatedPublish, Simulation};
use crate::validation::package_validator::validate_package;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};

/// Filters restricting a run
#[derive(Debug, Clone, Default)]
pub struct SelectionFilters {
    /// Explicit package names (empty: all)
    pub packages: Vec<String>,
    /// Active accounts (empty: all)
    pub accounts: Vec<String>,
    /// Only packages in these groups (empty: all)
    pub groups: Vec<String>,
    pub excluded_groups: Vec<String>,
    pub excluded_packages: Vec<String>,
    /// Confirms an unfiltered run when `safeGlobalUpload` is set
    pub allow_global: bool,
    /// Free-text annotation handed to the completion hook
    pub message: Option<String>,
}

impl SelectionFilters {
    fn is_unfiltered(&self) -> bool {
        self.packages.is_empty() && self.groups.is_empty() && self.accounts.is_empty()
    }
}

/// Packages and accounts of one run
#[derive(Debug)]
pub struct Selection {
    /// Packages in configuration order
    pub packages: Vec<Package>,
    /// Accounts referenced by the selected packages
    pub accounts: HashMap<String, Account>,
    pub message: Option<String>,
}

impl Selection {
    /// Accounts referenced by at least one package
    pub fn referenced_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }
}

/// Resolve the packages of a run
///
/// Configuration problems abort with `ConfigError`; skipped packages are
/// logged and left out.
pub fn select(config: &UploadConfig, filters: &SelectionFilters) -> Result<Selection, UploadError> {
    if filters.is_unfiltered() && config.safe_global_upload() && !filters.allow_global {
        return Err(UploadError::config(
            "global",
            "Global release not allowed, use --global flag",
        ));
    }

    for name in &filters.accounts {
        if !config.accounts.contains_key(name) {
            return Err(UploadError::config(
                "account",
                format!("account \"{}\" is not configured", name),
            ));
        }
    }

    for name in &filters.packages {
        if config.extension(name).is_none() {
            return Err(UploadError::config(
                "extensions",
                format!("extension \"{}\" is not configured", name),
            ));
        }
    }

    // Without an account filter every account is active
    let active_accounts: Option<HashSet<&str>> = (!filters.accounts.is_empty())
        .then(|| filters.accounts.iter().map(String::as_str).collect());

    let mut packages = Vec::new();

    for (name, extension) in &config.extensions {
        if !filters.packages.is_empty() && !filters.packages.contains(name) {
            continue;
        }

        if !filters.groups.is_empty()
            && !extension
                .group
                .as_ref()
                .is_some_and(|group| filters.groups.contains(group))
        {
            continue;
        }

        let package = build_package(config, name, extension);

        let excluded_group = extension
            .group
            .as_ref()
            .is_some_and(|group| filters.excluded_groups.contains(group));

        if extension.skip == Some(true)
            || excluded_group
            || filters.excluded_packages.contains(name)
        {
            log_skip(&package);
            continue;
        }

        let inactive = active_accounts
            .as_ref()
            .is_some_and(|active| !active.contains(package.account.as_str()));

        if inactive || (config.skip_unpublished() && !package.publish) {
            log_skip(&package);
            continue;
        }

        validate_package(&package, &config.accounts)?;

        packages.push(package);
    }

    let referenced: HashSet<&str> = packages.iter().map(|p| p.account.as_str()).collect();
    let accounts = config
        .accounts
        .iter()
        .filter(|(name, _)| referenced.contains(name.as_str()))
        .map(|(name, account)| (name.clone(), to_account(name, account)))
        .collect();

    if packages.is_empty() {
        tracing::warn!("no packages selected");
    }

    Ok(Selection {
        packages,
        accounts,
        message: filters.message.clone(),
    })
}

fn build_package(config: &UploadConfig, name: &str, extension: &ExtensionConfig) -> Package {
    let account = extension
        .account
        .clone()
        .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

    let account_publish = config.accounts.get(&account).and_then(|a| a.publish);
    let publish = extension.publish.or(account_publish).unwrap_or(false);

    // Either level enables a flag; good is checked first
    let fake = config.fake.clone().unwrap_or_default();
    let simulated_publish =
        if extension.fake_good_publish == Some(true) || fake.good_publish == Some(true) {
            Some(SimulatedPublish::Good)
        } else if extension.fake_bad_publish == Some(true) || fake.bad_publish == Some(true) {
            Some(SimulatedPublish::Bad)
        } else {
            None
        };

    Package {
        name: name.to_string(),
        item_id: extension.app_id.clone().unwrap_or_default(),
        archive: extension.zip.clone().unwrap_or_default(),
        account,
        publish,
        publish_target: extension.publish_target.clone(),
        group: extension.group.clone(),
        simulation: Simulation {
            upload: config.fake_upload(),
            publish: simulated_publish,
        },
    }
}

/// Build a runtime account from its configuration entry
pub fn to_account(name: &str, config: &AccountConfig) -> Account {
    Account {
        name: name.to_string(),
        client_id: config.client_id.clone(),
        client_secret: SecretString::new(config.client_secret.clone().into()),
        refresh_token: config
            .refresh_token
            .as_ref()
            .filter(|token| !token.trim().is_empty())
            .map(|token| SecretString::new(token.clone().into())),
        publish: config.publish,
        cli_auth: config.cli_auth.unwrap_or(false),
    }
}

fn log_skip(package: &Package) {
    tracing::info!(package = %package.name, "Skip {}", package.archive.display());
}
