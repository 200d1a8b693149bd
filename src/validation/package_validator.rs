//! Pre-flight checks on selected packages
//!
//! Every failure here is a configuration error and aborts the run before any
//! network call.

use crate::core::error::UploadError;
use crate::core::package::Package;
use std::collections::HashMap;

/// Check one package against the configured accounts
pub fn validate_package<A>(package: &Package, accounts: &HashMap<String, A>) -> Result<(), UploadError> {
    if package.item_id.trim().is_empty() {
        return Err(UploadError::config(
            format!("extensions.{}.appId", package.name),
            "appId is required",
        ));
    }

    if package.archive.as_os_str().is_empty() {
        return Err(UploadError::config(
            format!("extensions.{}.zip", package.name),
            "zip is required",
        ));
    }

    if !accounts.contains_key(&package.account) {
        return Err(UploadError::config(
            format!("extensions.{}.account", package.name),
            format!("account \"{}\" is not configured", package.account),
        ));
    }

    Ok(())
}
