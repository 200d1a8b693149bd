//! Per-run access token cache with masking capabilities
//!
//! Tokens are acquired once per account before any package is processed and
//! shared read-only by every pipeline of the run. They are wrapped in
//! `secrecy` types so they never reach logs or debug output.

use crate::core::error::UploadError;
use crate::core::package::Account;
use crate::core::traits::CredentialProvider;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Access tokens of one run, keyed by account name
///
/// An account whose acquisition failed keeps the failure message, so each of
/// its packages reports `AUTHENTICATION_FAILED` without another network call.
#[derive(Default)]
pub struct AccountTokens {
    tokens: HashMap<String, Result<SecretString, String>>,
}

impl AccountTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire one token per account, in account-name order
    pub async fn acquire<'a, I>(accounts: I, provider: &dyn CredentialProvider) -> Self
    where
        I: IntoIterator<Item = &'a Account>,
    {
        let mut accounts: Vec<&Account> = accounts.into_iter().collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        accounts.dedup_by(|a, b| a.name == b.name);

        let mut tokens = Self::new();

        for account in accounts {
            tracing::info!(account = %account.name, "acquiring access token");

            let outcome = provider.acquire_token(account).await;
            if let Err(error) = &outcome {
                tracing::warn!(account = %account.name, error = %error.detail(), "token acquisition failed");
            }

            tokens.insert(&account.name, outcome);
        }

        tokens
    }

    /// Record an acquisition outcome for an account
    pub fn insert(&mut self, account: &str, outcome: Result<SecretString, UploadError>) {
        self.tokens
            .insert(account.to_string(), outcome.map_err(|e| e.detail()));
    }

    /// Token of the account, or the authentication failure to report
    pub fn get(&self, account: &str) -> Result<&SecretString, UploadError> {
        match self.tokens.get(account) {
            Some(Ok(token)) => Ok(token),
            Some(Err(message)) => Err(UploadError::AuthenticationFailed {
                account: account.to_string(),
                message: message.clone(),
            }),
            None => Err(UploadError::AuthenticationFailed {
                account: account.to_string(),
                message: "no access token was acquired for this account".to_string(),
            }),
        }
    }

    /// Masks every acquired token in a string
    ///
    /// Used on remote payloads before they are logged or reported.
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for token in self.tokens.values().filter_map(|t| t.as_ref().ok()) {
            let token_str = token.expose_secret();
            if token_str.is_empty() {
                continue;
            }
            if let Ok(regex) = Regex::new(&regex::escape(token_str)) {
                let masked_token = mask_token(token_str);
                masked = regex
                    .replace_all(&masked, regex::NoExpand(&masked_token))
                    .to_string();
            }
        }

        masked
    }
}

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use webstore_publisher::security::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
