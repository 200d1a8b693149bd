//! OAuth credential provider
//!
//! Exchanges an account's refresh token for a bearer token. Accounts with
//! `cliAuth` and no refresh token go through the authorization-code flow:
//! the user opens a URL, pastes the code, and the code is exchanged.

use crate::core::config::UploadConfig;
use crate::core::error::UploadError;
use crate::core::package::Account;
use crate::core::traits::CredentialProvider;
use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

const SCOPE: &str = "https://www.googleapis.com/auth/chromewebstore";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Tokens returned by a successful exchange
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Only present for the authorization-code flow
    pub refresh_token: Option<SecretString>,
}

pub struct OAuthCredentialProvider {
    client: reqwest::Client,
    oauth_base: String,
    interactive: bool,
}

impl OAuthCredentialProvider {
    pub fn new(oauth_base: &str, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::config("endpoints.oauthBase", e.to_string()))?;

        Ok(Self {
            client,
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            interactive: true,
        })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        Self::new(config.oauth_base(), config.timeout())
    }

    /// Disable the code prompt; `cliAuth` accounts without a refresh token fail
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn token_url(&self) -> String {
        format!("{}/o/oauth2/token", self.oauth_base)
    }

    /// URL the user opens to obtain an authorization code
    pub fn auth_url(&self, account: &Account) -> Result<Url, UploadError> {
        Url::parse_with_params(
            &format!("{}/o/oauth2/auth", self.oauth_base),
            &[
                ("response_type", "code"),
                ("scope", SCOPE),
                ("client_id", account.client_id.as_str()),
                ("redirect_uri", REDIRECT_URI),
            ],
        )
        .map_err(|e| UploadError::config("endpoints.oauthBase", e.to_string()))
    }

    /// Run the authorization-code flow for an account
    ///
    /// Prints a hint when the account has no refresh token configured yet.
    pub async fn authorize(&self, account: &Account) -> Result<TokenGrant, UploadError> {
        let url = self.auth_url(account)?;
        let code = prompt_code(&url)
            .await
            .map_err(|e| auth_failed(account, format!("failed to read code: {}", e)))?;

        if code.is_empty() {
            return Err(auth_failed(account, "no authorization code entered"));
        }

        let grant = self
            .exchange(
                account,
                &[
                    ("code", code.as_str()),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", REDIRECT_URI),
                ],
            )
            .await?;

        if account.refresh_token.is_none()
            && let Some(ref refresh_token) = grant.refresh_token
        {
            println!(
                "Add refreshToken: {} to account '{}' to skip this prompt next time",
                refresh_token.expose_secret(),
                account.name
            );
        }

        Ok(grant)
    }

    async fn refresh(&self, account: &Account, refresh_token: &SecretString) -> Result<TokenGrant, UploadError> {
        self.exchange(
            account,
            &[
                ("refresh_token", refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ],
        )
        .await
    }

    async fn exchange(&self, account: &Account, grant: &[(&str, &str)]) -> Result<TokenGrant, UploadError> {
        let mut form = vec![
            ("client_id", account.client_id.as_str()),
            ("client_secret", account.client_secret.expose_secret()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .client
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| auth_failed(account, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| auth_failed(account, e.to_string()))?;

        parse_token_response(account, status, &body)
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    async fn acquire_token(&self, account: &Account) -> Result<SecretString, UploadError> {
        if let Some(ref refresh_token) = account.refresh_token {
            return Ok(self.refresh(account, refresh_token).await?.access_token);
        }

        if !account.cli_auth {
            return Err(auth_failed(
                account,
                "no refreshToken configured and cliAuth is disabled",
            ));
        }

        if !self.interactive {
            return Err(auth_failed(
                account,
                "cliAuth requires an interactive terminal",
            ));
        }

        Ok(self.authorize(account).await?.access_token)
    }
}

/// Parse the token endpoint's response
pub fn parse_token_response(
    account: &Account,
    status: u16,
    body: &str,
) -> Result<TokenGrant, UploadError> {
    let response: TokenResponse = serde_json::from_str(body).map_err(|_| {
        auth_failed(
            account,
            format!("unexpected token response (HTTP {})", status),
        )
    })?;

    if let Some(error) = response.error {
        let message = match response.error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        };
        return Err(auth_failed(account, message));
    }

    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| auth_failed(account, format!("no access_token in response (HTTP {})", status)))?;

    Ok(TokenGrant {
        access_token: SecretString::new(access_token.into()),
        refresh_token: response.refresh_token.map(|t| SecretString::new(t.into())),
    })
}

fn auth_failed(account: &Account, message: impl Into<String>) -> UploadError {
    UploadError::AuthenticationFailed {
        account: account.name.clone(),
        message: message.into(),
    }
}

async fn prompt_code(url: &Url) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout
        .write_all(format!("Please open {} and enter code: ", url).as_bytes())
        .await?;
    stdout.flush().await?;

    let mut reader = BufReader::new(io::stdin());
    let mut code = String::new();
    reader.read_line(&mut code).await?;

    Ok(code.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_OAUTH_BASE;
    use crate::test_support::account;

    fn provider() -> OAuthCredentialProvider {
        OAuthCredentialProvider::new(DEFAULT_OAUTH_BASE, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_token_url() {
        assert_eq!(
            provider().token_url(),
            "https://accounts.google.com/o/oauth2/token"
        );
    }

    #[test]
    fn test_auth_url_carries_client_and_scope() {
        let account = account("default");

        let url = provider().auth_url(&account).unwrap();
        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.path(), "/o/oauth2/auth");
        assert!(params.contains(&("response_type".into(), "code".into())));
        assert!(params.contains(&("scope".into(), SCOPE.into())));
        assert!(params.contains(&("client_id".into(), account.client_id.clone())));
        assert!(params.contains(&("redirect_uri".into(), REDIRECT_URI.into())));
    }

    #[test]
    fn test_parse_token_success() {
        let account = account("default");
        let body = r#"{"access_token":"ya29.token","expires_in":3600,"token_type":"Bearer"}"#;

        let grant = parse_token_response(&account, 200, body).unwrap();

        assert_eq!(grant.access_token.expose_secret(), "ya29.token");
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_parse_token_with_refresh_token() {
        let account = account("default");
        let body = r#"{"access_token":"ya29.token","refresh_token":"1//refresh"}"#;

        let grant = parse_token_response(&account, 200, body).unwrap();

        assert_eq!(grant.refresh_token.unwrap().expose_secret(), "1//refresh");
    }

    #[test]
    fn test_parse_token_error() {
        let account = account("second");
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;

        let error = parse_token_response(&account, 400, body).unwrap_err();

        assert_eq!(error.code(), "AUTHENTICATION_FAILED");
        assert_eq!(error.subject(), "second");
        assert_eq!(error.detail(), "invalid_grant: Bad Request");
    }

    #[test]
    fn test_parse_token_missing_access_token() {
        let account = account("default");

        let error = parse_token_response(&account, 200, "{}").unwrap_err();

        assert!(error.detail().contains("no access_token"));
    }

    #[test]
    fn test_parse_token_non_json() {
        let account = account("default");

        let error = parse_token_response(&account, 503, "unavailable").unwrap_err();

        assert!(error.detail().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_account_without_credentials_fails() {
        let mut account = account("default");
        account.refresh_token = None;
        account.cli_auth = false;

        let error = provider().acquire_token(&account).await.unwrap_err();

        assert_eq!(error.code(), "AUTHENTICATION_FAILED");
    }

    #[tokio::test]
    async fn test_cli_auth_requires_interactive_terminal() {
        let mut account = account("default");
        account.refresh_token = None;
        account.cli_auth = true;

        let error = provider()
            .non_interactive()
            .acquire_token(&account)
            .await
            .unwrap_err();

        assert!(error.detail().contains("interactive"));
    }
}
