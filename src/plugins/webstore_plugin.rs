//! Web store transport
//!
//! Uploads archives and publishes items through the store's HTTP API.

use crate::core::config::UploadConfig;
use crate::core::error::{Stage, UploadError};
use crate::core::package::Package;
use crate::core::traits::{PublishRequest, TransportClient, UploadRequest};
use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::CONTENT_LENGTH;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

const API_VERSION_HEADER: &str = "x-goog-api-version";
const API_VERSION: &str = "2";
const ITEMS_PATH: &str = "chromewebstore/v1.1/items";

/// HTTP client for the upload and publish endpoints
pub struct WebstoreClient {
    client: reqwest::Client,
    upload_base: String,
    api_base: String,
}

impl WebstoreClient {
    pub fn new(upload_base: &str, api_base: &str, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::config("endpoints", e.to_string()))?;

        Ok(Self {
            client,
            upload_base: upload_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        Self::new(config.upload_base(), config.api_base(), config.timeout())
    }

    pub fn upload_url(&self, item_id: &str) -> String {
        format!("{}/upload/{}/{}", self.upload_base, ITEMS_PATH, item_id)
    }

    pub fn publish_url(&self, item_id: &str, target: Option<&str>) -> Result<Url, UploadError> {
        let mut url = Url::parse(&format!("{}/{}/{}/publish", self.api_base, ITEMS_PATH, item_id))
            .map_err(|e| UploadError::config("endpoints.apiBase", e.to_string()))?;
        if let Some(target) = target {
            url.query_pairs_mut().append_pair("publishTarget", target);
        }
        Ok(url)
    }

    fn transport_error(package: &Package, stage: Stage, error: reqwest::Error) -> UploadError {
        let message = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else {
            error.to_string()
        };

        UploadError::Transport {
            package: package.name.clone(),
            stage,
            message,
        }
    }
}

#[async_trait]
impl TransportClient for WebstoreClient {
    fn name(&self) -> &str {
        "webstore"
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<Value, UploadError> {
        let package = request.package;

        let body = tokio::fs::read(request.archive)
            .await
            .map_err(|_| UploadError::ArchiveNotFound {
                package: package.name.clone(),
                path: request.archive.to_path_buf(),
            })?;

        let response = self
            .client
            .put(self.upload_url(&package.item_id))
            .bearer_auth(request.token.expose_secret())
            .header(API_VERSION_HEADER, API_VERSION)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transport_error(package, Stage::Upload, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Self::transport_error(package, Stage::Upload, e))?;

        parse_upload_response(package, status, &text)
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<Value, UploadError> {
        let package = request.package;

        let url = self
            .publish_url(&package.item_id, package.publish_target.as_deref())
            .map_err(|e| UploadError::Transport {
                package: package.name.clone(),
                stage: Stage::Publish,
                message: e.detail(),
            })?;

        let response = self
            .client
            .post(url)
            .bearer_auth(request.token.expose_secret())
            .header(API_VERSION_HEADER, API_VERSION)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| Self::transport_error(package, Stage::Publish, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Self::transport_error(package, Stage::Publish, e))?;

        parse_publish_response(package, status, &text)
    }
}

/// Classify an upload response
///
/// Success requires `uploadState == "SUCCESS"`; the detail of a rejection
/// comes from `error.message` or `itemError[0].error_detail`.
pub fn parse_upload_response(
    package: &Package,
    status: u16,
    body: &str,
) -> Result<Value, UploadError> {
    let value = parse_json(package, Stage::Upload, status, body)?;

    if value.get("uploadState").and_then(Value::as_str) == Some("SUCCESS") {
        return Ok(value);
    }

    let message = value
        .pointer("/error/message")
        .or_else(|| value.pointer("/itemError/0/error_detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let state = value
                .get("uploadState")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!("upload state {} (HTTP {})", state, status)
        });

    Err(rejection(package, Stage::Upload, message, body))
}

/// Classify a publish response; any `error` member is a rejection
pub fn parse_publish_response(
    package: &Package,
    status: u16,
    body: &str,
) -> Result<Value, UploadError> {
    let value = parse_json(package, Stage::Publish, status, body)?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(|m| format!("{} Please check configuration at Developer Dashboard", m))
            .unwrap_or_else(|| "Please check configuration at Developer Dashboard".to_string());
        return Err(rejection(package, Stage::Publish, message, body));
    }

    if !(200..300).contains(&status) {
        return Err(rejection(
            package,
            Stage::Publish,
            format!("HTTP {}", status),
            body,
        ));
    }

    Ok(value)
}

fn parse_json(package: &Package, stage: Stage, status: u16, body: &str) -> Result<Value, UploadError> {
    serde_json::from_str(body).map_err(|_| {
        rejection(
            package,
            stage,
            format!("unexpected non-JSON response (HTTP {})", status),
            body,
        )
    })
}

fn rejection(package: &Package, stage: Stage, message: String, body: &str) -> UploadError {
    UploadError::RemoteRejection {
        package: package.name.clone(),
        stage,
        message,
        raw: Some(body.to_string()),
    }
}
