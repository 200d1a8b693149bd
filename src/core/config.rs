//! Configuration structures and types for webstore-publisher
//!
//! This module provides type-safe configuration management with serde support.

use crate::core::retry::RetryMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Packages processed concurrently per chunk unless configured
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// HTTP timeout per store call unless configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Hook command timeout unless configured
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_OAUTH_BASE: &str = "https://accounts.google.com";

fn default_version() -> String {
    "1.0".to_string()
}

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Publisher accounts by name
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,

    /// Packages by name, in file order
    #[serde(default, with = "ordered_map")]
    pub extensions: Vec<(String, ExtensionConfig)>,

    /// Run options (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsConfig>,

    /// Simulated store calls (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<FakeConfig>,

    /// Store endpoints (optional, public store by default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointsConfig>,

    /// Hook commands (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<HooksConfig>,

    /// Environment variable expansion settings (optional)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "envVarExpansion"
    )]
    pub env_var_expansion: Option<EnvVarExpansionConfig>,
}

/// Publisher account configuration
#[derive(Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AccountConfig {
    #[serde(default, rename = "clientId", alias = "client_id")]
    pub client_id: String,

    #[serde(default, rename = "clientSecret", alias = "client_secret")]
    pub client_secret: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "refreshToken",
        alias = "refresh_token"
    )]
    pub refresh_token: Option<String>,

    /// Publish right after uploading (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,

    /// Allow the interactive code flow (default: false)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "cliAuth",
        alias = "cli_auth"
    )]
    pub cli_auth: Option<bool>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("publish", &self.publish)
            .field("cli_auth", &self.cli_auth)
            .finish()
    }
}

/// Package configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExtensionConfig {
    /// Item id in the store (required)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "appId",
        alias = "appID"
    )]
    pub app_id: Option<String>,

    /// Archive file or directory with archives (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<PathBuf>,

    /// Account name (default: "default")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Overrides the account's publish flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,

    /// Publish target (e.g., "trustedTesters")
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "publishTarget"
    )]
    pub publish_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "fakeGoodPublish"
    )]
    pub fake_good_publish: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "fakeBadPublish"
    )]
    pub fake_bad_publish: Option<bool>,
}

/// Run options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OptionsConfig {
    /// Packages processed concurrently (default: 5)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "chunkSize")]
    pub chunk_size: Option<usize>,

    /// Ignore packages with `publish: false` (default: false)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "skipUnpublished"
    )]
    pub skip_unpublished: Option<bool>,

    /// Require the global flag for unfiltered runs (default: false)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "safeGlobalUpload"
    )]
    pub safe_global_upload: Option<bool>,

    /// HTTP timeout in seconds (default: 120)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RetryConfig {
    #[serde(default)]
    pub mode: RetryMode,

    /// Pause before the second attempt in milliseconds (default: 0)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "delayMs")]
    pub delay_ms: Option<u64>,
}

/// Simulated store calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FakeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "goodPublish")]
    pub good_publish: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "badPublish")]
    pub bad_publish: Option<bool>,
}

/// Store endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EndpointsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "uploadBase")]
    pub upload_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "apiBase")]
    pub api_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "oauthBase")]
    pub oauth_base: Option<String>,
}

/// Hooks configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HooksConfig {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "onError")]
    pub on_error: Option<Vec<HookCommand>>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "onComplete")]
    pub on_complete: Option<Vec<HookCommand>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "onPackageFinished"
    )]
    pub on_package_finished: Option<Vec<HookCommand>>,
}

/// Hook command configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookCommand {
    /// Program and arguments, split on whitespace (no shell)
    pub command: String,

    /// Timeout in seconds (default: 300)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Working directory (default: current directory)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "workingDirectory"
    )]
    pub working_directory: Option<String>,
}

/// Environment variable expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvVarExpansionConfig {
    /// Enable environment variable expansion (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Allowed environment variable prefixes (default: all)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "allowedPrefixes"
    )]
    pub allowed_prefixes: Option<Vec<String>>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            extends: None,
            accounts: HashMap::new(),
            extensions: Vec::new(),
            options: None,
            fake: None,
            endpoints: None,
            hooks: None,
            env_var_expansion: None,
        }
    }
}

impl UploadConfig {
    pub fn extension(&self, name: &str) -> Option<&ExtensionConfig> {
        self.extensions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, ext)| ext)
    }

    pub fn chunk_size(&self) -> usize {
        self.options
            .as_ref()
            .and_then(|o| o.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    pub fn skip_unpublished(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.skip_unpublished)
            .unwrap_or(false)
    }

    pub fn safe_global_upload(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.safe_global_upload)
            .unwrap_or(false)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.options
                .as_ref()
                .and_then(|o| o.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn retry_mode(&self) -> RetryMode {
        self.options
            .as_ref()
            .and_then(|o| o.retry.as_ref())
            .map(|r| r.mode)
            .unwrap_or_default()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(
            self.options
                .as_ref()
                .and_then(|o| o.retry.as_ref())
                .and_then(|r| r.delay_ms)
                .unwrap_or(0),
        )
    }

    pub fn fake_upload(&self) -> bool {
        self.fake.as_ref().and_then(|f| f.upload).unwrap_or(false)
    }

    pub fn upload_base(&self) -> &str {
        self.endpoints
            .as_ref()
            .and_then(|e| e.upload_base.as_deref())
            .unwrap_or(DEFAULT_UPLOAD_BASE)
    }

    pub fn api_base(&self) -> &str {
        self.endpoints
            .as_ref()
            .and_then(|e| e.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
    }

    pub fn oauth_base(&self) -> &str {
        self.endpoints
            .as_ref()
            .and_then(|e| e.oauth_base.as_deref())
            .unwrap_or(DEFAULT_OAUTH_BASE)
    }
}

/// Map (de)serialization that keeps file order
mod ordered_map {
    use serde::de::{DeserializeOwned, MapAccess, Visitor};
    use serde::{Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S, T>(entries: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: DeserializeOwned> Visitor<'de> for OrderedVisitor<T> {
            type Value = Vec<(String, T)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
accounts:
  default:
    publish: true
    clientId: ie204es2mninvnb.apps.googleusercontent.com
    clientSecret: LEJDeBHfS
  new_account:
    publish: true
    clientId: kie204es2mninvnb.apps.googleusercontent.com
    clientSecret: EbDeHfShcj
extensions:
  test2:
    account: new_account
    publish: false
    appID: jcbeonnlplijjln
    zip: test/files/test2.zip
  test1:
    appId: jcbeonnlikcefedeaijjln
    zip: test/files/test1.zip
options:
  chunkSize: 3
  retry:
    mode: transient
    delayMs: 250
"#;

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();

        assert_eq!(config.version, "1.0");
        assert_eq!(config.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert!(!config.safe_global_upload());
        assert_eq!(config.retry_mode(), RetryMode::Never);
        assert_eq!(config.upload_base(), DEFAULT_UPLOAD_BASE);
    }

    #[test]
    fn test_deserialize_keeps_extension_order() {
        let config: UploadConfig = serde_yaml::from_str(SAMPLE).unwrap();

        let names: Vec<&str> = config.extensions.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["test2", "test1"]);
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_deserialize_extension_fields() {
        let config: UploadConfig = serde_yaml::from_str(SAMPLE).unwrap();

        let test2 = config.extension("test2").unwrap();
        assert_eq!(test2.app_id.as_deref(), Some("jcbeonnlplijjln"));
        assert_eq!(test2.account.as_deref(), Some("new_account"));
        assert_eq!(test2.publish, Some(false));
        assert_eq!(test2.zip, Some(PathBuf::from("test/files/test2.zip")));
        assert!(config.extension("missing").is_none());
    }

    #[test]
    fn test_option_accessors() {
        let config: UploadConfig = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.chunk_size(), 3);
        assert_eq!(config.retry_mode(), RetryMode::Transient);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.accounts["default"].publish, Some(true));
    }

    #[test]
    fn test_serialize_round_trips_order() {
        let config: UploadConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let test2 = yaml.find("test2:").unwrap();
        let test1 = yaml.find("test1:").unwrap();
        assert!(test2 < test1);
    }

    #[test]
    fn test_account_debug_is_redacted() {
        let config: UploadConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config.accounts["default"]);

        assert!(!debug.contains("LEJDeBHfS"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_empty_extensions() {
        let config: UploadConfig = serde_yaml::from_str("extensions:\n").unwrap();
        assert!(config.extensions.is_empty());
    }
}
