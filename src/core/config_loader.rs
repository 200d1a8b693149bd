//! Configuration file loader for webstore-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::UploadError;
use crate::core::package::DEFAULT_ACCOUNT;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = "webstore-upload.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Depth limit for `extends` chains
const MAX_EXTENDS_DEPTH: usize = 8;

/// Overrides taken from the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub chunk_size: Option<usize>,
    pub fake_upload: Option<bool>,
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Configuration file to load
    pub config_path: PathBuf,

    /// CLI overrides (highest priority)
    pub overrides: ConfigOverrides,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Load `webstore-upload.yaml` from the project directory with the process environment
    pub fn for_project(project_path: &Path) -> Self {
        Self {
            config_path: project_path.join(CONFIG_FILENAME),
            overrides: ConfigOverrides::default(),
            env: std::env::vars().collect(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

impl ConfigValidationResult {
    /// First error as a fatal `UploadError`, if any
    pub fn into_error(self) -> Option<UploadError> {
        self.errors
            .into_iter()
            .next()
            .map(|e| UploadError::config(e.field, e.message))
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "extensions.test1.appId")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<UploadConfig, UploadError>> + Send + 'a>>;

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI overrides
    /// 2. Environment variables (WEBSTORE_CHUNK_SIZE, WEBSTORE_FAKE_UPLOAD)
    /// 3. Configuration file, merged over the files it extends
    pub async fn load(options: ConfigLoadOptions) -> Result<UploadConfig, UploadError> {
        if !options.config_path.exists() {
            return Err(UploadError::config(
                "config",
                format!(
                    "configuration file not found: {}",
                    options.config_path.display()
                ),
            ));
        }

        let mut config = Self::load_config_file(&options.config_path, 0).await?;

        Self::apply_env(&mut config, &options.env)?;
        Self::apply_overrides(&mut config, &options.overrides);

        let config = Self::expand_env_vars(config, &options.env)?;

        tracing::debug!(
            path = %options.config_path.display(),
            accounts = config.accounts.len(),
            extensions = config.extensions.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Parse configuration from a YAML string without extends or env handling
    pub fn from_yaml(content: &str) -> Result<UploadConfig, UploadError> {
        serde_yaml::from_str(content)
            .map_err(|e| UploadError::config("config", format!("Failed to parse YAML config: {}", e)))
    }

    /// Load configuration from YAML file, resolving `extends`
    fn load_config_file(file_path: &Path, depth: usize) -> LoadFuture<'_> {
        Box::pin(async move {
            if depth > MAX_EXTENDS_DEPTH {
                return Err(UploadError::config(
                    "extends",
                    format!("extends chain deeper than {}", MAX_EXTENDS_DEPTH),
                ));
            }

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                UploadError::config(
                    "config",
                    format!("Failed to read {}: {}", file_path.display(), e),
                )
            })?;

            let config = Self::from_yaml(&content)?;

            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| UploadError::config("extends", "Invalid config file path"))?
                    .join(extends_path);

                let base_config = Self::load_config_file(&base_path, depth + 1).await?;
                return Ok(Self::merge_configs(vec![base_config, config]));
            }

            Ok(config)
        })
    }

    /// Apply environment variable overrides
    fn apply_env(
        config: &mut UploadConfig,
        env: &HashMap<String, String>,
    ) -> Result<(), UploadError> {
        // WEBSTORE_CHUNK_SIZE -> options.chunkSize
        if let Some(raw) = env.get("WEBSTORE_CHUNK_SIZE") {
            let chunk_size = raw.trim().parse::<usize>().map_err(|_| {
                UploadError::config(
                    "WEBSTORE_CHUNK_SIZE",
                    format!("expected a positive integer, got {:?}", raw),
                )
            })?;
            config.options.get_or_insert_with(Default::default).chunk_size = Some(chunk_size);
        }

        // WEBSTORE_FAKE_UPLOAD -> fake.upload
        if let Some(raw) = env.get("WEBSTORE_FAKE_UPLOAD") {
            let enabled = matches!(raw.as_str(), "true" | "1");
            config.fake.get_or_insert_with(Default::default).upload = Some(enabled);
        }

        Ok(())
    }

    fn apply_overrides(config: &mut UploadConfig, overrides: &ConfigOverrides) {
        if let Some(chunk_size) = overrides.chunk_size {
            config.options.get_or_insert_with(Default::default).chunk_size = Some(chunk_size);
        }
        if let Some(fake_upload) = overrides.fake_upload {
            config.fake.get_or_insert_with(Default::default).upload = Some(fake_upload);
        }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<UploadConfig>) -> UploadConfig {
        let mut result = UploadConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut UploadConfig, source: UploadConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if source.extends.is_some() {
            target.extends = source.extends;
        }

        // Accounts and extensions merge by name; an overridden extension keeps its position
        target.accounts.extend(source.accounts);

        for (name, extension) in source.extensions {
            match target.extensions.iter_mut().find(|(key, _)| *key == name) {
                Some((_, existing)) => *existing = extension,
                None => target.extensions.push((name, extension)),
            }
        }

        if source.options.is_some() {
            target.options = source.options;
        }
        if source.fake.is_some() {
            target.fake = source.fake;
        }
        if source.endpoints.is_some() {
            target.endpoints = source.endpoints;
        }
        if source.hooks.is_some() {
            target.hooks = source.hooks;
        }
        if source.env_var_expansion.is_some() {
            target.env_var_expansion = source.env_var_expansion;
        }
    }

    /// Expand environment variables in account credentials
    ///
    /// Only `${VAR_NAME}` references are expanded, restricted to
    /// `allowedPrefixes` when configured.
    fn expand_env_vars(
        mut config: UploadConfig,
        env: &HashMap<String, String>,
    ) -> Result<UploadConfig, UploadError> {
        let expansion = config.env_var_expansion.clone().unwrap_or_default();

        if !expansion.enabled.unwrap_or(true) {
            return Ok(config);
        }

        let pattern = Regex::new(ENV_VAR_PATTERN)
            .map_err(|e| UploadError::config("envVarExpansion", e.to_string()))?;
        let allowed_prefixes = expansion.allowed_prefixes;

        for account in config.accounts.values_mut() {
            account.client_id = Self::expand_string(&account.client_id, env, &allowed_prefixes, &pattern);
            account.client_secret =
                Self::expand_string(&account.client_secret, env, &allowed_prefixes, &pattern);
            if let Some(token) = &account.refresh_token {
                account.refresh_token = Some(Self::expand_string(token, env, &allowed_prefixes, &pattern));
            }
        }

        Ok(config)
    }

    /// Expand environment variables in a single string
    fn expand_string(
        input: &str,
        env: &HashMap<String, String>,
        allowed_prefixes: &Option<Vec<String>>,
        pattern: &Regex,
    ) -> String {
        let mut result = input.to_string();

        for cap in pattern.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(prefixes) = allowed_prefixes
                && !prefixes.iter().any(|prefix| var_name.starts_with(prefix))
            {
                tracing::warn!(variable = var_name, "not allowed by prefix whitelist, skipping");
                continue;
            }

            match env.get(var_name) {
                Some(value) => result = result.replace(&format!("${{{}}}", var_name), value),
                None => tracing::warn!(variable = var_name, "environment variable not found"),
            }
        }

        result
    }

    /// Validate configuration
    pub fn validate(config: &UploadConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Accounts and extensions; fatal only for selected packages
        Self::validate_accounts(&config.accounts, &mut warnings);
        Self::validate_extensions(config, &mut warnings);

        // 3. Options
        if let Some(options) = &config.options {
            Self::validate_options(options, &mut errors);
        }

        // 4. Hooks
        if let Some(hooks) = &config.hooks {
            Self::validate_hooks(hooks, &mut errors);
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_accounts(
        accounts: &HashMap<String, AccountConfig>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let mut names: Vec<&String> = accounts.keys().collect();
        names.sort();

        for name in names {
            let account = &accounts[name];

            for (field, value) in [
                ("clientId", &account.client_id),
                ("clientSecret", &account.client_secret),
            ] {
                if value.trim().is_empty() {
                    warnings.push(ConfigValidationWarning {
                        field: format!("accounts.{}.{}", name, field),
                        message: format!("{} is empty", field),
                        suggestion: Some(
                            "Token requests of this account will fail".to_string(),
                        ),
                    });
                } else if value.contains("${") {
                    warnings.push(ConfigValidationWarning {
                        field: format!("accounts.{}.{}", name, field),
                        message: "contains an unexpanded environment variable".to_string(),
                        suggestion: Some("Export the variable before running".to_string()),
                    });
                }
            }

            if account.refresh_token.is_none() && !account.cli_auth.unwrap_or(false) {
                warnings.push(ConfigValidationWarning {
                    field: format!("accounts.{}.refreshToken", name),
                    message: "no refresh token and cliAuth is disabled".to_string(),
                    suggestion: Some(format!("Run `webstore-publisher auth {}`", name)),
                });
            }
        }
    }

    fn validate_extensions(config: &UploadConfig, warnings: &mut Vec<ConfigValidationWarning>) {
        if config.extensions.is_empty() {
            warnings.push(ConfigValidationWarning {
                field: "extensions".to_string(),
                message: "no extensions configured".to_string(),
                suggestion: None,
            });
        }

        for (name, extension) in &config.extensions {
            if extension.app_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
                warnings.push(Self::required_when_selected(name, "appId"));
            }

            if extension
                .zip
                .as_deref()
                .is_none_or(|zip| zip.as_os_str().is_empty())
            {
                warnings.push(Self::required_when_selected(name, "zip"));
            }

            let account = extension.account.as_deref().unwrap_or(DEFAULT_ACCOUNT);
            if !config.accounts.contains_key(account) {
                warnings.push(ConfigValidationWarning {
                    field: format!("extensions.{}.account", name),
                    message: format!("account \"{}\" is not configured", account),
                    suggestion: Some("Selecting this extension aborts the run".to_string()),
                });
            }

            if extension.fake_good_publish == Some(true) && extension.fake_bad_publish == Some(true)
            {
                warnings.push(ConfigValidationWarning {
                    field: format!("extensions.{}", name),
                    message: "fakeGoodPublish and fakeBadPublish are both set".to_string(),
                    suggestion: Some("fakeGoodPublish takes precedence".to_string()),
                });
            }

            if extension.publish_target.is_some() && extension.publish == Some(false) {
                warnings.push(ConfigValidationWarning {
                    field: format!("extensions.{}.publishTarget", name),
                    message: "publishTarget has no effect when publish is false".to_string(),
                    suggestion: None,
                });
            }
        }
    }

    fn required_when_selected(extension: &str, field: &str) -> ConfigValidationWarning {
        ConfigValidationWarning {
            field: format!("extensions.{}.{}", extension, field),
            message: format!("{} is missing", field),
            suggestion: Some("Selecting this extension aborts the run".to_string()),
        }
    }

    fn validate_options(options: &OptionsConfig, errors: &mut Vec<ConfigValidationError>) {
        if options.chunk_size == Some(0) {
            errors.push(ConfigValidationError {
                field: "options.chunkSize".to_string(),
                message: "chunkSize must be at least 1".to_string(),
                expected: Some("positive integer".to_string()),
                actual: Some("0".to_string()),
            });
        }

        if options.timeout_secs == Some(0) {
            errors.push(ConfigValidationError {
                field: "options.timeoutSecs".to_string(),
                message: "timeoutSecs must be at least 1".to_string(),
                expected: Some("positive integer".to_string()),
                actual: Some("0".to_string()),
            });
        }
    }

    /// Validate hooks configuration
    fn validate_hooks(hooks: &HooksConfig, errors: &mut Vec<ConfigValidationError>) {
        let hook_types = [
            ("onError", &hooks.on_error),
            ("onComplete", &hooks.on_complete),
            ("onPackageFinished", &hooks.on_package_finished),
        ];

        for (hook_type, hook_commands) in hook_types {
            if let Some(commands) = hook_commands {
                for (i, hook) in commands.iter().enumerate() {
                    if hook.command.trim().is_empty() {
                        errors.push(ConfigValidationError {
                            field: format!("hooks.{}[{}].command", hook_type, i),
                            message: "command is required".to_string(),
                            expected: Some("non-empty string".to_string()),
                            actual: Some("empty".to_string()),
                        });
                    }
                }
            }
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
