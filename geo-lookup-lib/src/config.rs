//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `GEO_*`
//! environment variables, and merging them with proper precedence rules.

use crate::error::LookupError;
use crate::types::LookupConfig;
use crate::utils::parse_timeout;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for lookup options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Default concurrency level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Overall run timeout (as string, e.g., "5s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Per-lookup timeout (as string, e.g., "2s", "750ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,

    /// Geolocation API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Response language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Default output format ("text", "json" or "csv")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_format: Option<String>,

    /// Include CSV headers by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_headers: Option<bool>,

    /// Pretty-print JSON by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_pretty: Option<bool>,
}

impl FileConfig {
    /// Apply the `[defaults]` section on top of `config`.
    ///
    /// Values are validated at load time, so unparsable entries cannot reach
    /// this point through [`ConfigManager`].
    pub fn apply_to(&self, mut config: LookupConfig) -> LookupConfig {
        if let Some(defaults) = &self.defaults {
            if let Some(concurrency) = defaults.concurrency {
                config.concurrency = concurrency;
            }
            if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_timeout) {
                config.timeout = timeout;
            }
            if let Some(timeout) = defaults.request_timeout.as_deref().and_then(parse_timeout) {
                config.request_timeout = timeout;
            }
            if let Some(endpoint) = &defaults.endpoint {
                config.endpoint = endpoint.clone();
            }
            if let Some(lang) = &defaults.lang {
                config.lang = Some(lang.clone());
            }
        }
        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, LookupError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LookupError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            LookupError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| LookupError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// Lowest to highest: XDG config, home directory, current directory.
    /// Missing files are skipped; a file that exists but is invalid is an
    /// error.
    pub fn discover_and_load(&self) -> Result<FileConfig, LookupError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged_config = self.merge_configs(merged_config, config);
            loaded_files.push(path);
        }

        if self.verbose && loaded_files.len() > 1 {
            for (i, path) in loaded_files.iter().enumerate() {
                let role = if i == loaded_files.len() - 1 {
                    "highest precedence"
                } else {
                    "overridden where set above"
                };
                tracing::info!(path = %path.display(), role, "configuration file");
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./geo-lookup.toml", "./.geo-lookup.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Get the global configuration file path in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".geo-lookup.toml", "geo-lookup.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("geo-lookup").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    concurrency: higher_defaults.concurrency.or(lower_defaults.concurrency),
                    timeout: higher_defaults.timeout.or(lower_defaults.timeout),
                    request_timeout: higher_defaults
                        .request_timeout
                        .or(lower_defaults.request_timeout),
                    endpoint: higher_defaults.endpoint.or(lower_defaults.endpoint),
                    lang: higher_defaults.lang.or(lower_defaults.lang),
                }),
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            output: match (lower.output, higher.output) {
                (Some(lower_output), Some(higher_output)) => Some(OutputConfig {
                    default_format: higher_output.default_format.or(lower_output.default_format),
                    csv_headers: higher_output.csv_headers.or(lower_output.csv_headers),
                    json_pretty: higher_output.json_pretty.or(lower_output.json_pretty),
                }),
                (lower_output, higher_output) => higher_output.or(lower_output),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), LookupError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                if concurrency == 0 || concurrency > 100 {
                    return Err(LookupError::config("Concurrency must be between 1 and 100"));
                }
            }

            for (name, value) in [
                ("timeout", &defaults.timeout),
                ("request_timeout", &defaults.request_timeout),
            ] {
                if let Some(value) = value {
                    if parse_timeout(value).is_none() {
                        return Err(LookupError::config(format!(
                            "Invalid {} '{}'. Use format like '500ms', '5s', '2m' (at most 24h)",
                            name, value
                        )));
                    }
                }
            }

            if let Some(endpoint) = &defaults.endpoint {
                reqwest::Url::parse(endpoint).map_err(|e| {
                    LookupError::config(format!("Invalid endpoint '{}': {}", endpoint, e))
                })?;
            }
        }

        if let Some(output) = &config.output {
            if let Some(format) = &output.default_format {
                if !matches!(format.as_str(), "text" | "json" | "csv") {
                    return Err(LookupError::config(format!(
                        "Unknown output format '{}'. Use text, json or csv",
                        format
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `GEO_*`
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub concurrency: Option<usize>,
    pub timeout: Option<String>,
    pub request_timeout: Option<String>,
    pub endpoint: Option<String>,
    pub lang: Option<String>,
    pub json: Option<bool>,
    pub csv: Option<bool>,
    pub file: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from `GEO_*` environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|key| env::var(key).ok())
}

/// Same as [`load_env_config`], reading variables through `lookup`.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("GEO_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if (1..=100).contains(&concurrency) => {
                tracing::debug!(concurrency, "using GEO_CONCURRENCY");
                env_config.concurrency = Some(concurrency);
            }
            _ => tracing::warn!(value = %val, "ignoring GEO_CONCURRENCY, must be 1-100"),
        }
    }

    env_config.timeout = duration_var(&lookup, "GEO_TIMEOUT");
    env_config.request_timeout = duration_var(&lookup, "GEO_REQUEST_TIMEOUT");

    if let Some(endpoint) = non_empty_var(&lookup, "GEO_ENDPOINT") {
        if reqwest::Url::parse(&endpoint).is_ok() {
            env_config.endpoint = Some(endpoint);
        } else {
            tracing::warn!(value = %endpoint, "ignoring GEO_ENDPOINT, not a valid URL");
        }
    }

    env_config.lang = non_empty_var(&lookup, "GEO_LANG");
    env_config.json = bool_var(&lookup, "GEO_JSON");
    env_config.csv = bool_var(&lookup, "GEO_CSV");
    env_config.file = non_empty_var(&lookup, "GEO_FILE");
    env_config.config = non_empty_var(&lookup, "GEO_CONFIG");

    env_config
}

fn non_empty_var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    if value.trim().is_empty() {
        return None;
    }
    tracing::debug!(key, value = %value, "using environment variable");
    Some(value.trim().to_string())
}

fn duration_var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = non_empty_var(lookup, key)?;
    if parse_timeout(&value).is_none() {
        tracing::warn!(key, value = %value, "ignoring invalid duration, use e.g. '500ms', '5s', '2m' (at most 24h)");
        return None;
    }
    Some(value)
}

fn bool_var<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %value, "ignoring invalid boolean, use true/false");
            None
        }
    }
}

impl EnvConfig {
    /// Apply the lookup-related variables on top of `config`.
    pub fn apply_to(&self, mut config: LookupConfig) -> LookupConfig {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout.as_deref().and_then(parse_timeout) {
            config.timeout = timeout;
        }
        if let Some(timeout) = self.request_timeout.as_deref().and_then(parse_timeout) {
            config.request_timeout = timeout;
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(lang) = &self.lang {
            config.lang = Some(lang.clone());
        }
        config
    }

    /// Check if output format conflicts exist (JSON and CSV both set).
    pub fn has_output_format_conflict(&self) -> bool {
        matches!((self.json, self.csv), (Some(true), Some(true)))
    }
}
