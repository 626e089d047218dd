//! Configuration loading and endpoint resolution
//!
//! Bootstrap settings come from four sources, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Backend used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Primary environment variable for the backend base URL
pub const API_URL_ENV: &str = "VXAID_API_URL";

/// Legacy environment variable still honored for the backend base URL
pub const LEGACY_API_URL_ENV: &str = "VITE_API_URL";

/// Environment variable for the directory reports are saved into
pub const REPORT_DIR_ENV: &str = "VXAID_REPORT_DIR";

/// Largest image accepted for upload (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; a missing file is equivalent to an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Base URL of the classification backend
    #[serde(default)]
    pub api_url: Option<String>,

    /// Directory generated PDF reports are written to
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Upload size limit in bytes
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line, if any
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub report_dir: Option<PathBuf>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    /// Backend base URL, trailing slashes removed
    pub api_url: String,
    /// Directory reports are saved into
    pub report_dir: PathBuf,
    /// Upload size limit in bytes
    pub max_upload_bytes: u64,
    /// Default tracing filter
    pub log_level: String,
}

impl ScreenConfig {
    /// Resolve every setting against CLI, environment and TOML sources
    ///
    /// Fails with [`Error::InvalidInput`] when the upload limit is zero, since
    /// no image could ever be accepted.
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let max_upload_bytes = toml_config
            .max_upload_bytes
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(Error::InvalidInput(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_url: resolve_api_url(cli.api_url.as_deref(), toml_config),
            report_dir: resolve_report_dir(cli.report_dir.as_deref(), toml_config),
            max_upload_bytes,
            log_level: toml_config.logging.level.clone(),
        })
    }
}

/// Default config file location: `<config_dir>/vxaid/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vxaid").join("config.toml"))
}

/// Load the TOML bootstrap config
///
/// A missing file yields defaults with a warning. A file that exists but does
/// not parse is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine config directory, using defaults");
            return Ok(TomlConfig::default());
        }
    };

    if !path.exists() {
        warn!("Config file not found: {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve the backend base URL
///
/// **Priority:** CLI → `VXAID_API_URL` → `VITE_API_URL` → TOML → default
pub fn resolve_api_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    let chosen = cli_arg
        .filter(|v| is_set(v))
        .map(str::to_string)
        .or_else(|| env_value(API_URL_ENV))
        .or_else(|| env_value(LEGACY_API_URL_ENV))
        .or_else(|| toml_config.api_url.clone().filter(|v| is_set(v)))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let normalized = normalize_base_url(&chosen);
    debug!(api_url = %normalized, "Resolved backend URL");
    normalized
}

/// Resolve the report output directory
///
/// **Priority:** CLI → `VXAID_REPORT_DIR` → TOML → current directory
pub fn resolve_report_dir(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(dir) = cli_arg {
        return dir.to_path_buf();
    }

    if let Some(dir) = env_value(REPORT_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(dir) = &toml_config.report_dir {
        return dir.clone();
    }

    PathBuf::from(".")
}

/// Strip surrounding whitespace and every trailing slash from a base URL
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_set(v))
}

fn is_set(value: &str) -> bool {
    !value.trim().is_empty()
}
