//! Tests for configuration resolution and graceful degradation
//!
//! Covers:
//! - Missing TOML files fall back to defaults instead of failing
//! - Malformed TOML files are reported as configuration errors
//! - Priority order for the backend URL and report directory
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate VXAID_API_URL, VITE_API_URL or VXAID_REPORT_DIR are
//! marked with #[serial] so they run sequentially.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use vxaid_common::config::{
    load_toml_config, resolve_api_url, resolve_report_dir, CliOverrides, ScreenConfig,
    TomlConfig, API_URL_ENV, DEFAULT_API_URL, DEFAULT_MAX_UPLOAD_BYTES, LEGACY_API_URL_ENV,
    REPORT_DIR_ENV,
};
use vxaid_common::Error;

fn clear_env() {
    env::remove_var(API_URL_ENV);
    env::remove_var(LEGACY_API_URL_ENV);
    env::remove_var(REPORT_DIR_ENV);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_config_file_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "api_url = \"http://screening.local:9000/\"\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.api_url.as_deref(), Some("http://screening.local:9000/"));
    assert_eq!(config.logging.level, "warn");
    assert!(config.report_dir.is_none());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "api_url = [not toml").unwrap();

    let err = load_toml_config(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {err:?}");
}

#[test]
#[serial]
fn test_api_url_defaults_when_nothing_set() {
    clear_env();

    let url = resolve_api_url(None, &TomlConfig::default());
    assert_eq!(url, DEFAULT_API_URL);
}

#[test]
#[serial]
fn test_api_url_env_beats_toml() {
    clear_env();
    env::set_var(API_URL_ENV, "http://from-env:8000//");

    let toml_config = TomlConfig {
        api_url: Some("http://from-toml".to_string()),
        ..Default::default()
    };
    assert_eq!(resolve_api_url(None, &toml_config), "http://from-env:8000");

    clear_env();
}

#[test]
#[serial]
fn test_primary_env_beats_legacy_env() {
    clear_env();
    env::set_var(API_URL_ENV, "http://primary");
    env::set_var(LEGACY_API_URL_ENV, "http://legacy");

    assert_eq!(resolve_api_url(None, &TomlConfig::default()), "http://primary");

    env::remove_var(API_URL_ENV);
    assert_eq!(resolve_api_url(None, &TomlConfig::default()), "http://legacy");

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    clear_env();
    env::set_var(API_URL_ENV, "   ");

    let toml_config = TomlConfig {
        api_url: Some("http://from-toml/".to_string()),
        ..Default::default()
    };
    assert_eq!(resolve_api_url(None, &toml_config), "http://from-toml");

    clear_env();
}

#[test]
#[serial]
fn test_report_dir_priority() {
    clear_env();

    let toml_config = TomlConfig {
        report_dir: Some(PathBuf::from("/tmp/vxaid-toml-reports")),
        ..Default::default()
    };
    assert_eq!(
        resolve_report_dir(None, &toml_config),
        PathBuf::from("/tmp/vxaid-toml-reports")
    );

    env::set_var(REPORT_DIR_ENV, "/tmp/vxaid-env-reports");
    assert_eq!(
        resolve_report_dir(None, &toml_config),
        PathBuf::from("/tmp/vxaid-env-reports")
    );

    let cli = PathBuf::from("/tmp/vxaid-cli-reports");
    assert_eq!(resolve_report_dir(Some(&cli), &toml_config), cli);

    env::remove_var(REPORT_DIR_ENV);
    assert_eq!(
        resolve_report_dir(None, &TomlConfig::default()),
        PathBuf::from(".")
    );
}

#[test]
#[serial]
fn test_screen_config_resolution() {
    clear_env();

    let cli = CliOverrides {
        api_url: Some("http://cli-host:8000/".to_string()),
        report_dir: None,
    };
    let config = ScreenConfig::resolve(&cli, &TomlConfig::default()).unwrap();

    assert_eq!(config.api_url, "http://cli-host:8000");
    assert_eq!(config.report_dir, PathBuf::from("."));
    assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    assert_eq!(config.log_level, "info");
}

#[test]
#[serial]
fn test_zero_upload_limit_is_rejected() {
    clear_env();

    let toml_config = TomlConfig {
        max_upload_bytes: Some(0),
        ..TomlConfig::default()
    };

    let err = ScreenConfig::resolve(&CliOverrides::default(), &toml_config).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let toml_config = TomlConfig {
        max_upload_bytes: Some(4096),
        ..TomlConfig::default()
    };
    let config = ScreenConfig::resolve(&CliOverrides::default(), &toml_config).unwrap();
    assert_eq!(config.max_upload_bytes, 4096);
}
