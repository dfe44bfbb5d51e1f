//! Tests for YAML configuration loading and lookup order.

#![allow(clippy::expect_used, unsafe_code)]

use serial_test::serial;
use tplcheck_cli::application::ports::ConfigStore;
use tplcheck_cli::domain::{BootstrapConfig, ConfigError};
use tplcheck_cli::infra::config::{CONFIG_ENV, YamlConfigStore};

/// Set `TPLCHECK_CONFIG` for the duration of a test.
struct EnvGuard;

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        // SAFETY: tests touching the variable are serialized with #[serial].
        unsafe { std::env::set_var(CONFIG_ENV, value) };
        Self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        unsafe { std::env::remove_var(CONFIG_ENV) };
    }
}

#[test]
#[serial]
fn test_env_var_overrides_default_location() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("custom.yaml");
    let _guard = EnvGuard::set(&path);

    assert_eq!(YamlConfigStore::default().path().expect("path"), path);
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env_var() {
    let dir = tempfile::tempdir().expect("tempdir");
    let _guard = EnvGuard::set(&dir.path().join("env.yaml"));
    let explicit = dir.path().join("explicit.yaml");

    let store = YamlConfigStore::new(Some(explicit.clone()));
    assert_eq!(store.path().expect("path"), explicit);
}

#[test]
#[serial]
fn test_missing_default_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let _guard = EnvGuard::set(&dir.path().join("absent.yaml"));

    let config = YamlConfigStore::default().load().expect("load");
    assert_eq!(config, BootstrapConfig::default());
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = YamlConfigStore::new(Some(dir.path().join("absent.yaml")));
    assert!(store.load().is_err());
}

#[test]
fn test_partial_file_merges_with_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "run_prefix: smoke\nhealth:\n  interval_secs: 5\n  max_elapsed_secs: 60\nvm:\n  region: us-east-1\n",
    )
    .expect("write");

    let config = YamlConfigStore::new(Some(path)).load().expect("load");

    assert_eq!(config.run_prefix, "smoke");
    assert_eq!(config.retry_policy().max_attempts(), 12);
    assert_eq!(config.vm.region.as_deref(), Some("us-east-1"));
    assert_eq!(config.vm.image, "ami-fa7dba92");
    assert_eq!(config.deploy.auth_failure_marker, "Failed to authenticate");
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "health:\n  interval_secs: 0\n").expect("write");

    let err = YamlConfigStore::new(Some(path)).load().expect_err("invalid");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidValue {
            key: "health.interval_secs",
            ..
        })
    ));
}

#[test]
fn test_malformed_yaml_is_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "health: [unterminated\n").expect("write");

    let err = YamlConfigStore::new(Some(path)).load().expect_err("malformed");
    assert!(format!("{err:#}").contains("cannot parse"));
}
