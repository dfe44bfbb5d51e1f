//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::BootstrapConfig;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "TPLCHECK_CONFIG";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
///
/// Lookup order: explicit path, `$TPLCHECK_CONFIG`, `~/.tplcheck/config.yaml`.
#[derive(Default)]
pub struct YamlConfigStore {
    path: Option<PathBuf>,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<BootstrapConfig> {
        let path = self.path()?;
        if !path.exists() {
            if self.path.is_some() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(BootstrapConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: BootstrapConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".tplcheck").join("config.yaml"))
    }
}
