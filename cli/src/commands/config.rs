//! `tplcheck config`: show the effective configuration.

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::app::AppContext;
use crate::application::ports::ConfigStore;

/// Print the configuration source and the effective configuration as YAML.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or serialized.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    let path = app.config_store.path()?;
    let yaml = serde_yaml::to_string(&config).context("cannot serialize config")?;

    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    if !app.output.quiet {
        println!("# {source}");
    }
    print!("{yaml}");
    Ok(ExitCode::SUCCESS)
}
