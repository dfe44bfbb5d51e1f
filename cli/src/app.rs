//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the presentation and configuration concerns and is the
//! one place production adapters are constructed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::domain::{BootstrapConfig, HostCredentials};
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};
use crate::infra::config::YamlConfigStore;
use crate::infra::ec2::Ec2Provisioner;
use crate::infra::github::GithubHost;
use crate::infra::http_probe::HttpProbe;
use crate::output::OutputContext;

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Explicit configuration file.
    pub config: Option<PathBuf>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Configuration file store.
    pub config_store: YamlConfigStore,
}

/// Production adapters for one run.
pub struct Adapters {
    pub runner: TokioCommandRunner,
    pub provisioner: Ec2Provisioner<TokioCommandRunner>,
    pub host: GithubHost,
    pub probe: HttpProbe,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            config_store: YamlConfigStore::new(flags.config.clone()),
        }
    }

    /// Build the adapters a run talks to.
    ///
    /// Command output is echoed unless `--quiet`; the cloud CLI never echoes.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn adapters(
        &self,
        config: &BootstrapConfig,
        credentials: &HostCredentials,
    ) -> Result<Adapters> {
        Ok(Adapters {
            runner: TokioCommandRunner::new(config.command_timeout())
                .with_echo(!self.output.quiet),
            provisioner: Ec2Provisioner::new(
                TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT).with_echo(false),
                config.vm.region.clone(),
                Duration::from_secs(config.vm.boot_timeout_secs),
            ),
            host: GithubHost::new(&config.hosting.api_url, credentials.clone())?,
            probe: HttpProbe::new()?,
        })
    }
}
