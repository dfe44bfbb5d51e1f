//! Application service: invoke the deployment tool against the test server.
//!
//! One tool invocation per call; retries belong to the verifier.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, Deployer};
use crate::domain::{CommandResult, CommandSpec};

/// Where and as whom the deployment tool runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    /// Deployment tool executable (inside the run's virtualenv).
    pub tool: PathBuf,
    /// Per-run login user on the server.
    pub user: String,
    /// Per-run private key.
    pub key_file: PathBuf,
    pub hostname: String,
    /// Project checkout the tool runs from.
    pub project_dir: PathBuf,
    pub timeout: Duration,
}

pub struct DeploymentExecutor<'a, R: CommandRunner> {
    runner: &'a R,
    target: DeployTarget,
}

impl<'a, R: CommandRunner> DeploymentExecutor<'a, R> {
    #[must_use]
    pub fn new(runner: &'a R, target: DeployTarget) -> Self {
        Self { runner, target }
    }

    /// Full command line for one invocation: per-run credentials first, then
    /// the task arguments.
    #[must_use]
    pub fn command(&self, task_args: &[String]) -> CommandSpec {
        CommandSpec::new(self.target.tool.to_string_lossy())
            .arg("-u")
            .arg(&self.target.user)
            .arg("-i")
            .arg(self.target.key_file.to_string_lossy())
            .arg("--disable-known-hosts")
            .args(task_args.iter().cloned())
            .current_dir(&self.target.project_dir)
            .timeout(self.target.timeout)
    }

    /// Run one task and return its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the tool cannot be spawned or times out.
    pub async fn deploy_once(&self, task_args: &[String]) -> Result<CommandResult> {
        let spec = self.command(task_args);
        tracing::debug!(host = %self.target.hostname, task = %task_args.join(" "), "deploy attempt");
        self.runner
            .run_unchecked(&spec)
            .await
            .with_context(|| format!("running {}", task_args.join(" ")))
    }

    /// Run one task that must succeed.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` on a non-zero exit.
    pub async fn run_task(&self, task_args: &[String]) -> Result<CommandResult> {
        let spec = self.command(task_args);
        tracing::info!(host = %self.target.hostname, task = %task_args.join(" "), "remote task");
        self.runner
            .run(&spec)
            .await
            .with_context(|| format!("remote task {}", task_args.join(" ")))
    }

    /// A [`Deployer`] that repeats `task_args` on every call.
    #[must_use]
    pub fn deployer(&self, task_args: Vec<String>) -> DeployStep<'_, 'a, R> {
        DeployStep {
            executor: self,
            task_args,
        }
    }
}

/// A fixed task bound to an executor.
pub struct DeployStep<'e, 'a, R: CommandRunner> {
    executor: &'e DeploymentExecutor<'a, R>,
    task_args: Vec<String>,
}

impl<R: CommandRunner> Deployer for DeployStep<'_, '_, R> {
    async fn deploy(&self) -> Result<CommandResult> {
        self.executor.deploy_once(&self.task_args).await
    }
}

/// One-time server setup tasks, in order: master setup, forced sync of
/// secrets, master minion, then the environment's minion with all roles.
#[must_use]
pub fn setup_tasks(environment: &str, roles: &[String], hostname: &str) -> Vec<Vec<String>> {
    let owned = |args: &[&str]| args.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
    let minion = format!("setup_minion:{}", roles.join(","));
    vec![
        owned(&["setup_master", "-H", hostname]),
        owned(&["sync:1"]),
        owned(&[
            "--set",
            "environment=master",
            "setup_minion:salt-master",
            "-H",
            hostname,
        ]),
        owned(&[environment, minion.as_str(), "-H", hostname]),
    ]
}

/// Arguments of the repeated deploy step.
#[must_use]
pub fn deploy_task(environment: &str, task: &str) -> Vec<String> {
    vec![environment.to_string(), task.to_string()]
}
