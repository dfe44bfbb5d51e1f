//! `tplcheck run`: bootstrap the environment, verify it, and tear it down.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::bootstrap::{BootstrapOptions, BootstrapReport, Collaborators};
use crate::domain::{HostCredentials, VerifyState};
use crate::infra::clock::TokioSleeper;
use crate::infra::fs::StdFs;
use crate::infra::signal::shutdown_signal;
use crate::output::{OutputContext, TerminalReporter};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Directory the project, virtualenv, and key file are created in
    /// [default: current directory]
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Hosting account login
    #[arg(long, env = "GITHUB_USER")]
    pub hosting_user: String,

    /// Hosting account password or token
    #[arg(long, env = "GITHUB_PASSWORD", hide_env_values = true)]
    pub hosting_secret: String,
}

/// Entry point for `tplcheck run`.
///
/// A verification timeout is reported but still exits successfully. The
/// first Ctrl-C cancels the current step and tears down; a second one exits
/// at once.
///
/// # Errors
///
/// Returns an error if configuration is invalid or any bootstrap step fails.
pub async fn run(app: &AppContext, args: RunArgs) -> Result<ExitCode> {
    let config = app.config_store.load()?;

    let work_dir = args.work_dir.map_or_else(std::env::current_dir, Ok)?;
    std::fs::create_dir_all(&work_dir)
        .with_context(|| format!("creating work directory {}", work_dir.display()))?;
    let work_dir = std::path::absolute(&work_dir)
        .with_context(|| format!("resolving {}", work_dir.display()))?;

    let credentials = HostCredentials::new(
        config.hosting.machine.as_str(),
        args.hosting_user,
        args.hosting_secret,
    );

    let adapters = app.adapters(&config, &credentials)?;
    let reporter = TerminalReporter::new(&app.output);

    let collaborators = Collaborators {
        runner: &adapters.runner,
        provisioner: &adapters.provisioner,
        host: &adapters.host,
        probe: &adapters.probe,
        sleeper: &TokioSleeper,
        fs: &StdFs,
        reporter: &reporter,
    };
    let opts = BootstrapOptions {
        config,
        credentials,
        work_dir,
        started_at: Local::now().naive_local(),
    };

    let report = collaborators.bootstrap(&opts, shutdown_signal()).await?;
    render_report(&app.output, &report);
    Ok(ExitCode::SUCCESS)
}

fn render_report(output: &OutputContext, report: &BootstrapReport) {
    let v = &report.verification;
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    output.header("Summary");
    output.kv("run:         ", &report.name);
    let result = match v.state {
        VerifyState::Succeeded => "healthy".to_string(),
        _ => format!(
            "not healthy (last status: {})",
            v.last_status
                .map_or_else(|| "none".to_string(), |s| s.to_string())
        ),
    };
    output.kv("result:      ", &result);
    output.kv("attempts:    ", &v.attempts.to_string());
    output.kv("deploys:     ", &v.deploy_attempts.to_string());
    output.kv("auth errors: ", &v.auth_failures.to_string());
    output.kv("repo deleted:", yes_no(report.cleanup.repository_deleted));
    output.kv("vm released: ", yes_no(report.cleanup.vm_released));
    for path in &report.cleanup.leftover_paths {
        output.warn(&format!("left behind: {}", path.display()));
    }
}
