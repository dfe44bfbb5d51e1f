//! Application service: local project steps: generate from the template,
//! create the virtualenv, commit, and push.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, LocalFs};
use crate::application::services::credentials::CredentialScope;
use crate::domain::config::{DeployConfig, GitConfig, TemplateConfig};
use crate::domain::{CommandSpec, Environment, HostCredentials};

/// Render the template into `env.project_path`.
///
/// # Errors
///
/// Returns an error if the generator exits non-zero.
pub async fn generate_project(
    runner: &impl CommandRunner,
    env: &Environment,
    template: &TemplateConfig,
) -> Result<()> {
    let spec = CommandSpec::new(&template.generator)
        .args([
            "startproject".to_string(),
            format!("--template={}", template.url),
            format!("--extension={}", template.extensions),
            env.name.clone(),
        ])
        .current_dir(&env.work_dir);
    runner
        .run(&spec)
        .await
        .context("generating project from template")?;
    Ok(())
}

/// Create the run's virtualenv at `env.venv_path`.
///
/// # Errors
///
/// Returns an error if virtualenv creation exits non-zero.
pub async fn create_virtualenv(
    runner: &impl CommandRunner,
    env: &Environment,
    deploy: &DeployConfig,
) -> Result<()> {
    let spec = CommandSpec::new(&deploy.virtualenv)
        .arg(env.venv_path.to_string_lossy())
        .current_dir(&env.work_dir);
    runner.run(&spec).await.context("creating virtualenv")?;
    Ok(())
}

/// Install the project's development requirements into the virtualenv.
///
/// # Errors
///
/// Returns an error if pip exits non-zero.
pub async fn install_requirements(
    runner: &impl CommandRunner,
    env: &Environment,
    deploy: &DeployConfig,
    timeout: Duration,
) -> Result<()> {
    let pip = env.venv_path.join("bin").join("pip");
    let spec = CommandSpec::new(pip.to_string_lossy())
        .args(["install", "-q", "-r"])
        .arg(deploy.requirements.to_string_lossy())
        .current_dir(&env.project_path)
        .timeout(timeout);
    runner
        .run(&spec)
        .await
        .context("installing development requirements")?;
    Ok(())
}

/// `git init`, set the committer identity, commit everything, and add the
/// hosted repository as `origin`.
///
/// # Errors
///
/// Returns an error if any git command exits non-zero.
pub async fn init_repository(
    runner: &impl CommandRunner,
    project_dir: &Path,
    git: &GitConfig,
    clone_url: &str,
) -> Result<()> {
    let steps: [Vec<&str>; 6] = [
        vec!["init"],
        vec!["config", "user.email", git.user_email.as_str()],
        vec!["config", "user.name", git.user_name.as_str()],
        vec!["add", "--all"],
        vec!["commit", "-m", git.commit_message.as_str()],
        vec!["remote", "add", "origin", clone_url],
    ];
    for args in steps {
        let spec = CommandSpec::new("git").args(args).current_dir(project_dir);
        runner.run(&spec).await?;
    }
    Ok(())
}

/// Push to `origin` with `credentials` installed in a scoped `.netrc` under
/// `home`. `HOME` is overridden for the push only.
///
/// # Errors
///
/// Returns an error if the credentials cannot be installed or removed, or the
/// push exits non-zero. A push failure wins over a failed restore, which is
/// only logged. The credential file is restored in every case.
pub async fn push(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    project_dir: &Path,
    home: &Path,
    git: &GitConfig,
    credentials: &HostCredentials,
) -> Result<()> {
    let scope = CredentialScope::enter(fs, home, credentials)?;
    let spec = CommandSpec::new("git")
        .args(["push", "-u", "origin", git.branch.as_str()])
        .current_dir(project_dir)
        .env("HOME", home.to_string_lossy());
    let pushed = runner.run(&spec).await.context("pushing to hosted repository");
    let restored = scope.exit();
    if let Err(e) = pushed {
        if let Err(restore) = restored {
            tracing::warn!(error = %format!("{restore:#}"), "failed to restore credential file");
        }
        return Err(e);
    }
    restored
}
