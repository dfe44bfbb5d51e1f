//! Application service: the bootstrap-and-verify workflow.
//!
//! Provision a server and a repository, generate and push the project, set
//! up the server, then deploy and poll until healthy. Teardown runs after
//! the workflow on every exit path: success, timeout, error, or interrupt.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::application::ports::{
    CommandRunner, HealthProbe, LocalFs, ProgressReporter, RepositoryHost, Sleeper, VmProvisioner,
};
use crate::application::services::cleanup_service::{CleanupReport, teardown};
use crate::application::services::configure::configure_project;
use crate::application::services::deploy::{
    DeployTarget, DeploymentExecutor, deploy_task, setup_tasks,
};
use crate::application::services::verify::{VerifyOptions, verify};
use crate::application::services::{project, provision};
use crate::domain::template::PlaceholderValues;
use crate::domain::{
    BootstrapConfig, BootstrapError, Environment, HostCredentials, VerifyReport, VmSpec,
};

/// Explicit inputs of one run. Nothing is read from the process environment.
pub struct BootstrapOptions {
    pub config: BootstrapConfig,
    pub credentials: HostCredentials,
    /// Directory the project, virtualenv, and key file are created in. Also
    /// used as `HOME` for the push.
    pub work_dir: PathBuf,
    pub started_at: NaiveDateTime,
}

/// Outcome of a run that reached the verification loop.
#[derive(Debug)]
pub struct BootstrapReport {
    pub name: String,
    pub verification: VerifyReport,
    pub cleanup: CleanupReport,
}

/// The ports a run needs.
pub struct Collaborators<'a, R, V, H, P, S, F, Rep> {
    pub runner: &'a R,
    pub provisioner: &'a V,
    pub host: &'a H,
    pub probe: &'a P,
    pub sleeper: &'a S,
    pub fs: &'a F,
    pub reporter: &'a Rep,
}

impl<R, V, H, P, S, F, Rep> Collaborators<'_, R, V, H, P, S, F, Rep>
where
    R: CommandRunner,
    V: VmProvisioner,
    H: RepositoryHost,
    P: HealthProbe,
    S: Sleeper,
    F: LocalFs,
    Rep: ProgressReporter,
{
    /// Run the whole workflow, then tear down.
    ///
    /// When `shutdown` resolves first, the in-flight step is dropped (child
    /// processes are killed) and teardown still runs.
    ///
    /// # Errors
    ///
    /// Returns the first error of the workflow, after teardown. A
    /// verification timeout is not an error; see
    /// [`VerifyReport::timeout`].
    pub async fn bootstrap(
        &self,
        opts: &BootstrapOptions,
        shutdown: impl Future<Output = ()>,
    ) -> Result<BootstrapReport> {
        let mut env =
            Environment::new(&opts.config.run_prefix, opts.started_at, &opts.work_dir);
        tracing::info!(name = %env.name, work_dir = %env.work_dir.display(), "bootstrap starting");

        let outcome = tokio::select! {
            result = self.run_workflow(opts, &mut env) => result,
            () = shutdown => {
                self.reporter.warn("interrupted; cleaning up...");
                Err(BootstrapError::Interrupted.into())
            }
        };

        let cleanup = teardown(self.provisioner, self.host, self.fs, self.reporter, &mut env).await;
        if let Err(e) = &outcome {
            tracing::error!(name = %env.name, error = %format!("{e:#}"), "bootstrap failed");
        }
        let verification = outcome?;

        if let Some(timeout) = verification.timeout() {
            tracing::warn!(name = %env.name, %timeout, auth_failures = verification.auth_failures, "verification timed out");
            self.reporter.warn(&timeout.to_string());
        }
        Ok(BootstrapReport {
            name: env.name,
            verification,
            cleanup,
        })
    }

    async fn run_workflow(
        &self,
        opts: &BootstrapOptions,
        env: &mut Environment,
    ) -> Result<VerifyReport> {
        let config = &opts.config;

        // Step 1: Launch the test server.
        let spec = VmSpec {
            name: env.name.clone(),
            image: config.vm.image.clone(),
            instance_type: config.vm.instance_type.clone(),
            security_groups: config.vm.security_groups.clone(),
            tags: config.vm_tags(&env.name),
            admin_user: config.vm.admin_user.clone(),
            key_path: env.key_path.clone(),
            terminate_on_release: config.vm.terminate_on_release,
        };
        let server = provision::create_server(self.provisioner, self.reporter, env, &spec).await?;

        // Step 2: Create the hosted repository.
        let repo = provision::create_repository(self.host, self.reporter, env).await?;

        // Step 3: Generate the project and its virtualenv, then fill in live values.
        self.reporter.step("generating project from template...");
        project::generate_project(self.runner, env, &config.template).await?;
        project::create_virtualenv(self.runner, env, &config.deploy).await?;
        let values = PlaceholderValues {
            hostname: server.public_hostname.clone(),
            project: env.name.clone(),
            clone_url: repo.clone_url.clone(),
        };
        configure_project(
            self.fs,
            self.reporter,
            &env.project_path,
            &config.rewrites,
            &config.copies,
            &values,
        )?;
        self.reporter.success("project generated");

        // Step 4: Commit and push under scoped credentials.
        self.reporter.step("pushing project...");
        project::init_repository(self.runner, &env.project_path, &config.git, &repo.clone_url)
            .await?;
        project::push(
            self.runner,
            self.fs,
            &env.project_path,
            &env.work_dir,
            &config.git,
            &opts.credentials,
        )
        .await?;
        self.reporter.success("project pushed");

        // Step 5: Development dependencies (provides the deployment tool).
        self.reporter.step("installing development requirements...");
        project::install_requirements(self.runner, env, &config.deploy, config.command_timeout())
            .await?;

        // Step 6: One-time server setup.
        let executor = DeploymentExecutor::new(
            self.runner,
            DeployTarget {
                tool: env.venv_path.join("bin").join(&config.deploy.tool),
                user: server.admin_user.clone(),
                key_file: server.key_file.clone(),
                hostname: server.public_hostname.clone(),
                project_dir: env.project_path.clone(),
                timeout: config.command_timeout(),
            },
        );
        let tasks = setup_tasks(
            &config.deploy.environment,
            &config.deploy.minion_roles,
            &server.public_hostname,
        );
        for task in &tasks {
            self.reporter.step(&format!("running {}...", task.join(" ")));
            executor.run_task(task).await?;
        }

        // Step 7: Deploy and poll until healthy or out of budget.
        let policy = config.retry_policy();
        let url = config.health_url(&server.public_hostname);
        self.reporter.step(&format!(
            "deploying and polling {url} (up to {} attempts)...",
            policy.max_attempts()
        ));
        let deployer =
            executor.deployer(deploy_task(&config.deploy.environment, &config.deploy.deploy_task));
        let report = verify(
            &deployer,
            self.probe,
            self.sleeper,
            self.reporter,
            &VerifyOptions {
                url: &url,
                policy: &policy,
                auth_failure_marker: &config.deploy.auth_failure_marker,
            },
        )
        .await;
        Ok(report)
    }
}
