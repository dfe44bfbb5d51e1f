//! Application service: create the run's external resources and record
//! their handles on the environment as soon as they exist.

use anyhow::Result;

use crate::application::ports::{ProgressReporter, RepositoryHost, VmProvisioner};
use crate::domain::{Environment, Handle, HostedRepository, VmInstance, VmSpec};

/// Launch the test server and wait until it is addressable.
///
/// The VM handle is stored on `env` before waiting, so a server that never
/// comes up is still released by cleanup.
///
/// # Errors
///
/// Returns an error if launch fails or the server never becomes addressable.
pub async fn create_server(
    provisioner: &impl VmProvisioner,
    reporter: &impl ProgressReporter,
    env: &mut Environment,
    spec: &VmSpec,
) -> Result<VmInstance> {
    reporter.step(&format!("launching test server '{}'...", spec.name));
    let vm = provisioner.launch(spec).await?;
    tracing::info!(instance_id = %vm.instance_id, "test server launched");
    env.vm = Some(Handle::new(vm.clone()));

    let instance = provisioner.wait_addressable(&vm).await?;
    env.server = Some(instance.clone());
    reporter.success(&format!("test server ready at {}", instance.public_hostname));
    Ok(instance)
}

/// Create the hosted repository named after the run.
///
/// # Errors
///
/// Returns an error if the hosting API rejects the request.
pub async fn create_repository(
    host: &impl RepositoryHost,
    reporter: &impl ProgressReporter,
    env: &mut Environment,
) -> Result<HostedRepository> {
    reporter.step(&format!("creating repository '{}'...", env.name));
    let repo = host.create_repository(&env.name).await?;
    tracing::info!(full_name = %repo.full_name, clone_url = %repo.clone_url, "repository created");
    env.repository = Some(Handle::new(repo.clone()));
    reporter.success(&format!("repository {} created", repo.full_name));
    Ok(repo)
}
