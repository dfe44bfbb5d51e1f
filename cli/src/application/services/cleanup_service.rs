//! Application service: best-effort teardown of everything a run created.
//!
//! Every release failure is reported and swallowed: cleanup never fails.

use crate::application::ports::{LocalFs, ProgressReporter, RepositoryHost, VmProvisioner};
use crate::domain::{Environment, Handle, HostedRepository, VmRef};

/// What teardown managed to release.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub repository_deleted: bool,
    pub vm_released: bool,
    /// Local paths that could not be removed.
    pub leftover_paths: Vec<std::path::PathBuf>,
}

/// Delete the repository if its handle is still releasable.
pub async fn release_repository(
    host: &impl RepositoryHost,
    reporter: &impl ProgressReporter,
    handle: &mut Handle<HostedRepository>,
) -> bool {
    if !handle.is_releasable() {
        tracing::debug!("repository already released");
        return false;
    }
    handle.mark_released();
    let repo = handle.resource();
    reporter.step(&format!("deleting repository {}...", repo.full_name));
    match host.delete_repository(repo).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(full_name = %repo.full_name, error = %format!("{e:#}"), "repository delete failed");
            reporter.warn(&format!("could not delete repository {}: {e:#}", repo.full_name));
            false
        }
    }
}

/// Terminate the VM if its handle is still releasable.
pub async fn release_vm(
    provisioner: &impl VmProvisioner,
    reporter: &impl ProgressReporter,
    handle: &mut Handle<VmRef>,
) -> bool {
    if !handle.is_releasable() {
        tracing::debug!("VM already released");
        return false;
    }
    handle.mark_released();
    let vm = handle.resource();
    reporter.step(&format!("terminating test server {}...", vm.instance_id));
    match provisioner.release(vm).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(instance_id = %vm.instance_id, error = %format!("{e:#}"), "VM release failed");
            reporter.warn(&format!("could not terminate {}: {e:#}", vm.instance_id));
            false
        }
    }
}

/// Release the repository (if one was created), the VM (if one was
/// launched), and every local path of the run.
pub async fn teardown(
    provisioner: &impl VmProvisioner,
    host: &impl RepositoryHost,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    env: &mut Environment,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    if let Some(handle) = env.repository.as_mut() {
        report.repository_deleted = release_repository(host, reporter, handle).await;
    }
    if let Some(handle) = env.vm.as_mut() {
        report.vm_released = release_vm(provisioner, reporter, handle).await;
    }
    for path in env.local_paths() {
        if let Err(e) = fs.remove_all(path) {
            tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "local cleanup failed");
            reporter.warn(&format!("could not remove {}: {e:#}", path.display()));
            report.leftover_paths.push(path.to_path_buf());
        }
    }
    reporter.success("cleanup finished");
    report
}
