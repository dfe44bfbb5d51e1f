//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`: never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::domain::{
    BootstrapConfig, CommandFailed, CommandResult, CommandSpec, HostedRepository, ProbeResponse,
    TransientNetworkError, VmInstance, VmRef, VmSpec,
};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// Implementations stream each output line to the operator as it arrives
/// (when `spec.echo` is set) while accumulating the combined text.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run to completion and return the result whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned or exceeds its
    /// timeout. On timeout, the child process must be killed.
    async fn run_unchecked(&self, spec: &CommandSpec) -> Result<CommandResult>;

    /// Run to completion, failing with [`CommandFailed`] on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Everything `run_unchecked` returns, plus [`CommandFailed`].
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let result = self.run_unchecked(spec).await?;
        if result.success() {
            Ok(result)
        } else {
            Err(CommandFailed {
                command: spec.display(),
                code: result.code,
                output: result.output,
            }
            .into())
        }
    }
}

// ── Provisioning Ports ────────────────────────────────────────────────────────

/// VM provisioning backend.
///
/// Creation is split in two so the caller holds a releasable reference
/// before waiting on the slow part: `launch` allocates the instance,
/// `wait_addressable` blocks until it has a public hostname.
#[allow(async_fn_in_trait)]
pub trait VmProvisioner {
    /// Allocate an instance. Must not leave anything allocated on error.
    async fn launch(&self, spec: &VmSpec) -> Result<VmRef>;
    /// Block until the instance has a reachable network address.
    async fn wait_addressable(&self, vm: &VmRef) -> Result<VmInstance>;
    /// Terminate (or stop) the instance and drop its per-run key.
    async fn release(&self, vm: &VmRef) -> Result<()>;
}

/// Source-control hosting API.
#[allow(async_fn_in_trait)]
pub trait RepositoryHost {
    async fn create_repository(&self, name: &str) -> Result<HostedRepository>;
    /// Delete the repository. A repository that is already gone is not an
    /// error.
    async fn delete_repository(&self, repo: &HostedRepository) -> Result<()>;
}

// ── Verification Ports ────────────────────────────────────────────────────────

/// One deployment attempt against the test server.
#[allow(async_fn_in_trait)]
pub trait Deployer {
    async fn deploy(&self) -> Result<CommandResult>;
}

/// HTTP GET against the health endpoint.
#[allow(async_fn_in_trait)]
pub trait HealthProbe {
    /// # Errors
    ///
    /// Any request-level failure (refused, DNS, TLS, reset) is transient.
    async fn get(&self, url: &str) -> Result<ProbeResponse, TransientNetworkError>;
}

/// Abstracts waiting so the poll loop can be tested without real delays.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── State and Filesystem Ports ────────────────────────────────────────────────

/// Abstracts local filesystem operations.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    /// Write a file readable only by the current user.
    fn write_private(&self, path: &Path, content: &str) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Remove a file or directory tree. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> Result<()>;
}

/// Abstracts configuration loading.
pub trait ConfigStore {
    /// Load the configuration, returning defaults if no file exists.
    fn load(&self) -> Result<BootstrapConfig>;
    /// Location the configuration is read from.
    fn path(&self) -> Result<PathBuf>;
}
