//! The per-run environment: generated name, local paths, and the handles of
//! everything created so far.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::domain::resource::{Handle, HostedRepository, VmInstance, VmRef};

/// Identifies one test run. Mutated only by the orchestrator as steps succeed.
#[derive(Debug)]
pub struct Environment {
    /// `<prefix>_%Y_%m_%d_%H_%M_%S`; doubles as project, repository, and VM name.
    pub name: String,
    pub work_dir: PathBuf,
    pub project_path: PathBuf,
    pub venv_path: PathBuf,
    pub key_path: PathBuf,
    pub vm: Option<Handle<VmRef>>,
    pub server: Option<VmInstance>,
    pub repository: Option<Handle<HostedRepository>>,
}

impl Environment {
    /// Derive all names and paths for a run started at `now` under `work_dir`.
    #[must_use]
    pub fn new(prefix: &str, now: NaiveDateTime, work_dir: &Path) -> Self {
        let name = run_name(prefix, now);
        Self {
            project_path: work_dir.join(&name),
            venv_path: work_dir.join(format!("env_{name}")),
            key_path: work_dir.join(format!("{name}.pem")),
            work_dir: work_dir.to_path_buf(),
            name,
            vm: None,
            server: None,
            repository: None,
        }
    }

    /// Local paths removed during cleanup.
    #[must_use]
    pub fn local_paths(&self) -> [&Path; 3] {
        [&self.project_path, &self.venv_path, &self.key_path]
    }
}

/// Timestamp-derived run name, unique per second.
#[must_use]
pub fn run_name(prefix: &str, now: NaiveDateTime) -> String {
    format!("{prefix}_{}", now.format("%Y_%m_%d_%H_%M_%S"))
}
