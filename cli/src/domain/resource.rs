//! Handles to externally owned resources (VM instances, hosted repositories).

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A created resource plus its release state.
///
/// Cleanup asks `is_releasable()` instead of inferring state from whether a
/// variable happens to be set. A handle is released at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle<R> {
    resource: R,
    released: bool,
}

impl<R> Handle<R> {
    #[must_use]
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            released: false,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &R {
        &self.resource
    }

    #[must_use]
    pub fn is_releasable(&self) -> bool {
        !self.released
    }

    /// Record that release was attempted. Called whether or not the attempt
    /// succeeded; cleanup is best-effort and never retried.
    pub fn mark_released(&mut self) {
        self.released = true;
    }
}

// ── VM ────────────────────────────────────────────────────────────────────────

/// Launch parameters for a test server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSpec {
    /// Run name; also used as the key-pair name.
    pub name: String,
    pub image: String,
    pub instance_type: String,
    pub security_groups: Vec<String>,
    pub tags: BTreeMap<String, String>,
    /// Login user baked into the image.
    pub admin_user: String,
    /// Where the per-run private key is written.
    pub key_path: PathBuf,
    /// Release terminates the instance instead of stopping it.
    pub terminate_on_release: bool,
}

/// Reference to a launched VM. Releasable as soon as it exists, even if the
/// instance never becomes addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub instance_id: String,
    pub key_name: String,
    pub key_path: PathBuf,
    pub admin_user: String,
    pub terminate_on_release: bool,
}

/// Access details of an addressable VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInstance {
    pub public_hostname: String,
    pub admin_user: String,
    pub key_file: PathBuf,
}

// ── Repository ────────────────────────────────────────────────────────────────

/// A repository created on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedRepository {
    pub name: String,
    /// `owner/name`, used to address the repository for deletion.
    pub full_name: String,
    pub clone_url: String,
}
