//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Callers that need to branch on a specific failure
//! recover it with `downcast_ref`.

use thiserror::Error;

// ── Provisioning errors ───────────────────────────────────────────────────────

/// A VM or hosted repository could not be created. Fatal: aborts to cleanup.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to launch VM '{name}': {reason}")]
    VmLaunch { name: String, reason: String },

    #[error("VM {instance_id} never reported a public hostname")]
    VmUnaddressable { instance_id: String },

    #[error("failed to create repository '{name}': {reason}")]
    Repository { name: String, reason: String },
}

// ── Command errors ────────────────────────────────────────────────────────────

/// A required command exited non-zero. Carries the captured output.
#[derive(Debug, Error)]
#[error("`{command}` failed (exit code: {})", exit_label(.code))]
pub struct CommandFailed {
    pub command: String,
    pub code: Option<i32>,
    pub output: String,
}

// ── Health verification errors ────────────────────────────────────────────────

/// Connection refused, DNS failure, or any other request-level failure while
/// polling the health endpoint. Recovered by the poll loop.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransientNetworkError(pub String);

/// The poll budget was exhausted without a success response. Reported, never
/// fatal.
#[derive(Debug, Error)]
#[error("service did not become ready after {attempts} attempts (last status: {})", status_label(.last_status))]
pub struct VerificationTimeout {
    pub attempts: u32,
    pub last_status: Option<u16>,
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

#[allow(clippy::ref_option)]
fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

// ── Workflow errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("interrupted; cleanup was run before exiting")]
    Interrupted,
}

// ── Template errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("substitution pattern must not be empty")]
    EmptyPattern,

    #[error("invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ── Config errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
