//! Domain layer: pure types, validation, and text transforms.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod command;
pub mod config;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod health;
pub mod resource;
pub mod template;

pub use command::{CommandResult, CommandSpec};
pub use config::BootstrapConfig;
pub use credentials::HostCredentials;
pub use environment::Environment;
pub use error::{
    BootstrapError, CommandFailed, ConfigError, ProvisionError, TemplateError,
    TransientNetworkError, VerificationTimeout,
};
pub use health::{DeployLatch, ProbeResponse, RetryPolicy, VerifyReport, VerifyState};
pub use resource::{Handle, HostedRepository, VmInstance, VmRef, VmSpec};
