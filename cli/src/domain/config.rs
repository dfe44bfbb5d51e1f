//! Domain types and validation for tplcheck configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::health::{Backoff, RetryPolicy};

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.tplcheck/config.yaml`.
///
/// Every field has a default, so an absent file or a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Prefix of the timestamped run name.
    pub run_prefix: String,
    pub template: TemplateConfig,
    pub vm: VmConfig,
    pub hosting: HostingConfig,
    pub git: GitConfig,
    pub deploy: DeployConfig,
    pub health: HealthConfig,
    /// Placeholder rewrites applied to the generated project, in order.
    pub rewrites: Vec<RewriteRule>,
    /// Files copied verbatim inside the generated project.
    pub copies: Vec<CopyRule>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            run_prefix: "dpt_test".to_string(),
            template: TemplateConfig::default(),
            vm: VmConfig::default(),
            hosting: HostingConfig::default(),
            git: GitConfig::default(),
            deploy: DeployConfig::default(),
            health: HealthConfig::default(),
            rewrites: default_rewrites(),
            copies: default_copies(),
        }
    }
}

/// Project generation from a template archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Generator executable, e.g. `django-admin.py`.
    pub generator: String,
    pub url: String,
    /// Comma-separated file extensions rendered by the generator.
    pub extensions: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            generator: "django-admin.py".to_string(),
            url: "https://github.com/caktus/django-project-template/zipball/dpt-test-support"
                .to_string(),
            extensions: "py,rst".to_string(),
        }
    }
}

/// Test server launch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub image: String,
    pub instance_type: String,
    pub security_groups: Vec<String>,
    /// Cloud region; the CLI's configured default when unset.
    pub region: Option<String>,
    pub admin_user: String,
    /// Value of the `environment` tag.
    pub environment: String,
    /// Value of the `project` tag.
    pub project_tag: String,
    pub terminate_on_release: bool,
    /// How long to wait for the instance to reach `running`.
    pub boot_timeout_secs: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            image: "ami-fa7dba92".to_string(),
            instance_type: "t1.micro".to_string(),
            security_groups: vec!["dpt-test-sg".to_string()],
            region: None,
            admin_user: "ubuntu".to_string(),
            environment: "staging".to_string(),
            project_tag: "django-project-template".to_string(),
            terminate_on_release: true,
            boot_timeout_secs: 600,
        }
    }
}

/// Source-control hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingConfig {
    pub api_url: String,
    /// Host written into the scoped `.netrc` for pushes.
    pub machine: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            machine: "github.com".to_string(),
        }
    }
}

/// Local repository identity and push target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub user_name: String,
    pub user_email: String,
    pub branch: String,
    pub commit_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            user_name: "DPT Tester".to_string(),
            user_email: "dpt-test@example.com".to_string(),
            branch: "master".to_string(),
            commit_message: "initial commit".to_string(),
        }
    }
}

/// Deployment tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Executable inside the virtualenv's `bin/`.
    pub tool: String,
    /// Executable used to create the virtualenv.
    pub virtualenv: String,
    /// Requirements file, relative to the project root.
    pub requirements: PathBuf,
    /// Target environment passed to every environment-scoped task.
    pub environment: String,
    pub minion_roles: Vec<String>,
    pub deploy_task: String,
    /// Output substring meaning the deploy could not authenticate.
    pub auth_failure_marker: String,
    pub command_timeout_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            tool: "fab".to_string(),
            virtualenv: "virtualenv".to_string(),
            requirements: PathBuf::from("requirements").join("dev.txt"),
            environment: "staging".to_string(),
            minion_roles: ["web", "balancer", "db-master", "cache", "queue", "worker"]
                .into_iter()
                .map(String::from)
                .collect(),
            deploy_task: "deploy".to_string(),
            auth_failure_marker: "Failed to authenticate".to_string(),
            command_timeout_secs: 3600,
        }
    }
}

/// Health endpoint polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub scheme: String,
    pub path: String,
    pub interval_secs: u64,
    pub max_elapsed_secs: u64,
    pub backoff: BackoffConfig,
    pub success_status: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            path: "/admin/".to_string(),
            interval_secs: 10,
            max_elapsed_secs: 1800,
            backoff: BackoffConfig::Fixed,
            success_status: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffConfig {
    Fixed,
    Exponential { factor: u32, max_secs: u64 },
}

/// Replace `pattern` with `replacement` in `file` (relative to the project).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub file: PathBuf,
    pub pattern: String,
    /// May contain `{hostname}`, `{project}`, `{clone_url}`.
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
    pub from: PathBuf,
    pub to: PathBuf,
}

fn pillar(parts: &[&str]) -> PathBuf {
    parts
        .iter()
        .fold(PathBuf::from("conf").join("pillar"), |p, part| p.join(part))
}

fn default_rewrites() -> Vec<RewriteRule> {
    let rule = |file: PathBuf, pattern: &str, replacement: &str| RewriteRule {
        file,
        pattern: pattern.to_string(),
        replacement: replacement.to_string(),
    };
    vec![
        rule(PathBuf::from("fabfile.py"), "CHANGEME", "{hostname}"),
        rule(
            pillar(&["project.sls"]),
            "project_name: example",
            "project_name: {project}",
        ),
        rule(
            pillar(&["staging", "env.sls"]),
            "staging.example.com",
            "{hostname}",
        ),
        rule(
            pillar(&["staging", "env.sls"]),
            "git@github.com:CHANGEME/CHANGEME.git",
            "{clone_url}",
        ),
    ]
}

fn default_copies() -> Vec<CopyRule> {
    ["staging", "production"]
        .into_iter()
        .map(|slot| CopyRule {
            from: pillar(&["secrets.ex"]),
            to: pillar(&[slot, "secrets.sls"]),
        })
        .collect()
}

// ── Derived values ───────────────────────────────────────────────────────────

impl BootstrapConfig {
    /// Reject values that would make the workflow meaningless.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, reason: &str| {
            Err(ConfigError::InvalidValue {
                key,
                reason: reason.to_string(),
            })
        };
        if self.run_prefix.trim().is_empty() {
            return invalid("run_prefix", "must not be empty");
        }
        if self.health.interval_secs == 0 {
            return invalid("health.interval_secs", "must be greater than 0");
        }
        if self.health.max_elapsed_secs < self.health.interval_secs {
            return invalid(
                "health.max_elapsed_secs",
                "must be at least health.interval_secs",
            );
        }
        if let BackoffConfig::Exponential { factor: 0, .. } = self.health.backoff {
            return invalid("health.backoff.factor", "must be at least 1");
        }
        if self.deploy.auth_failure_marker.is_empty() {
            return invalid("deploy.auth_failure_marker", "must not be empty");
        }
        if self.deploy.command_timeout_secs == 0 {
            return invalid("deploy.command_timeout_secs", "must be greater than 0");
        }
        if self.rewrites.iter().any(|r| r.pattern.is_empty()) {
            return invalid("rewrites.pattern", "must not be empty");
        }
        Ok(())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.health.backoff {
            BackoffConfig::Fixed => Backoff::Fixed,
            BackoffConfig::Exponential { factor, max_secs } => Backoff::Exponential {
                factor,
                max: Duration::from_secs(max_secs),
            },
        };
        RetryPolicy {
            interval: Duration::from_secs(self.health.interval_secs),
            max_elapsed: Duration::from_secs(self.health.max_elapsed_secs),
            backoff,
            success_status: self.health.success_status,
        }
    }

    /// Tags attached to the test server.
    #[must_use]
    pub fn vm_tags(&self, run_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("environment".to_string(), self.vm.environment.clone()),
            ("project".to_string(), self.vm.project_tag.clone()),
            ("project_name".to_string(), run_name.to_string()),
            ("Name".to_string(), run_name.to_string()),
        ])
    }

    #[must_use]
    pub fn health_url(&self, hostname: &str) -> String {
        format!("{}://{hostname}{}", self.health.scheme, self.health.path)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy.command_timeout_secs)
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
