//! Infrastructure implementation of the `VmProvisioner` port on EC2.
//!
//! `Ec2Provisioner<R>` routes every `aws ec2` CLI call through a
//! `CommandRunner`, the same way the other adapters wrap external tools, and
//! parses the CLI's JSON output with `serde_json`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::application::ports::CommandRunner;
use crate::application::ports::VmProvisioner;
use crate::domain::{CommandSpec, ProvisionError, VmInstance, VmRef, VmSpec};
use crate::infra::fs::write_private;

const AWS: &str = "aws";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    instances: Vec<InstanceDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    instances: Vec<InstanceDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceDescription {
    instance_id: String,
    #[serde(default)]
    public_dns_name: Option<String>,
}

/// VM provisioner backed by the `aws` CLI.
pub struct Ec2Provisioner<R: CommandRunner> {
    runner: R,
    region: Option<String>,
    boot_timeout: Duration,
}

impl<R: CommandRunner> Ec2Provisioner<R> {
    #[must_use]
    pub fn new(runner: R, region: Option<String>, boot_timeout: Duration) -> Self {
        Self {
            runner,
            region,
            boot_timeout,
        }
    }

    /// `aws ec2 <subcommand> ...` with the configured region, JSON output,
    /// and echo disabled.
    fn ec2<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new(AWS).arg("ec2").args(args);
        if let Some(region) = &self.region {
            spec = spec.args(["--region", region.as_str()]);
        }
        spec.args(["--output", "json"]).silent()
    }

    /// Create the key pair; returns the CLI output holding the key material.
    async fn create_key_pair(&self, key_name: &str) -> Result<String> {
        let spec = self.ec2([
            "create-key-pair",
            "--key-name",
            key_name,
            "--query",
            "KeyMaterial",
        ]);
        let result = self.runner.run(&spec).await.context("aws ec2 create-key-pair")?;
        tracing::debug!(key_name, "key pair created");
        Ok(result.output)
    }

    /// Every launch step after the key pair exists. The caller discards the
    /// key pair when this fails.
    async fn launch_with_key(&self, spec: &VmSpec, key_output: &str) -> Result<String> {
        store_key(key_output, &spec.key_path).await?;
        let output = self.run_instance(spec).await?;
        match parse_instance_id(&output) {
            Ok(instance_id) => Ok(instance_id),
            Err(e) => {
                self.terminate_tagged(spec).await;
                Err(e)
            }
        }
    }

    /// Terminate whatever carries the run's `Name` tag. Used when
    /// `run-instances` succeeded but its output could not be read.
    async fn terminate_tagged(&self, spec: &VmSpec) {
        let name = spec.tags.get("Name").unwrap_or(&spec.name);
        let filter = format!("Name=tag:Name,Values={name}");
        let lookup = self.ec2([
            "describe-instances",
            "--filters",
            filter.as_str(),
            "Name=instance-state-name,Values=pending,running",
            "--query",
            "Reservations[].Instances[].InstanceId",
        ]);
        let ids = self.runner.run(&lookup).await.and_then(|r| {
            serde_json::from_str::<Vec<String>>(r.output.trim()).context("parsing instance ids")
        });
        let ids = match ids {
            Ok(ids) if !ids.is_empty() => ids,
            Ok(_) => {
                tracing::warn!(tag = %name, "no instance found for unreadable run-instances output");
                return;
            }
            Err(e) => {
                tracing::warn!(tag = %name, error = %format!("{e:#}"), "cannot look up launched instance");
                return;
            }
        };
        let mut args = vec!["terminate-instances".to_string(), "--instance-ids".to_string()];
        args.extend(ids);
        if let Err(e) = self.runner.run(&self.ec2(args)).await {
            tracing::warn!(tag = %name, error = %format!("{e:#}"), "failed to terminate launched instance");
        }
    }

    /// Drop the key pair and the local key file after a failed launch.
    async fn discard_key(&self, spec: &VmSpec) {
        if let Err(e) = self.delete_key_pair(&spec.name).await {
            tracing::warn!(key_name = %spec.name, error = %format!("{e:#}"), "failed to delete key pair");
        }
        let key_path = spec.key_path.clone();
        let _ = tokio::task::spawn_blocking(move || std::fs::remove_file(key_path)).await;
    }

    async fn delete_key_pair(&self, key_name: &str) -> Result<()> {
        let spec = self.ec2(["delete-key-pair", "--key-name", key_name]);
        self.runner
            .run(&spec)
            .await
            .context("aws ec2 delete-key-pair")?;
        Ok(())
    }

    /// Raw `run-instances` output.
    async fn run_instance(&self, spec: &VmSpec) -> Result<String> {
        let mut args = vec![
            "run-instances".to_string(),
            "--image-id".to_string(),
            spec.image.clone(),
            "--instance-type".to_string(),
            spec.instance_type.clone(),
            "--key-name".to_string(),
            spec.name.clone(),
            "--count".to_string(),
            "1".to_string(),
            "--instance-initiated-shutdown-behavior".to_string(),
            "terminate".to_string(),
            "--tag-specifications".to_string(),
            tag_specifications(&spec.tags),
        ];
        if !spec.security_groups.is_empty() {
            args.push("--security-groups".to_string());
            args.extend(spec.security_groups.iter().cloned());
        }
        let result = self
            .runner
            .run(&self.ec2(args))
            .await
            .context("aws ec2 run-instances")?;
        Ok(result.output)
    }
}

impl<R: CommandRunner> VmProvisioner for Ec2Provisioner<R> {
    async fn launch(&self, spec: &VmSpec) -> Result<VmRef> {
        let launch_error = |e: anyhow::Error| -> anyhow::Error {
            ProvisionError::VmLaunch {
                name: spec.name.clone(),
                reason: format!("{e:#}"),
            }
            .into()
        };
        let key_output = self.create_key_pair(&spec.name).await.map_err(launch_error)?;

        match self.launch_with_key(spec, &key_output).await {
            Ok(instance_id) => Ok(VmRef {
                instance_id,
                key_name: spec.name.clone(),
                key_path: spec.key_path.clone(),
                admin_user: spec.admin_user.clone(),
                terminate_on_release: spec.terminate_on_release,
            }),
            Err(e) => {
                self.discard_key(spec).await;
                Err(launch_error(e))
            }
        }
    }

    async fn wait_addressable(&self, vm: &VmRef) -> Result<VmInstance> {
        let wait = self
            .ec2(["wait", "instance-running", "--instance-ids", vm.instance_id.as_str()])
            .timeout(self.boot_timeout);
        self.runner
            .run(&wait)
            .await
            .context("aws ec2 wait instance-running")?;

        let describe = self.ec2(["describe-instances", "--instance-ids", vm.instance_id.as_str()]);
        let result = self
            .runner
            .run(&describe)
            .await
            .context("aws ec2 describe-instances")?;
        let hostname =
            parse_public_hostname(&result.output)?.ok_or_else(|| ProvisionError::VmUnaddressable {
                instance_id: vm.instance_id.clone(),
            })?;
        Ok(VmInstance {
            public_hostname: hostname,
            admin_user: vm.admin_user.clone(),
            key_file: vm.key_path.clone(),
        })
    }

    async fn release(&self, vm: &VmRef) -> Result<()> {
        let action = if vm.terminate_on_release {
            "terminate-instances"
        } else {
            "stop-instances"
        };
        let spec = self.ec2([action, "--instance-ids", vm.instance_id.as_str()]);
        let instance = self
            .runner
            .run(&spec)
            .await
            .with_context(|| format!("aws ec2 {action}"));
        let key = self.delete_key_pair(&vm.key_name).await;
        instance?;
        key
    }
}

/// Write the key material from `create-key-pair` output with mode 0600.
async fn store_key(key_output: &str, key_path: &Path) -> Result<()> {
    let material: String =
        serde_json::from_str(key_output.trim()).context("parsing key material")?;
    let path = key_path.to_path_buf();
    tokio::task::spawn_blocking(move || write_private(&path, material.as_bytes()))
        .await
        .context("spawn_blocking for key write")??;
    tracing::debug!(key_path = %key_path.display(), "key written");
    Ok(())
}

/// `--tag-specifications` JSON for an instance.
#[must_use]
pub fn tag_specifications(tags: &BTreeMap<String, String>) -> String {
    let tags: Vec<_> = tags
        .iter()
        .map(|(k, v)| serde_json::json!({ "Key": k, "Value": v }))
        .collect();
    serde_json::json!([{ "ResourceType": "instance", "Tags": tags }]).to_string()
}

/// Instance ID from `run-instances` output.
///
/// # Errors
///
/// Returns an error if the output is not the expected JSON or names no
/// instance.
pub fn parse_instance_id(output: &str) -> Result<String> {
    let parsed: RunInstancesOutput =
        serde_json::from_str(output).context("parsing run-instances output")?;
    parsed
        .instances
        .into_iter()
        .next()
        .map(|i| i.instance_id)
        .ok_or_else(|| anyhow::anyhow!("run-instances returned no instances"))
}

/// Public DNS name from `describe-instances` output; `None` while the
/// instance has none.
///
/// # Errors
///
/// Returns an error if the output is not the expected JSON.
pub fn parse_public_hostname(output: &str) -> Result<Option<String>> {
    let parsed: DescribeInstancesOutput =
        serde_json::from_str(output).context("parsing describe-instances output")?;
    Ok(parsed
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .next()
        .and_then(|i| i.public_dns_name)
        .filter(|name| !name.is_empty()))
}
