//! Tests for the bootstrap workflow and its cleanup guarantee.

#![allow(clippy::expect_used)]

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tplcheck_cli::application::services::bootstrap::{
    BootstrapOptions, BootstrapReport, Collaborators,
};
use tplcheck_cli::application::services::project;
use tplcheck_cli::domain::config::{CopyRule, GitConfig, RewriteRule};
use tplcheck_cli::domain::{
    BootstrapConfig, BootstrapError, CommandFailed, CommandResult, HostCredentials,
    ProvisionError, VerifyState,
};

use crate::mocks::{
    HOSTNAME, MemFs, MockHost, MockVms, NoopSleeper, RecordingReporter, RecordingRunner,
    ScriptedProbe,
};

const RUN_NAME: &str = "dpt_test_2024_03_07_09_05_02";

fn started_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 7)
        .and_then(|d| d.and_hms_opt(9, 5, 2))
        .expect("valid timestamp")
}

fn work_dir() -> PathBuf {
    PathBuf::from("/work")
}

fn options(config: BootstrapConfig) -> BootstrapOptions {
    BootstrapOptions {
        config,
        credentials: HostCredentials::new("github.com", "tester", "s3cr3t"),
        work_dir: work_dir(),
        started_at: started_at(),
    }
}

/// Default config without file rewrites, so the in-memory project can stay
/// empty.
fn bare_config() -> BootstrapConfig {
    BootstrapConfig {
        rewrites: Vec::new(),
        copies: Vec::new(),
        ..BootstrapConfig::default()
    }
}

struct World {
    runner: RecordingRunner,
    vms: MockVms,
    host: MockHost,
    probe: ScriptedProbe,
    sleeper: NoopSleeper,
    fs: MemFs,
    reporter: RecordingReporter,
}

impl World {
    fn new() -> Self {
        Self {
            runner: RecordingRunner::default(),
            vms: MockVms::default(),
            host: MockHost::default(),
            probe: ScriptedProbe::always(200),
            sleeper: NoopSleeper::default(),
            fs: MemFs::default(),
            reporter: RecordingReporter::default(),
        }
    }

    async fn run_until(
        &self,
        opts: &BootstrapOptions,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<BootstrapReport> {
        Collaborators {
            runner: &self.runner,
            provisioner: &self.vms,
            host: &self.host,
            probe: &self.probe,
            sleeper: &self.sleeper,
            fs: &self.fs,
            reporter: &self.reporter,
        }
        .bootstrap(opts, shutdown)
        .await
    }

    async fn run(&self, opts: &BootstrapOptions) -> anyhow::Result<BootstrapReport> {
        self.run_until(opts, std::future::pending()).await
    }

    fn released_vms(&self) -> usize {
        self.vms.released.lock().expect("lock").len()
    }

    fn deleted_repos(&self) -> Vec<String> {
        self.host.deleted.lock().expect("lock").clone()
    }

    fn removed_paths(&self) -> Vec<PathBuf> {
        self.fs.removed.lock().expect("lock").clone()
    }
}

fn expected_local_paths() -> Vec<PathBuf> {
    vec![
        work_dir().join(RUN_NAME),
        work_dir().join(format!("env_{RUN_NAME}")),
        work_dir().join(format!("{RUN_NAME}.pem")),
    ]
}

#[tokio::test]
async fn test_happy_path_runs_steps_in_order_and_cleans_up() {
    let world = World::new();

    let report = world.run(&options(bare_config())).await.expect("run");

    assert_eq!(report.name, RUN_NAME);
    assert_eq!(report.verification.state, VerifyState::Succeeded);
    assert!(report.cleanup.repository_deleted);
    assert!(report.cleanup.vm_released);
    assert!(report.cleanup.leftover_paths.is_empty());

    let commands = world.runner.commands();
    let position = |needle: &str| {
        commands
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("`{needle}` not run; ran {commands:#?}"))
    };
    let order = [
        "django-admin.py startproject",
        "virtualenv",
        "git init",
        "git commit -m",
        "git remote add origin https://github.com/tester/",
        "git push -u origin master",
        "pip install -q -r requirements/dev.txt",
        "setup_master -H",
        "sync:1",
        "setup_minion:salt-master",
        "setup_minion:web,balancer,db-master,cache,queue,worker",
        "staging deploy",
    ];
    let positions: Vec<usize> = order.iter().map(|n| position(n)).collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "steps out of order: {commands:#?}"
    );

    assert_eq!(world.deleted_repos(), [format!("tester/{RUN_NAME}")]);
    assert_eq!(world.released_vms(), 1);
    assert_eq!(world.removed_paths(), expected_local_paths());
}

#[tokio::test]
async fn test_vm_tags_and_key_path_follow_run_name() {
    let world = World::new();
    world.run(&options(bare_config())).await.expect("run");

    let launched = world.vms.launched.lock().expect("lock");
    let spec = &launched[0];
    assert_eq!(spec.name, RUN_NAME);
    assert_eq!(spec.key_path, work_dir().join(format!("{RUN_NAME}.pem")));
    assert_eq!(spec.tags.get("Name").map(String::as_str), Some(RUN_NAME));
    assert_eq!(spec.image, "ami-fa7dba92");
}

#[tokio::test]
async fn test_deploy_tool_gets_per_run_credentials() {
    let world = World::new();
    world.run(&options(bare_config())).await.expect("run");

    let deploy = world.runner.find("staging deploy").expect("deploy ran");
    let key = work_dir()
        .join(format!("{RUN_NAME}.pem"))
        .to_string_lossy()
        .into_owned();
    assert!(deploy.program.ends_with("bin/fab"), "{}", deploy.program);
    assert_eq!(
        &deploy.args[..5],
        [
            "-u",
            "ubuntu",
            "-i",
            key.as_str(),
            "--disable-known-hosts"
        ]
    );
    assert_eq!(deploy.cwd, Some(work_dir().join(RUN_NAME)));

    let setup = world.runner.find("setup_master").expect("setup ran");
    assert!(setup.args.iter().any(|a| a == HOSTNAME));
}

#[tokio::test]
async fn test_push_uses_scoped_netrc_and_preserves_existing_one() {
    let netrc = work_dir().join(".netrc");
    let mut world = World::new();
    world.fs = MemFs::default().with_file(&netrc, "machine example.org\nlogin me\n");

    world.run(&options(bare_config())).await.expect("run");

    let push = world.runner.find("git push").expect("push ran");
    assert!(
        push.env
            .iter()
            .any(|(k, v)| k == "HOME" && Path::new(v) == work_dir())
    );
    assert_eq!(
        world.fs.get(&netrc).as_deref(),
        Some("machine example.org\nlogin me\n"),
        "pre-existing credentials restored byte-for-byte"
    );
    assert!(world.fs.get(&work_dir().join(".netrc.bak")).is_none());
    assert_eq!(*world.fs.private.lock().expect("lock"), [netrc]);
}

#[tokio::test]
async fn test_placeholders_are_filled_with_live_values() {
    let project = work_dir().join(RUN_NAME);
    let mut world = World::new();
    world.fs = MemFs::default()
        .with_file(project.join("fabfile.py"), "env.hosts = ['CHANGEME']\n")
        .with_file(project.join("conf/pillar/secrets.ex"), "secret_key: x\n");
    let config = BootstrapConfig {
        rewrites: vec![RewriteRule {
            file: PathBuf::from("fabfile.py"),
            pattern: "CHANGEME".to_string(),
            replacement: "{hostname}".to_string(),
        }],
        copies: vec![CopyRule {
            from: PathBuf::from("conf/pillar/secrets.ex"),
            to: PathBuf::from("conf/pillar/staging/secrets.sls"),
        }],
        ..BootstrapConfig::default()
    };

    let report = world.run(&options(config)).await.expect("run");
    assert!(report.verification.succeeded());

    assert_eq!(
        world.fs.last_write(&project.join("fabfile.py")).as_deref(),
        Some(format!("env.hosts = ['{HOSTNAME}']\n").as_str())
    );
    assert_eq!(
        world
            .fs
            .last_write(&project.join("conf/pillar/staging/secrets.sls"))
            .as_deref(),
        Some("secret_key: x\n")
    );
    assert!(
        world.fs.get(&project.join("fabfile.py")).is_none(),
        "project removed by cleanup"
    );
}

#[tokio::test]
async fn test_repository_creation_failure_releases_vm_only() {
    let mut world = World::new();
    world.host.fail_create = true;

    let err = world
        .run(&options(bare_config()))
        .await
        .expect_err("repo creation fails");

    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Repository { .. })
    ));
    assert_eq!(world.released_vms(), 1);
    assert!(world.deleted_repos().is_empty());
    assert!(world.runner.commands().is_empty());
    assert_eq!(world.removed_paths(), expected_local_paths());
}

#[tokio::test]
async fn test_launch_failure_releases_nothing_remote() {
    let mut world = World::new();
    world.vms.fail_launch = true;

    let err = world
        .run(&options(bare_config()))
        .await
        .expect_err("launch fails");

    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::VmLaunch { .. })
    ));
    assert_eq!(world.released_vms(), 0);
    assert!(world.host.created.lock().expect("lock").is_empty());
    assert_eq!(world.removed_paths(), expected_local_paths());
}

#[tokio::test]
async fn test_mid_sequence_failure_releases_everything_once() {
    let mut world = World::new();
    world.runner = RecordingRunner::default().script(
        "pip install",
        [CommandResult::new(Some(1), "No matching distribution found")],
    );

    let err = world
        .run(&options(bare_config()))
        .await
        .expect_err("pip fails");

    let failed = err.downcast_ref::<CommandFailed>().expect("CommandFailed");
    assert_eq!(failed.code, Some(1));
    assert!(failed.output.contains("No matching distribution"));
    assert_eq!(world.released_vms(), 1);
    assert_eq!(world.deleted_repos().len(), 1);
    assert!(
        world.runner.find("setup_master").is_none(),
        "no steps after the failure"
    );
}

#[tokio::test]
async fn test_failed_push_still_removes_credentials() {
    let mut world = World::new();
    world.runner = RecordingRunner::default().script(
        "git push",
        [CommandResult::new(Some(128), "fatal: Authentication failed")],
    );

    let err = world
        .run(&options(bare_config()))
        .await
        .expect_err("push fails");

    assert!(err.downcast_ref::<CommandFailed>().is_some());
    assert!(world.fs.get(&work_dir().join(".netrc")).is_none());
    assert_eq!(world.deleted_repos().len(), 1);
}

#[tokio::test]
async fn test_push_error_wins_over_failed_credential_restore() {
    let runner = RecordingRunner::default().script(
        "git push",
        [CommandResult::new(Some(128), "fatal: Authentication failed")],
    );
    let fs = MemFs {
        fail_remove: true,
        ..MemFs::default()
    };
    let credentials = HostCredentials::new("github.com", "tester", "s3cr3t");

    let err = project::push(
        &runner,
        &fs,
        Path::new("/work/project"),
        &work_dir(),
        &GitConfig::default(),
        &credentials,
    )
    .await
    .expect_err("push fails");

    let failed = err.downcast_ref::<CommandFailed>().expect("push error kept");
    assert!(failed.output.contains("Authentication failed"));
}

#[tokio::test]
async fn test_failed_credential_restore_fails_a_successful_push() {
    let runner = RecordingRunner::default();
    let fs = MemFs {
        fail_remove: true,
        ..MemFs::default()
    };
    let credentials = HostCredentials::new("github.com", "tester", "s3cr3t");

    let err = project::push(
        &runner,
        &fs,
        Path::new("/work/project"),
        &work_dir(),
        &GitConfig::default(),
        &credentials,
    )
    .await
    .expect_err("restore fails");

    assert!(format!("{err:#}").contains("permission denied"));
}

#[tokio::test]
async fn test_setup_task_failure_is_fatal() {
    let mut world = World::new();
    world.runner = RecordingRunner::default()
        .script("sync:1", [CommandResult::new(Some(1), "Fatal error")]);

    let err = world
        .run(&options(bare_config()))
        .await
        .expect_err("setup fails");

    assert!(err.downcast_ref::<CommandFailed>().is_some());
    assert!(world.runner.find("staging deploy").is_none());
    assert_eq!(world.released_vms(), 1);
}

#[tokio::test]
async fn test_verification_timeout_is_reported_not_raised() {
    let mut world = World::new();
    world.probe = ScriptedProbe::always(503);

    let report = world
        .run(&options(bare_config()))
        .await
        .expect("timeout is not an error");

    assert_eq!(report.verification.state, VerifyState::TimedOut);
    assert_eq!(report.verification.attempts, 180);
    assert!(report.cleanup.repository_deleted);
    assert!(report.cleanup.vm_released);
    assert!(
        world
            .reporter
            .warnings()
            .iter()
            .any(|w| w.contains("did not become ready after 180 attempts"))
    );
}

#[tokio::test]
async fn test_cleanup_failure_does_not_mask_success() {
    let mut world = World::new();
    world.host.fail_delete = true;

    let report = world.run(&options(bare_config())).await.expect("run");

    assert!(report.verification.succeeded());
    assert!(!report.cleanup.repository_deleted);
    assert!(report.cleanup.vm_released, "VM released after repo failure");
    assert_eq!(world.deleted_repos().len(), 1, "no retry");
}

#[tokio::test]
async fn test_interrupt_during_boot_releases_launched_vm() {
    let mut world = World::new();
    world.vms.hang_on_wait = true;

    let err = world
        .run_until(&options(bare_config()), async {})
        .await
        .expect_err("interrupted");

    assert!(matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::Interrupted)
    ));
    assert_eq!(world.released_vms(), 1, "handle stored before the wait");
    assert!(world.host.created.lock().expect("lock").is_empty());
    assert_eq!(world.removed_paths(), expected_local_paths());
}
