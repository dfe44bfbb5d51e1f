//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` streams each output line to the operator as it
//! arrives, accumulates the combined stdout/stderr text, and kills the child
//! when its timeout fires.

use std::io::Write as _;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::application::ports::CommandRunner;
use crate::domain::{CommandResult, CommandSpec};

/// Default timeout for any single external command.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Production `CommandRunner` backed by `tokio::process`.
///
/// `tokio::time::timeout` around `.wait()` drops the future but leaves the OS
/// process running, so the timeout branch kills the child explicitly.
pub struct TokioCommandRunner {
    timeout: Duration,
    echo: bool,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            echo: true,
        }
    }

    /// Disable echoing for every command, regardless of `CommandSpec::echo`.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run_unchecked(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let timeout = spec.timeout.unwrap_or(self.timeout);
        let echo = self.echo && spec.echo;
        let program = spec.program.as_str();

        let mut command = tokio::process::Command::new(program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        tracing::debug!(command = %spec.display(), cwd = ?spec.cwd, "spawning");
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::select! {
            result = async {
                let collect = async {
                    let mut output = String::new();
                    while let Some(line) = rx.recv().await {
                        if echo {
                            let _ = std::io::stdout().lock().write_all(line.as_bytes());
                        }
                        output.push_str(&line);
                    }
                    output
                };
                let (status, (), (), output) = tokio::join!(
                    child.wait(),
                    forward_lines(stdout, tx.clone()),
                    forward_lines(stderr, tx),
                    collect,
                );
                let status = status.with_context(|| format!("waiting for {program}"))?;
                tracing::debug!(command = %spec.display(), code = ?status.code(), "finished");
                Ok(CommandResult::new(status.code(), output))
            } => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}

/// Send each line of `stream` (newline included) until EOF.
async fn forward_lines<T>(stream: Option<T>, tx: mpsc::UnboundedSender<String>)
where
    T: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                    break;
                }
            }
        }
    }
}
