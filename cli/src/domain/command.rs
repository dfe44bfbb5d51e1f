//! Process invocations and their captured results.

use std::path::PathBuf;
use std::time::Duration;

/// A process to run: program, arguments, and per-call overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Overrides the runner's default timeout.
    pub timeout: Option<Duration>,
    /// Whether output lines are echoed to the operator as they arrive.
    pub echo: bool,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: None,
            echo: true,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Capture output without echoing it (key material, machine-readable JSON).
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Render as a single line for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status and combined stdout/stderr text of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub output: String,
}

impl CommandResult {
    #[must_use]
    pub fn new(code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            code,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether the captured output contains `marker` anywhere.
    #[must_use]
    pub fn contains(&self, marker: &str) -> bool {
        self.output.contains(marker)
    }
}
