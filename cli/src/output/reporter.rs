//! `ProgressReporter` backed by the terminal.

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Prints workflow progress through an `OutputContext` and mirrors each
/// event as a `debug` trace, so `RUST_LOG=debug` interleaves progress with
/// adapter logs.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        tracing::debug!(kind = "step", "{message}");
        self.ctx.step(message);
    }

    fn success(&self, message: &str) {
        tracing::debug!(kind = "success", "{message}");
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        tracing::debug!(kind = "warn", "{message}");
        self.ctx.warn(message);
    }
}
