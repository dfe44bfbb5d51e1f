//! Terminal output for a bootstrap run.
//!
//! Every progress line carries the time since the run started, so a slow
//! `pip install` or a long health poll is visible at a glance.

pub mod reporter;
pub mod styles;

use std::time::{Duration, Instant};

use console::Term;
use owo_colors::{OwoColorize as _, Style};
pub use reporter::TerminalReporter;
pub use styles::Styles;

pub struct OutputContext {
    pub styles: Styles,
    /// Suppress progress and the summary.
    pub quiet: bool,
    started: Instant,
}

impl OutputContext {
    /// Colors are used only when stdout is a terminal and `no_color` is unset.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let styles = if !no_color && Term::stdout().is_term() {
            Styles::colored()
        } else {
            Styles::default()
        };
        Self {
            styles,
            quiet,
            started: Instant::now(),
        }
    }

    pub fn step(&self, msg: &str) {
        self.line("→", &self.styles.step, msg);
    }

    pub fn success(&self, msg: &str) {
        self.line("✓", &self.styles.ok, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line("⚠", &self.styles.warn, msg);
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!();
            println!("  {}", msg.style(self.styles.title));
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.clock));
        }
    }

    fn line(&self, marker: &str, style: &Style, msg: &str) {
        if !self.quiet {
            println!("{} {} {msg}", self.stamp(), marker.style(*style));
        }
    }

    fn stamp(&self) -> String {
        format_elapsed(self.started.elapsed())
            .style(self.styles.clock)
            .to_string()
    }
}

/// `[mm:ss]`; minutes keep counting past the hour.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("[{:02}:{:02}]", secs / 60, secs % 60)
}
