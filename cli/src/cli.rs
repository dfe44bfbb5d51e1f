//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// Bootstrap a throwaway environment from a project template and verify it deploys
#[derive(Parser)]
#[command(
    name = "tplcheck",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (default: $TPLCHECK_CONFIG or ~/.tplcheck/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision, push, deploy, and poll until healthy, then tear everything down
    Run(commands::run::RunArgs),

    /// Show the effective configuration
    Config,

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            quiet,
            no_color,
            config,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            no_color,
            quiet,
            config,
        });
        match command {
            Command::Run(args) => commands::run::run(&app, args).await,
            Command::Config => commands::config::run(&app),
            Command::Version => {
                commands::version::run();
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
