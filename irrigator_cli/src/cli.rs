//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "irrigator", version, about = "Drip irrigation controller")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/irrigator.toml")]
    pub config: PathBuf,

    /// Emit status lines and logs as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller loop against simulated hardware
    Run {
        /// Stop after this many scheduler ticks (default: run until Ctrl-C)
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
    },
    /// Parse and validate the config file, then exit
    CheckConfig,
    /// One-shot diagnostic read of every configured channel
    SelfTest,
}
