//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ota - plays the host runtime around the update lifecycle
#[derive(Parser)]
#[command(name = "ota")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Simulate host launches against the ota update lifecycle")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to the log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Launch the host once and print the bundle it would run
    Boot {
        /// Embedded bundle file name (defaults to the configured one)
        #[arg(long, value_name = "NAME")]
        bundle: Option<String>,

        /// Confirm the update right after a successful launch
        #[arg(long)]
        confirm: bool,
    },

    /// Confirm that the running update started successfully
    Confirm,

    /// Install a downloaded package as the next boot candidate
    #[command(alias = "i")]
    Install {
        /// Package metadata as JSON
        #[arg(long, value_name = "FILE")]
        record: PathBuf,

        /// Directory holding the unpacked package contents
        #[arg(long, value_name = "DIR")]
        files: PathBuf,
    },

    /// Show the installed packages and the pending update
    #[command(alias = "st")]
    Status,

    /// List updates that failed to confirm
    Failed,

    /// Drop every installed package and all update records
    Discard,
}

impl Commands {
    /// Short name used in log records
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boot { .. } => "boot",
            Self::Confirm => "confirm",
            Self::Install { .. } => "install",
            Self::Status => "status",
            Self::Failed => "failed",
            Self::Discard => "discard",
        }
    }
}
