//! ota - host simulator for the update lifecycle
//!
//! Each invocation plays one host process: `boot` is a launch, `confirm` is
//! the application reporting a healthy start, and a crash is simply a boot
//! that is never followed by a confirm.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{BootReport, CommandOutput, OutputRenderer, StatusReport};
use crate::error::CliError;
use clap::Parser;
use ota_config::Config;
use ota_lifecycle::BundleSelector;
use ota_types::{OutputFormat, PackageRecord};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};

fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    // Log files land in the configured log dir; a config that fails to load
    // is reported again by run()
    let log_dir = Config::load_or_default(cli.global.config.as_deref())
        .map(|mut config| {
            apply_cli_config(&mut config, &cli.global);
            config.log_dir()
        })
        .ok();
    init_tracing(json_mode, cli.global.debug, log_dir.as_deref());

    if let Err(e) = run(cli) {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting ota v{}", env!("CARGO_PKG_VERSION"));

    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(cli.global.config.as_deref())?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli.global);

    let json_output = cli.global.json || config.general.default_output == OutputFormat::Json;

    let (event_sender, mut event_receiver) = ota_events::channel();
    let selector = BundleSelector::from_config(&config, Some(event_sender))?;

    let command_name = cli.command.name();
    let result = execute_command(cli.command, &selector);

    let drained = logging::drain_events(&mut event_receiver);
    tracing::debug!(command = command_name, events = drained, "Events drained");

    let output = result?;
    OutputRenderer::new(json_output).render_result(&output)?;

    info!(command = command_name, "Command completed successfully");
    Ok(())
}

/// Execute the specified command
fn execute_command(command: Commands, selector: &BundleSelector) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Boot { bundle, confirm } => boot(selector, bundle.as_deref(), confirm),

        Commands::Confirm => {
            selector.confirm_ready()?;
            Ok(CommandOutput::Confirmed)
        }

        Commands::Install { record, files } => {
            let record = read_record(&record)?;
            if !files.is_dir() {
                return Err(CliError::InvalidArguments(format!(
                    "package files directory not found: {}",
                    files.display()
                )));
            }
            let package = selector.install_update(&record, &files)?;
            Ok(CommandOutput::Installed { package })
        }

        Commands::Status => {
            let app_version = match selector.app_version() {
                Ok(version) => Some(version),
                Err(e) => {
                    warn!("Binary identity unavailable: {}", e);
                    None
                }
            };
            Ok(CommandOutput::Status(StatusReport {
                app_version,
                current: selector.current_package()?,
                previous: selector.previous_package()?,
                pending: selector.pending_update()?,
                failed_count: selector.failed_updates()?.len(),
            }))
        }

        Commands::Failed => Ok(CommandOutput::Failed {
            updates: selector.failed_updates()?,
        }),

        Commands::Discard => {
            selector.discard_all_updates()?;
            Ok(CommandOutput::Discarded)
        }
    }
}

/// One simulated launch, optionally followed by the application's confirm
fn boot(
    selector: &BundleSelector,
    bundle: Option<&str>,
    confirm: bool,
) -> Result<CommandOutput, CliError> {
    // The host clears its cached dev bundle before asking for a path
    if let Err(e) = selector.clear_debug_cache_if_needed() {
        warn!("Failed to clear development bundle cache: {}", e);
    }

    let target = match bundle {
        Some(name) => selector.resolve_boot_target_for(name)?,
        None => selector.resolve_boot_target()?,
    };
    let did_update = selector.did_just_update();
    let need_to_report_rollback = selector.need_to_report_rollback();

    if confirm {
        selector.confirm_ready()?;
    }

    Ok(CommandOutput::Boot(BootReport {
        status: selector.status()?,
        target,
        did_update,
        need_to_report_rollback,
        confirmed: confirm,
    }))
}

fn read_record(path: &Path) -> Result<PackageRecord, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        CliError::InvalidArguments(format!(
            "invalid package record {}: {e}",
            path.display()
        ))
    })
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool, log_dir: Option<&Path>) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if debug_enabled {
        if let Some((log_file, file)) = log_dir.and_then(open_log_file) {
            tracing_subscriber::fmt()
                .json()
                .with_writer(std::sync::Mutex::new(file))
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                        tracing_subscriber::EnvFilter::new(
                            "info,ota=debug,ota_lifecycle=debug",
                        )
                    }),
                )
                .init();
            if !json_mode {
                eprintln!("Debug logging enabled: {}", log_file.display());
            }
            return;
        }
    }

    if json_mode {
        // JSON mode: keep stdout clean for the result document
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        // Normal mode: minimal logging to stderr
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("warn,ota=warn,ota_lifecycle=warn")
                }),
            )
            .init();
    }
}

fn open_log_file(log_dir: &Path) -> Option<(PathBuf, std::fs::File)> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create log directory: {e}");
        return None;
    }
    let log_file = log_dir.join(format!(
        "ota-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    match std::fs::File::create(&log_file) {
        Ok(file) => Some((log_file, file)),
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {e}");
            None
        }
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(dir) = &global.data_dir {
        config.paths.data_dir = Some(dir.clone());
    }
    if global.json {
        config.general.default_output = OutputFormat::Json;
    }
}
