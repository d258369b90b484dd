//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use console::Style;
use ota_types::{BootTarget, FailedUpdate, LifecycleStatus, PackageRecord, PendingUpdate};
use serde::Serialize;
use std::io;

/// Result of one simulator command
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    Boot(BootReport),
    Confirmed,
    Installed { package: PackageRecord },
    Status(StatusReport),
    Failed { updates: Vec<FailedUpdate> },
    Discarded,
}

/// What one simulated launch decided
#[derive(Debug, Serialize)]
pub struct BootReport {
    pub target: BootTarget,
    pub status: LifecycleStatus,
    pub did_update: bool,
    pub need_to_report_rollback: bool,
    pub confirmed: bool,
}

/// Persisted lifecycle state, read without launching
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub app_version: Option<String>,
    pub current: Option<PackageRecord>,
    pub previous: Option<PackageRecord>,
    pub pending: Option<PendingUpdate>,
    pub failed_count: usize,
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self {
            json_output,
            colors: console::colors_enabled(),
        }
    }

    /// Render command result
    pub fn render_result(&self, result: &CommandOutput) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            CommandOutput::Boot(report) => self.render_boot(report),
            CommandOutput::Confirmed => self.render_success("Update confirmed"),
            CommandOutput::Installed { package } => self.render_installed(package),
            CommandOutput::Status(report) => self.render_status(report),
            CommandOutput::Failed { updates } => self.render_failed(updates),
            CommandOutput::Discarded => self.render_success("All updates discarded"),
        }
        Ok(())
    }

    fn render_boot(&self, report: &BootReport) {
        match &report.target {
            BootTarget::Binary { path } => {
                println!("Booting embedded bundle: {}", path.display());
            }
            BootTarget::Package { path, package_hash } => {
                println!(
                    "Booting package {}: {}",
                    self.style_hash(package_hash),
                    path.display()
                );
            }
        }
        println!("Status:      {}", report.status);
        if report.did_update {
            println!("First run of a new update");
        }
        if report.need_to_report_rollback {
            println!("{}", self.style_warning("An unconfirmed update was rolled back"));
        }
        if report.confirmed {
            println!("Update confirmed");
        }
    }

    fn render_installed(&self, package: &PackageRecord) {
        println!("Installed package {}", self.style_hash(&package.package_hash));
        if let Some(label) = &package.label {
            println!("Label:       {label}");
        }
        if let Some(version) = &package.app_version {
            println!("App version: {version}");
        }
        println!("Takes effect on the next boot.");
    }

    fn render_status(&self, report: &StatusReport) {
        match &report.app_version {
            Some(version) => println!("Binary:      {version}"),
            None => println!("Binary:      {}", self.style_warning("unknown")),
        }
        println!("Current:     {}", describe(report.current.as_ref()));
        println!("Previous:    {}", describe(report.previous.as_ref()));
        match &report.pending {
            Some(pending) if pending.is_first_run => {
                println!("Pending:     {} (running, unconfirmed)", pending.package_hash);
            }
            Some(pending) => println!("Pending:     {} (next boot)", pending.package_hash),
            None => println!("Pending:     -"),
        }
        println!("Failed:      {}", report.failed_count);
    }

    fn render_failed(&self, updates: &[FailedUpdate]) {
        if updates.is_empty() {
            println!("No failed updates.");
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Label").add_attribute(Attribute::Bold),
            Cell::new("App version").add_attribute(Attribute::Bold),
            Cell::new("Failed at").add_attribute(Attribute::Bold),
        ]);

        for update in updates {
            table.add_row(vec![
                Cell::new(&update.package_hash),
                Cell::new(update.label.as_deref().unwrap_or("-")),
                Cell::new(update.app_version.as_deref().unwrap_or("-")),
                Cell::new(update.failed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            ]);
        }

        println!("{table}");
    }

    fn render_success(&self, message: &str) {
        if self.colors {
            println!("{}", Style::new().green().apply_to(message));
        } else {
            println!("{message}");
        }
    }

    fn style_hash(&self, hash: &str) -> String {
        if self.colors {
            Style::new().cyan().bold().apply_to(hash).to_string()
        } else {
            hash.to_string()
        }
    }

    fn style_warning(&self, message: &str) -> String {
        if self.colors {
            Style::new().yellow().apply_to(message).to_string()
        } else {
            message.to_string()
        }
    }
}

fn describe(record: Option<&PackageRecord>) -> String {
    match record {
        Some(record) => match &record.label {
            Some(label) => format!("{} ({label})", record.package_hash),
            None => record.package_hash.clone(),
        },
        None => "-".to_string(),
    }
}
