//! Command: print a read-only status report.
use anyhow::{Context as _, Result};
use std::sync::Arc;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};
use crate::sync::StatusReport;

fn timestamp(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map_or_else(
        || "never".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Render `report` as display lines.
#[must_use]
pub fn render(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("config:      {}", report.config_path.display()),
        format!("repository:  {}", report.repo),
        format!("branch:      {}", report.branch),
        format!("mirror:      {}", report.repo_dir.display()),
    ];
    if report.cloned {
        lines.push(format!(
            "checked out: {}",
            report.current_branch.as_deref().unwrap_or("(detached)")
        ));
        if report.changes.is_empty() {
            lines.push("changes:     none".to_string());
        } else {
            lines.push(format!("changes:     {} uncommitted", report.changes.len()));
            lines.extend(report.changes.iter().map(|c| format!("  {c}")));
        }
    } else {
        lines.push("checked out: not cloned yet".to_string());
    }
    lines.push(format!(
        "secrets:     {}",
        if report.include_secrets { "enabled" } else { "disabled" }
    ));
    lines.push(format!("last pull:   {}", timestamp(report.state.last_pull)));
    lines.push(format!("last push:   {}", timestamp(report.state.last_push)));
    lines.push(format!(
        "last remote: {}",
        timestamp(report.state.last_remote_update)
    ));
    if let Some(backend) = &report.backend {
        lines.push(format!(
            "backend:     {} (vault {}, cli {})",
            backend.kind,
            backend.vault,
            if backend.cli_available { "found" } else { "missing" }
        ));
        lines.extend(backend.documents.iter().map(|d| format!("  document: {d}")));
    }
    lines
}

/// Run the status command.
///
/// # Errors
///
/// Returns an error if the configuration is missing or invalid.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Status");
    let report = setup.service.status().context("status failed")?;
    for line in render(&report) {
        log.info(&line);
    }
    Ok(())
}
