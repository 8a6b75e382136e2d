//! Command: resolve uncommitted mirror changes.
use anyhow::{Context as _, Result};
use std::sync::Arc;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ResolveOpts};
use crate::logging::{Log, Logger, StepStatus};
use crate::sync::ResolveOutcome;

/// Run the resolve command.
///
/// # Errors
///
/// Returns an error if the lock is busy, the configuration is unusable, or
/// committing / discarding fails.
pub fn run(global: &GlobalOpts, opts: &ResolveOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Resolving mirror changes");
    let outcome = setup
        .service
        .resolve(opts.allow_discard)
        .context("resolve failed")?;

    let (status, message) = match &outcome {
        ResolveOutcome::Clean => (StepStatus::Unchanged, "mirror is clean".to_string()),
        ResolveOutcome::Committed { message } => (StepStatus::Ok, format!("committed: {message}")),
        ResolveOutcome::Discarded => (StepStatus::Ok, "discarded mirror changes".to_string()),
        ResolveOutcome::Manual { reason } => (StepStatus::Warning, reason.clone()),
    };
    log.info(&message);
    log.record_step("resolve", status, Some(&message));
    log.print_summary();
    Ok(())
}
