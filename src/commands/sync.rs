//! Commands: `sync`, `pull` and `push`.
use anyhow::Result;
use std::sync::Arc;

use super::{CommandSetup, finish};
use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};

/// Run one background cycle.
///
/// # Errors
///
/// Returns an error if the cycle fails (diverged mirror, invalid
/// configuration, git failure, ...).  A busy lock or dirty mirror is not an
/// error.
pub fn run_sync(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Synchronizing");
    finish("sync", setup.service.startup(), log)
}

/// Fast-forward the mirror and apply it locally.
///
/// # Errors
///
/// Returns an error if the pull fails.
pub fn run_pull(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Pulling");
    finish("pull", setup.service.pull(), log)
}

/// Capture local changes and push them.
///
/// # Errors
///
/// Returns an error if the push fails.
pub fn run_push(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Pushing");
    finish("push", setup.service.push(), log)
}
