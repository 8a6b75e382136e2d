//! Command: push on every debounced local change until Ctrl-C.
use anyhow::{Context as _, Result};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use super::CommandSetup;
use crate::cli::{GlobalOpts, WatchOpts};
use crate::config;
use crate::logging::{Log, Logger, StepStatus};
use crate::watch::{SyncWatcher, WatchTargets};

/// Run the watch command.
///
/// # Errors
///
/// Returns an error if the configuration is unusable, the watcher cannot be
/// started, or the Ctrl-C handler cannot be installed.  Failed pushes are
/// logged and watching continues.
pub fn run(global: &GlobalOpts, opts: &WatchOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    let sync_config = config::load_config(&setup.locations).context("cannot watch")?;
    let repo_dir = setup
        .locations
        .repo_dir(sync_config.local_repo_path.as_deref());
    let targets = WatchTargets::for_locations(&setup.locations, &repo_dir);

    log.stage("Watching for changes");
    for root in &targets.roots {
        log.info(&format!("watching {}", root.display()));
    }

    let service = Arc::new(setup.service);
    let callback_log = Arc::clone(log);
    let mut watcher = SyncWatcher::start(targets, Duration::from_secs(opts.debounce), move || {
        match service.push() {
            Ok(outcome) => callback_log.info(&outcome.summary()),
            Err(e) => {
                callback_log.error(&format!("push failed: {e}"));
                callback_log.record_step("watch push", StepStatus::Failed, Some(&e.to_string()));
            }
        }
    })
    .context("failed to start watcher")?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let _ = stop_rx.recv();
    log.info("stopping");
    watcher.stop();
    log.print_summary();
    Ok(())
}
