//! Subcommand handlers and the setup they share.
pub mod completions;
pub mod init;
pub mod resolve;
pub mod status;
pub mod sync;
pub mod version;
pub mod watch;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::error::SyncError;
use crate::exec::{Executor, SystemExecutor};
use crate::host::{CliHost, HostServices};
use crate::locations::{CONFIG_DIR_ENV, SyncLocations};
use crate::logging::{Log, Logger, StepStatus};
use crate::platform::Platform;
use crate::sync::{SyncOutcome, SyncService};

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates platform detection, location resolution and wiring of the
/// sync service so that each command does not have to repeat the
/// boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Detected platform.
    pub platform: Platform,
    /// Resolved directories and file paths.
    pub locations: SyncLocations,
    /// Sync service wired to the real executor and host.
    pub service: SyncService,
}

impl CommandSetup {
    /// Detect the platform, resolve locations and build the service.
    #[must_use]
    pub fn init(global: &GlobalOpts, log: &Arc<Logger>) -> Self {
        let platform = Platform::detect();
        let mut env: HashMap<String, String> = std::env::vars().collect();
        if let Some(dir) = &global.config_dir {
            env.insert(CONFIG_DIR_ENV.to_string(), dir.display().to_string());
        }
        let locations = SyncLocations::resolve(&env, &platform);

        log.debug(&format!("config dir: {}", locations.config_dir.display()));
        log.debug(&format!("data dir: {}", locations.data_dir.display()));
        log.debug(&format!("state dir: {}", locations.state_dir.display()));
        log.debug(&format!("sync config: {}", locations.sync_config_path.display()));

        let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
        let host: Arc<dyn HostServices> = Arc::new(CliHost::new(
            Arc::clone(log) as Arc<dyn Log>,
            Arc::clone(&executor),
        ));
        let service = SyncService::new(locations.clone(), platform, executor, host);
        Self {
            platform,
            locations,
            service,
        }
    }
}

/// Record a sync flow's result as a step, print the summary, and convert the
/// error for the command boundary.
///
/// # Errors
///
/// Returns the flow's error with the command name as context.
pub fn finish(
    name: &str,
    result: std::result::Result<SyncOutcome, SyncError>,
    log: &Logger,
) -> Result<()> {
    match result {
        Ok(outcome) => {
            let summary = outcome.summary();
            log.info(&summary);
            log.record_step(name, outcome.step_status(), Some(&summary));
            log.print_summary();
            Ok(())
        }
        Err(e) => {
            log.record_step(name, StepStatus::Failed, Some(&e.to_string()));
            log.print_summary();
            Err(anyhow::Error::new(e).context(format!("{name} failed")))
        }
    }
}
