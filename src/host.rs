//! Host-services port: logging, user notification and the one-shot advisor.
//!
//! The orchestrator only talks to its surroundings through this trait and
//! [`Executor`], so it can run under the CLI, a daemon, or a test harness.
use std::path::PathBuf;
use std::sync::Arc;

use crate::exec::Executor;
use crate::logging::Log;

/// Capabilities the sync flows need from whatever is hosting them.
pub trait HostServices: Send + Sync {
    /// Structured log sink.
    fn log(&self) -> &dyn Log;

    /// Surface a short message to the user.
    fn notify(&self, message: &str);

    /// Send `prompt` to the advisor described by `command` and return its
    /// answer, or `None` when it produced nothing usable.
    fn ask(&self, command: &[String], prompt: &str) -> Option<String>;
}

/// [`HostServices`] for the command-line front end.
///
/// Notifications go to the log at info level; the advisor is an external
/// command whose last argument is the prompt.
pub struct CliHost {
    log: Arc<dyn Log>,
    executor: Arc<dyn Executor>,
    work_dir: PathBuf,
}

impl std::fmt::Debug for CliHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliHost")
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

impl CliHost {
    /// Host that logs to `log` and runs the advisor through `executor`.
    #[must_use]
    pub fn new(log: Arc<dyn Log>, executor: Arc<dyn Executor>) -> Self {
        Self {
            log,
            executor,
            work_dir: std::env::temp_dir(),
        }
    }
}

impl HostServices for CliHost {
    fn log(&self) -> &dyn Log {
        &*self.log
    }

    fn notify(&self, message: &str) {
        self.log.info(message);
    }

    fn ask(&self, command: &[String], prompt: &str) -> Option<String> {
        let (program, rest) = command.split_first()?;
        let mut args: Vec<&str> = rest.iter().map(String::as_str).collect();
        args.push(prompt);
        match self.executor.run_in_unchecked(&self.work_dir, program, &args) {
            Ok(result) if result.success => {
                let answer = result.stdout.trim();
                if answer.is_empty() {
                    self.log.debug("advisor returned no output");
                    None
                } else {
                    Some(answer.to_string())
                }
            }
            Ok(result) => {
                self.log
                    .debug(&format!("advisor failed: {}", result.failure_text()));
                None
            }
            Err(e) => {
                self.log.debug(&format!("advisor could not be started: {e:#}"));
                None
            }
        }
    }
}
