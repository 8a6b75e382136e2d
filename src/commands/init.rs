//! Commands: `init` and `link`.
use anyhow::Result;
use std::sync::Arc;

use super::{CommandSetup, finish};
use crate::cli::{GlobalOpts, InitOpts, LinkOpts};
use crate::logging::{Log, Logger};
use crate::sync::{InitOptions, LinkOptions};

/// Configure a repository (creating it when needed) and push to it.
///
/// # Errors
///
/// Returns an error if the repository cannot be created or inspected, the
/// configuration cannot be written, or the initial push fails.
pub fn run_init(global: &GlobalOpts, opts: &InitOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Initializing");
    let options = InitOptions {
        repo: opts.repo.clone(),
        branch: opts.branch.clone(),
        include_secrets: opts.include_secrets,
        public: opts.public,
        local_repo_path: opts.local_repo_path.clone(),
    };
    finish("init", setup.service.init(&options), log)
}

/// Attach to an existing repository and pull it.
///
/// # Errors
///
/// Returns an error if no repository can be determined or the pull fails.
pub fn run_link(global: &GlobalOpts, opts: &LinkOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log);
    log.stage("Linking");
    let options = LinkOptions {
        repo: opts.repo.clone(),
        branch: opts.branch.clone(),
        local_repo_path: opts.local_repo_path.clone(),
    };
    finish("link", setup.service.link(&options), log)
}
