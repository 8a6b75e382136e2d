//! `opencode-sync` command-line entry point.
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use opencode_sync::{cli, commands, logging};

fn command_name(command: &cli::Command) -> &'static str {
    match command {
        cli::Command::Sync => "sync",
        cli::Command::Pull => "pull",
        cli::Command::Push => "push",
        cli::Command::Status => "status",
        cli::Command::Init(_) => "init",
        cli::Command::Link(_) => "link",
        cli::Command::Resolve(_) => "resolve",
        cli::Command::Watch(_) => "watch",
        cli::Command::Completions(_) => "completions",
        cli::Command::Version => "version",
    }
}

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match &args.command {
        cli::Command::Version => {
            commands::version::run();
            return Ok(());
        }
        cli::Command::Completions(opts) => {
            commands::completions::run(opts);
            return Ok(());
        }
        _ => {}
    }

    let name = command_name(&args.command);
    logging::init_subscriber(args.verbose, name);
    let log = Arc::new(logging::Logger::new(name));

    match &args.command {
        cli::Command::Sync => commands::sync::run_sync(&args.global, &log),
        cli::Command::Pull => commands::sync::run_pull(&args.global, &log),
        cli::Command::Push => commands::sync::run_push(&args.global, &log),
        cli::Command::Status => commands::status::run(&args.global, &log),
        cli::Command::Init(opts) => commands::init::run_init(&args.global, opts, &log),
        cli::Command::Link(opts) => commands::init::run_link(&args.global, opts, &log),
        cli::Command::Resolve(opts) => commands::resolve::run(&args.global, opts, &log),
        cli::Command::Watch(opts) => commands::watch::run(&args.global, opts, &log),
        cli::Command::Completions(_) | cli::Command::Version => Ok(()),
    }
}
