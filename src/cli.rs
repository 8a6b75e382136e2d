//! Command-line interface definition.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI entry point for the opencode configuration sync engine.
#[derive(Parser, Debug)]
#[command(
    name = "opencode-sync",
    about = "Synchronize opencode configuration through a private git mirror",
    version
)]
pub struct Cli {
    /// The command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Override the opencode config directory (also OPENCODE_SYNC_CONFIG_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one background sync cycle (pull when behind, push otherwise)
    #[command(alias = "startup")]
    Sync,
    /// Fast-forward the mirror and apply it to this machine
    Pull,
    /// Capture this machine into the mirror and push it
    Push,
    /// Show configuration, mirror and secrets backend status
    Status,
    /// Create or choose a repository and push the local configuration
    Init(InitOpts),
    /// Attach to an existing repository and pull it
    Link(LinkOpts),
    /// Ask the advisor how to deal with uncommitted mirror changes
    Resolve(ResolveOpts),
    /// Push on every local change until interrupted
    Watch(WatchOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

/// Options for the `init` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct InitOpts {
    /// Repository URL, owner/name, or name (default: opencode-config)
    #[arg(long)]
    pub repo: Option<String>,

    /// Working branch (default: main)
    #[arg(long)]
    pub branch: Option<String>,

    /// Also sync authentication files and extra secret paths
    #[arg(long)]
    pub include_secrets: bool,

    /// Create the repository as public
    #[arg(long, conflicts_with = "include_secrets")]
    pub public: bool,

    /// Where to keep the mirror checkout
    #[arg(long, value_name = "DIR")]
    pub local_repo_path: Option<PathBuf>,
}

/// Options for the `link` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct LinkOpts {
    /// Repository URL, owner/name, or name (discovered when omitted)
    #[arg(long)]
    pub repo: Option<String>,

    /// Working branch (default: main)
    #[arg(long)]
    pub branch: Option<String>,

    /// Where to keep the mirror checkout
    #[arg(long, value_name = "DIR")]
    pub local_repo_path: Option<PathBuf>,
}

/// Options for the `resolve` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ResolveOpts {
    /// Allow the advisor to discard uncommitted mirror changes
    #[arg(long)]
    pub allow_discard: bool,
}

/// Options for the `watch` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct WatchOpts {
    /// Seconds of quiet before a change is pushed
    #[arg(long, default_value_t = 2)]
    pub debounce: u64,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    pub shell: clap_complete::Shell,
}
