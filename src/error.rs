//! Domain-specific error types for the sync engine.
//!
//! Library modules return [`SyncError`]; command handlers at the CLI boundary
//! convert it to [`anyhow::Error`] via the standard `?` operator.  Every
//! message is safe to show verbatim to a human: it names operations and paths
//! but never includes file contents.
//!
//! # Error taxonomy
//!
//! ```text
//! SyncError
//! ├── ConfigMissing:           no sync configuration present
//! ├── ConfigInvalid:           malformed or failed validation
//! ├── CommandFailure:          external git/gh/op invocation failed
//! ├── RepoPrivacyViolation:    secrets enabled against a non-private remote
//! ├── RepoDiverged:            local and remote both advanced
//! ├── UncommittedChanges:      mirror has local edits (foreground flows)
//! ├── LockBusy:                another process holds the advisory lock
//! ├── SecretsBackendAmbiguous: several documents match one title
//! ├── AuthFilesAlreadyTracked: backend-owned files exist in mirror history
//! ├── Io:                      filesystem failure at a path
//! └── Parse:                   a persisted file is not valid JSON(C)
//! ```
use std::path::PathBuf;

use thiserror::Error;

use crate::lock::LockInfo;

/// Convenience alias used throughout the library.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Top-level error type for the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No sync configuration file exists.
    #[error("no sync configuration found at {}; run `opencode-sync init` or `opencode-sync link`", .path.display())]
    ConfigMissing {
        /// Expected location of the configuration file.
        path: PathBuf,
    },

    /// The configuration is malformed or fails validation.
    #[error("invalid sync configuration: {0}")]
    ConfigInvalid(String),

    /// An external command failed.
    #[error("{operation} failed: {message}")]
    CommandFailure {
        /// Operation name, e.g. `git fetch`.
        operation: String,
        /// Sanitized failure text.
        message: String,
    },

    /// Secrets are enabled but the remote repository is not private.
    #[error("repository {repo} is not private; refusing to sync secrets to it")]
    RepoPrivacyViolation {
        /// Repository identifier.
        repo: String,
    },

    /// Local and remote histories have both advanced.
    #[error(
        "local branch {branch} has diverged from origin ({ahead} ahead, {behind} behind); rebase or reset the mirror manually"
    )]
    RepoDiverged {
        /// Working branch.
        branch: String,
        /// Commits only present locally.
        ahead: u32,
        /// Commits only present on the remote.
        behind: u32,
    },

    /// The mirror has uncommitted changes.
    #[error("mirror at {} has uncommitted changes; run `opencode-sync resolve`", .path.display())]
    UncommittedChanges {
        /// Mirror working-copy path.
        path: PathBuf,
    },

    /// Another process holds the advisory lock.
    #[error("another sync is running (pid {} on {}, started {})", .0.pid, .0.hostname, .0.started_at)]
    LockBusy(LockInfo),

    /// More than one backend document matches a configured title.
    #[error("secrets backend has {count} documents titled '{title}'; rename or delete the duplicates")]
    SecretsBackendAmbiguous {
        /// Configured document title.
        title: String,
        /// Number of matching documents.
        count: usize,
    },

    /// Backend-owned files are already committed in mirror history.
    #[error(
        "a secrets backend is configured but {} already tracked in the mirror history; remove them from history (e.g. git filter-repo) before syncing",
        .paths.join(", ")
    )]
    AuthFilesAlreadyTracked {
        /// Mirror-relative paths found in history.
        paths: Vec<String>,
    },

    /// Filesystem failure.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A persisted file could not be parsed.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Parser message (position only, never file contents).
        message: String,
    },
}

impl SyncError {
    /// Build an [`SyncError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`SyncError::CommandFailure`].
    pub fn command(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Build a [`SyncError::Parse`] from a `serde_json` error.
    pub fn parse(path: impl Into<PathBuf>, err: &serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            message: format!("line {} column {}: {:?}", err.line(), err.column(), err.classify()),
        }
    }
}
