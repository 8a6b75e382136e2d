//! Version-control adapter for the mirror working copy.
//!
//! Every call goes through the injected [`Executor`]; failures surface as
//! [`SyncError::CommandFailure`] with sanitized output.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SyncError};
use crate::exec::{ExecResult, Executor};

/// Remote name used for the mirror.
pub const REMOTE: &str = "origin";

/// Relationship between the local branch and its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Commits only present locally.
    pub ahead: u32,
    /// Commits only present on the remote.
    pub behind: u32,
}

impl Divergence {
    /// Both sides advanced.
    #[must_use]
    pub const fn diverged(self) -> bool {
        self.ahead > 0 && self.behind > 0
    }
}

/// A git working copy driven through the command runner.
#[derive(Debug, Clone)]
pub struct GitRepo {
    executor: Arc<dyn Executor>,
    root: PathBuf,
}

fn spawn_error(operation: &str, err: &anyhow::Error) -> SyncError {
    SyncError::command(operation, format!("{err:#}"))
}

impl GitRepo {
    /// Handle for the working copy at `root`.
    #[must_use]
    pub const fn new(executor: Arc<dyn Executor>, root: PathBuf) -> Self {
        Self { executor, root }
    }

    /// Working-copy root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `root` holds a git repository.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn raw(&self, args: &[&str]) -> Result<ExecResult> {
        let operation = format!("git {}", args.first().copied().unwrap_or_default());
        self.executor
            .run_in_unchecked(&self.root, "git", args)
            .map_err(|e| spawn_error(&operation, &e))
    }

    fn git(&self, args: &[&str]) -> Result<ExecResult> {
        let result = self.raw(args)?;
        if result.success {
            Ok(result)
        } else {
            let operation = format!("git {}", args.first().copied().unwrap_or_default());
            Err(SyncError::command(operation, result.failure_text()))
        }
    }

    /// Clone `url` into `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the parent directory cannot be created and
    /// [`SyncError::CommandFailure`] if the clone fails.
    pub fn clone_from(&self, url: &str) -> Result<()> {
        let parent = self.root.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        let dest = self.root.to_string_lossy().to_string();
        let result = self
            .executor
            .run_in_unchecked(parent, "git", &["clone", url, &dest])
            .map_err(|e| spawn_error("git clone", &e))?;
        if result.success {
            Ok(())
        } else {
            Err(SyncError::command("git clone", result.failure_text()))
        }
    }

    /// Fetch from the remote, pruning stale refs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn fetch(&self) -> Result<()> {
        self.git(&["fetch", "--prune", REMOTE]).map(drop)
    }

    /// Current branch name, or `None` on a detached or unborn HEAD.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] if git cannot be run.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let result = self.raw(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = result.stdout.trim();
        if !result.success || name.is_empty() || name == "HEAD" {
            return Ok(None);
        }
        Ok(Some(name.to_string()))
    }

    /// Whether `refs/heads/<branch>` exists.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] if git cannot be run.
    pub fn has_local_branch(&self, branch: &str) -> Result<bool> {
        let reference = format!("refs/heads/{branch}");
        Ok(self.raw(&["show-ref", "--verify", "--quiet", &reference])?.success)
    }

    /// Whether `refs/remotes/origin/<branch>` exists.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] if git cannot be run.
    pub fn has_remote_branch(&self, branch: &str) -> Result<bool> {
        let reference = format!("refs/remotes/{REMOTE}/{branch}");
        Ok(self.raw(&["show-ref", "--verify", "--quiet", &reference])?.success)
    }

    /// Check out `branch`, creating it (tracking the remote when present)
    /// if it does not exist locally.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn ensure_branch(&self, branch: &str) -> Result<()> {
        if self.current_branch()?.as_deref() == Some(branch) {
            return Ok(());
        }
        if self.has_local_branch(branch)? {
            return self.git(&["checkout", branch]).map(drop);
        }
        if self.has_remote_branch(branch)? {
            let upstream = format!("{REMOTE}/{branch}");
            return self
                .git(&["checkout", "-b", branch, "--track", &upstream])
                .map(drop);
        }
        self.git(&["checkout", "-b", branch]).map(drop)
    }

    /// Ahead/behind counts of `HEAD` against `origin/<branch>`.  Without a
    /// remote branch every local commit counts as ahead.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] if the output is malformed.
    pub fn divergence(&self, branch: &str) -> Result<Divergence> {
        if !self.has_remote_branch(branch)? {
            // Fails on an unborn HEAD, which has nothing to push.
            let local = self.raw(&["rev-list", "--count", "HEAD"])?;
            let ahead = if local.success {
                local.stdout.trim().parse().unwrap_or(0)
            } else {
                0
            };
            return Ok(Divergence { ahead, behind: 0 });
        }
        let range = format!("HEAD...{REMOTE}/{branch}");
        let result = self.git(&["rev-list", "--left-right", "--count", &range])?;
        parse_left_right(&result.stdout).ok_or_else(|| {
            SyncError::command(
                "git rev-list",
                format!("unexpected output '{}'", result.stdout.trim()),
            )
        })
    }

    /// Fast-forward the current branch to `origin/<branch>`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] when a fast-forward is impossible.
    pub fn fast_forward(&self, branch: &str) -> Result<()> {
        let upstream = format!("{REMOTE}/{branch}");
        self.git(&["merge", "--ff-only", &upstream]).map(drop)
    }

    /// Porcelain status lines.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn status_porcelain(&self) -> Result<Vec<String>> {
        let result = self.git(&["status", "--porcelain"])?;
        Ok(result
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Whether the working copy has uncommitted changes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.status_porcelain()?.is_empty())
    }

    /// Stage everything and commit with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-m", message]).map(drop)
    }

    /// Push `branch` and set its upstream.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn push(&self, branch: &str) -> Result<()> {
        self.git(&["push", "-u", REMOTE, branch]).map(drop)
    }

    /// `git diff HEAD --stat`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn diff_stat(&self) -> Result<String> {
        Ok(self.git(&["diff", "HEAD", "--stat"])?.stdout)
    }

    /// `git diff HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn diff(&self) -> Result<String> {
        Ok(self.git(&["diff", "HEAD"])?.stdout)
    }

    /// Throw away all uncommitted changes, including untracked files.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn discard_changes(&self) -> Result<()> {
        self.git(&["reset", "--hard", "HEAD"])?;
        self.git(&["clean", "-fd"]).map(drop)
    }

    /// Subset of `paths` that appear anywhere in the repository history.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn tracked_in_history(&self, paths: &[&str]) -> Result<Vec<String>> {
        let mut tracked = Vec::new();
        for path in paths {
            let result = self.raw(&["log", "--all", "--format=%H", "-n", "1", "--", path])?;
            // An unborn repository has no history to search.
            if result.success && !result.stdout.trim().is_empty() {
                tracked.push((*path).to_string());
            }
        }
        Ok(tracked)
    }
}

/// Parse `rev-list --left-right --count` output (`"<ahead>\t<behind>"`).
fn parse_left_right(output: &str) -> Option<Divergence> {
    let mut parts = output.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some(Divergence { ahead, behind })
}
