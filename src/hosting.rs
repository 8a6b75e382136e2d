//! Repository-hosting adapter (`gh`).
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SyncError};
use crate::exec::{ExecResult, Executor};

const GH: &str = "gh";

/// Visibility facts about a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoView {
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    #[serde(default)]
    pub name_with_owner: String,
    /// Whether the repository is private.
    pub is_private: bool,
    /// Web URL.
    #[serde(default)]
    pub url: String,
}

/// The `gh` CLI driven through the command runner.
#[derive(Debug, Clone)]
pub struct GitHub {
    executor: Arc<dyn Executor>,
    work_dir: PathBuf,
}

impl GitHub {
    /// Adapter running `gh` from `work_dir`.
    #[must_use]
    pub const fn new(executor: Arc<dyn Executor>, work_dir: PathBuf) -> Self {
        Self { executor, work_dir }
    }

    fn run(&self, operation: &str, args: &[&str]) -> Result<ExecResult> {
        self.run_in(&self.work_dir, operation, args)
    }

    fn run_in(&self, dir: &Path, operation: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self
            .executor
            .run_in_unchecked(dir, GH, args)
            .map_err(|e| SyncError::command(operation, format!("{e:#}")))?;
        if result.success {
            Ok(result)
        } else {
            Err(SyncError::command(operation, result.failure_text()))
        }
    }

    /// Whether `gh` is installed.
    #[must_use]
    pub fn available(&self) -> bool {
        self.executor.which(GH)
    }

    /// Visibility of `locator` (URL or `owner/name`), or `None` when the
    /// repository does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] for failures other than
    /// "not found".
    pub fn view(&self, locator: &str) -> Result<Option<RepoView>> {
        match self.run(
            "gh repo view",
            &["repo", "view", locator, "--json", "name,nameWithOwner,isPrivate,url"],
        ) {
            Ok(result) => serde_json::from_str(result.stdout.trim())
                .map(Some)
                .map_err(|e| SyncError::command("gh repo view", format!("unexpected output: {e}"))),
            Err(SyncError::CommandFailure { message, .. }) if is_missing_repo(&message) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fail with [`SyncError::RepoPrivacyViolation`] unless `locator` is
    /// private.
    ///
    /// # Errors
    ///
    /// Also fails when the repository cannot be inspected.
    pub fn ensure_private(&self, locator: &str) -> Result<()> {
        match self.view(locator)? {
            Some(view) if view.is_private => Ok(()),
            Some(_) => Err(SyncError::RepoPrivacyViolation {
                repo: locator.to_string(),
            }),
            None => Err(SyncError::command(
                "gh repo view",
                format!("repository {locator} not found"),
            )),
        }
    }

    /// Login of the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] when `gh` is not authenticated.
    pub fn current_user(&self) -> Result<String> {
        let login = self
            .run("gh api user", &["api", "user", "--jq", ".login"])?
            .stdout
            .trim()
            .to_string();
        if login.is_empty() {
            return Err(SyncError::command("gh api user", "empty login"));
        }
        Ok(login)
    }

    /// Create `slug` with the given visibility.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn create(&self, slug: &str, private: bool) -> Result<()> {
        let visibility = if private { "--private" } else { "--public" };
        self.run("gh repo create", &["repo", "create", slug, visibility])
            .map(drop)
    }

    /// Clone `locator` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the parent directory cannot be created and
    /// [`SyncError::CommandFailure`] if the clone fails.
    pub fn clone_repo(&self, locator: &str, dest: &Path) -> Result<()> {
        let parent = dest.parent().unwrap_or(dest);
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        let dest_text = dest.to_string_lossy().to_string();
        self.run_in(parent, "gh repo clone", &["repo", "clone", locator, &dest_text])
            .map(drop)
    }

    /// Repositories owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailure`] on failure.
    pub fn list(&self, owner: &str) -> Result<Vec<RepoView>> {
        let result = self.run(
            "gh repo list",
            &[
                "repo",
                "list",
                owner,
                "--json",
                "name,nameWithOwner,isPrivate,url",
                "--limit",
                "200",
            ],
        )?;
        serde_json::from_str(result.stdout.trim())
            .map_err(|e| SyncError::command("gh repo list", format!("unexpected output: {e}")))
    }
}

fn is_missing_repo(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("could not resolve to a repository") || lower.contains("not found")
}
