//! Out-of-band storage for the authentication files.
//!
//! When a backend is configured, `auth.json` and `mcp-auth.json` never enter
//! the mirror; they are exchanged with the backend instead.
pub mod onepassword;

use sha2::{Digest as _, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ONEPASSWORD_BACKEND, SecretsBackendConfig, Validation, validate_backend};
use crate::error::{Result, SyncError};
use crate::exec::Executor;
use crate::fs_util::read_optional;
use crate::locations::SyncLocations;

pub use onepassword::OnePasswordBackend;

/// What happened to one backend document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAction {
    /// Downloaded into the local file.
    Downloaded,
    /// Uploaded as a new document.
    Created,
    /// Existing document overwritten.
    Updated,
    /// Nothing stored under this title yet.
    NotFound,
    /// Local file absent, so nothing was uploaded.
    SkippedMissingLocal,
}

/// Per-document outcome of a pull or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    /// Document title.
    pub title: String,
    /// Local file path.
    pub local_path: PathBuf,
    /// Action taken.
    pub action: DocumentAction,
}

/// Read-only backend report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    /// Backend type tag.
    pub kind: String,
    /// Vault name.
    pub vault: String,
    /// Whether the backend CLI is on `PATH`.
    pub cli_available: bool,
    /// Configured document titles.
    pub documents: Vec<String>,
}

/// Out-of-band secrets store.
#[cfg_attr(test, mockall::automock)]
pub trait SecretsBackend: Send + Sync {
    /// Download every stored document into its local file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SecretsBackendAmbiguous`] when a title matches
    /// several documents, or [`SyncError::CommandFailure`] when the CLI fails.
    fn pull(&self) -> Result<Vec<DocumentOutcome>>;

    /// Upload every present local file.
    ///
    /// # Errors
    ///
    /// Same as [`SecretsBackend::pull`].
    fn push(&self) -> Result<Vec<DocumentOutcome>>;

    /// Report configuration and CLI availability.
    fn status(&self) -> BackendStatus;
}

/// Build the backend described by `config`.
///
/// Validation runs before any command is executed.
///
/// # Errors
///
/// Returns [`SyncError::ConfigInvalid`] when the descriptor is unusable.
pub fn create_backend(
    config: &SecretsBackendConfig,
    locations: &SyncLocations,
    executor: Arc<dyn Executor>,
) -> Result<Box<dyn SecretsBackend>> {
    if let Validation::Invalid(reason) = validate_backend(config) {
        return Err(SyncError::ConfigInvalid(reason));
    }
    match config.kind.as_str() {
        ONEPASSWORD_BACKEND => Ok(Box::new(OnePasswordBackend::new(config, locations, executor))),
        other => Err(SyncError::ConfigInvalid(format!(
            "unsupported secrets backend '{other}'"
        ))),
    }
}

/// SHA-256 fingerprint over the existence and contents of `paths`.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if a present file cannot be read.
pub fn secrets_hash(paths: &[&Path]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        match read_optional(path)? {
            Some(bytes) => {
                hasher.update(b"present\0");
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(&bytes);
            }
            None => hasher.update(b"absent\0"),
        }
    }
    let mut hex = String::with_capacity(64);
    for byte in hasher.finalize() {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;

    #[test]
    fn hash_changes_with_content_and_existence() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("auth.json");
        let b = dir.path().join("mcp-auth.json");

        let empty = secrets_hash(&[&a, &b]).unwrap();
        std::fs::write(&a, "{}").unwrap();
        let one = secrets_hash(&[&a, &b]).unwrap();
        assert_ne!(empty, one);
        assert_eq!(one, secrets_hash(&[&a, &b]).unwrap());

        std::fs::write(&a, "{\"k\": 1}").unwrap();
        assert_ne!(one, secrets_hash(&[&a, &b]).unwrap());
        assert_eq!(one.len(), 64);
    }

    #[test]
    fn hash_distinguishes_which_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "x").unwrap();
        let first = secrets_hash(&[&a, &b]).unwrap();
        std::fs::remove_file(&a).unwrap();
        std::fs::write(&b, "x").unwrap();
        assert_ne!(first, secrets_hash(&[&a, &b]).unwrap());
    }

    #[test]
    fn invalid_backend_fails_before_any_command() {
        let dir = tempfile::tempdir().unwrap();
        let locations = SyncLocations::from_roots(
            dir.path().to_path_buf(),
            dir.path().join("c"),
            dir.path().join("d"),
            dir.path().join("s"),
        );
        let executor = Arc::new(MockExecutor::new());
        let config = SecretsBackendConfig {
            kind: ONEPASSWORD_BACKEND.to_string(),
            vault: String::new(),
            auth_json_title: "a".to_string(),
            mcp_auth_json_title: "b".to_string(),
        };
        let result = create_backend(&config, &locations, executor.clone());
        assert!(matches!(result, Err(SyncError::ConfigInvalid(_))));
        assert!(executor.calls().is_empty());
    }
}
