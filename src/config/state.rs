//! Persisted sync bookkeeping (`sync-state.json`).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SyncError};

/// Timestamps and fingerprints of the last successful operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Last time remote content was applied locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pull: Option<DateTime<Utc>>,
    /// Last time local content was pushed to the remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_push: Option<DateTime<Utc>>,
    /// Last time the remote was observed to have new commits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_remote_update: Option<DateTime<Utc>>,
    /// Fingerprint of the authentication files at the last backend push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_secrets_hash: Option<String>,
}

impl SyncState {
    /// Load state from `path`; a missing file yields the default state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] on read failure or [`SyncError::Parse`] when
    /// the file is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| SyncError::parse(path, &e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SyncError::io(path, e)),
        }
    }

    /// Persist state to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let value = serde_json::to_value(self).map_err(|e| SyncError::parse(path, &e))?;
        super::write_json(path, &value)
    }

    /// Load, apply `update`, and save.  A corrupt file is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be written.
    pub fn update(path: &Path, update: impl FnOnce(&mut Self)) -> Result<Self> {
        let mut state = Self::load(path).unwrap_or_default();
        update(&mut state);
        state.save(path)?;
        Ok(state)
    }
}
