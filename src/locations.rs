//! Platform-specific root directories and derived file paths.
//!
//! [`SyncLocations::resolve`] is a pure function of an environment map and a
//! [`Platform`]; [`SyncLocations::from_env`] feeds it the process environment.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Directory name of the synchronized application under each root.
pub const APP_DIR: &str = "opencode";

/// Directory holding this tool's own bookkeeping under the data root.
pub const SYNC_DIR: &str = "opencode-synced";

/// Environment variable that overrides the config root.
pub const CONFIG_DIR_ENV: &str = "OPENCODE_SYNC_CONFIG_DIR";

/// Resolved absolute roots and derived paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLocations {
    /// User home directory.
    pub home: PathBuf,
    /// Application config directory (e.g. `~/.config/opencode`).
    pub config_dir: PathBuf,
    /// Application data directory (e.g. `~/.local/share/opencode`).
    pub data_dir: PathBuf,
    /// Application state directory (e.g. `~/.local/state/opencode`).
    pub state_dir: PathBuf,
    /// Sync configuration file.
    pub sync_config_path: PathBuf,
    /// Machine-local overrides file.
    pub overrides_path: PathBuf,
    /// Persisted [`SyncState`](crate::config::state::SyncState).
    pub state_path: PathBuf,
    /// Advisory lock file.
    pub lock_path: PathBuf,
    /// Default mirror checkout directory.
    pub default_repo_dir: PathBuf,
}

impl SyncLocations {
    /// Resolve locations from the current process environment.
    #[must_use]
    pub fn from_env(platform: &Platform) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(&env, platform)
    }

    /// Resolve locations from an explicit environment map.
    ///
    /// POSIX uses the XDG variables with `~/.config`, `~/.local/share` and
    /// `~/.local/state` fallbacks.  Windows uses `APPDATA` for config and
    /// `LOCALAPPDATA` for data and state, falling back to the conventional
    /// `AppData` subdirectories of the home directory.
    #[must_use]
    pub fn resolve(env: &HashMap<String, String>, platform: &Platform) -> Self {
        let var = |name: &str| {
            env.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        let home = if platform.is_windows() {
            var("USERPROFILE").or_else(|| var("HOME"))
        } else {
            var("HOME")
        }
        .unwrap_or_else(|| PathBuf::from("."));

        let (config_root, data_root, state_root) = if platform.is_windows() {
            let roaming = var("APPDATA").unwrap_or_else(|| home.join("AppData").join("Roaming"));
            let local = var("LOCALAPPDATA").unwrap_or_else(|| home.join("AppData").join("Local"));
            (roaming, local.clone(), local)
        } else {
            (
                var("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config")),
                var("XDG_DATA_HOME").unwrap_or_else(|| home.join(".local").join("share")),
                var("XDG_STATE_HOME").unwrap_or_else(|| home.join(".local").join("state")),
            )
        };

        let config_dir = var(CONFIG_DIR_ENV).unwrap_or_else(|| config_root.join(APP_DIR));
        let data_dir = data_root.join(APP_DIR);
        let state_dir = state_root.join(APP_DIR);
        Self::from_roots(home, config_dir, data_dir, state_dir)
    }

    /// Build locations from explicit application directories.
    #[must_use]
    pub fn from_roots(home: PathBuf, config_dir: PathBuf, data_dir: PathBuf, state_dir: PathBuf) -> Self {
        let sync_dir = data_dir.join(SYNC_DIR);
        Self {
            sync_config_path: config_dir.join("opencode-synced.jsonc"),
            overrides_path: config_dir.join("opencode-synced.overrides.jsonc"),
            state_path: sync_dir.join("sync-state.json"),
            lock_path: sync_dir.join("sync.lock"),
            default_repo_dir: sync_dir.join("repo"),
            home,
            config_dir,
            data_dir,
            state_dir,
        }
    }

    /// Mirror directory, honouring a configured override.
    #[must_use]
    pub fn repo_dir(&self, local_repo_path: Option<&Path>) -> PathBuf {
        local_repo_path.map_or_else(|| self.default_repo_dir.clone(), Path::to_path_buf)
    }

    /// Local path of the primary authentication file.
    #[must_use]
    pub fn auth_json(&self) -> PathBuf {
        self.data_dir.join("auth.json")
    }

    /// Local path of the MCP authentication file.
    #[must_use]
    pub fn mcp_auth_json(&self) -> PathBuf {
        self.data_dir.join("mcp-auth.json")
    }
}
