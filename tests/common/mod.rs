// Shared helpers for integration tests.
//
// Provides a temporary home directory laid out like a real machine (XDG
// config, data and state roots) and a fluent builder so each integration
// test can set up an isolated environment without repeating filesystem
// boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use opencode_sync::config;
use opencode_sync::locations::SyncLocations;
use serde_json::Value;

/// An isolated machine backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped (via the underlying
/// [`tempfile::TempDir`]).
pub struct IntegrationTestContext {
    /// Temporary directory acting as `$HOME`.
    pub home: tempfile::TempDir,
    /// Locations derived from the temporary home.
    pub locations: SyncLocations,
}

impl IntegrationTestContext {
    /// Create a new context with empty opencode directories.
    pub fn new() -> Self {
        let home = tempfile::tempdir().expect("create temp dir");
        let root = home.path().to_path_buf();
        let locations = SyncLocations::from_roots(
            root.clone(),
            root.join(".config").join("opencode"),
            root.join(".local").join("share").join("opencode"),
            root.join(".local").join("state").join("opencode"),
        );
        for dir in [
            &locations.config_dir,
            &locations.data_dir,
            &locations.state_dir,
        ] {
            std::fs::create_dir_all(dir).expect("create opencode dir");
        }
        Self { home, locations }
    }

    /// Path of the temporary home directory.
    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// Default mirror checkout.
    pub fn repo_dir(&self) -> PathBuf {
        self.locations.default_repo_dir.clone()
    }

    /// Write the sync configuration.
    pub fn with_sync_config(self, value: &Value) -> Self {
        config::write_json(&self.locations.sync_config_path, value).expect("write sync config");
        self
    }

    /// Write the machine-local overrides document.
    pub fn with_overrides(self, value: &Value) -> Self {
        config::write_json(&self.locations.overrides_path, value).expect("write overrides");
        self
    }

    /// Write a file below the opencode config directory.
    pub fn with_config_file(self, rel: &str, text: &str) -> Self {
        write_file(&self.locations.config_dir.join(rel), text);
        self
    }

    /// Read a file below the opencode config directory.
    pub fn read_config_file(&self, rel: &str) -> String {
        std::fs::read_to_string(self.locations.config_dir.join(rel)).expect("read config file")
    }

    /// Run the compiled binary with this context's home and XDG roots.
    pub fn run_cli(&self, args: &[&str]) -> Output {
        let home = self.home_path();
        Command::new(env!("CARGO_BIN_EXE_opencode-sync"))
            .args(args)
            .env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join(".config"))
            .env("XDG_DATA_HOME", home.join(".local").join("share"))
            .env("XDG_STATE_HOME", home.join(".local").join("state"))
            .env("XDG_CACHE_HOME", home.join(".cache"))
            .env_remove("OPENCODE_SYNC_CONFIG_DIR")
            .env_remove("RUST_LOG")
            .output()
            .expect("run opencode-sync")
    }
}

/// Write `text` to `path`, creating parent directories.
pub fn write_file(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    std::fs::write(path, text).expect("write file");
}
