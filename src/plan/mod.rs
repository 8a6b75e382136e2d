//! Sync plan: the complete list of items exchanged between the local
//! application directories and the mirror.
//!
//! The plan is a pure function of the normalized configuration, the resolved
//! locations, the mirror root and the platform.  It never touches the
//! filesystem.
pub mod extra;

pub use extra::{ExtraPathEntry, ExtraPathPlan, encode_extra_path, normalize_path};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::NormalizedSyncConfig;
use crate::locations::SyncLocations;
use crate::platform::Platform;

/// Config files that receive override merging.
pub const CONFIG_FILES: &[&str] = &["opencode.json", "opencode.jsonc"];

/// Config-root directories mirrored verbatim.
pub const CONFIG_DIRS: &[&str] = &["agent", "command", "mode", "plugin", "tool", "themes"];

/// Session storage directories under the data root.
pub const SESSION_DIRS: &[&str] = &[
    "storage/session",
    "storage/message",
    "storage/part",
    "storage/session_diff",
];

/// Prompt stash files under the state root.
pub const PROMPT_STASH_FILES: &[&str] = &["prompt-stash.jsonl", "prompt-history.jsonl"];

/// Mirror-relative paths of the authentication files a secrets backend owns.
pub const AUTH_REPO_PATHS: &[&str] = &["data/auth.json", "data/mcp-auth.json"];

/// Whether a file name is an opencode config file.
#[must_use]
pub fn is_config_file(name: &str) -> bool {
    CONFIG_FILES.contains(&name)
}

/// Whether an item is a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A single file.
    File,
    /// A directory tree.
    Dir,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Dir => write!(f, "dir"),
        }
    }
}

/// One path exchanged between the local machine and the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItem {
    /// Local filesystem path.
    pub local_path: PathBuf,
    /// Absolute path inside the mirror.
    pub repo_path: PathBuf,
    /// Mirror-relative path with `/` separators.
    pub repo_rel: String,
    /// File or directory.
    pub kind: ItemKind,
    /// Contains secrets.
    pub is_secret: bool,
    /// Receives override merging.
    pub is_config_file: bool,
    /// Backend-owned authentication file.  Always also secret.
    pub is_auth_token: bool,
}

/// The complete plan for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Items in deterministic order.
    pub items: Vec<SyncItem>,
    /// Allow-listed extra secret paths.
    pub extra_secrets: ExtraPathPlan,
    /// Allow-listed extra config paths.
    pub extra_configs: ExtraPathPlan,
    /// Mirror root.
    pub repo_root: PathBuf,
    /// Home directory used for path normalization.
    pub home: PathBuf,
    /// Target platform.
    pub platform: Platform,
}

#[derive(Clone, Copy)]
struct Flags {
    secret: bool,
    config: bool,
    auth: bool,
}

const PLAIN: Flags = Flags {
    secret: false,
    config: false,
    auth: false,
};

impl SyncPlan {
    /// Items that receive override merging.
    pub fn config_files(&self) -> impl Iterator<Item = &SyncItem> {
        self.items.iter().filter(|i| i.is_config_file)
    }
}

/// Build the plan for `config`.
#[must_use]
pub fn build_sync_plan(
    config: &NormalizedSyncConfig,
    locations: &SyncLocations,
    repo_root: &Path,
    platform: &Platform,
) -> SyncPlan {
    let mut items = Vec::new();
    let mut push = |local_root: &Path, rel: &str, repo_prefix: &str, kind: ItemKind, flags: Flags| {
        let repo_rel = format!("{repo_prefix}/{rel}");
        items.push(SyncItem {
            local_path: join_rel(local_root, rel),
            repo_path: join_rel(repo_root, &repo_rel),
            repo_rel,
            kind,
            is_secret: flags.secret || flags.auth,
            is_config_file: flags.config,
            is_auth_token: flags.auth,
        });
    };

    for name in CONFIG_FILES {
        push(
            &locations.config_dir,
            name,
            "config",
            ItemKind::File,
            Flags {
                config: true,
                ..PLAIN
            },
        );
    }
    push(&locations.config_dir, "AGENTS.md", "config", ItemKind::File, PLAIN);
    for dir in CONFIG_DIRS {
        push(&locations.config_dir, dir, "config", ItemKind::Dir, PLAIN);
    }

    if config.include_model_favorites {
        push(&locations.state_dir, "model.json", "state", ItemKind::File, PLAIN);
    }

    let secret = Flags {
        secret: true,
        ..PLAIN
    };
    if config.include_secrets && config.secrets_backend.is_none() {
        for name in ["auth.json", "mcp-auth.json"] {
            push(
                &locations.data_dir,
                name,
                "data",
                ItemKind::File,
                Flags {
                    auth: true,
                    ..secret
                },
            );
        }
    }
    if config.sessions_enabled() {
        for dir in SESSION_DIRS {
            push(&locations.data_dir, dir, "data", ItemKind::Dir, secret);
        }
    }
    if config.prompt_stash_enabled() {
        for name in PROMPT_STASH_FILES {
            push(&locations.state_dir, name, "state", ItemKind::File, secret);
        }
    }

    let home = &locations.home;
    let normalize_all = |paths: &[String]| -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for raw in paths {
            let normalized = normalize_path(raw, home, platform);
            if !out.contains(&normalized) {
                out.push(normalized);
            }
        }
        out
    };

    let secret_allowlist = if config.include_secrets {
        let mut list = normalize_all(&config.extra_secret_paths);
        if config.secrets_backend.is_some() {
            let owned = [
                normalize_path(&locations.auth_json().to_string_lossy(), home, platform),
                normalize_path(&locations.mcp_auth_json().to_string_lossy(), home, platform),
            ];
            list.retain(|p| !owned.contains(p));
        }
        list
    } else {
        Vec::new()
    };
    let config_allowlist = normalize_all(&config.extra_config_paths);

    SyncPlan {
        items,
        extra_secrets: ExtraPathPlan::new(repo_root, "secrets", secret_allowlist),
        extra_configs: ExtraPathPlan::new(repo_root, "config", config_allowlist),
        repo_root: repo_root.to_path_buf(),
        home: home.clone(),
        platform: *platform,
    }
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{RawSyncConfig, normalize, parse_config};
    use crate::platform::Os;
    use std::fmt::Write as _;

    fn locations() -> SyncLocations {
        SyncLocations::from_roots(
            PathBuf::from("/home/u"),
            PathBuf::from("/home/u/.config/opencode"),
            PathBuf::from("/home/u/.local/share/opencode"),
            PathBuf::from("/home/u/.local/state/opencode"),
        )
    }

    fn config(text: &str) -> NormalizedSyncConfig {
        parse_config(text, Path::new("test.jsonc")).unwrap()
    }

    fn plan(text: &str) -> SyncPlan {
        build_sync_plan(
            &config(text),
            &locations(),
            Path::new("/mirror"),
            &Platform::new(Os::Linux),
        )
    }

    fn render(plan: &SyncPlan) -> String {
        let mut out = String::new();
        for item in &plan.items {
            let mut flags = String::new();
            if item.is_config_file {
                flags.push_str(" config");
            }
            if item.is_secret {
                flags.push_str(" secret");
            }
            if item.is_auth_token {
                flags.push_str(" auth-token");
            }
            let _ = writeln!(out, "{} {}{flags}", item.repo_rel, item.kind);
        }
        out
    }

    #[test]
    fn default_plan_snapshot() {
        let plan = plan(r#"{ "repo": { "name": "dots" } }"#);
        insta::assert_snapshot!(render(&plan), @r"
        config/opencode.json file config
        config/opencode.jsonc file config
        config/AGENTS.md file
        config/agent dir
        config/command dir
        config/mode dir
        config/plugin dir
        config/tool dir
        config/themes dir
        state/model.json file
        ");
    }

    #[test]
    fn full_plan_snapshot() {
        let plan = plan(
            r#"{ "repo": { "name": "dots" }, "includeSecrets": true, "includeSessions": true,
                 "includePromptStash": true, "includeModelFavorites": false }"#,
        );
        insta::assert_snapshot!(render(&plan), @r"
        config/opencode.json file config
        config/opencode.jsonc file config
        config/AGENTS.md file
        config/agent dir
        config/command dir
        config/mode dir
        config/plugin dir
        config/tool dir
        config/themes dir
        data/auth.json file secret auth-token
        data/mcp-auth.json file secret auth-token
        data/storage/session dir secret
        data/storage/message dir secret
        data/storage/part dir secret
        data/storage/session_diff dir secret
        state/prompt-stash.jsonl file secret
        state/prompt-history.jsonl file secret
        ");
    }

    #[test]
    fn local_and_mirror_paths() {
        let plan = plan(r#"{ "repo": { "name": "dots" }, "includeSessions": true, "includeSecrets": true }"#);
        let session = plan
            .items
            .iter()
            .find(|i| i.repo_rel == "data/storage/session")
            .unwrap();
        assert_eq!(
            session.local_path,
            PathBuf::from("/home/u/.local/share/opencode/storage/session")
        );
        assert_eq!(session.repo_path, PathBuf::from("/mirror/data/storage/session"));
    }

    #[test]
    fn sessions_and_stash_need_secrets() {
        let plan = plan(
            r#"{ "repo": { "name": "dots" }, "includeSessions": true, "includePromptStash": true }"#,
        );
        assert!(plan.items.iter().all(|i| !i.is_secret));
    }

    #[test]
    fn backend_removes_auth_items() {
        let plan = plan(
            r#"{ "repo": { "name": "dots" }, "includeSecrets": true,
                 "secretsBackend": { "type": "1password", "vault": "v",
                    "documents": { "authJson": "a", "mcpAuthJson": "b" } } }"#,
        );
        assert!(plan.items.iter().all(|i| !i.is_auth_token));
    }

    #[test]
    fn auth_token_implies_secret() {
        for text in [
            r#"{ "repo": { "name": "d" }, "includeSecrets": true }"#,
            r#"{ "repo": { "name": "d" }, "includeSecrets": true, "includeSessions": true }"#,
            r#"{ "repo": { "name": "d" } }"#,
        ] {
            for item in plan(text).items {
                assert!(!item.is_auth_token || item.is_secret, "{}", item.repo_rel);
            }
        }
    }

    #[test]
    fn extra_secrets_empty_without_secrets_flag() {
        let plan = plan(
            r#"{ "repo": { "name": "d" }, "extraSecretPaths": ["~/.netrc"], "extraConfigPaths": ["~/.zshrc"] }"#,
        );
        assert!(plan.extra_secrets.allowlist.is_empty());
        assert!(plan.extra_secrets.entries.is_empty());
        assert_eq!(plan.extra_configs.allowlist, vec!["/home/u/.zshrc"]);
        assert!(
            plan.extra_configs
                .entries
                .first()
                .unwrap()
                .repo_rel
                .starts_with("config/extra/.zshrc-")
        );
    }

    #[test]
    fn extra_paths_deduplicate_after_normalization() {
        let plan = plan(
            r#"{ "repo": { "name": "d" }, "extraConfigPaths": ["~/.zshrc", "/home/u/./.zshrc", ".zshrc"] }"#,
        );
        assert_eq!(plan.extra_configs.allowlist, vec!["/home/u/.zshrc"]);
    }

    #[test]
    fn backend_owned_files_filtered_from_extra_secrets() {
        let plan = plan(
            r#"{ "repo": { "name": "d" }, "includeSecrets": true,
                 "extraSecretPaths": ["~/.local/share/opencode/auth.json", "~/.local/share/opencode/mcp-auth.json", "~/.netrc"],
                 "secretsBackend": { "type": "1password", "vault": "v",
                    "documents": { "authJson": "a", "mcpAuthJson": "b" } } }"#,
        );
        assert_eq!(plan.extra_secrets.allowlist, vec!["/home/u/.netrc"]);
    }

    #[test]
    fn plan_is_deterministic() {
        let raw = RawSyncConfig::default();
        let cfg = normalize(&raw);
        let a = build_sync_plan(&cfg, &locations(), Path::new("/m"), &Platform::new(Os::Linux));
        let b = build_sync_plan(&cfg, &locations(), Path::new("/m"), &Platform::new(Os::Linux));
        assert_eq!(a, b);
    }

    #[test]
    fn config_files_are_flagged() {
        let plan = plan(r#"{ "repo": { "name": "d" } }"#);
        let names: Vec<&str> = plan.config_files().map(|i| i.repo_rel.as_str()).collect();
        assert_eq!(names, vec!["config/opencode.json", "config/opencode.jsonc"]);
        assert!(is_config_file("opencode.jsonc"));
        assert!(!is_config_file("AGENTS.md"));
    }
}
