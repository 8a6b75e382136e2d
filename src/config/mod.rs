//! Sync configuration: loading, normalization and validation.
//!
//! The persisted file is loosely typed ([`RawSyncConfig`], every field
//! optional).  [`normalize`] turns it into one fully-populated, immutable
//! [`NormalizedSyncConfig`] and [`validate`] returns a tagged
//! [`Validation`] instead of throwing ad hoc errors.
pub mod jsonc;
pub mod state;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::locations::SyncLocations;

/// Default working branch of the mirror.
pub const DEFAULT_BRANCH: &str = "main";

/// Default repository name used by `init` and `link` auto-discovery.
pub const DEFAULT_REPO_NAME: &str = "opencode-config";

/// Type tag of the 1Password secrets backend.
pub const ONEPASSWORD_BACKEND: &str = "1password";

/// Repository section as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRepo {
    /// Clone URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Owner (user or organisation) on the hosting service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Repository name on the hosting service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Working branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Document titles of the secrets backend as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocuments {
    /// Title of the document holding `auth.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_json: Option<String>,
    /// Title of the document holding `mcp-auth.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_auth_json: Option<String>,
}

/// Secrets backend descriptor as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecretsBackend {
    /// Backend type tag.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Vault name or id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<String>,
    /// Logical name → document title mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<RawDocuments>,
}

/// The sync configuration file exactly as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSyncConfig {
    /// Repository identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<RawRepo>,
    /// Sync authentication files and allow extra secret paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_secrets: Option<bool>,
    /// Sync session storage (requires secrets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_sessions: Option<bool>,
    /// Sync the prompt stash (requires secrets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_prompt_stash: Option<bool>,
    /// Sync model favorites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_model_favorites: Option<bool>,
    /// Commit secrets embedded in config files instead of moving them to
    /// the overrides file (requires secrets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_config_secrets: Option<bool>,
    /// Additional secret paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_secret_paths: Option<Vec<String>>,
    /// Additional config paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_config_paths: Option<Vec<String>>,
    /// Mirror checkout location override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_repo_path: Option<String>,
    /// Out-of-band secrets store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets_backend: Option<RawSecretsBackend>,
    /// Command used to consult the AI advisor; the prompt is appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor_command: Option<Vec<String>>,
}

/// Identity of the mirror repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    /// Clone URL, when configured explicitly.
    pub url: Option<String>,
    /// Hosting owner.
    pub owner: Option<String>,
    /// Hosting repository name.
    pub name: Option<String>,
    /// Working branch.
    pub branch: String,
}

impl RepoIdentity {
    /// `owner/name` when both are known, either configured or parsed from a
    /// GitHub URL.
    #[must_use]
    pub fn slug(&self) -> Option<String> {
        match (&self.owner, &self.name) {
            (Some(owner), Some(name)) => Some(format!("{owner}/{name}")),
            _ => self.url.as_deref().and_then(github_slug_from_url),
        }
    }

    /// Identifier handed to `git clone` / `gh`: URL, `owner/name`, or bare name.
    #[must_use]
    pub fn locator(&self) -> String {
        self.url
            .clone()
            .or_else(|| self.slug())
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

/// Parse `owner/name` out of a GitHub HTTPS or SSH URL.
#[must_use]
pub fn github_slug_from_url(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("git@github.com:"))?;
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some(format!("{owner}/{name}"))
}

/// Validated-shape secrets backend descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsBackendConfig {
    /// Backend type tag (only `1password` is supported).
    pub kind: String,
    /// Vault name or id.
    pub vault: String,
    /// Document title for `auth.json`.
    pub auth_json_title: String,
    /// Document title for `mcp-auth.json`.
    pub mcp_auth_json_title: String,
}

/// Fully-populated configuration for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSyncConfig {
    /// Mirror identity.
    pub repo: RepoIdentity,
    /// Secrets flag.
    pub include_secrets: bool,
    /// Sessions flag (effective only with secrets).
    pub include_sessions: bool,
    /// Prompt-stash flag (effective only with secrets).
    pub include_prompt_stash: bool,
    /// Model favorites flag.
    pub include_model_favorites: bool,
    /// Commit embedded config secrets (effective only with secrets).
    pub include_config_secrets: bool,
    /// Extra secret paths as configured.
    pub extra_secret_paths: Vec<String>,
    /// Extra config paths as configured.
    pub extra_config_paths: Vec<String>,
    /// Mirror checkout override.
    pub local_repo_path: Option<PathBuf>,
    /// Out-of-band secrets store.
    pub secrets_backend: Option<SecretsBackendConfig>,
    /// Advisor command argv.
    pub advisor_command: Option<Vec<String>>,
}

impl NormalizedSyncConfig {
    /// Whether sessions are effectively synced.
    #[must_use]
    pub const fn sessions_enabled(&self) -> bool {
        self.include_secrets && self.include_sessions
    }

    /// Whether the prompt stash is effectively synced.
    #[must_use]
    pub const fn prompt_stash_enabled(&self) -> bool {
        self.include_secrets && self.include_prompt_stash
    }

    /// Whether embedded config secrets are committed to the mirror.
    #[must_use]
    pub const fn commit_config_secrets(&self) -> bool {
        self.include_secrets && self.include_config_secrets
    }

    /// Convert back to the persisted representation.
    #[must_use]
    pub fn to_raw(&self) -> RawSyncConfig {
        RawSyncConfig {
            repo: Some(RawRepo {
                url: self.repo.url.clone(),
                owner: self.repo.owner.clone(),
                name: self.repo.name.clone(),
                branch: Some(self.repo.branch.clone()),
            }),
            include_secrets: Some(self.include_secrets),
            include_sessions: Some(self.include_sessions),
            include_prompt_stash: Some(self.include_prompt_stash),
            include_model_favorites: Some(self.include_model_favorites),
            include_config_secrets: Some(self.include_config_secrets),
            extra_secret_paths: Some(self.extra_secret_paths.clone()),
            extra_config_paths: Some(self.extra_config_paths.clone()),
            local_repo_path: self
                .local_repo_path
                .as_ref()
                .map(|p| p.display().to_string()),
            secrets_backend: self.secrets_backend.as_ref().map(|b| RawSecretsBackend {
                kind: Some(b.kind.clone()),
                vault: Some(b.vault.clone()),
                documents: Some(RawDocuments {
                    auth_json: Some(b.auth_json_title.clone()),
                    mcp_auth_json: Some(b.mcp_auth_json_title.clone()),
                }),
            }),
            advisor_command: self.advisor_command.clone(),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The configuration is usable.
    Ok,
    /// The configuration is unusable, with a human-readable reason.
    Invalid(String),
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Fill defaults and tidy strings.  Never fails; see [`validate`].
#[must_use]
pub fn normalize(raw: &RawSyncConfig) -> NormalizedSyncConfig {
    let repo = raw.repo.clone().unwrap_or_default();
    let clean_list = |list: Option<&Vec<String>>| -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for item in list.into_iter().flatten() {
            let item = item.trim().to_string();
            if !item.is_empty() && !out.contains(&item) {
                out.push(item);
            }
        }
        out
    };

    NormalizedSyncConfig {
        repo: RepoIdentity {
            url: trimmed(repo.url.as_ref()),
            owner: trimmed(repo.owner.as_ref()),
            name: trimmed(repo.name.as_ref()),
            branch: trimmed(repo.branch.as_ref()).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        },
        include_secrets: raw.include_secrets.unwrap_or(false),
        include_sessions: raw.include_sessions.unwrap_or(false),
        include_prompt_stash: raw.include_prompt_stash.unwrap_or(false),
        include_model_favorites: raw.include_model_favorites.unwrap_or(true),
        include_config_secrets: raw.include_config_secrets.unwrap_or(false),
        extra_secret_paths: clean_list(raw.extra_secret_paths.as_ref()),
        extra_config_paths: clean_list(raw.extra_config_paths.as_ref()),
        local_repo_path: trimmed(raw.local_repo_path.as_ref()).map(PathBuf::from),
        secrets_backend: raw.secrets_backend.as_ref().map(|b| {
            let docs = b.documents.clone().unwrap_or_default();
            SecretsBackendConfig {
                kind: trimmed(b.kind.as_ref())
                    .unwrap_or_default()
                    .to_ascii_lowercase(),
                vault: trimmed(b.vault.as_ref()).unwrap_or_default(),
                auth_json_title: trimmed(docs.auth_json.as_ref()).unwrap_or_default(),
                mcp_auth_json_title: trimmed(docs.mcp_auth_json.as_ref()).unwrap_or_default(),
            }
        }),
        advisor_command: raw
            .advisor_command
            .as_ref()
            .map(|argv| {
                argv.iter()
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|argv| !argv.is_empty()),
    }
}

/// Check a normalized configuration for problems.
#[must_use]
pub fn validate(config: &NormalizedSyncConfig) -> Validation {
    if config.repo.url.is_none() && config.repo.name.is_none() {
        return Validation::Invalid("repo.url or repo.name is required".to_string());
    }
    if config.repo.owner.is_some() && config.repo.name.is_none() {
        return Validation::Invalid("repo.owner is set but repo.name is missing".to_string());
    }
    if let Some(backend) = &config.secrets_backend
        && let Validation::Invalid(reason) = validate_backend(backend)
    {
        return Validation::Invalid(reason);
    }
    Validation::Ok
}

/// Case-insensitive document title comparison shared by validation and
/// backend lookup.
#[must_use]
pub fn same_title(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Check a secrets backend descriptor.
#[must_use]
pub fn validate_backend(backend: &SecretsBackendConfig) -> Validation {
    if backend.kind != ONEPASSWORD_BACKEND {
        return Validation::Invalid(format!(
            "unsupported secretsBackend.type '{}'; expected '{ONEPASSWORD_BACKEND}'",
            backend.kind
        ));
    }
    if backend.vault.is_empty() {
        return Validation::Invalid("secretsBackend.vault is required".to_string());
    }
    if backend.auth_json_title.is_empty() {
        return Validation::Invalid("secretsBackend.documents.authJson is required".to_string());
    }
    if backend.mcp_auth_json_title.is_empty() {
        return Validation::Invalid("secretsBackend.documents.mcpAuthJson is required".to_string());
    }
    if same_title(&backend.auth_json_title, &backend.mcp_auth_json_title) {
        return Validation::Invalid(format!(
            "secretsBackend.documents titles must be unique (case-insensitive); '{}' is used twice",
            backend.auth_json_title
        ));
    }
    Validation::Ok
}

/// Parse, normalize and validate configuration text.
///
/// # Errors
///
/// Returns [`SyncError::ConfigInvalid`] when the text is malformed or the
/// configuration fails validation.
pub fn parse_config(text: &str, path: &Path) -> Result<NormalizedSyncConfig> {
    let raw: RawSyncConfig = jsonc::parse_jsonc(text, path)
        .map_err(|e| SyncError::ConfigInvalid(e.to_string()))?;
    let config = normalize(&raw);
    match validate(&config) {
        Validation::Ok => Ok(config),
        Validation::Invalid(reason) => Err(SyncError::ConfigInvalid(reason)),
    }
}

/// Load the sync configuration for `locations`.
///
/// # Errors
///
/// Returns [`SyncError::ConfigMissing`] if the file does not exist, and
/// [`SyncError::ConfigInvalid`] if it is malformed or fails validation.
pub fn load_config(locations: &SyncLocations) -> Result<NormalizedSyncConfig> {
    let path = &locations.sync_config_path;
    if !path.exists() {
        return Err(SyncError::ConfigMissing { path: path.clone() });
    }
    let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    parse_config(&text, path)
}

/// Write the sync configuration (strict JSON, which is valid JSONC).
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be written.
pub fn save_config(locations: &SyncLocations, config: &NormalizedSyncConfig) -> Result<()> {
    let value = serde_json::to_value(config.to_raw())
        .map_err(|e| SyncError::parse(&locations.sync_config_path, &e))?;
    write_json(&locations.sync_config_path, &value)
}

/// Load the machine-local override document (an empty object when absent).
///
/// # Errors
///
/// Returns [`SyncError::ConfigInvalid`] when the file is malformed or is not
/// a JSON object.
pub fn load_overrides(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let value: Value =
        jsonc::read_jsonc(path).map_err(|e| SyncError::ConfigInvalid(e.to_string()))?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        _ => Err(SyncError::ConfigInvalid(format!(
            "{} must contain a JSON object",
            path.display()
        ))),
    }
}

/// Persist the override document.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be written.
pub fn save_overrides(path: &Path, overrides: &Value) -> Result<()> {
    write_json(path, overrides)
}

/// Render JSON the way every file written by this crate is rendered:
/// two-space indentation and a trailing newline.
#[must_use]
pub fn render_json(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    text.push('\n');
    text
}

/// Write `value` to `path` through a sibling temporary file and a rename.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the directory or file cannot be written.
pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    write_atomic(path, render_json(value).as_bytes())
}

/// Write bytes to `path` through a sibling temporary file and a rename.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the directory or file cannot be written.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().to_string());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    std::fs::write(&tmp, bytes).map_err(|e| SyncError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        SyncError::io(path, e)
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Result<NormalizedSyncConfig> {
        parse_config(text, Path::new("opencode-synced.jsonc"))
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(r#"{ "repo": { "name": "dots" } }"#).unwrap();
        assert_eq!(config.repo.branch, "main");
        assert!(!config.include_secrets);
        assert!(config.include_model_favorites);
        assert!(config.extra_secret_paths.is_empty());
        assert!(config.secrets_backend.is_none());
    }

    #[test]
    fn jsonc_features_are_accepted() {
        let config = parse(
            r#"{
                // mirror
                "repo": { "owner": "me", "name": "dots", "branch": "trunk", },
                "includeSecrets": true, /* yes */
                "extraConfigPaths": ["~/.zshrc", "~/.zshrc", " "],
            }"#,
        )
        .unwrap();
        assert_eq!(config.repo.slug().as_deref(), Some("me/dots"));
        assert_eq!(config.repo.branch, "trunk");
        assert!(config.include_secrets);
        assert_eq!(config.extra_config_paths, vec!["~/.zshrc"]);
    }

    #[test]
    fn missing_repo_is_invalid() {
        let err = parse("{}").unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid(ref m) if m.contains("repo")));
    }

    #[test]
    fn wrong_field_type_is_invalid() {
        let err = parse(r#"{ "repo": { "name": "x" }, "includeSecrets": "yes" }"#).unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid(_)));
    }

    #[test]
    fn sessions_require_secrets() {
        let config = parse(r#"{ "repo": { "name": "x" }, "includeSessions": true }"#).unwrap();
        assert!(!config.sessions_enabled());
        let config = parse(
            r#"{ "repo": { "name": "x" }, "includeSessions": true, "includeSecrets": true }"#,
        )
        .unwrap();
        assert!(config.sessions_enabled());
    }

    #[test]
    fn backend_requires_vault_and_documents() {
        let err = parse(
            r#"{ "repo": { "name": "x" }, "secretsBackend": { "type": "1password", "documents": { "authJson": "a", "mcpAuthJson": "b" } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("vault"));

        let err = parse(
            r#"{ "repo": { "name": "x" }, "secretsBackend": { "type": "1password", "vault": "v", "documents": { "authJson": "a" } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mcpAuthJson"));
    }

    #[test]
    fn backend_titles_must_be_unique_case_insensitively() {
        let err = parse(
            r#"{ "repo": { "name": "x" }, "secretsBackend": { "type": "1password", "vault": "v", "documents": { "authJson": "Auth.JSON", "mcpAuthJson": "auth.json" } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid(ref m) if m.contains("unique")));

        let err = parse(
            r#"{ "repo": { "name": "x" }, "secretsBackend": { "type": "1password", "vault": "v", "documents": { "authJson": "ÄRGER.json", "mcpAuthJson": "ärger.json" } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid(ref m) if m.contains("unique")));
        assert!(same_title("ÖFFNEN", "öffnen"));
        assert!(!same_title("öffnen", "offnen"));
    }

    #[test]
    fn backend_type_is_checked() {
        let err = parse(
            r#"{ "repo": { "name": "x" }, "secretsBackend": { "type": "vault", "vault": "v", "documents": { "authJson": "a", "mcpAuthJson": "b" } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn valid_backend_accepted() {
        let config = parse(
            r#"{ "repo": { "name": "x" }, "secretsBackend": { "type": "1Password", "vault": "Dev", "documents": { "authJson": "opencode-auth.json", "mcpAuthJson": "opencode-mcp-auth.json" } } }"#,
        )
        .unwrap();
        let backend = config.secrets_backend.unwrap();
        assert_eq!(backend.kind, "1password");
        assert_eq!(backend.vault, "Dev");
    }

    #[test]
    fn slug_from_urls() {
        assert_eq!(
            github_slug_from_url("https://github.com/me/dots.git").as_deref(),
            Some("me/dots")
        );
        assert_eq!(
            github_slug_from_url("git@github.com:me/dots.git").as_deref(),
            Some("me/dots")
        );
        assert_eq!(github_slug_from_url("https://gitlab.com/me/dots"), None);
        assert_eq!(github_slug_from_url("https://github.com/me"), None);
    }

    #[test]
    fn locator_prefers_url() {
        let repo = RepoIdentity {
            url: Some("https://example.com/r.git".to_string()),
            owner: Some("me".to_string()),
            name: Some("r".to_string()),
            branch: "main".to_string(),
        };
        assert_eq!(repo.locator(), "https://example.com/r.git");
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let loc = SyncLocations::from_roots(
            dir.path().to_path_buf(),
            dir.path().join("cfg"),
            dir.path().join("data"),
            dir.path().join("state"),
        );
        let config = parse(
            r#"{ "repo": { "owner": "me", "name": "dots" }, "includeSecrets": true, "extraSecretPaths": ["~/.ssh/config"] }"#,
        )
        .unwrap();
        save_config(&loc, &config).unwrap();
        assert_eq!(load_config(&loc).unwrap(), config);
    }

    #[test]
    fn load_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loc = SyncLocations::from_roots(
            dir.path().to_path_buf(),
            dir.path().join("cfg"),
            dir.path().join("data"),
            dir.path().join("state"),
        );
        assert!(matches!(load_config(&loc), Err(SyncError::ConfigMissing { .. })));
    }

    #[test]
    fn overrides_default_to_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let value = load_overrides(&dir.path().join("missing.jsonc")).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn overrides_must_be_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o.jsonc");
        std::fs::write(&path, "[1]").unwrap();
        assert!(matches!(load_overrides(&path), Err(SyncError::ConfigInvalid(_))));
        std::fs::write(&path, "{ // local\n \"theme\": \"x\", }").unwrap();
        assert_eq!(load_overrides(&path).unwrap(), json!({"theme": "x"}));
    }

    #[test]
    fn render_json_has_trailing_newline() {
        assert_eq!(render_json(&json!({"a": 1})), "{\n  \"a\": 1\n}\n");
    }
}
