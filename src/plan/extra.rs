//! Allow-listed extra paths: normalization and deterministic mirror ids.
use sha2::{Digest as _, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// One allow-listed extra path and where it lives in the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraPathEntry {
    /// Normalized source path (the allow-list key).
    pub source_path: String,
    /// Local filesystem path.
    pub local_path: PathBuf,
    /// Absolute path inside the mirror.
    pub repo_path: PathBuf,
    /// Mirror-relative path with `/` separators.
    pub repo_rel: String,
}

/// Plan for one family of extra paths (secrets or configs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraPathPlan {
    /// Normalized, de-duplicated allow-list in configuration order.
    pub allowlist: Vec<String>,
    /// Manifest location inside the mirror.
    pub manifest_path: PathBuf,
    /// Mirror-relative manifest path.
    pub manifest_rel: String,
    /// Per-entry mirror placement.
    pub entries: Vec<ExtraPathEntry>,
}

impl ExtraPathPlan {
    /// Build a plan that stores entries under `<repo_root>/<prefix>/extra/`
    /// with the manifest at `<repo_root>/<prefix>/extra-manifest.json`.
    #[must_use]
    pub fn new(repo_root: &Path, prefix: &str, allowlist: Vec<String>) -> Self {
        let entries = allowlist
            .iter()
            .map(|source| {
                let repo_rel = format!("{prefix}/extra/{}", encode_extra_path(source));
                ExtraPathEntry {
                    source_path: source.clone(),
                    local_path: PathBuf::from(source),
                    repo_path: repo_root.join(&repo_rel),
                    repo_rel,
                }
            })
            .collect();
        let manifest_rel = format!("{prefix}/extra-manifest.json");
        Self {
            manifest_path: repo_root.join(&manifest_rel),
            manifest_rel,
            allowlist,
            entries,
        }
    }

    /// Whether a normalized source path is currently allow-listed.
    #[must_use]
    pub fn allows(&self, source_path: &str) -> bool {
        self.allowlist.iter().any(|p| p == source_path)
    }
}

/// Normalize a user-supplied path into the canonical allow-list key.
///
/// Expands a leading `~`, resolves relative paths against `home`, folds `.`
/// and `..` lexically, strips Windows verbatim prefixes, and uses `/`
/// separators.  Windows paths are lower-cased.
#[must_use]
pub fn normalize_path(raw: &str, home: &Path, platform: &Platform) -> String {
    let windows = platform.is_windows();
    let to_slashes = |s: &str| {
        if windows {
            s.replace('\\', "/")
        } else {
            s.to_string()
        }
    };

    let raw = raw.trim();
    let simplified = dunce::simplified(Path::new(raw)).to_string_lossy().to_string();
    let mut text = to_slashes(&simplified);
    if let Some(verbatim) = text.strip_prefix("//?/") {
        text = verbatim.to_string();
    }
    let home_text = to_slashes(&home.to_string_lossy());

    let expanded = if text == "~" {
        home_text
    } else if let Some(rest) = text.strip_prefix("~/") {
        format!("{}/{rest}", home_text.trim_end_matches('/'))
    } else if split_root(&text, windows).is_some() {
        text
    } else {
        format!("{}/{text}", home_text.trim_end_matches('/'))
    };

    let (root, rest) = split_root(&expanded, windows).unwrap_or_else(|| (String::new(), expanded.as_str()));
    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let folded = format!("{root}{}", parts.join("/"));
    if platform.case_insensitive_paths() {
        folded.to_lowercase()
    } else {
        folded
    }
}

/// Split an absolute path into its root (`/`, `c:/` or `//`) and remainder.
fn split_root(path: &str, windows: bool) -> Option<(String, &str)> {
    if windows {
        let mut chars = path.chars();
        if let (Some(drive), Some(':')) = (chars.next(), chars.next())
            && drive.is_ascii_alphabetic()
        {
            let rest = path.get(2..).unwrap_or_default();
            return Some((format!("{drive}:/"), rest));
        }
        if let Some(rest) = path.strip_prefix("//") {
            return Some(("//".to_string(), rest));
        }
    }
    path.strip_prefix('/').map(|rest| ("/".to_string(), rest))
}

/// Deterministic mirror id of a normalized path:
/// `sanitize(basename) + "-" + first 8 hex digits of SHA-256(path)`.
#[must_use]
pub fn encode_extra_path(normalized: &str) -> String {
    let base = normalized
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        sanitized = "path".to_string();
    }

    let digest = Sha256::digest(normalized.as_bytes());
    let mut hash8 = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        let _ = write!(hash8, "{byte:02x}");
    }
    format!("{sanitized}-{hash8}")
}
