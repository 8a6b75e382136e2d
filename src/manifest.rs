//! Extra-path manifests.
//!
//! Each family of allow-listed extra paths (secrets, configs) is stored in the
//! mirror under `<prefix>/extra/<id>` together with a strict-JSON manifest
//! that records where every entry came from and the permission bits of the
//! entry and all of its descendants.  The manifest is rebuilt from scratch on
//! every local→mirror pass.
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::config::{render_json, write_atomic};
use crate::error::{Result, SyncError};
use crate::fs_util::{file_mode, read_optional, remove_existing, replace_with_copy, set_mode};
use crate::logging::Log;
use crate::plan::{ExtraPathPlan, ItemKind};

/// A descendant of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    /// Path relative to the entry root, `/`-separated.
    pub relative_path: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Permission bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// One allow-listed path stored in the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Normalized local source path.
    pub source_path: String,
    /// Mirror-relative storage path.
    pub repo_path: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Permission bits of the entry root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    /// Descendants of a directory entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ManifestItem>>,
}

/// Manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraManifest {
    /// Stored entries in allow-list order.
    pub entries: Vec<ManifestEntry>,
}

impl ExtraManifest {
    /// Load a manifest; `None` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Parse`] if the file is not a valid manifest.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(bytes) = read_optional(path)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::parse(path, &e))
    }

    /// Write the manifest as strict JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let value = serde_json::to_value(self).map_err(|e| SyncError::parse(path, &e))?;
        write_atomic(path, render_json(&value).as_bytes())
    }
}

/// Result of applying a manifest to the local machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestApplyReport {
    /// Entries copied to their local source path.
    pub applied: usize,
    /// Entries skipped because they are no longer allow-listed.
    pub not_allowed: usize,
    /// Entries skipped because the mirror copy is missing.
    pub missing: usize,
}

fn extra_dir(plan: &ExtraPathPlan) -> PathBuf {
    plan.manifest_path.with_file_name("extra")
}

/// Whether a manifest-supplied relative path stays inside its root.
fn is_contained(relative: &str) -> bool {
    !relative.is_empty()
        && Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn join_slashed(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Walk `root` and record every descendant with its mode, sorted by path.
fn collect_items(root: &Path) -> Result<Vec<ManifestItem>> {
    let mut items = Vec::new();
    let mut stack = vec![(root.to_path_buf(), String::new())];
    while let Some((dir, prefix)) = stack.pop() {
        for entry in std::fs::read_dir(&dir).map_err(|e| SyncError::io(&dir, e))? {
            let entry = entry.map_err(|e| SyncError::io(&dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let relative_path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let kind = if path.is_dir() {
                stack.push((path.clone(), relative_path.clone()));
                ItemKind::Dir
            } else {
                ItemKind::File
            };
            items.push(ManifestItem {
                relative_path,
                kind,
                mode: file_mode(&path),
            });
        }
    }
    items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(items)
}

/// Rebuild `<prefix>/extra/` and its manifest from the local allow-listed
/// paths.  Missing local paths are left out.
///
/// Returns the written manifest (empty when nothing is allow-listed, in which
/// case no manifest file is left in the mirror).
///
/// # Errors
///
/// Returns an error if a local path cannot be read or the mirror cannot be
/// written.
pub fn write_extra_paths(plan: &ExtraPathPlan, log: &dyn Log) -> Result<ExtraManifest> {
    remove_existing(&extra_dir(plan))?;

    let mut manifest = ExtraManifest::default();
    for entry in &plan.entries {
        let local = &entry.local_path;
        if local.symlink_metadata().is_err() {
            log.debug(&format!("extra path {} does not exist, skipping", entry.source_path));
            continue;
        }
        replace_with_copy(local, &entry.repo_path)?;
        let (kind, items) = if local.is_dir() {
            (ItemKind::Dir, Some(collect_items(local)?))
        } else {
            (ItemKind::File, None)
        };
        manifest.entries.push(ManifestEntry {
            source_path: entry.source_path.clone(),
            repo_path: entry.repo_rel.clone(),
            kind,
            mode: file_mode(local),
            items,
        });
    }

    if plan.allowlist.is_empty() {
        remove_existing(&plan.manifest_path)?;
    } else {
        manifest.save(&plan.manifest_path)?;
    }
    Ok(manifest)
}

/// Copy every manifest entry that is still allow-listed from the mirror to
/// its local source path and restore the recorded modes.
///
/// # Errors
///
/// Returns an error if the manifest is malformed or a copy fails.
pub fn apply_extra_paths(
    plan: &ExtraPathPlan,
    repo_root: &Path,
    log: &dyn Log,
) -> Result<ManifestApplyReport> {
    let mut report = ManifestApplyReport::default();
    let Some(manifest) = ExtraManifest::load(&plan.manifest_path)? else {
        return Ok(report);
    };

    for entry in &manifest.entries {
        if !plan.allows(&entry.source_path) {
            log.debug(&format!(
                "{} is no longer allow-listed, not restoring it",
                entry.source_path
            ));
            report.not_allowed += 1;
            continue;
        }
        if !is_contained(&entry.repo_path) {
            return Err(SyncError::Parse {
                path: plan.manifest_path.clone(),
                message: format!("repoPath '{}' escapes the mirror", entry.repo_path),
            });
        }
        let source = join_slashed(repo_root, &entry.repo_path);
        if source.symlink_metadata().is_err() {
            log.warn(&format!("mirror copy of {} is missing", entry.source_path));
            report.missing += 1;
            continue;
        }

        let target = PathBuf::from(&entry.source_path);
        replace_with_copy(&source, &target)?;
        for item in entry.items.iter().flatten() {
            if !is_contained(&item.relative_path) {
                continue;
            }
            if let Some(mode) = item.mode {
                let path = join_slashed(&target, &item.relative_path);
                if path.exists() {
                    set_mode(&path, mode)?;
                }
            }
        }
        if let Some(mode) = entry.mode {
            set_mode(&target, mode)?;
        }
        report.applied += 1;
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::Logger;

    fn plan_for(repo: &Path, prefix: &str, paths: &[&Path]) -> ExtraPathPlan {
        ExtraPathPlan::new(
            repo,
            prefix,
            paths.iter().map(|p| p.to_string_lossy().to_string()).collect(),
        )
    }

    #[test]
    fn write_records_entries_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let file = dir.path().join("netrc");
        std::fs::write(&file, "machine x").unwrap();
        let missing = dir.path().join("missing");
        let plan = plan_for(&repo, "secrets", &[&file, &missing]);

        let manifest = write_extra_paths(&plan, &Logger::new("test")).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        let entry = &manifest.entries[0];
        assert_eq!(entry.kind, ItemKind::File);
        assert!(entry.repo_path.starts_with("secrets/extra/netrc-"));
        assert_eq!(
            std::fs::read_to_string(repo.join(&entry.repo_path)).unwrap(),
            "machine x"
        );
        let reloaded = ExtraManifest::load(&plan.manifest_path).unwrap().unwrap();
        assert_eq!(reloaded, manifest);
    }

    #[test]
    fn manifest_json_shape() {
        let manifest = ExtraManifest {
            entries: vec![ManifestEntry {
                source_path: "/h/.zshrc".to_string(),
                repo_path: "config/extra/.zshrc-0a1b2c3d".to_string(),
                kind: ItemKind::Dir,
                mode: Some(0o755),
                items: Some(vec![ManifestItem {
                    relative_path: "a/b".to_string(),
                    kind: ItemKind::File,
                    mode: None,
                }]),
            }],
        };
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"entries": [{
                "sourcePath": "/h/.zshrc",
                "repoPath": "config/extra/.zshrc-0a1b2c3d",
                "type": "dir",
                "mode": 493,
                "items": [{"relativePath": "a/b", "type": "file"}]
            }]})
        );
    }

    #[test]
    fn rebuild_drops_removed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();
        let log = Logger::new("test");

        let first = write_extra_paths(&plan_for(&repo, "config", &[&a, &b]), &log).unwrap();
        let stale = repo.join(&first.entries[1].repo_path);
        assert!(stale.exists());

        write_extra_paths(&plan_for(&repo, "config", &[&a]), &log).unwrap();
        assert!(!stale.exists(), "entries no longer listed are removed");

        write_extra_paths(&plan_for(&repo, "config", &[]), &log).unwrap();
        assert!(!repo.join("config/extra-manifest.json").exists());
    }

    #[test]
    fn apply_round_trip_directory_with_modes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let src = dir.path().join("tool");
        std::fs::create_dir_all(src.join("bin")).unwrap();
        std::fs::write(src.join("bin").join("run"), "#!/bin/sh").unwrap();
        std::fs::write(src.join("conf"), "x=1").unwrap();
        #[cfg(unix)]
        set_mode(&src.join("bin").join("run"), 0o755).unwrap();
        let plan = plan_for(&repo, "config", &[&src]);
        let log = Logger::new("test");

        let manifest = write_extra_paths(&plan, &log).unwrap();
        let items = manifest.entries[0].items.as_ref().unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.relative_path.as_str()).collect();
        assert_eq!(names, vec!["bin", "bin/run", "conf"]);

        std::fs::remove_dir_all(&src).unwrap();
        let report = apply_extra_paths(&plan, &repo, &log).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(std::fs::read_to_string(src.join("conf")).unwrap(), "x=1");
        #[cfg(unix)]
        assert_eq!(file_mode(&src.join("bin").join("run")), Some(0o755));
    }

    #[test]
    fn apply_skips_entries_not_allow_listed() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let file = dir.path().join("secret.txt");
        std::fs::write(&file, "s").unwrap();
        let log = Logger::new("test");
        write_extra_paths(&plan_for(&repo, "secrets", &[&file]), &log).unwrap();
        std::fs::remove_file(&file).unwrap();

        let mut narrowed = plan_for(&repo, "secrets", &[&file]);
        narrowed.allowlist.clear();
        let report = apply_extra_paths(&narrowed, &repo, &log).unwrap();
        assert_eq!(report.not_allowed, 1);
        assert!(!file.exists());
    }

    #[test]
    fn apply_rejects_escaping_repo_path() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let plan = plan_for(&repo, "config", &[Path::new("/h/x")]);
        ExtraManifest {
            entries: vec![ManifestEntry {
                source_path: "/h/x".to_string(),
                repo_path: "../outside".to_string(),
                kind: ItemKind::File,
                mode: None,
                items: None,
            }],
        }
        .save(&plan.manifest_path)
        .unwrap();
        let err = apply_extra_paths(&plan, &repo, &Logger::new("test")).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }

    #[test]
    fn apply_without_manifest_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan_for(&dir.path().join("repo"), "config", &[]);
        let report = apply_extra_paths(&plan, dir.path(), &Logger::new("test")).unwrap();
        assert_eq!(report, ManifestApplyReport::default());
    }
}
