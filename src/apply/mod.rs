//! Applier: moves plan items between the local directories and the mirror.
//!
//! Both directions are idempotent.  A second pass with unchanged inputs
//! writes nothing: config files are compared semantically and other files
//! byte-for-byte before being touched.
pub mod embedded;

use serde_json::{Map, Value};
use std::path::Path;

use crate::config::{jsonc, render_json, write_atomic};
use crate::error::{Result, SyncError};
use crate::fs_util::{
    ensure_parent_dir, file_mode, read_optional, remove_existing, replace_with_copy, set_mode,
};
use crate::logging::Log;
use crate::manifest::{ManifestApplyReport, apply_extra_paths, write_extra_paths};
use crate::merge::{deep_merge, is_empty_overrides, strip_overrides};
use crate::plan::{ItemKind, SyncItem, SyncPlan};

pub use embedded::{extract_embedded_secrets, is_sensitive};

/// Options for [`sync_local_to_mirror`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalToMirrorOptions {
    /// Skip backend-owned authentication files.
    pub exclude_auth_tokens: bool,
    /// Commit secrets embedded in config files instead of moving them to the
    /// override document.
    pub commit_config_secrets: bool,
}

/// What an apply pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Items written.
    pub written: usize,
    /// Items left alone because they were already up to date.
    pub unchanged: usize,
    /// Mirror items deleted because the local source disappeared.
    pub removed: usize,
    /// Extra-path manifest entries restored locally.
    pub extra_applied: usize,
    /// Extra-path entries skipped because they are no longer allow-listed.
    pub extra_not_allowed: usize,
    /// Number of embedded secret values moved into the override document.
    pub secrets_extracted: usize,
    /// The override document after this pass.
    pub overrides: Value,
    /// Whether `overrides` differs from the input document.
    pub overrides_changed: bool,
}

impl ApplyReport {
    fn new(overrides: &Value) -> Self {
        Self {
            written: 0,
            unchanged: 0,
            removed: 0,
            extra_applied: 0,
            extra_not_allowed: 0,
            secrets_extracted: 0,
            overrides: overrides.clone(),
            overrides_changed: false,
        }
    }

    fn add_manifest(&mut self, report: &ManifestApplyReport) {
        self.extra_applied += report.applied;
        self.extra_not_allowed += report.not_allowed;
    }

    /// Whether the pass changed anything on disk.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.written > 0 || self.removed > 0 || self.extra_applied > 0 || self.overrides_changed
    }
}

fn parse_json(bytes: &[u8], path: &Path) -> Option<Value> {
    let text = String::from_utf8_lossy(bytes);
    jsonc::parse_jsonc::<Value>(&text, path).ok()
}

/// Copy `src` over `dst` unless their bytes already match.  Returns whether
/// a write happened.
fn copy_file_if_changed(src: &Path, dst: &Path) -> Result<bool> {
    let src_bytes = read_optional(src)?.unwrap_or_default();
    if read_optional(dst)?.as_deref() == Some(src_bytes.as_slice()) {
        return Ok(false);
    }
    ensure_parent_dir(dst)?;
    if dst.is_dir() {
        remove_existing(dst)?;
    }
    std::fs::copy(src, dst).map_err(|e| SyncError::io(src, e))?;
    Ok(true)
}

/// Write a JSON value to `dst`, giving it `mode` when known.
fn write_value(dst: &Path, value: &Value, mode: Option<u32>) -> Result<()> {
    write_atomic(dst, render_json(value).as_bytes())?;
    if let Some(mode) = mode {
        set_mode(dst, mode)?;
    }
    Ok(())
}

/// Apply the mirror to the local machine.
///
/// Every present mirror item replaces its local counterpart (missing mirror
/// items leave local files alone), both extra-path manifests are applied, and
/// the override document is merged onto every config file.
///
/// # Errors
///
/// Returns an error if a file cannot be read or written.
pub fn sync_mirror_to_local(plan: &SyncPlan, overrides: &Value, log: &dyn Log) -> Result<ApplyReport> {
    let mut report = ApplyReport::new(overrides);
    let has_overrides = !is_empty_overrides(overrides);

    for item in &plan.items {
        let mirror = &item.repo_path;
        if mirror.symlink_metadata().is_err() {
            if item.is_config_file && has_overrides {
                merge_overrides_in_place(item, overrides, &mut report)?;
            }
            continue;
        }

        match item.kind {
            ItemKind::Dir => {
                replace_with_copy(mirror, &item.local_path)?;
                report.written += 1;
            }
            ItemKind::File if item.is_config_file && has_overrides => {
                let mirror_bytes = read_optional(mirror)?.unwrap_or_default();
                let Some(base) = parse_json(&mirror_bytes, mirror) else {
                    log.warn(&format!(
                        "{} is not valid JSON; copying it without overrides",
                        item.repo_rel
                    ));
                    count(copy_file_if_changed(mirror, &item.local_path)?, &mut report);
                    continue;
                };
                let merged = deep_merge(&base, overrides);
                let local = read_optional(&item.local_path)?
                    .and_then(|bytes| parse_json(&bytes, &item.local_path));
                if local.as_ref() == Some(&merged) {
                    report.unchanged += 1;
                } else {
                    write_value(&item.local_path, &merged, file_mode(mirror))?;
                    report.written += 1;
                }
            }
            ItemKind::File => {
                count(copy_file_if_changed(mirror, &item.local_path)?, &mut report);
            }
        }
    }

    let secrets = apply_extra_paths(&plan.extra_secrets, &plan.repo_root, log)?;
    report.add_manifest(&secrets);
    let configs = apply_extra_paths(&plan.extra_configs, &plan.repo_root, log)?;
    report.add_manifest(&configs);
    Ok(report)
}

/// Merge overrides onto a local config file that has no mirror counterpart.
fn merge_overrides_in_place(item: &SyncItem, overrides: &Value, report: &mut ApplyReport) -> Result<()> {
    let Some(bytes) = read_optional(&item.local_path)? else {
        return Ok(());
    };
    let Some(local) = parse_json(&bytes, &item.local_path) else {
        return Ok(());
    };
    let merged = deep_merge(&local, overrides);
    if merged == local {
        report.unchanged += 1;
    } else {
        write_value(&item.local_path, &merged, file_mode(&item.local_path))?;
        report.written += 1;
    }
    Ok(())
}

const fn count(written: bool, report: &mut ApplyReport) {
    if written {
        report.written += 1;
    } else {
        report.unchanged += 1;
    }
}

/// Capture the local machine into the mirror.
///
/// Config files have embedded secrets moved into the override document
/// (unless `options.commit_config_secrets`) and machine-local overrides
/// stripped before they are written.  A missing local source deletes the
/// mirror counterpart.  Extra-path directories and manifests are rebuilt.
///
/// # Errors
///
/// Returns an error if a file cannot be read or written.
pub fn sync_local_to_mirror(
    plan: &SyncPlan,
    overrides: &Value,
    options: LocalToMirrorOptions,
    log: &dyn Log,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::new(overrides);

    for item in &plan.items {
        if options.exclude_auth_tokens && item.is_auth_token {
            continue;
        }
        let local = &item.local_path;
        if local.symlink_metadata().is_err() {
            if item.repo_path.symlink_metadata().is_ok() {
                remove_existing(&item.repo_path)?;
                report.removed += 1;
            }
            continue;
        }

        match item.kind {
            ItemKind::Dir => {
                replace_with_copy(local, &item.repo_path)?;
                report.written += 1;
            }
            ItemKind::File if item.is_config_file => {
                capture_config_file(item, options, &mut report, log)?;
            }
            ItemKind::File => {
                count(copy_file_if_changed(local, &item.repo_path)?, &mut report);
            }
        }
    }

    write_extra_paths(&plan.extra_secrets, log)?;
    write_extra_paths(&plan.extra_configs, log)?;
    Ok(report)
}

fn capture_config_file(
    item: &SyncItem,
    options: LocalToMirrorOptions,
    report: &mut ApplyReport,
    log: &dyn Log,
) -> Result<()> {
    let local_bytes = read_optional(&item.local_path)?.unwrap_or_default();
    let Some(mut local) = parse_json(&local_bytes, &item.local_path) else {
        log.warn(&format!(
            "{} is not valid JSON; copying it verbatim",
            item.local_path.display()
        ));
        count(copy_file_if_changed(&item.local_path, &item.repo_path)?, report);
        return Ok(());
    };

    let mut extracted = Value::Object(Map::new());
    if !options.commit_config_secrets {
        let mut scrubbed = local.clone();
        extracted = extract_embedded_secrets(&mut scrubbed);
        if !is_empty_overrides(&extracted) {
            let moved = embedded::count_new_leaves(&extracted, &report.overrides);
            let merged = deep_merge(&report.overrides, &extracted);
            if merged != report.overrides {
                report.overrides = merged;
                report.overrides_changed = true;
            }
            if moved > 0 {
                report.secrets_extracted += moved;
                log.info(&format!(
                    "moved {moved} embedded secret(s) from {} to the local overrides",
                    item.local_path.display()
                ));
            }
            local = deep_merge(&scrubbed, &extracted);
        }
    }

    if is_empty_overrides(&report.overrides) {
        count(copy_file_if_changed(&item.local_path, &item.repo_path)?, report);
        return Ok(());
    }

    let mirror_value = read_optional(&item.repo_path)?
        .and_then(|bytes| parse_json(&bytes, &item.repo_path));
    let base = mirror_value
        .clone()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let mut desired = strip_overrides(&local, &report.overrides, &base);
    embedded::drop_literal_secrets(&mut desired, &extracted);

    if mirror_value.as_ref() == Some(&desired) {
        report.unchanged += 1;
    } else {
        write_value(&item.repo_path, &desired, file_mode(&item.local_path))?;
        report.written += 1;
    }
    Ok(())
}
