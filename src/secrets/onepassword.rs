//! 1Password backend driven through the `op` CLI.
//!
//! Documents are located by title (case-insensitive) in a Document-category
//! listing of the configured vault.  Zero matches means "not stored yet",
//! one match is used, several matches are refused as ambiguous.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{BackendStatus, DocumentAction, DocumentOutcome, SecretsBackend};
use crate::config::{SecretsBackendConfig, same_title};
use crate::error::{Result, SyncError};
use crate::exec::{ExecResult, Executor};
use crate::fs_util::{ensure_parent_dir, set_mode};
use crate::locations::SyncLocations;

const OP: &str = "op";
const PRIVATE_MODE: u32 = 0o600;

/// One entry of `op item list --format json`.
#[derive(Debug, Clone, Deserialize)]
struct OpItem {
    id: String,
    title: String,
}

/// 1Password [`SecretsBackend`].
#[derive(Debug)]
pub struct OnePasswordBackend {
    executor: Arc<dyn Executor>,
    vault: String,
    documents: Vec<(String, PathBuf)>,
    work_dir: PathBuf,
}

enum Lookup {
    Missing,
    Found(String),
}

impl OnePasswordBackend {
    /// Backend for the validated descriptor `config`.
    #[must_use]
    pub fn new(
        config: &SecretsBackendConfig,
        locations: &SyncLocations,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            executor,
            vault: config.vault.clone(),
            documents: vec![
                (config.auth_json_title.clone(), locations.auth_json()),
                (config.mcp_auth_json_title.clone(), locations.mcp_auth_json()),
            ],
            work_dir: std::env::temp_dir(),
        }
    }

    fn op(&self, operation: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self
            .executor
            .run_in_unchecked(&self.work_dir, OP, args)
            .map_err(|e| SyncError::command(operation, e.to_string()))?;
        Ok(result)
    }

    fn list(&self) -> Result<Vec<OpItem>> {
        let result = self.op(
            "op item list",
            &[
                "item",
                "list",
                "--vault",
                &self.vault,
                "--categories",
                "Document",
                "--format",
                "json",
            ],
        )?;
        if !result.success {
            return Err(SyncError::command("op item list", result.failure_text()));
        }
        let text = result.stdout.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(text).map_err(|e| {
            SyncError::command("op item list", format!("unexpected output: {e}"))
        })
    }

    fn lookup(items: &[OpItem], title: &str) -> Result<Lookup> {
        let matches: Vec<&OpItem> = items
            .iter()
            .filter(|i| same_title(&i.title, title))
            .collect();
        match matches.as_slice() {
            [] => Ok(Lookup::Missing),
            [one] => Ok(Lookup::Found(one.id.clone())),
            many => Err(SyncError::SecretsBackendAmbiguous {
                title: title.to_string(),
                count: many.len(),
            }),
        }
    }

    fn download(&self, id: &str, target: &Path) -> Result<ExecResult> {
        ensure_parent_dir(target)?;
        let tmp = temp_sibling(target);
        let tmp_text = tmp.to_string_lossy().to_string();
        let result = self.op(
            "op document get",
            &[
                "document",
                "get",
                id,
                "--vault",
                &self.vault,
                "--out-file",
                &tmp_text,
                "--force",
            ],
        )?;
        if result.success {
            move_private(&tmp, target)?;
        } else {
            let _ = std::fs::remove_file(&tmp);
        }
        Ok(result)
    }

    fn upload(&self, id: &str, source: &Path) -> Result<ExecResult> {
        let source_text = source.to_string_lossy().to_string();
        self.op(
            "op document edit",
            &["document", "edit", id, &source_text, "--vault", &self.vault],
        )
    }

    fn create(&self, title: &str, source: &Path) -> Result<()> {
        let source_text = source.to_string_lossy().to_string();
        let result = self.op(
            "op document create",
            &[
                "document",
                "create",
                &source_text,
                "--vault",
                &self.vault,
                "--title",
                title,
            ],
        )?;
        if result.success {
            Ok(())
        } else {
            Err(SyncError::command("op document create", result.failure_text()))
        }
    }
}

fn is_not_found(result: &ExecResult) -> bool {
    let text = format!("{} {}", result.stderr, result.stdout).to_lowercase();
    text.contains("isn't an item") || text.contains("not found") || text.contains("no item")
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().to_string());
    target.with_file_name(format!(".{name}.{}.op-tmp", std::process::id()))
}

/// Restrict `tmp` to its owner, then rename it onto `target`, falling back
/// to copy + delete across filesystems.
fn move_private(tmp: &Path, target: &Path) -> Result<()> {
    set_mode(tmp, PRIVATE_MODE)?;
    if std::fs::rename(tmp, target).is_ok() {
        return Ok(());
    }
    std::fs::copy(tmp, target).map_err(|e| SyncError::io(target, e))?;
    set_mode(target, PRIVATE_MODE)?;
    std::fs::remove_file(tmp).map_err(|e| SyncError::io(tmp, e))
}

impl SecretsBackend for OnePasswordBackend {
    fn pull(&self) -> Result<Vec<DocumentOutcome>> {
        let mut items = self.list()?;
        let mut refreshed = false;
        let mut outcomes = Vec::new();

        for (title, local_path) in &self.documents {
            let mut lookup = Self::lookup(&items, title)?;
            let action = loop {
                let Lookup::Found(id) = &lookup else {
                    break DocumentAction::NotFound;
                };
                let result = self.download(id, local_path)?;
                if result.success {
                    break DocumentAction::Downloaded;
                }
                if is_not_found(&result) && !refreshed {
                    refreshed = true;
                    items = self.list()?;
                    lookup = Self::lookup(&items, title)?;
                    continue;
                }
                return Err(SyncError::command("op document get", result.failure_text()));
            };
            outcomes.push(DocumentOutcome {
                title: title.clone(),
                local_path: local_path.clone(),
                action,
            });
        }
        Ok(outcomes)
    }

    fn push(&self) -> Result<Vec<DocumentOutcome>> {
        let mut items = self.list()?;
        let mut refreshed = false;
        let mut outcomes = Vec::new();

        for (title, local_path) in &self.documents {
            let mut lookup = Self::lookup(&items, title)?;
            let action = if local_path.exists() {
                loop {
                    let Lookup::Found(id) = &lookup else {
                        self.create(title, local_path)?;
                        break DocumentAction::Created;
                    };
                    let result = self.upload(id, local_path)?;
                    if result.success {
                        break DocumentAction::Updated;
                    }
                    if is_not_found(&result) && !refreshed {
                        refreshed = true;
                        items = self.list()?;
                        lookup = Self::lookup(&items, title)?;
                        continue;
                    }
                    return Err(SyncError::command("op document edit", result.failure_text()));
                }
            } else {
                DocumentAction::SkippedMissingLocal
            };
            outcomes.push(DocumentOutcome {
                title: title.clone(),
                local_path: local_path.clone(),
                action,
            });
        }
        Ok(outcomes)
    }

    fn status(&self) -> BackendStatus {
        BackendStatus {
            kind: crate::config::ONEPASSWORD_BACKEND.to_string(),
            vault: self.vault.clone(),
            cli_available: self.executor.which(OP),
            documents: self.documents.iter().map(|(t, _)| t.clone()).collect(),
        }
    }
}
