#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Integration tests for the compiled `opencode-sync` binary.
//!
//! Only flows that never reach git, gh or op are exercised here: version and
//! completion output, configuration errors, and the read-only status report
//! of a mirror that has not been cloned yet.

mod common;

use common::IntegrationTestContext;
use serde_json::json;

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn version_prints_name() {
    let ctx = IntegrationTestContext::new();
    let output = ctx.run_cli(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("opencode-sync "));
}

#[test]
fn completions_for_bash() {
    let ctx = IntegrationTestContext::new();
    let output = ctx.run_cli(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("opencode-sync"));
}

#[test]
fn status_without_config_fails_with_hint() {
    let ctx = IntegrationTestContext::new();
    let output = ctx.run_cli(&["status"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("no sync configuration found"), "stderr: {err}");
    assert!(err.contains("opencode-sync init"), "stderr: {err}");
}

#[test]
fn status_reports_uncloned_mirror() {
    let ctx = IntegrationTestContext::new().with_sync_config(&json!({
        "repo": {"owner": "me", "name": "opencode-config", "branch": "work"}
    }));
    let output = ctx.run_cli(&["status"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("me/opencode-config"), "stdout: {out}");
    assert!(out.contains("work"), "stdout: {out}");
    assert!(out.contains("not cloned yet"), "stdout: {out}");
    assert!(!ctx.repo_dir().exists());
}

#[test]
fn invalid_backend_is_rejected_before_any_command() {
    let ctx = IntegrationTestContext::new().with_sync_config(&json!({
        "repo": {"owner": "me", "name": "opencode-config"},
        "secretsBackend": {
            "type": "1password",
            "vault": "Dev",
            "documents": {"authJson": "Auth", "mcpAuthJson": "auth"}
        }
    }));
    let output = ctx.run_cli(&["pull"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("unique"), "stderr: {err}");
    assert!(!ctx.repo_dir().exists());
}

#[test]
fn config_dir_flag_overrides_location() {
    let ctx = IntegrationTestContext::new();
    let elsewhere = ctx.home_path().join("elsewhere");
    common::write_file(
        &elsewhere.join("opencode-synced.jsonc"),
        "// custom location\n{\"repo\": {\"url\": \"https://example.com/me/cfg.git\",},}\n",
    );
    let output = ctx.run_cli(&["status", "--config-dir", elsewhere.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("https://example.com/me/cfg.git"));
}
