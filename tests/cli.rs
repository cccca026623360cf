// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// The binary, run in `dir` with no registry or CI variables set
fn pushflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pushflow").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1");
    for var in [
        "REGISTRY",
        "REGISTRY_USERNAME",
        "REGISTRY_PASSWORD",
        "IMAGE_NAME",
        "VERSION",
        "GITHUB_SHA",
        "GITHUB_REF_NAME",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn archived_runs(dir: &Path) -> Vec<String> {
    let runs = dir.join(".pushflow").join("runs");
    if !runs.exists() {
        return vec![];
    }
    std::fs::read_dir(runs)
        .unwrap()
        .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
        .collect()
}

#[test]
fn tags_for_commit() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .args(["tags", "--commit", "abc123", "--registry", "reg.io"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reg.io/langflow-base:abc123"))
        .stdout(predicate::str::contains("reg.io/langflow-base:latest"))
        .stdout(predicate::str::contains("reg.io/langflow-backend:abc123"))
        .stdout(predicate::str::contains("reg.io/langflow-frontend:latest"));
}

#[test]
fn tags_honour_image_name() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .env("IMAGE_NAME", "flow")
        .args(["tags", "--commit", "abc123", "--registry", "reg.io/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reg.io/flow-base:abc123"));
}

#[test]
fn push_to_other_branch_is_ignored() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .args(["run", "--branch", "develop", "--commit", "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored"));

    assert!(archived_runs(dir.path()).is_empty());
}

#[test]
fn tag_push_event_is_ignored() {
    let dir = TempDir::new().unwrap();
    let payload = dir.path().join("push.json");
    std::fs::write(
        &payload,
        r#"{"ref": "refs/tags/v1.0.0", "after": "1f2e3d4c5b6a7988776655443322110000aabbcc"}"#,
    )
    .unwrap();

    pushflow(dir.path())
        .args(["run", "--event", "push.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored"));
}

#[test]
fn missing_secrets_fail_before_any_step() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .env("REGISTRY", "reg.io")
        .args(["run", "--branch", "main", "--commit", "abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required secrets"))
        .stderr(predicate::str::contains("REGISTRY_USERNAME"))
        .stderr(predicate::str::contains("REGISTRY_PASSWORD"));

    let runs = archived_runs(dir.path());
    assert_eq!(runs.len(), 1);
    assert!(runs[0].contains("\"failed_step\": \"preflight\""));
    assert!(runs[0].contains("\"status\": \"failed\""));
}

#[test]
fn malformed_commit_is_rejected() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .args(["run", "--branch", "main", "--commit", "not-a-sha"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid commit identifier"));
}

#[test]
fn dry_run_shows_plan() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .env("REGISTRY", "reg.io")
        .args(["run", "--branch", "main", "--commit", "abc123", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("tag: reg.io/langflow-base:abc123"))
        .stdout(predicate::str::contains(
            "build-arg: LANGFLOW_IMAGE=reg.io/langflow-base:abc123",
        ));

    assert!(archived_runs(dir.path()).is_empty());
}

#[test]
fn init_then_validate() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created .pushflow.yaml"));

    assert!(dir.path().join(".pushflow.yaml").exists());

    pushflow(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    pushflow(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn validate_rejects_unknown_base() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".pushflow.yaml"),
        "images:\n  - name: web\n    suffix: -web\n    dockerfile: Dockerfile\n    base: missing\n",
    )
    .unwrap();

    pushflow(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown image 'missing'"));
}

#[test]
fn graph_text() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. checkout (git)"))
        .stdout(predicate::str::contains("3. build-base (docker) [depends: login]"))
        .stdout(predicate::str::contains(
            "5. build-frontend (docker) [depends: login, build-base]",
        ));
}

#[test]
fn runs_list_when_empty() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .args(["runs", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs recorded"));
}

#[test]
fn runs_show_unknown_id() {
    let dir = TempDir::new().unwrap();

    pushflow(dir.path())
        .args(["runs", "show", "abc1234"])
        .assert()
        .failure();
}
