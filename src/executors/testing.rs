// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Test doubles and throwaway git repositories

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ExecutionResult, Executor, StepInput};
use crate::credentials::{Credentials, Secret};
use crate::errors::PushflowError;
use crate::pipeline::{RunContext, Step, StepSequencer};

pub(crate) type Calls = Arc<Mutex<Vec<(String, StepInput)>>>;

/// Records every call; fails the named step with exit code 1
pub(crate) struct FakeExecutor {
    pub calls: Calls,
    pub fail_on: Option<String>,
    pub error_on: Option<String>,
}

impl FakeExecutor {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            fail_on: None,
            error_on: None,
        }
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(
        &self,
        step: &Step,
        _ctx: &RunContext,
        input: &StepInput,
    ) -> Result<ExecutionResult, PushflowError> {
        self.calls.lock().unwrap().push((step.name.clone(), input.clone()));

        if self.error_on.as_deref() == Some(step.name.as_str()) {
            return Err(PushflowError::ToolExecutionFailed {
                tool: "fake".into(),
                error: "spawn failed".into(),
                help: None,
            });
        }
        if self.fail_on.as_deref() == Some(step.name.as_str()) {
            return Ok(ExecutionResult::failure("denied\n".into(), 1, Duration::ZERO));
        }

        let published = input.tags.as_ref().map(|t| t.to_strings()).unwrap_or_default();
        Ok(ExecutionResult::success(String::new(), Duration::ZERO).with_published(published))
    }

    async fn check_available(&self) -> Result<bool, PushflowError> {
        Ok(true)
    }

    async fn version(&self) -> Result<String, PushflowError> {
        Ok("fake 1.0".into())
    }

    fn validate_step(&self, _step: &Step) -> Result<(), PushflowError> {
        Ok(())
    }
}

/// A sequencer whose git and docker steps are both fakes sharing one call log
pub(crate) fn fake_sequencer(fail_on: Option<&str>, error_on: Option<&str>) -> (StepSequencer, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let mut sequencer = StepSequencer::new();
    for tool in ["git", "docker"] {
        sequencer.register_executor(
            tool,
            Box::new(FakeExecutor {
                calls: Arc::clone(&calls),
                fail_on: fail_on.map(String::from),
                error_on: error_on.map(String::from),
            }),
        );
    }
    (sequencer, calls)
}

pub(crate) fn called(calls: &Calls) -> Vec<String> {
    calls.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
}

pub(crate) fn git_binary() -> PathBuf {
    which::which("git").expect("git must be installed to run these tests")
}

/// Run git in `dir`, returning trimmed stdout
pub(crate) fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new(git_binary())
        .args([
            "-c",
            "user.name=pushflow",
            "-c",
            "user.email=ci@pushflow.test",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// New repository at `dir` whose current branch is `main`
pub(crate) fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
}

/// Write `content` to `file`, commit it and return the new commit
pub(crate) fn commit(dir: &Path, file: &str, content: &str) -> String {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "--quiet", "-m", &format!("update {}", file)]);
    git(dir, &["rev-parse", "HEAD"])
}

/// Context for a run of `commit` on `branch` checking out into `workspace`
pub(crate) fn run_context(commit: &str, branch: &str, workspace: PathBuf) -> RunContext {
    RunContext::new(
        "test-run",
        commit,
        branch,
        "langflow",
        Credentials {
            host: "reg.io".into(),
            username: "ci".into(),
            password: Secret::new("hunter2"),
        },
        workspace,
    )
}
