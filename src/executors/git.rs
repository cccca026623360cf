// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Git executor
//!
//! Checks out the triggering commit into the run's workspace, cloning and
//! fetching first when a remote repository is configured. The pushed branch
//! is fetched rather than the commit itself, so abbreviated commits resolve
//! locally once the branch history is present.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{first_line, run_sequence, ExecutionResult, Executor, StepInput, ToolCommand};
use crate::errors::PushflowError;
use crate::pipeline::{RunContext, Step, StepAction};

/// Git executor
pub struct GitExecutor {
    /// Path to git binary
    git_bin: PathBuf,
    /// Remote to clone/fetch from
    repository: Option<String>,
}

impl GitExecutor {
    /// Create a new git executor
    pub fn new(repository: Option<String>) -> Result<Self, PushflowError> {
        let git_bin = which::which("git").map_err(|_| PushflowError::tool_not_found("git"))?;
        Ok(Self::with_binary(git_bin, repository))
    }

    /// Use a specific git binary
    pub fn with_binary(git_bin: PathBuf, repository: Option<String>) -> Self {
        Self {
            git_bin,
            repository,
        }
    }

    /// Commands that bring `workspace` to `commit` of `branch`
    pub fn checkout_commands(
        &self,
        workspace: &Path,
        branch: &str,
        commit: &str,
        needs_clone: bool,
    ) -> Vec<ToolCommand> {
        let git = || ToolCommand::new(&self.git_bin, workspace);
        let mut commands = Vec::new();

        if let Some(ref repository) = self.repository {
            if needs_clone {
                commands.push(
                    git()
                        .arg("clone")
                        .arg("--quiet")
                        .arg("--no-checkout")
                        .arg(repository.as_str())
                        .arg("."),
                );
            }
            commands.push(
                git()
                    .arg("fetch")
                    .arg("--quiet")
                    .arg("origin")
                    .arg(branch),
            );
        }

        commands.push(
            git()
                .arg("checkout")
                .arg("--quiet")
                .arg("--force")
                .arg(commit),
        );

        commands
    }
}

#[async_trait]
impl Executor for GitExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        _input: &StepInput,
    ) -> Result<ExecutionResult, PushflowError> {
        self.validate_step(step)?;

        let workspace = ctx.workspace();
        let needs_clone = self.repository.is_some() && !workspace.join(".git").exists();

        if needs_clone {
            tokio::fs::create_dir_all(workspace).await.map_err(|e| {
                PushflowError::FileWriteError {
                    path: workspace.to_path_buf(),
                    error: e.to_string(),
                }
            })?;
        }

        let commands = self.checkout_commands(workspace, ctx.branch(), ctx.commit(), needs_clone);
        run_sequence("git", &commands).await
    }

    async fn check_available(&self) -> Result<bool, PushflowError> {
        Ok(self.git_bin.exists())
    }

    async fn version(&self) -> Result<String, PushflowError> {
        let output = ToolCommand::new(&self.git_bin, ".")
            .arg("--version")
            .run()
            .await
            .map_err(|e| PushflowError::ToolExecutionFailed {
                tool: "git".to_string(),
                error: e.to_string(),
                help: None,
            })?;

        Ok(first_line(&output.stdout))
    }

    fn validate_step(&self, step: &Step) -> Result<(), PushflowError> {
        match step.action {
            StepAction::Checkout => Ok(()),
            _ => Err(PushflowError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a checkout step".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::testing::{commit, git, git_binary, init_repo, run_context};
    use crate::pipeline::Pipeline;

    fn args(commands: &[ToolCommand]) -> Vec<String> {
        commands.iter().map(|c| c.args.join(" ")).collect()
    }

    #[test]
    fn test_local_checkout_only() {
        let git = GitExecutor::with_binary("git".into(), None);
        let commands = git.checkout_commands(Path::new("/src"), "main", "abc123", true);
        assert_eq!(args(&commands), vec!["checkout --quiet --force abc123"]);
        assert_eq!(commands[0].cwd, PathBuf::from("/src"));
    }

    #[test]
    fn test_clone_then_fetch_then_checkout() {
        let git = GitExecutor::with_binary(
            "git".into(),
            Some("https://example.com/langflow.git".into()),
        );
        let commands = git.checkout_commands(Path::new("/ws"), "main", "abc123", true);
        assert_eq!(
            args(&commands),
            vec![
                "clone --quiet --no-checkout https://example.com/langflow.git .",
                "fetch --quiet origin main",
                "checkout --quiet --force abc123",
            ]
        );
    }

    #[test]
    fn test_existing_clone_is_fetched() {
        let git = GitExecutor::with_binary("git".into(), Some("https://example.com/x.git".into()));
        let commands = git.checkout_commands(Path::new("/ws"), "main", "abc123", false);
        assert_eq!(commands.len(), 2);
        assert!(commands[0].args.starts_with(&["fetch".to_string()]));
    }

    #[test]
    fn test_rejects_docker_steps() {
        let git = GitExecutor::with_binary("git".into(), None);
        let steps = Pipeline::default().steps();
        assert!(git.validate_step(&steps[0]).is_ok());
        assert!(git.validate_step(&steps[1]).is_err());
    }

    #[tokio::test]
    async fn test_abbreviated_commit_from_remote() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let remote = dir.path().join("remote.git");
        init_repo(&source);
        let first = commit(&source, "f.txt", "v1\n");
        git(dir.path(), &["init", "--quiet", "--bare", "remote.git"]);
        git(&source, &["push", "--quiet", remote.to_str().unwrap(), "main"]);

        let executor = GitExecutor::with_binary(git_binary(), Some(remote.display().to_string()));
        let step = &Pipeline::default().steps()[0];
        let workspace = dir.path().join("ws");

        let ctx = run_context(&first[..7], "main", workspace.clone());
        let result = executor.execute(step, &ctx, &StepInput::default()).await.unwrap();
        assert!(result.success, "clone failed: {}", result.stderr);
        assert_eq!(git(&workspace, &["rev-parse", "HEAD"]), first);

        // Existing clone: only fetch and checkout run
        let second = commit(&source, "f.txt", "v2\n");
        git(&source, &["push", "--quiet", remote.to_str().unwrap(), "main"]);

        let ctx = run_context(&second[..7], "main", workspace.clone());
        let result = executor.execute(step, &ctx, &StepInput::default()).await.unwrap();
        assert!(result.success, "fetch failed: {}", result.stderr);
        assert_eq!(git(&workspace, &["rev-parse", "HEAD"]), second);
        assert_eq!(std::fs::read_to_string(workspace.join("f.txt")).unwrap(), "v2\n");
    }

    #[tokio::test]
    async fn test_unknown_commit_fails_step() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        init_repo(&source);
        commit(&source, "f.txt", "v1\n");

        let executor = GitExecutor::with_binary(git_binary(), Some(source.display().to_string()));
        let step = &Pipeline::default().steps()[0];
        let ctx = run_context("deadbeef", "main", dir.path().join("ws"));

        let result = executor.execute(step, &ctx, &StepInput::default()).await.unwrap();
        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
    }
}
