// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Docker executor
//!
//! Logs in to the registry and builds/pushes images. Both tags of an image
//! come from a single `docker build`, so they name the same image.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{first_line, run_sequence, ExecutionResult, Executor, StepInput, ToolCommand};
use crate::errors::PushflowError;
use crate::pipeline::tags::TagPair;
use crate::pipeline::{ImageSpec, RunContext, Step, StepAction};

/// Docker executor
pub struct DockerExecutor {
    /// Path to docker binary
    docker_bin: PathBuf,
}

impl DockerExecutor {
    /// Create a new docker executor
    pub fn new() -> Result<Self, PushflowError> {
        let docker_bin =
            which::which("docker").map_err(|_| PushflowError::tool_not_found("docker"))?;
        Ok(Self::with_binary(docker_bin))
    }

    /// Use a specific docker binary
    pub fn with_binary(docker_bin: PathBuf) -> Self {
        Self { docker_bin }
    }

    /// `docker login` with the password on stdin
    pub fn login_command(&self, ctx: &RunContext) -> ToolCommand {
        let credentials = ctx.credentials();
        ToolCommand::new(&self.docker_bin, ctx.workspace())
            .arg("login")
            .arg(credentials.host.as_str())
            .arg("--username")
            .arg(credentials.username.as_str())
            .arg("--password-stdin")
            .stdin(credentials.password.clone())
    }

    /// `docker build` followed by one `docker push` per tag
    pub fn build_commands(
        &self,
        image: &ImageSpec,
        ctx: &RunContext,
        tags: &TagPair,
        input: &StepInput,
    ) -> Vec<ToolCommand> {
        let workspace = ctx.workspace();
        let mut build = ToolCommand::new(&self.docker_bin, workspace)
            .arg("build")
            .arg("--file")
            .arg(workspace.join(&image.dockerfile).to_string_lossy().to_string());

        for tag in tags.to_strings() {
            build = build.arg("--tag").arg(tag);
        }

        // Static arguments first, so the injected base tag wins on a clash
        let mut build_args = image.build_args.clone();
        build_args.extend(input.build_args.clone());
        for (key, value) in &build_args {
            build = build.arg("--build-arg").arg(format!("{}={}", key, value));
        }

        build = build.arg(workspace.join(&image.context).to_string_lossy().to_string());

        let mut commands = vec![build];
        if image.push {
            for tag in tags.to_strings() {
                commands.push(ToolCommand::new(&self.docker_bin, workspace).arg("push").arg(tag));
            }
        }

        commands
    }
}

#[async_trait]
impl Executor for DockerExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        input: &StepInput,
    ) -> Result<ExecutionResult, PushflowError> {
        self.validate_step(step)?;

        match &step.action {
            StepAction::Login => run_sequence("docker", &[self.login_command(ctx)]).await,
            StepAction::BuildPush(image) => {
                let tags = input.tags.clone().unwrap_or_else(|| ctx.tags_for(image));
                let commands = self.build_commands(image, ctx, &tags, input);
                let result = run_sequence("docker", &commands).await?;

                if result.success && image.push {
                    Ok(result.with_published(tags.to_strings()))
                } else {
                    Ok(result)
                }
            }
            StepAction::Checkout => Err(PushflowError::ExecutorNotFound {
                tool: step.tool_name().to_string(),
            }),
        }
    }

    async fn check_available(&self) -> Result<bool, PushflowError> {
        Ok(self.docker_bin.exists())
    }

    async fn version(&self) -> Result<String, PushflowError> {
        let output = ToolCommand::new(&self.docker_bin, ".")
            .arg("--version")
            .run()
            .await
            .map_err(|e| PushflowError::ToolExecutionFailed {
                tool: "docker".to_string(),
                error: e.to_string(),
                help: None,
            })?;

        Ok(first_line(&output.stdout))
    }

    fn validate_step(&self, step: &Step) -> Result<(), PushflowError> {
        match &step.action {
            StepAction::Login => Ok(()),
            StepAction::BuildPush(image) => {
                if image.suffix.is_empty() {
                    return Err(PushflowError::InvalidStep {
                        step: step.name.clone(),
                        reason: "Image suffix is empty".to_string(),
                    });
                }
                Ok(())
            }
            StepAction::Checkout => Err(PushflowError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a docker step".to_string(),
            }),
        }
    }
}
