// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Tool executors
//!
//! This module provides the executor trait and implementations for the
//! external tools a run drives: git for checkout, docker for registry
//! login and image build/push.

mod docker;
mod git;
mod process;
#[cfg(test)]
pub(crate) mod testing;

pub use docker::DockerExecutor;
pub use git::GitExecutor;
pub use process::{ProcessOutput, ToolCommand};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::errors::PushflowError;
use crate::pipeline::tags::TagPair;
use crate::pipeline::{Pipeline, RunContext, Step};

/// Result of step execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code of the last command run
    pub exit_code: i32,

    /// Tags pushed by the step
    pub published: Vec<String>,

    /// Execution duration
    pub duration: Duration,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(stdout: String, duration: Duration) -> Self {
        Self {
            success: true,
            stdout,
            stderr: String::new(),
            exit_code: 0,
            published: vec![],
            duration,
        }
    }

    /// Create a failed result
    pub fn failure(stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code,
            published: vec![],
            duration,
        }
    }

    /// Attach the tags pushed by the step
    pub fn with_published(mut self, tags: Vec<String>) -> Self {
        self.published = tags;
        self
    }
}

/// Values computed by the sequencer for one step
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    /// Tags for the image built by the step
    pub tags: Option<TagPair>,
    /// Build arguments, including the injected base tag
    pub build_args: BTreeMap<String, String>,
}

/// Trait for tool executors
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a step
    ///
    /// # Arguments
    /// * `step` - The step to run
    /// * `ctx` - The immutable run context
    /// * `input` - Tags and build arguments prepared by the sequencer
    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        input: &StepInput,
    ) -> Result<ExecutionResult, PushflowError>;

    /// Check if tool is available
    async fn check_available(&self) -> Result<bool, PushflowError>;

    /// Get tool version
    async fn version(&self) -> Result<String, PushflowError>;

    /// Validate step configuration
    fn validate_step(&self, step: &Step) -> Result<(), PushflowError>;
}

/// Run commands in order, stopping at the first failure
pub(crate) async fn run_sequence(
    tool: &str,
    commands: &[ToolCommand],
) -> Result<ExecutionResult, PushflowError> {
    let start = Instant::now();
    let mut stdout = String::new();
    let mut stderr = String::new();

    for command in commands {
        tracing::debug!("{}: {}", tool, command.display());
        let output = command.run().await.map_err(|e| PushflowError::ToolExecutionFailed {
            tool: tool.to_string(),
            error: e.to_string(),
            help: Some(format!("'{}' could not be started", command.program.display())),
        })?;

        stdout.push_str(&output.stdout);
        stderr.push_str(&output.stderr);

        if !output.success() {
            return Ok(ExecutionResult {
                success: false,
                stdout,
                stderr,
                exit_code: output.exit_code,
                published: vec![],
                duration: start.elapsed(),
            });
        }
    }

    Ok(ExecutionResult {
        success: true,
        stdout,
        stderr,
        exit_code: 0,
        published: vec![],
        duration: start.elapsed(),
    })
}

/// Create a standard executor setup with all built-in executors
pub fn create_default_executors(pipeline: &Pipeline) -> HashMap<String, Box<dyn Executor>> {
    let mut executors: HashMap<String, Box<dyn Executor>> = HashMap::new();

    // Missing tools are reported by the sequencer's preflight check
    match GitExecutor::new(pipeline.checkout.repository.clone()) {
        Ok(git) => {
            executors.insert("git".to_string(), Box::new(git));
        }
        Err(e) => tracing::debug!("git executor unavailable: {}", e),
    }

    match DockerExecutor::new() {
        Ok(docker) => {
            executors.insert("docker".to_string(), Box::new(docker));
        }
        Err(e) => tracing::debug!("docker executor unavailable: {}", e),
    }

    executors
}

/// First line of a `--version` style output
pub(crate) fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or("unknown").trim().to_string()
}
