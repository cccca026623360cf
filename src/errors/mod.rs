// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Error types with actionable messages
//!
//! Every failure a run can hit maps onto one of three categories:
//! configuration problems found before any step runs, failures of the
//! external tools the steps drive, and internal errors.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pushflow operations
pub type PushflowResult<T> = Result<T, PushflowError>;

/// Broad classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing secrets, invalid pipeline or event; raised before any step
    Configuration,
    /// A checkout, login, build or push tool failed or is missing
    ExternalTool,
    /// I/O, archive and state machine errors
    Internal,
}

/// Main error type for pushflow
#[derive(Error, Debug, Diagnostic)]
pub enum PushflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(pushflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Tool '{tool}' execution failed: {error}")]
    #[diagnostic(code(pushflow::tool_execution_failed))]
    ToolExecutionFailed {
        tool: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Executor not found for tool: {tool}")]
    #[diagnostic(
        code(pushflow::executor_not_found),
        help("Available executors: git, docker")
    )]
    ExecutorNotFound { tool: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(pushflow::pipeline_not_found),
        help("Create a pipeline with 'pushflow init' or omit --pipeline to use the built-in defaults")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(pushflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' is invalid: {reason}")]
    #[diagnostic(code(pushflow::invalid_step))]
    InvalidStep { step: String, reason: String },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(pushflow::circular_dependency),
        help("Review the image dependencies to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(pushflow::unknown_dependency),
        help("Check that '{dependency}' is defined in your pipeline")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Missing required secrets: {}", names.join(", "))]
    #[diagnostic(
        code(pushflow::missing_secrets),
        help("Export the listed variables or pass --secrets-file with a dotenv file defining them")
    )]
    MissingSecrets { names: Vec<String> },

    #[error("Invalid push event: {reason}")]
    #[diagnostic(code(pushflow::invalid_event))]
    InvalidEvent { reason: String },

    #[error("Invalid commit identifier '{commit}'")]
    #[diagnostic(
        code(pushflow::invalid_commit),
        help("Commit identifiers are 4 to 40 hexadecimal characters")
    )]
    InvalidCommit { commit: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' failed with exit code {exit_code}")]
    #[diagnostic(code(pushflow::step_failed))]
    StepFailed {
        step: String,
        exit_code: i32,
        stderr: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' needs the tag of '{dependency}', which this run has not built")]
    #[diagnostic(code(pushflow::missing_base_tag))]
    MissingBaseTag { step: String, dependency: String },

    #[error("Illegal transition from {from} on step '{step}'")]
    #[diagnostic(code(pushflow::invalid_transition))]
    InvalidTransition { from: String, step: String },

    #[error("Run {run_id} failed at step '{step}'")]
    #[diagnostic(code(pushflow::run_failed))]
    RunFailed {
        run_id: String,
        step: String,
        #[help]
        help: Option<String>,
    },

    #[error("Run cancelled before step '{step}'")]
    #[diagnostic(code(pushflow::cancelled))]
    Cancelled { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File / Archive Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pushflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(pushflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Archive error: {message}")]
    #[diagnostic(code(pushflow::archive_error))]
    ArchiveError { message: String },

    #[error("Run '{run_id}' not found in archive")]
    #[diagnostic(code(pushflow::run_not_found), help("List archived runs with 'pushflow runs list'"))]
    RunNotFound { run_id: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(pushflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pushflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(pushflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pushflow::toml_error))]
    Toml { message: String },

    #[error("Secrets file error: {message}")]
    #[diagnostic(code(pushflow::secrets_file_error))]
    SecretsFile { message: String },
}

impl From<std::io::Error> for PushflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PushflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PushflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PushflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<dotenvy::Error> for PushflowError {
    fn from(e: dotenvy::Error) -> Self {
        Self::SecretsFile { message: e.to_string() }
    }
}

impl PushflowError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "docker" => "Install Docker: https://docs.docker.com/get-docker/".to_string(),
            "git" => "Install git: https://git-scm.com/downloads".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Create a step failed error with help derived from the tool output
    pub fn step_failed_with_help(step: &str, exit_code: i32, stderr: String, tool: &str) -> Self {
        let help = Self::generate_help_for_tool_error(tool, &stderr);
        Self::StepFailed {
            step: step.to_string(),
            exit_code,
            stderr,
            help,
        }
    }

    /// Which part of the error taxonomy this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PipelineNotFound { .. }
            | Self::InvalidPipeline { .. }
            | Self::InvalidStep { .. }
            | Self::CircularDependency { .. }
            | Self::UnknownDependency { .. }
            | Self::MissingSecrets { .. }
            | Self::InvalidEvent { .. }
            | Self::InvalidCommit { .. }
            | Self::Yaml { .. }
            | Self::Toml { .. }
            | Self::SecretsFile { .. } => ErrorCategory::Configuration,

            Self::ToolNotFound { .. }
            | Self::ToolExecutionFailed { .. }
            | Self::ExecutorNotFound { .. }
            | Self::StepFailed { .. }
            | Self::RunFailed { .. } => ErrorCategory::ExternalTool,

            Self::MissingBaseTag { .. }
            | Self::InvalidTransition { .. }
            | Self::Cancelled { .. }
            | Self::FileReadError { .. }
            | Self::FileWriteError { .. }
            | Self::ArchiveError { .. }
            | Self::RunNotFound { .. }
            | Self::Io { .. }
            | Self::Json { .. } => ErrorCategory::Internal,
        }
    }

    /// Generate helpful suggestions based on tool output
    fn generate_help_for_tool_error(tool: &str, stderr: &str) -> Option<String> {
        match tool {
            "docker" => Self::parse_docker_error(stderr),
            "git" => Self::parse_git_error(stderr),
            _ => None,
        }
    }

    fn parse_docker_error(stderr: &str) -> Option<String> {
        if stderr.contains("unauthorized") || stderr.contains("authentication required") {
            Some("The registry rejected the credentials. Check REGISTRY_USERNAME and REGISTRY_PASSWORD.".into())
        } else if stderr.contains("Cannot connect to the Docker daemon") {
            Some("The Docker daemon is not running or not reachable from this user.".into())
        } else if stderr.contains("failed to read dockerfile") || stderr.contains("no such file or directory") {
            Some("A Dockerfile or build context path is wrong. Check the image entries in your pipeline.".into())
        } else if stderr.contains("denied") {
            Some("Push was denied. The account may lack write access to this repository.".into())
        } else {
            None
        }
    }

    fn parse_git_error(stderr: &str) -> Option<String> {
        if stderr.contains("not a git repository") {
            Some("The workspace is not a repository. Set checkout.repository to clone it first.".into())
        } else if stderr.contains("reference is not a tree") || stderr.contains("did not match any") {
            Some("The commit is not present locally. Set checkout.repository so it can be fetched.".into())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secrets_is_configuration() {
        let err = PushflowError::MissingSecrets {
            names: vec!["REGISTRY".into(), "REGISTRY_PASSWORD".into()],
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(
            err.to_string(),
            "Missing required secrets: REGISTRY, REGISTRY_PASSWORD"
        );
    }

    #[test]
    fn test_step_failed_is_external_tool() {
        let err = PushflowError::step_failed_with_help(
            "login",
            1,
            "Error response from daemon: unauthorized: authentication required".into(),
            "docker",
        );
        assert_eq!(err.category(), ErrorCategory::ExternalTool);
        match err {
            PushflowError::StepFailed { help, .. } => {
                assert!(help.unwrap().contains("credentials"));
            }
            _ => panic!("Expected StepFailed"),
        }
    }

    #[test]
    fn test_tool_not_found_suggestion() {
        match PushflowError::tool_not_found("docker") {
            PushflowError::ToolNotFound { suggestion, .. } => {
                assert!(suggestion.contains("docs.docker.com"));
            }
            _ => panic!("Expected ToolNotFound"),
        }
    }
}
