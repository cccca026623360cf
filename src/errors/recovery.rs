// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::PushflowError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &PushflowError) -> Option<Self> {
        match error {
            PushflowError::ToolNotFound { tool, .. } => Some(Self::install_tool(tool)),
            PushflowError::MissingSecrets { names } => Some(Self::provide_secrets(names)),
            PushflowError::CircularDependency { steps } => {
                Some(Self::fix_circular_dependency(steps))
            }
            PushflowError::PipelineNotFound { .. } => Some(Self::create_pipeline()),
            PushflowError::RunFailed { step, .. } if step == "login" => {
                Some(Self::check_registry_credentials())
            }
            _ => None,
        }
    }

    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        match tool {
            "docker" => Self {
                action: "Install Docker".into(),
                steps: vec![
                    "Docker is required to log in, build and push images".into(),
                    "Make sure the daemon is running and your user can reach it".into(),
                ],
                commands: vec![
                    "# Check the installation:".into(),
                    "docker version".into(),
                ],
            },
            "git" => Self {
                action: "Install git".into(),
                steps: vec!["git is required to check out the triggering commit".into()],
                commands: vec!["git --version".into()],
            },
            _ => Self {
                action: format!("Install {}", tool),
                steps: vec![format!("Install {} and ensure it's in your PATH", tool)],
                commands: vec![],
            },
        }
    }

    /// Suggest providing missing secrets
    pub fn provide_secrets(names: &[String]) -> Self {
        let mut commands = vec!["# Export them in the shell running pushflow:".to_string()];
        commands.extend(names.iter().map(|n| format!("export {}=...", n)));
        commands.push(String::new());
        commands.push("# Or keep them in a dotenv file:".into());
        commands.push("pushflow run --secrets-file .pushflow.env".into());

        Self {
            action: "Provide the registry secrets".into(),
            steps: vec![
                format!("Unresolved: {}", names.join(", ")),
                "No step was started, nothing was pushed".into(),
            ],
            commands,
        }
    }

    /// Suggest fixing a circular dependency
    pub fn fix_circular_dependency(steps: &[String]) -> Self {
        Self {
            action: "Remove circular dependency".into(),
            steps: vec![
                format!("Detected cycle: {}", steps.join(" → ")),
                "Each image may only depend on images built before it".into(),
            ],
            commands: vec![
                "# Visualize your pipeline:".into(),
                "pushflow graph --format mermaid".into(),
            ],
        }
    }

    /// Suggest creating a pipeline file
    pub fn create_pipeline() -> Self {
        Self {
            action: "Create a pipeline configuration".into(),
            steps: vec![
                "The requested pipeline file does not exist".into(),
                "Write the default Langflow pipeline and edit it".into(),
            ],
            commands: vec!["pushflow init".into()],
        }
    }

    /// Suggest checking the registry login
    pub fn check_registry_credentials() -> Self {
        Self {
            action: "Check the registry credentials".into(),
            steps: vec![
                "The registry refused the login".into(),
                "Verify the host, username and password secrets".into(),
            ],
            commands: vec![
                "# Try the login by hand:".into(),
                "echo \"$REGISTRY_PASSWORD\" | docker login \"$REGISTRY\" -u \"$REGISTRY_USERNAME\" --password-stdin".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
