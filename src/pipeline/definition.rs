// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .pushflow.yaml / .pushflow.toml files. Every field
//! has a default, and the defaults reproduce the Langflow publishing
//! pipeline, so an empty file (or no file at all) is a working pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::PushflowError;

/// File names searched when no pipeline path is given
pub const DEFAULT_PIPELINE_FILES: &[&str] = &[".pushflow.yaml", ".pushflow.yml", ".pushflow.toml"];

/// Pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    #[serde(default = "default_name")]
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Which pushes start a run
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Base name shared by all published images
    #[serde(default = "default_image_name")]
    pub image_name: String,

    /// Secret references for the registry
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Source checkout settings
    #[serde(default)]
    pub checkout: CheckoutConfig,

    /// Images to build, in declaration order
    #[serde(default = "default_images")]
    pub images: Vec<ImageSpec>,

    /// Where finished runs are recorded
    #[serde(default)]
    pub archive: ArchiveConfig,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_name() -> String {
    "langflow-images".to_string()
}

fn default_image_name() -> String {
    "langflow".to_string()
}

fn default_images() -> Vec<ImageSpec> {
    vec![
        ImageSpec::new("base", "-base", "docker/build_and_push_base.Dockerfile"),
        ImageSpec::new("backend", "-backend", "docker/build_and_push_backend.Dockerfile")
            .with_base("base"),
        ImageSpec::new(
            "frontend",
            "-frontend",
            "docker/frontend/build_and_push_frontend.Dockerfile",
        )
        .with_base("base"),
    ]
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            description: Some("Build and push the Langflow base, backend and frontend images".into()),
            trigger: TriggerConfig::default(),
            image_name: default_image_name(),
            registry: RegistryConfig::default(),
            checkout: CheckoutConfig::default(),
            images: default_images(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl Pipeline {
    /// Load pipeline from a YAML or TOML file (chosen by extension)
    pub fn from_file(path: &Path) -> Result<Self, PushflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| PushflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Locate and load the pipeline for a directory
    ///
    /// An explicit path must exist. Without one, the default file names are
    /// tried in order and the built-in pipeline is used when none exists.
    pub fn discover(
        explicit: Option<&Path>,
        dir: &Path,
    ) -> Result<(Self, Option<PathBuf>), PushflowError> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                dir.join(path)
            };
            if !path.exists() {
                return Err(PushflowError::PipelineNotFound { path });
            }
            return Ok((Self::from_file(&path)?, Some(path)));
        }

        for name in DEFAULT_PIPELINE_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Ok((Self::from_file(&path)?, Some(path)));
            }
        }

        tracing::debug!("No pipeline file in {}, using built-in pipeline", dir.display());
        Ok((Self::default(), None))
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, PushflowError> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse pipeline from TOML string
    pub fn from_toml(content: &str) -> Result<Self, PushflowError> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> Result<String, PushflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get an image by name
    pub fn get_image(&self, name: &str) -> Option<&ImageSpec> {
        self.images.iter().find(|i| i.name == name)
    }

    /// Expand the pipeline into its steps, in declaration order
    ///
    /// Checkout and login always come first; every image step depends on
    /// the login and, when it declares a base, on the base image's step.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = vec![
            Step {
                name: CHECKOUT_STEP.to_string(),
                action: StepAction::Checkout,
                depends_on: vec![],
            },
            Step {
                name: LOGIN_STEP.to_string(),
                action: StepAction::Login,
                depends_on: vec![CHECKOUT_STEP.to_string()],
            },
        ];

        for image in &self.images {
            let mut depends_on = vec![LOGIN_STEP.to_string()];
            if let Some(ref base) = image.base {
                depends_on.push(build_step_name(base));
            }
            steps.push(Step {
                name: build_step_name(&image.name),
                action: StepAction::BuildPush(image.clone()),
                depends_on,
            });
        }

        steps
    }
}

/// Name of the checkout step
pub const CHECKOUT_STEP: &str = "checkout";

/// Name of the registry login step
pub const LOGIN_STEP: &str = "login";

/// Name of the build step for an image
pub fn build_step_name(image: &str) -> String {
    format!("build-{}", image)
}

/// Trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Only pushes to this branch start a run
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
        }
    }
}

/// Names of the secrets holding registry access
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Secret holding the registry host (login server)
    #[serde(default = "default_host_secret")]
    pub host_secret: String,

    /// Secret holding the registry username
    #[serde(default = "default_username_secret")]
    pub username_secret: String,

    /// Secret holding the registry password
    #[serde(default = "default_password_secret")]
    pub password_secret: String,
}

fn default_host_secret() -> String {
    "REGISTRY".to_string()
}

fn default_username_secret() -> String {
    "REGISTRY_USERNAME".to_string()
}

fn default_password_secret() -> String {
    "REGISTRY_PASSWORD".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host_secret: default_host_secret(),
            username_secret: default_username_secret(),
            password_secret: default_password_secret(),
        }
    }
}

impl RegistryConfig {
    /// The three references in binding order
    pub fn references(&self) -> [&str; 3] {
        [&self.host_secret, &self.username_secret, &self.password_secret]
    }
}

/// Source checkout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Working tree to check the commit out into
    #[serde(default = "default_checkout_path")]
    pub path: PathBuf,

    /// Remote to clone from and fetch the commit from
    #[serde(default)]
    pub repository: Option<String>,
}

fn default_checkout_path() -> PathBuf {
    PathBuf::from(".")
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            path: default_checkout_path(),
            repository: None,
        }
    }
}

/// One image to build and push
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSpec {
    /// Image name (must be unique within pipeline)
    pub name: String,

    /// Suffix appended to the image base name
    pub suffix: String,

    /// Build definition, relative to the workspace
    pub dockerfile: PathBuf,

    /// Build context, relative to the workspace
    #[serde(default = "default_context")]
    pub context: PathBuf,

    /// Image whose commit tag is injected as a build argument
    #[serde(default)]
    pub base: Option<String>,

    /// Build argument receiving the base tag
    #[serde(default = "default_base_arg")]
    pub base_arg: String,

    /// Push after building
    #[serde(default = "default_true")]
    pub push: bool,

    /// Extra static build arguments
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_base_arg() -> String {
    "LANGFLOW_IMAGE".to_string()
}

fn default_true() -> bool {
    true
}

impl ImageSpec {
    /// Create an image with default context and push enabled
    pub fn new(name: &str, suffix: &str, dockerfile: &str) -> Self {
        Self {
            name: name.to_string(),
            suffix: suffix.to_string(),
            dockerfile: PathBuf::from(dockerfile),
            context: default_context(),
            base: None,
            base_arg: default_base_arg(),
            push: true,
            build_args: BTreeMap::new(),
        }
    }

    /// Declare the image this one is built on
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }
}

/// Run archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Record finished runs
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Archive directory
    #[serde(default = "default_archive_dir")]
    pub directory: PathBuf,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from(".pushflow/runs")
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_archive_dir(),
        }
    }
}

/// A single pipeline step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Step name (unique within pipeline)
    pub name: String,
    /// What the step does
    pub action: StepAction,
    /// Steps that must succeed first
    pub depends_on: Vec<String>,
}

impl Step {
    /// Get the tool name for this step
    pub fn tool_name(&self) -> &str {
        match &self.action {
            StepAction::Checkout => "git",
            StepAction::Login | StepAction::BuildPush(_) => "docker",
        }
    }

    /// The image built by this step, if any
    pub fn image(&self) -> Option<&ImageSpec> {
        match &self.action {
            StepAction::BuildPush(image) => Some(image),
            _ => None,
        }
    }
}

/// Step kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Fetch the source tree at the triggering commit
    Checkout,
    /// Authenticate to the registry
    Login,
    /// Build an image and push both of its tags
    BuildPush(ImageSpec),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_langflow_pipeline() {
        let pipeline = Pipeline::from_yaml("").unwrap();
        assert_eq!(pipeline.trigger.branch, "main");
        assert_eq!(pipeline.image_name, "langflow");
        let names: Vec<_> = pipeline.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["base", "backend", "frontend"]);
        assert_eq!(pipeline.get_image("backend").unwrap().base.as_deref(), Some("base"));
        assert_eq!(pipeline.get_image("frontend").unwrap().base_arg, "LANGFLOW_IMAGE");
    }

    #[test]
    fn test_parse_custom_pipeline() {
        let yaml = r#"
name: "custom"
trigger:
  branch: release
image_name: myapp
registry:
  host_secret: ACR_LOGIN_SERVER
checkout:
  repository: https://example.com/org/myapp.git
images:
  - name: core
    suffix: "-core"
    dockerfile: Dockerfile.core
  - name: web
    suffix: "-web"
    dockerfile: web/Dockerfile
    context: web
    base: core
    base_arg: CORE_IMAGE
    build_args:
      NODE_ENV: production
"#;

        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.trigger.branch, "release");
        assert_eq!(pipeline.registry.host_secret, "ACR_LOGIN_SERVER");
        assert_eq!(pipeline.registry.username_secret, "REGISTRY_USERNAME");
        assert_eq!(pipeline.images.len(), 2);
        let web = pipeline.get_image("web").unwrap();
        assert_eq!(web.context, PathBuf::from("web"));
        assert_eq!(web.base_arg, "CORE_IMAGE");
        assert!(web.push);
        assert_eq!(web.build_args["NODE_ENV"], "production");
    }

    #[test]
    fn test_parse_toml_pipeline() {
        let content = r#"
image_name = "langflow"

[trigger]
branch = "main"

[[images]]
name = "base"
suffix = "-base"
dockerfile = "base.Dockerfile"
push = false
"#;

        let pipeline = Pipeline::from_toml(content).unwrap();
        assert_eq!(pipeline.images.len(), 1);
        assert!(!pipeline.images[0].push);
    }

    #[test]
    fn test_steps_expand_in_order() {
        let steps = Pipeline::default().steps();
        let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["checkout", "login", "build-base", "build-backend", "build-frontend"]
        );
        assert_eq!(steps[0].tool_name(), "git");
        assert_eq!(steps[3].tool_name(), "docker");
        assert_eq!(steps[3].depends_on, vec!["login", "build-base"]);
        assert_eq!(steps[2].depends_on, vec!["login"]);
    }

    #[test]
    fn test_discover_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, path) = Pipeline::discover(None, dir.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(pipeline.images.len(), 3);
    }

    #[test]
    fn test_discover_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Pipeline::discover(Some(Path::new("nope.yaml")), dir.path());
        assert!(matches!(result, Err(PushflowError::PipelineNotFound { .. })));
    }

    #[test]
    fn test_discover_finds_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".pushflow.yaml"), "image_name: other\n").unwrap();
        let (pipeline, path) = Pipeline::discover(None, dir.path()).unwrap();
        assert_eq!(pipeline.image_name, "other");
        assert_eq!(path.unwrap(), dir.path().join(".pushflow.yaml"));
    }

    #[test]
    fn test_yaml_round_trip_keeps_images() {
        let yaml = Pipeline::default().to_yaml().unwrap();
        let parsed = Pipeline::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.images, Pipeline::default().images);
    }
}
