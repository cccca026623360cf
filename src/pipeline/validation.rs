// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before execution.

use std::collections::HashSet;
use std::path::Path;

use crate::errors::PushflowError;
use crate::pipeline::dag::StepGraph;
use crate::pipeline::{ImageSpec, Pipeline, CHECKOUT_STEP, LOGIN_STEP};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> Result<ValidationResult, PushflowError> {
        let mut result = ValidationResult::new();

        if pipeline.images.is_empty() {
            result.add_error("Pipeline has no images defined");
        }

        if pipeline.trigger.branch.trim().is_empty() {
            result.add_error("Trigger branch is empty");
        }

        if pipeline.image_name.trim().is_empty() {
            result.add_error("Image name is empty");
        }

        for reference in pipeline.registry.references() {
            if reference.trim().is_empty() {
                result.add_error("Registry secret reference is empty");
            }
        }

        // Check for duplicate image names
        let mut seen_names = HashSet::new();
        let mut seen_suffixes = HashSet::new();
        for image in &pipeline.images {
            if !seen_names.insert(&image.name) {
                result.add_error(&format!("Duplicate image name: '{}'", image.name));
            }
            if !seen_suffixes.insert(&image.suffix) {
                result.add_error(&format!(
                    "Image '{}': suffix '{}' is already used",
                    image.name, image.suffix
                ));
            }
            if image.name == CHECKOUT_STEP || image.name == LOGIN_STEP {
                result.add_warning(&format!(
                    "Image '{}' shares its name with a built-in step",
                    image.name
                ));
            }
        }

        // Validate step graph (cycles and unknown bases)
        match StepGraph::build(&pipeline.steps()) {
            Ok(_) => {}
            Err(PushflowError::CircularDependency { steps }) => {
                result.add_error(&format!("Circular base images: {}", steps.join(" → ")));
            }
            Err(PushflowError::UnknownDependency { step, dependency }) => {
                result.add_error(&format!(
                    "Step '{}' depends on unknown step '{}'",
                    step, dependency
                ));
            }
            Err(e) => {
                result.add_error(&format!("Step graph error: {}", e));
            }
        }

        for image in &pipeline.images {
            Self::validate_image(image, pipeline, &mut result);
        }

        Ok(result)
    }

    /// Validate a single image
    fn validate_image(image: &ImageSpec, pipeline: &Pipeline, result: &mut ValidationResult) {
        if image.suffix.is_empty() {
            result.add_error(&format!("Image '{}': suffix is empty", image.name));
        } else if !image.suffix.starts_with('-') {
            result.add_warning(&format!(
                "Image '{}': suffix '{}' does not start with '-'",
                image.name, image.suffix
            ));
        }

        if image.dockerfile.as_os_str().is_empty() {
            result.add_error(&format!("Image '{}': dockerfile is empty", image.name));
        }

        let Some(ref base) = image.base else {
            return;
        };

        if base == &image.name {
            result.add_error(&format!("Image '{}' is its own base", image.name));
            return;
        }

        match pipeline.get_image(base) {
            None => result.add_error(&format!(
                "Image '{}': base references unknown image '{}'",
                image.name, base
            )),
            Some(base_image) if !base_image.push => result.add_warning(&format!(
                "Image '{}': base '{}' is not pushed, so its tag may not resolve during the build",
                image.name, base
            )),
            Some(_) => {}
        }

        if image.base_arg.trim().is_empty() {
            result.add_error(&format!("Image '{}': base_arg is empty", image.name));
        }
    }

    /// Check that build definitions exist in a checked-out tree
    pub fn validate_files(pipeline: &Pipeline, base_path: &Path) -> Vec<String> {
        let root = base_path.join(&pipeline.checkout.path);
        let mut missing = Vec::new();

        for image in &pipeline.images {
            if !root.join(&image.dockerfile).exists() {
                missing.push(format!(
                    "Image '{}': Dockerfile not found: {}",
                    image.name,
                    image.dockerfile.display()
                ));
            }
            if !root.join(&image.context).is_dir() {
                missing.push(format!(
                    "Image '{}': build context not found: {}",
                    image.name,
                    image.context.display()
                ));
            }
        }

        missing
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_pipeline_is_valid() {
        let result = PipelineValidator::validate(&Pipeline::default()).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_validate_empty_pipeline() {
        let pipeline = Pipeline {
            images: vec![],
            ..Pipeline::default()
        };

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no images"));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let pipeline = Pipeline {
            images: vec![
                ImageSpec::new("dup", "-a", "a.Dockerfile"),
                ImageSpec::new("dup", "-b", "b.Dockerfile"),
            ],
            ..Pipeline::default()
        };

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("Duplicate")));
    }

    #[test]
    fn test_validate_unknown_base() {
        let pipeline = Pipeline {
            images: vec![ImageSpec::new("web", "-web", "Dockerfile").with_base("missing")],
            ..Pipeline::default()
        };

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("unknown image 'missing'")));
    }

    #[test]
    fn test_validate_circular_bases() {
        let pipeline = Pipeline {
            images: vec![
                ImageSpec::new("a", "-a", "a.Dockerfile").with_base("b"),
                ImageSpec::new("b", "-b", "b.Dockerfile").with_base("a"),
            ],
            ..Pipeline::default()
        };

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("Circular")));
    }

    #[test]
    fn test_suffix_rules() {
        let pipeline = Pipeline {
            images: vec![
                ImageSpec::new("a", "", "a.Dockerfile"),
                ImageSpec::new("b", "b", "b.Dockerfile"),
            ],
            ..Pipeline::default()
        };

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("suffix is empty")));
        assert!(result.warnings.iter().any(|w| w.contains("does not start with '-'")));
    }

    #[test]
    fn test_unpushed_base_warns() {
        let mut base = ImageSpec::new("base", "-base", "base.Dockerfile");
        base.push = false;
        let pipeline = Pipeline {
            images: vec![base, ImageSpec::new("web", "-web", "web.Dockerfile").with_base("base")],
            ..Pipeline::default()
        };

        let result = PipelineValidator::validate(&pipeline).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("not pushed")));
    }

    #[test]
    fn test_validate_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("docker")).unwrap();
        std::fs::write(dir.path().join("docker/build_and_push_base.Dockerfile"), "FROM scratch").unwrap();

        let missing = PipelineValidator::validate_files(&Pipeline::default(), dir.path());
        assert_eq!(missing.len(), 2);
        assert!(missing.iter().all(|m| !m.contains("'base'")));
    }
}
