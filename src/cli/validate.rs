// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{Pipeline, PipelineValidator, StepGraph};

/// Run the validate command
pub async fn run(pipeline_path: Option<PathBuf>, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let (pipeline, source) = match Pipeline::discover(pipeline_path.as_deref(), &cwd) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("  {} Failed to load pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    match source {
        Some(ref path) => println!("  {} Parsed {}", "✓".green(), path.display()),
        None => println!(
            "  {} No pipeline file found, checking the built-in pipeline",
            "→".cyan()
        ),
    }

    let validation = PipelineValidator::validate(&pipeline)?;

    // Dockerfiles only exist up front when building from the local tree
    let missing_files = if pipeline.checkout.repository.is_none() {
        PipelineValidator::validate_files(&pipeline, &cwd)
    } else {
        vec![]
    };

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !missing_files.is_empty() {
        println!();
        println!("{}:", "Missing files".yellow().bold());
        for missing in &missing_files {
            println!("  {} {}", "⚠".yellow(), missing);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose && validation.is_valid() {
        let steps = pipeline.steps();
        let dag = StepGraph::build(&steps)?;

        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Trigger: push to '{}'", pipeline.trigger.branch);
        println!(
            "  Secrets: {}",
            pipeline.registry.references().join(", ")
        );
        println!("  Steps:");
        for line in dag.to_text(&steps)?.lines() {
            println!("    {}", line.dimmed());
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() || !missing_files.is_empty() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(())
}
