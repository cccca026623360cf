// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Init command - write the default pipeline file

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::pipeline::Pipeline;

const PIPELINE_FILE: &str = ".pushflow.yaml";

const HEADER: &str = "\
# pushflow pipeline
#
# Runs on every push to the trigger branch: checks out the commit, logs in
# to the registry, then builds and pushes each image tagged with the commit
# SHA and 'latest'. Images with a 'base' are built on the base image's
# commit tag, passed as the 'base_arg' build argument.
#
# Registry secrets are read from the environment (or --secrets-file) under
# the names given in 'registry'.

";

/// Run the init command
pub async fn run(force: bool, verbose: bool) -> Result<()> {
    println!("{}", "Initializing pushflow pipeline...".bold());
    println!();

    let path = Path::new(PIPELINE_FILE);
    if path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            PIPELINE_FILE
        ));
    }

    let pipeline = Pipeline::default();
    let content = render(&pipeline)?;

    std::fs::write(path, &content)
        .map_err(|e| miette::miette!("Failed to write {}: {}", PIPELINE_FILE, e))?;

    println!("  {} Created {}", "✓".green(), PIPELINE_FILE);
    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  1. Provide {} as environment variables or in a secrets file",
        pipeline.registry.references().join(", ").cyan()
    );
    println!("  2. Check the pipeline with {}", "pushflow validate".cyan());
    println!(
        "  3. Preview a run with {}",
        "pushflow run --branch main --commit <sha> --dry-run".cyan()
    );
    println!();

    if verbose {
        println!("{}", content.dimmed());
    }

    Ok(())
}

fn render(pipeline: &Pipeline) -> Result<String> {
    Ok(format!("{}{}", HEADER, pipeline.to_yaml()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_file_loads_back() {
        let content = render(&Pipeline::default()).unwrap();
        assert!(content.starts_with("# pushflow pipeline"));

        let parsed = Pipeline::from_yaml(&content).unwrap();
        assert_eq!(parsed.images, Pipeline::default().images);
        assert_eq!(parsed.trigger.branch, "main");
    }
}
