// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Tags command - show the tags a commit is published under

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_pipeline;
use crate::pipeline::format_tags;
use crate::trigger::normalize_commit;

/// Run the tags command
pub async fn run(
    commit: String,
    registry: String,
    image_name: Option<String>,
    pipeline_path: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let (pipeline, _) = load_pipeline(pipeline_path.as_deref())?;
    let commit = normalize_commit(&commit)?;
    let image_name = image_name.unwrap_or_else(|| pipeline.image_name.clone());

    for image in &pipeline.images {
        let tags = format_tags(&registry, &image_name, &image.suffix, &commit);

        if verbose {
            println!("{}:", image.name.bold());
            for tag in tags.to_strings() {
                println!("  {}", tag);
            }
        } else {
            for tag in tags.to_strings() {
                println!("{}", tag);
            }
        }
    }

    Ok(())
}
