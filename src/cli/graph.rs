// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Graph command - visualize pipeline steps as a graph

use miette::Result;
use std::path::PathBuf;

use super::{load_pipeline, GraphFormat};
use crate::pipeline::StepGraph;

/// Run the graph command
pub async fn run(pipeline_path: Option<PathBuf>, format: GraphFormat, _verbose: bool) -> Result<()> {
    let (pipeline, _) = load_pipeline(pipeline_path.as_deref())?;

    let steps = pipeline.steps();
    let dag = StepGraph::build(&steps)?;

    let output = match format {
        GraphFormat::Text => dag.to_text(&steps)?,
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid()?,
    };

    print!("{}", output);

    Ok(())
}
