// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! pushflow - push-triggered image pipeline
//!
//! Builds and pushes the Langflow container images for pushes to main.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pushflow::cli::run::RunArgs;
use pushflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pushflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init { force } => pushflow::cli::init::run(force, cli.verbose).await,
        Commands::Run {
            pipeline,
            branch,
            commit,
            event,
            secrets_file,
            image_name,
            dry_run,
            no_archive,
        } => {
            let args = RunArgs {
                pipeline,
                branch,
                commit,
                event,
                secrets_file,
                image_name,
                dry_run,
                no_archive,
            };
            pushflow::cli::run::run(args, cli.verbose).await
        }
        Commands::Watch {
            pipeline,
            repo,
            secrets_file,
            debounce,
        } => pushflow::cli::watch::run(pipeline, repo, secrets_file, debounce, cli.verbose).await,
        Commands::Validate { pipeline } => {
            pushflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            pushflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Tags {
            commit,
            registry,
            image_name,
            pipeline,
        } => pushflow::cli::tags::run(commit, registry, image_name, pipeline, cli.verbose).await,
        Commands::Runs { action } => pushflow::cli::runs::run(action, cli.verbose).await,
    }
}
