// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pushflow.

pub mod graph;
pub mod init;
pub mod run;
pub mod runs;
pub mod tags;
pub mod validate;
pub mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::credentials::{ChainSecretStore, EnvSecretStore, MapSecretStore};
use crate::errors::PushflowError;
use crate::pipeline::{Pipeline, PipelineValidator};

/// Push-triggered container image pipeline
///
/// Builds and publishes the Langflow base, backend and frontend images
/// when the main branch moves.
#[derive(Parser, Debug)]
#[clap(
    name = "pushflow",
    version,
    about = "Build and push container images when a branch is pushed",
    long_about = None,
    after_help = "Examples:\n\
        pushflow init                              Write the default pipeline file\n\
        pushflow run --branch main --commit abc123 Run for a push to main\n\
        pushflow run --event push.json             Run for a webhook payload\n\
        pushflow watch                             Run whenever main moves locally\n\n\
        See 'pushflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default pipeline file
    Init {
        /// Overwrite an existing .pushflow.yaml
        #[clap(short, long)]
        force: bool,
    },

    /// Run the pipeline for one push
    Run {
        /// Pipeline file (default: .pushflow.yaml, .pushflow.yml, .pushflow.toml)
        #[clap(short, long)]
        pipeline: Option<PathBuf>,

        /// Branch that was pushed
        #[clap(short, long, env = "GITHUB_REF_NAME")]
        branch: Option<String>,

        /// Commit that was pushed (falls back to GITHUB_SHA)
        #[clap(short, long, env = "VERSION")]
        commit: Option<String>,

        /// Push webhook payload (JSON); takes precedence over --branch/--commit
        #[clap(short, long, value_name = "FILE")]
        event: Option<PathBuf>,

        /// Dotenv file with registry secrets, consulted before the environment
        #[clap(long, value_name = "FILE")]
        secrets_file: Option<PathBuf>,

        /// Image base name
        #[clap(long, env = "IMAGE_NAME")]
        image_name: Option<String>,

        /// Show what would be done
        #[clap(long)]
        dry_run: bool,

        /// Do not record the run
        #[clap(long)]
        no_archive: bool,
    },

    /// Watch a local repository and run on pushes to the trigger branch
    Watch {
        /// Pipeline file
        #[clap(short, long)]
        pipeline: Option<PathBuf>,

        /// Repository to watch (default: current directory)
        #[clap(short, long)]
        repo: Option<PathBuf>,

        /// Dotenv file with registry secrets
        #[clap(long, value_name = "FILE")]
        secrets_file: Option<PathBuf>,

        /// Debounce delay in milliseconds
        #[clap(long, default_value = "500")]
        debounce: u64,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        pipeline: Option<PathBuf>,
    },

    /// Show pipeline steps as a graph
    Graph {
        /// Pipeline file
        pipeline: Option<PathBuf>,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: GraphFormat,
    },

    /// Print the tags a commit would be published under
    Tags {
        /// Commit SHA
        #[clap(short, long, env = "VERSION")]
        commit: String,

        /// Registry host
        #[clap(short, long, env = "REGISTRY")]
        registry: String,

        /// Image base name
        #[clap(long, env = "IMAGE_NAME")]
        image_name: Option<String>,

        /// Pipeline file
        #[clap(short, long)]
        pipeline: Option<PathBuf>,
    },

    /// Inspect recorded runs
    Runs {
        #[clap(subcommand)]
        action: RunsAction,
    },
}

/// Run archive actions
#[derive(Subcommand, Debug, Clone)]
pub enum RunsAction {
    /// List recorded runs, newest first
    List {
        /// Show at most this many runs
        #[clap(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Show one run
    Show {
        /// Run id or unique prefix
        id: String,
    },

    /// Show archive statistics
    Stats,

    /// Delete all recorded runs
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load the pipeline for the current directory
pub(crate) fn load_pipeline(explicit: Option<&Path>) -> Result<(Pipeline, PathBuf), PushflowError> {
    let cwd = std::env::current_dir()?;
    let (pipeline, source) = Pipeline::discover(explicit, &cwd)?;

    match source {
        Some(path) => tracing::debug!("Loaded pipeline from {}", path.display()),
        None => tracing::debug!("Using built-in pipeline"),
    }

    Ok((pipeline, cwd))
}

/// Refuse to go on with an invalid pipeline
pub(crate) fn ensure_valid(pipeline: &Pipeline, verbose: bool) -> miette::Result<()> {
    let validation = PipelineValidator::validate(pipeline)?;

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(PushflowError::InvalidPipeline {
            reason: format!(
                "{} error{}",
                validation.errors.len(),
                if validation.errors.len() == 1 { "" } else { "s" }
            ),
            help: Some("Run 'pushflow validate' to see every problem".to_string()),
        }
        .into());
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    Ok(())
}

/// Secrets file first, then the process environment
pub(crate) fn secret_store(secrets_file: Option<&Path>) -> Result<ChainSecretStore, PushflowError> {
    let mut store = ChainSecretStore::new();
    if let Some(path) = secrets_file {
        store = store.push(Box::new(MapSecretStore::from_dotenv_file(path)?));
    }
    Ok(store.push(Box::new(EnvSecretStore)))
}

/// Relative age for listings
pub(crate) fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
