// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Run command - execute the pipeline for one push

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use super::{ensure_valid, load_pipeline, secret_store};
use crate::archive::{FilesystemArchive, RunArchive};
use crate::credentials::SecretStore;
use crate::errors::{PushflowError, RecoverySuggestion};
use crate::executors::create_default_executors;
use crate::pipeline::{ExecutionOptions, Pipeline, PipelineRun, StepSequencer};
use crate::trigger::{PushEvent, TriggerListener};

/// Arguments of `pushflow run`
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub pipeline: Option<PathBuf>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub event: Option<PathBuf>,
    pub secrets_file: Option<PathBuf>,
    pub image_name: Option<String>,
    pub dry_run: bool,
    pub no_archive: bool,
}

/// Run the pipeline
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let (mut pipeline, working_dir) = load_pipeline(args.pipeline.as_deref())?;
    if let Some(image_name) = args.image_name {
        pipeline.image_name = image_name;
    }
    ensure_valid(&pipeline, verbose)?;

    let event = push_event(args.event.as_deref(), args.branch, args.commit)?;
    let listener = TriggerListener::for_pipeline(&pipeline);

    let Some(run) = listener.accept(&event)? else {
        println!(
            "{} Push to '{}' ignored (trigger branch is '{}')",
            "→".cyan(),
            event.git_ref,
            listener.branch()
        );
        return Ok(());
    };

    let secrets = secret_store(args.secrets_file.as_deref())?;

    if args.dry_run {
        return print_dry_run(&pipeline, &run, &secrets);
    }

    let archive = (pipeline.archive.enabled && !args.no_archive)
        .then(|| FilesystemArchive::from_config(&pipeline.archive, &working_dir));

    let run = execute_run(
        default_sequencer(&pipeline),
        &pipeline,
        run,
        &secrets,
        &working_dir,
        verbose,
        archive.as_ref().map(|a| a as &dyn RunArchive),
    )
    .await
    .map_err(report_error)?;

    if !run.succeeded() {
        return Err(report_error(run_failure(&run)));
    }

    let published = run.published_tags();
    if !published.is_empty() {
        println!();
        println!("{}:", "Published".bold());
        for tag in published {
            println!("  - {}", tag);
        }
    }

    Ok(())
}

/// Build the push event from a payload file or from branch and commit
fn push_event(
    event: Option<&Path>,
    branch: Option<String>,
    commit: Option<String>,
) -> Result<PushEvent, PushflowError> {
    if let Some(path) = event {
        return PushEvent::from_file(path);
    }

    let branch = branch.ok_or_else(|| PushflowError::InvalidEvent {
        reason: "no branch given; pass --branch or set GITHUB_REF_NAME".into(),
    })?;

    let commit = commit
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .ok_or_else(|| PushflowError::InvalidEvent {
            reason: "no commit given; pass --commit or set VERSION or GITHUB_SHA".into(),
        })?;

    Ok(PushEvent::new(&branch, &commit))
}

/// Sequencer with the git and docker executors found on PATH
pub(crate) fn default_sequencer(pipeline: &Pipeline) -> StepSequencer {
    let mut sequencer = StepSequencer::new();
    for (name, executor) in create_default_executors(pipeline) {
        sequencer.register_executor(&name, executor);
    }
    sequencer
}

/// Drive an accepted run to completion and record it
///
/// Ctrl-C stops the run before its next step. Preflight errors are
/// returned after the failed run has been recorded.
pub(crate) async fn execute_run(
    sequencer: StepSequencer,
    pipeline: &Pipeline,
    mut run: PipelineRun,
    secrets: &dyn SecretStore,
    working_dir: &Path,
    verbose: bool,
    archive: Option<&dyn RunArchive>,
) -> Result<PipelineRun, PushflowError> {
    let cancel = sequencer.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling after the current step...".yellow());
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let options = ExecutionOptions {
        working_dir: working_dir.to_path_buf(),
        verbose,
        quiet: false,
    };

    let result = sequencer.execute(pipeline, &mut run, secrets, &options).await;
    ctrl_c.abort();

    if let Some(archive) = archive {
        if run.is_terminal() {
            if let Err(e) = archive.store(&run).await {
                tracing::warn!("Failed to archive run {}: {}", run.id, e);
            }
        }
    }

    result.map(|_| run)
}

/// Error describing a failed run
pub(crate) fn run_failure(run: &PipelineRun) -> PushflowError {
    PushflowError::RunFailed {
        run_id: run.id.clone(),
        step: run.failed_step.clone().unwrap_or_default(),
        help: run.error.clone(),
    }
}

/// Print a recovery suggestion, then hand the error to miette
pub(crate) fn report_error(error: PushflowError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&error) {
        eprintln!();
        eprint!("{}", suggestion);
    }
    error.into()
}

fn print_dry_run(pipeline: &Pipeline, run: &PipelineRun, secrets: &dyn SecretStore) -> Result<()> {
    let registry = secrets
        .resolve(&pipeline.registry.host_secret)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("<{}>", pipeline.registry.host_secret));

    let plan = StepSequencer::plan(pipeline, &registry, &run.commit)?;

    println!("{}", "Dry run - nothing will be executed".yellow().bold());
    println!();
    println!("{}: {}", "Pipeline".bold(), pipeline.name);
    println!("{}: {} at {}", "Push".bold(), run.branch, run.commit);
    println!("{}", "═".repeat(50));

    for (i, step) in plan.iter().enumerate() {
        print!("  {}. {} ({})", i + 1, step.name.bold(), step.tool);
        if !step.depends_on.is_empty() {
            print!(" {}", format!("[depends: {}]", step.depends_on.join(", ")).dimmed());
        }
        println!();

        if let Some(ref tags) = step.tags {
            for tag in tags.to_strings() {
                println!("       tag: {}", tag.cyan());
            }
        }
        for (key, value) in &step.build_args {
            println!("       build-arg: {}={}", key, value);
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_branch_and_commit() {
        let event = push_event(None, Some("main".into()), Some("abc123".into())).unwrap();
        assert_eq!(event.git_ref, "refs/heads/main");
        assert_eq!(event.commit, "abc123");
    }

    #[test]
    fn test_missing_branch() {
        let result = push_event(None, None, Some("abc123".into()));
        assert!(matches!(result, Err(PushflowError::InvalidEvent { .. })));
    }

    #[test]
    fn test_run_failure_carries_step() {
        let mut run = PipelineRun::new("abc123", "main", "p");
        run.start().unwrap();
        run.fail_preflight(&PushflowError::tool_not_found("docker")).unwrap();

        match run_failure(&run) {
            PushflowError::RunFailed { step, help, .. } => {
                assert_eq!(step, "preflight");
                assert!(help.unwrap().contains("docker"));
            }
            _ => panic!("Expected RunFailed"),
        }
    }
}
