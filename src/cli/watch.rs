// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Watch command - run the pipeline when the trigger branch moves
//!
//! Watches a local repository's `.git` directory. Each debounced change
//! re-reads the branch heads; heads that moved become push events and go
//! through the trigger listener like any other push. Accepted runs are
//! executed one at a time, in the order the pushes were seen.
//!
//! Runs never check out into the watched working tree. When the configured
//! checkout path is the watched repository, runs clone it into
//! `.pushflow/workspace` instead.

use colored::Colorize;
use miette::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use super::run::{default_sequencer, execute_run, report_error, run_failure};
use super::{ensure_valid, load_pipeline, secret_store};
use crate::archive::{FilesystemArchive, RunArchive};
use crate::credentials::SecretStore;
use crate::errors::PushflowError;
use crate::pipeline::{Pipeline, PipelineRun, StepSequencer};
use crate::trigger::{RefSnapshot, TriggerListener};

/// Checkout path used while watching, relative to the working directory
pub const WATCH_WORKSPACE: &str = ".pushflow/workspace";

/// Run the watch command
pub async fn run(
    pipeline_path: Option<PathBuf>,
    repo: Option<PathBuf>,
    secrets_file: Option<PathBuf>,
    debounce_ms: u64,
    verbose: bool,
) -> Result<()> {
    let (pipeline, working_dir) = load_pipeline(pipeline_path.as_deref())?;
    ensure_valid(&pipeline, verbose)?;

    let repo = repo.unwrap_or_else(|| working_dir.clone());
    let git_dir = repo.join(".git");
    if !git_dir.is_dir() {
        return Err(miette::miette!(
            "Not a git repository: {}\n\n\
             Pass --repo with the path of a local clone.",
            repo.display()
        ));
    }

    let secrets = secret_store(secrets_file.as_deref())?;
    let mut watch = PushWatch::start(pipeline, &repo, working_dir, verbose).await?;

    println!("{}", "Starting watch mode...".bold());
    println!(
        "Watching {} for pushes to '{}' (debounce: {}ms)",
        repo.display(),
        watch.listener.branch(),
        debounce_ms
    );
    println!("Checking out into {}", watch.workspace().display());
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), move |res: DebounceEventResult| {
        let _ = tx.send(res);
    })
    .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    debouncer
        .watcher()
        .watch(&git_dir, RecursiveMode::Recursive)
        .map_err(|e| miette::miette!("Failed to start watching: {}", e))?;

    loop {
        let received = tokio::select! {
            received = rx.recv() => received,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Stopping watch mode.".dimmed());
                break;
            }
        };

        match received {
            Some(Ok(_events)) => {
                if let Err(e) = watch.on_change(&secrets, default_sequencer).await {
                    eprintln!("{}: {}", "Failed to read branch heads".red(), e);
                }
            }
            Some(Err(e)) => {
                eprintln!("{}: {:?}", "Watch error".red(), e);
            }
            None => {
                // Watcher dropped
                break;
            }
        }
    }

    Ok(())
}

/// Turns branch head changes of a repository into runs
pub(crate) struct PushWatch {
    pipeline: Pipeline,
    repo: PathBuf,
    working_dir: PathBuf,
    listener: TriggerListener,
    snapshot: RefSnapshot,
    archive: Option<FilesystemArchive>,
    verbose: bool,
}

impl PushWatch {
    /// Take the first snapshot of `repo`
    pub(crate) async fn start(
        mut pipeline: Pipeline,
        repo: &Path,
        working_dir: PathBuf,
        verbose: bool,
    ) -> Result<Self, PushflowError> {
        if isolate_checkout(&mut pipeline, repo, &working_dir) {
            tracing::info!("Watched tree is left alone; runs check out into {}", WATCH_WORKSPACE);
        }

        let listener = TriggerListener::for_pipeline(&pipeline);
        let archive = pipeline
            .archive
            .enabled
            .then(|| FilesystemArchive::from_config(&pipeline.archive, &working_dir));
        let snapshot = RefSnapshot::capture(repo).await?;

        Ok(Self {
            pipeline,
            repo: repo.to_path_buf(),
            working_dir,
            listener,
            snapshot,
            archive,
            verbose,
        })
    }

    /// Directory runs check out into
    pub(crate) fn workspace(&self) -> PathBuf {
        self.working_dir.join(&self.pipeline.checkout.path)
    }

    /// Re-read the heads and execute every accepted push, one at a time
    ///
    /// Returns the runs that were executed, finished or failed.
    pub(crate) async fn on_change<F>(
        &mut self,
        secrets: &dyn SecretStore,
        sequencer: F,
    ) -> Result<Vec<PipelineRun>, PushflowError>
    where
        F: Fn(&Pipeline) -> StepSequencer,
    {
        let current = RefSnapshot::capture(&self.repo).await?;
        let pushes = self.snapshot.diff(&current);
        self.snapshot = current;

        let mut runs = Vec::new();
        for event in pushes {
            match self.listener.accept(&event) {
                Ok(Some(run)) => {
                    println!();
                    println!("{}", "─".repeat(50).dimmed());
                    println!(
                        "{}: {} moved to {}",
                        "Push detected".yellow(),
                        event.git_ref,
                        run.commit
                    );
                    if let Some(run) = self.run_once(sequencer(&self.pipeline), run, secrets).await {
                        runs.push(run);
                    }
                }
                Ok(None) => {
                    if self.verbose {
                        println!("  {} {} ignored", "→".dimmed(), event.git_ref);
                    }
                }
                Err(e) => eprintln!("{}: {}", "Rejected push".red(), e),
            }
        }

        Ok(runs)
    }

    /// Execute one run; failures are reported and watching continues
    async fn run_once(
        &self,
        sequencer: StepSequencer,
        run: PipelineRun,
        secrets: &dyn SecretStore,
    ) -> Option<PipelineRun> {
        let archive = self.archive.as_ref().map(|a| a as &dyn RunArchive);

        match execute_run(
            sequencer,
            &self.pipeline,
            run,
            secrets,
            &self.working_dir,
            self.verbose,
            archive,
        )
        .await
        {
            Ok(run) => {
                if !run.succeeded() {
                    eprintln!("{:?}", report_error(run_failure(&run)));
                }
                Some(run)
            }
            Err(e) => {
                eprintln!("{:?}", report_error(e));
                None
            }
        }
    }
}

/// Point the checkout away from the watched working tree
///
/// When the checkout path resolves to `repo`, runs clone `repo` into
/// [`WATCH_WORKSPACE`] instead; a configured remote is kept. Returns whether
/// the pipeline was changed.
pub(crate) fn isolate_checkout(pipeline: &mut Pipeline, repo: &Path, working_dir: &Path) -> bool {
    let Ok(repo) = repo.canonicalize() else {
        return false;
    };
    let checkout = working_dir.join(&pipeline.checkout.path);
    if checkout.canonicalize().ok().as_deref() != Some(repo.as_path()) {
        return false;
    }

    if pipeline.checkout.repository.is_none() {
        pipeline.checkout.repository = Some(repo.display().to_string());
    }
    pipeline.checkout.path = PathBuf::from(WATCH_WORKSPACE);
    true
}
