// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Runs command - inspect the run archive

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};

use super::{format_duration, load_pipeline, RunsAction};
use crate::archive::{FilesystemArchive, RunArchive};
use crate::errors::PushflowError;
use crate::pipeline::{PipelineRun, RunStatus, StepStatus};

/// Run the runs command
pub async fn run(action: RunsAction, _verbose: bool) -> Result<()> {
    let (pipeline, working_dir) = load_pipeline(None)?;
    let archive = FilesystemArchive::from_config(&pipeline.archive, &working_dir);

    match action {
        RunsAction::List { limit } => {
            let runs = archive.list().await?;

            println!("{}", "Recorded Runs".bold());
            println!("{}", "═".repeat(60));

            if runs.is_empty() {
                println!("{}", "  No runs recorded.".dimmed());
                return Ok(());
            }

            for run in runs.iter().take(limit) {
                let age = run
                    .created_at
                    .elapsed()
                    .map(|d| format!("{} ago", format_duration(d)))
                    .unwrap_or_default();

                let detail = match run.failed_step {
                    Some(ref step) => format!("failed at {}", step).red().to_string(),
                    None => String::new(),
                };

                println!(
                    "  {} {:<16} {:<10} {:<8} {:>8}  {}",
                    status_marker(run.status),
                    run.id,
                    run.branch,
                    short(&run.commit),
                    age.dimmed(),
                    detail
                );
            }

            if runs.len() > limit {
                println!();
                println!("{}", format!("  ... and {} more", runs.len() - limit).dimmed());
            }

            Ok(())
        }

        RunsAction::Show { id } => {
            let run = archive
                .get(&id)
                .await?
                .ok_or(PushflowError::RunNotFound { run_id: id })?;

            print_run(&run);
            Ok(())
        }

        RunsAction::Stats => {
            let stats = archive.stats().await?;

            println!("{}", "Archive Statistics".bold());
            println!("{}", "═".repeat(40));
            println!("  Location:  {}", archive.directory().display());
            println!("  Runs:      {}", stats.runs);
            println!("  Succeeded: {}", stats.succeeded);
            println!("  Failed:    {}", stats.failed);
            println!("  Size:      {}", stats.formatted_size());

            if let Some(oldest) = stats.oldest_run {
                if let Ok(duration) = oldest.elapsed() {
                    println!("  Oldest:    {} ago", format_duration(duration));
                }
            }

            if let Some(newest) = stats.newest_run {
                if let Ok(duration) = newest.elapsed() {
                    println!("  Newest:    {} ago", format_duration(duration));
                }
            }

            Ok(())
        }

        RunsAction::Clear { yes } => {
            let stats = archive.stats().await?;

            if stats.runs == 0 {
                println!("{}", "Archive is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!(
                    "Delete {} recorded runs ({})? [y/N] ",
                    stats.runs,
                    stats.formatted_size()
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            let removed = archive.clear().await?;
            println!("{}", format!("Removed {} runs.", removed).green());

            Ok(())
        }
    }
}

fn print_run(run: &PipelineRun) {
    println!("{} {}", "Run".bold(), run.id.bold());
    println!("{}", "═".repeat(50));
    println!("  Pipeline: {}", run.pipeline);
    println!("  Push:     {} at {}", run.branch, run.commit);
    println!("  Status:   {} {}", status_marker(run.status), run.status);
    println!("  State:    {}", run.state);
    if let Some(duration) = run.duration() {
        println!("  Duration: {:.2}s", duration.as_secs_f64());
    }
    if let Some(ref step) = run.failed_step {
        println!("  Failed:   {}", step.red());
    }

    if !run.steps.is_empty() {
        println!();
        println!("{}:", "Steps".bold());
        for record in &run.steps {
            let marker = match record.status {
                StepStatus::Succeeded => "✓".green(),
                StepStatus::Failed => "✗".red(),
                StepStatus::Skipped => "○".dimmed(),
            };
            print!("  {} {} ({})", marker, record.step, record.tool);
            match record.status {
                StepStatus::Skipped => print!(" {}", "skipped".dimmed()),
                _ => print!(" {:.2}s", record.duration_ms as f64 / 1000.0),
            }
            if let Some(code) = record.exit_code.filter(|c| *c != 0) {
                print!(" {}", format!("exit {}", code).red());
            }
            println!();
        }
    }

    let published = run.published_tags();
    if !published.is_empty() {
        println!();
        println!("{}:", "Published".bold());
        for tag in published {
            println!("  - {}", tag);
        }
    }

    if let Some(ref error) = run.error {
        println!();
        println!("{}:", "Error".red().bold());
        for line in error.lines() {
            println!("  {}", line.dimmed());
        }
    }
}

fn status_marker(status: RunStatus) -> colored::ColoredString {
    match status {
        RunStatus::Succeeded => "✓".green(),
        RunStatus::Failed => "✗".red(),
        RunStatus::Pending | RunStatus::Running => "→".cyan(),
    }
}

fn short(commit: &str) -> &str {
    &commit[..commit.len().min(7)]
}
