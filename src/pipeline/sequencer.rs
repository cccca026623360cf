// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Step sequencer
//!
//! Runs a pipeline's steps one at a time in dependency order. Credentials
//! are bound and tools checked before the first step; the first failing
//! step ends the run and the remaining steps are recorded as skipped.
//! Images already pushed by earlier steps stay published.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use colored::Colorize;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialBinder, SecretStore};
use crate::errors::PushflowError;
use crate::executors::{ExecutionResult, Executor, StepInput};
use crate::pipeline::dag::StepGraph;
use crate::pipeline::run::{PipelineRun, StepRecord};
use crate::pipeline::tags::{format_tags, TagPair};
use crate::pipeline::{Pipeline, RunContext, Step, StepAction};
use crate::utils::create_spinner;

/// Sequencer options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Directory the checkout path is resolved against
    pub working_dir: PathBuf,
    /// Print tool stderr for failed steps
    pub verbose: bool,
    /// No progress output
    pub quiet: bool,
}

/// A step as it would run, for dry runs and graph output
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub name: String,
    pub tool: String,
    pub depends_on: Vec<String>,
    pub tags: Option<TagPair>,
    pub build_args: BTreeMap<String, String>,
}

/// Step sequencer
pub struct StepSequencer {
    /// Registered executors by tool name
    executors: HashMap<String, Box<dyn Executor>>,
    /// Checked between steps
    cancel: Arc<AtomicBool>,
}

impl StepSequencer {
    /// Create a sequencer with no executors
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register an executor for a tool
    pub fn register_executor(&mut self, name: &str, executor: Box<dyn Executor>) {
        self.executors.insert(name.to_string(), executor);
    }

    /// Flag that stops the sequencer before its next step
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Resolve steps, order, tags and build arguments without running anything
    pub fn plan(
        pipeline: &Pipeline,
        registry: &str,
        commit: &str,
    ) -> Result<Vec<PlannedStep>, PushflowError> {
        let steps = pipeline.steps();
        let dag = StepGraph::build(&steps)?;

        dag.execution_order()?
            .into_iter()
            .map(|idx| -> Result<PlannedStep, PushflowError> {
                let step = &steps[idx];
                let (tags, build_args) = match step.image() {
                    Some(image) => {
                        let tags = format_tags(registry, &pipeline.image_name, &image.suffix, commit);
                        let mut args = image.build_args.clone();
                        if let Some(ref base) = image.base {
                            let base_image = pipeline.get_image(base).ok_or_else(|| {
                                PushflowError::UnknownDependency {
                                    step: step.name.clone(),
                                    dependency: base.clone(),
                                }
                            })?;
                            let base_tags =
                                format_tags(registry, &pipeline.image_name, &base_image.suffix, commit);
                            args.insert(image.base_arg.clone(), base_tags.versioned.to_string());
                        }
                        (Some(tags), args)
                    }
                    None => (None, BTreeMap::new()),
                };

                Ok(PlannedStep {
                    name: step.name.clone(),
                    tool: step.tool_name().to_string(),
                    depends_on: dag.dependencies(&step.name).unwrap_or_default(),
                    tags,
                    build_args,
                })
            })
            .collect()
    }

    /// Execute a run to a terminal state
    ///
    /// Step failures are recorded on the run and return `Ok`. Errors raised
    /// before the first step (invalid graph, missing secrets, missing tools)
    /// are recorded on the run as a preflight failure and also returned.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        run: &mut PipelineRun,
        secrets: &dyn SecretStore,
        options: &ExecutionOptions,
    ) -> Result<(), PushflowError> {
        let start = Instant::now();
        run.start()?;
        info!(run = %run.id, commit = %run.commit, branch = %run.branch, "Run started");

        let (steps, order, ctx) = match self.preflight(pipeline, run, secrets, options).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(run = %run.id, "Preflight failed: {}", e);
                run.fail_preflight(&e)?;
                return Err(e);
            }
        };

        if !options.quiet {
            self.print_execution_plan(pipeline, &steps, &order);
            if options.verbose {
                for (tool, version) in self.tool_versions(&steps).await {
                    println!("  {} {}", format!("{}:", tool).dimmed(), version);
                }
                println!();
            }
        }

        // Versioned tags produced by this run, by image name
        let mut produced: HashMap<String, String> = HashMap::new();

        for (position, &idx) in order.iter().enumerate() {
            let step = &steps[idx];
            let is_last = position + 1 == order.len();

            if self.cancel.load(Ordering::SeqCst) {
                warn!(run = %run.id, "Cancelled before {}", step.name);
                let error = PushflowError::Cancelled {
                    step: step.name.clone(),
                };
                let record = StepRecord::failed(step, SystemTime::now(), Default::default(), None, error.to_string());
                run.record_failure(step, record)?;
                self.skip_remaining(run, &steps, &order[position + 1..]);
                break;
            }

            let started_at = SystemTime::now();
            let step_start = Instant::now();

            let outcome = match self.step_input(step, &ctx, &produced) {
                Ok(input) => self.execute_step(step, &ctx, &input, options).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(result) if result.success => {
                    if let Some(image) = step.image() {
                        produced.insert(image.name.clone(), ctx.tags_for(image).versioned.to_string());
                    }
                    info!(run = %run.id, step = %step.name, "Step succeeded");
                    let record = StepRecord::succeeded(step, started_at, result.duration)
                        .with_published(result.published);
                    run.record_success(step, is_last, record)?;
                }
                Ok(result) => {
                    warn!(run = %run.id, step = %step.name, exit_code = result.exit_code, "Step failed");
                    if options.verbose && !options.quiet && !result.stderr.is_empty() {
                        eprintln!("{}", result.stderr.dimmed());
                    }
                    let message = failure_message(&result);
                    let record = StepRecord::failed(
                        step,
                        started_at,
                        result.duration,
                        Some(result.exit_code),
                        message,
                    );
                    run.record_failure(step, record)?;
                    self.skip_remaining(run, &steps, &order[position + 1..]);
                    break;
                }
                Err(e) => {
                    warn!(run = %run.id, step = %step.name, "Step errored: {}", e);
                    let record = StepRecord::failed(step, started_at, step_start.elapsed(), None, e.to_string());
                    run.record_failure(step, record)?;
                    self.skip_remaining(run, &steps, &order[position + 1..]);
                    break;
                }
            }
        }

        let duration = start.elapsed();
        info!(run = %run.id, status = %run.status, "Run finished in {:.2}s", duration.as_secs_f64());

        if !options.quiet {
            println!();
            if run.succeeded() {
                println!(
                    "{}",
                    format!("Run {} succeeded in {:.2}s", run.id, duration.as_secs_f64()).green()
                );
            } else {
                println!(
                    "{}",
                    format!(
                        "Run {} failed at '{}' after {:.2}s",
                        run.id,
                        run.failed_step.as_deref().unwrap_or("?"),
                        duration.as_secs_f64()
                    )
                    .red()
                );
            }
        }

        Ok(())
    }

    /// Graph, credentials, tools, context, in that order
    async fn preflight(
        &self,
        pipeline: &Pipeline,
        run: &PipelineRun,
        secrets: &dyn SecretStore,
        options: &ExecutionOptions,
    ) -> Result<(Vec<Step>, Vec<usize>, RunContext), PushflowError> {
        let steps = pipeline.steps();
        let dag = StepGraph::build(&steps)?;
        let order = dag.execution_order()?;

        let credentials = CredentialBinder::new(&pipeline.registry).bind(secrets)?;

        let missing = self.check_tools(&steps).await?;
        if let Some(tool) = missing.into_iter().next() {
            return Err(PushflowError::tool_not_found(&tool));
        }

        for step in &steps {
            self.executor_for(step)?.validate_step(step)?;
        }

        let ctx = RunContext::new(
            &run.id,
            &run.commit,
            &run.branch,
            &pipeline.image_name,
            credentials,
            options.working_dir.join(&pipeline.checkout.path),
        );

        Ok((steps, order, ctx))
    }

    /// Tags and build arguments for a step
    ///
    /// A base tag only comes from an image built earlier in this same run.
    fn step_input(
        &self,
        step: &Step,
        ctx: &RunContext,
        produced: &HashMap<String, String>,
    ) -> Result<StepInput, PushflowError> {
        let StepAction::BuildPush(image) = &step.action else {
            return Ok(StepInput::default());
        };

        let mut input = StepInput {
            tags: Some(ctx.tags_for(image)),
            build_args: BTreeMap::new(),
        };

        if let Some(ref base) = image.base {
            let base_tag = produced.get(base).ok_or_else(|| PushflowError::MissingBaseTag {
                step: step.name.clone(),
                dependency: base.clone(),
            })?;
            input.build_args.insert(image.base_arg.clone(), base_tag.clone());
        }

        Ok(input)
    }

    fn executor_for(&self, step: &Step) -> Result<&dyn Executor, PushflowError> {
        self.executors
            .get(step.tool_name())
            .map(|e| e.as_ref())
            .ok_or_else(|| PushflowError::ExecutorNotFound {
                tool: step.tool_name().to_string(),
            })
    }

    /// Execute a single step
    async fn execute_step(
        &self,
        step: &Step,
        ctx: &RunContext,
        input: &StepInput,
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult, PushflowError> {
        let executor = self.executor_for(step)?;

        debug!(step = %step.name, args = ?input.build_args, "Executing step");
        let spinner = (!options.quiet).then(|| create_spinner(&format!("{}...", step.name)));

        let result = executor.execute(step, ctx, input).await;

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        if !options.quiet {
            match &result {
                Ok(r) if r.success => println!(
                    "  {} {} ({:.2}s)",
                    "✓".green(),
                    step.name.bold(),
                    r.duration.as_secs_f64()
                ),
                _ => println!("  {} {} failed", "✗".red(), step.name.bold()),
            }
        }

        result
    }

    fn skip_remaining(&self, run: &mut PipelineRun, steps: &[Step], rest: &[usize]) {
        for &idx in rest {
            run.record_skipped(&steps[idx]);
        }
    }

    /// Print the execution plan
    fn print_execution_plan(&self, pipeline: &Pipeline, steps: &[Step], order: &[usize]) {
        println!();
        println!("{}: {}", "Pipeline".bold(), pipeline.name);
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} step{}):",
            order.len(),
            if order.len() == 1 { "" } else { "s" }
        );
        println!();

        for (i, &idx) in order.iter().enumerate() {
            let step = &steps[idx];
            print!("  {}. {} ({})", i + 1, step.name.bold(), step.tool_name());
            if !step.depends_on.is_empty() {
                print!(" {}", format!("[depends: {}]", step.depends_on.join(", ")).dimmed());
            }
            println!();
        }

        println!();
    }

    /// Version of each tool the steps use, in first-use order
    pub async fn tool_versions(&self, steps: &[Step]) -> Vec<(String, String)> {
        let mut versions = Vec::new();
        let mut seen = HashSet::new();

        for step in steps {
            let tool = step.tool_name();
            if !seen.insert(tool) {
                continue;
            }
            let Some(executor) = self.executors.get(tool) else {
                continue;
            };
            match executor.version().await {
                Ok(version) => versions.push((tool.to_string(), version)),
                Err(e) => debug!("{} version unavailable: {}", tool, e),
            }
        }

        versions
    }

    /// Tools the steps need that are missing or unavailable
    pub async fn check_tools(&self, steps: &[Step]) -> Result<Vec<String>, PushflowError> {
        let mut missing = Vec::new();

        let mut seen = HashSet::new();
        for step in steps {
            let tool = step.tool_name();
            if !seen.insert(tool) {
                continue;
            }

            match self.executors.get(tool) {
                Some(executor) => match executor.check_available().await {
                    Ok(true) => {}
                    _ => missing.push(tool.to_string()),
                },
                None => missing.push(tool.to_string()),
            }
        }

        Ok(missing)
    }
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Last stderr lines of a failed result, or the exit code
fn failure_message(result: &ExecutionResult) -> String {
    let lines: Vec<&str> = result.stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        format!("exited with code {}", result.exit_code)
    } else {
        lines[lines.len().saturating_sub(5)..].join("\n")
    }
}
