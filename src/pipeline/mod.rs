// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Pipeline definitions and execution
//!
//! This module defines the pipeline file, the step graph derived from it,
//! the per-run context and state machine, and the sequencer that drives a
//! run from checkout to the last pushed image.

mod context;
pub mod dag;
mod definition;
pub mod run;
mod sequencer;
pub mod state;
pub mod tags;
mod validation;

pub use context::RunContext;
pub use dag::StepGraph;
pub use definition::*;
pub use run::{PipelineRun, RunStatus, StepRecord, StepStatus};
pub use sequencer::{ExecutionOptions, PlannedStep, StepSequencer};
pub use state::RunState;
pub use tags::{format_tags, ImageTag, TagPair};
pub use validation::{PipelineValidator, ValidationResult};
