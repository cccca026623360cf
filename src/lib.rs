// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! # pushflow - push-triggered image pipeline
//!
//! `pushflow` builds and publishes the Langflow container images whenever
//! the main branch is pushed.
//!
//! ## Features
//!
//! - **Trigger filtering** - only pushes to the configured branch start a run
//! - **Fail-fast credentials** - every registry secret is resolved before any step
//! - **Deterministic tags** - each image is pushed as `<commit>` and `latest`
//! - **Ordered steps** - checkout, login, base, then the images built on it
//! - **Run archive** - every finished run is recorded with its outcome
//!
//! ## Quick Start
//!
//! ```bash
//! # Write the default pipeline
//! pushflow init
//!
//! # Preview the run for a commit
//! pushflow run --branch main --commit abc123 --dry-run
//!
//! # Run it
//! REGISTRY=... REGISTRY_USERNAME=... REGISTRY_PASSWORD=... \
//!     pushflow run --branch main --commit abc123
//! ```

pub mod archive;
pub mod cli;
pub mod credentials;
pub mod errors;
pub mod executors;
pub mod pipeline;
pub mod trigger;
pub mod utils;

// Re-export commonly used types
pub use errors::{ErrorCategory, PushflowError, PushflowResult};
pub use pipeline::{format_tags, Pipeline, PipelineRun, RunContext, StepSequencer, TagPair};
pub use trigger::{PushEvent, TriggerListener};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
