// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Push triggers
//!
//! Turns push notifications into pipeline runs. Only pushes that move the
//! configured branch produce a run; everything else is dropped without
//! side effects.

mod refs;

pub use refs::RefSnapshot;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::errors::PushflowError;
use crate::pipeline::{Pipeline, PipelineRun};

/// Prefix of branch refs
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// A push notification
///
/// Field names follow the GitHub push webhook payload; unknown fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Full ref that was pushed, e.g. `refs/heads/main`
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// Commit the ref points to after the push
    #[serde(rename = "after")]
    pub commit: String,

    /// Set when the push removed the ref
    #[serde(default)]
    pub deleted: bool,
}

impl PushEvent {
    /// Push of `commit` to `branch`; a full ref is kept as given
    pub fn new(branch: &str, commit: &str) -> Self {
        let git_ref = if branch.starts_with("refs/") {
            branch.to_string()
        } else {
            format!("{}{}", BRANCH_REF_PREFIX, branch)
        };
        Self {
            git_ref,
            commit: commit.to_string(),
            deleted: false,
        }
    }

    /// Parse a webhook payload
    pub fn from_json(payload: &str) -> Result<Self, PushflowError> {
        serde_json::from_str(payload).map_err(|e| PushflowError::InvalidEvent {
            reason: e.to_string(),
        })
    }

    /// Read a webhook payload from a file
    pub fn from_file(path: &Path) -> Result<Self, PushflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| PushflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Branch name, if this is a branch ref
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix(BRANCH_REF_PREFIX)
    }

    /// Whether the push removed the ref
    pub fn is_deletion(&self) -> bool {
        self.deleted || (!self.commit.is_empty() && self.commit.chars().all(|c| c == '0'))
    }
}

fn commit_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^[0-9a-fA-F]{4,40}$").expect("Invalid commit pattern"))
}

/// Validate and normalise a commit identifier
pub fn normalize_commit(commit: &str) -> Result<String, PushflowError> {
    let commit = commit.trim();
    if !commit_pattern().is_match(commit) {
        return Err(PushflowError::InvalidCommit {
            commit: commit.to_string(),
        });
    }
    Ok(commit.to_ascii_lowercase())
}

/// Decides which pushes start a run
#[derive(Debug, Clone)]
pub struct TriggerListener {
    branch: String,
    pipeline: String,
}

impl TriggerListener {
    pub fn new(branch: &str, pipeline: &str) -> Self {
        Self {
            branch: branch.to_string(),
            pipeline: pipeline.to_string(),
        }
    }

    /// Listener for a pipeline's configured branch
    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        Self::new(&pipeline.trigger.branch, &pipeline.name)
    }

    /// The branch that triggers runs
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Create a pending run for a matching push
    ///
    /// Returns `Ok(None)` for pushes that should be ignored: other
    /// branches, tags and deletions.
    pub fn accept(&self, event: &PushEvent) -> Result<Option<PipelineRun>, PushflowError> {
        let Some(branch) = event.branch() else {
            tracing::debug!("Ignoring push to non-branch ref {}", event.git_ref);
            return Ok(None);
        };

        if branch != self.branch {
            tracing::debug!("Ignoring push to '{}' (trigger branch is '{}')", branch, self.branch);
            return Ok(None);
        }

        if event.is_deletion() {
            tracing::warn!("Ignoring deletion of branch '{}'", branch);
            return Ok(None);
        }

        let commit = normalize_commit(&event.commit)?;
        let run = PipelineRun::new(&commit, branch, &self.pipeline);
        tracing::info!(run = %run.id, "Push to '{}' at {} accepted", branch, commit);

        Ok(Some(run))
    }
}
