// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Pipeline run records
//!
//! A run is bound to one commit for its whole life. Only the sequencer
//! mutates it; once terminal it is handed to the archive.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::PushflowError;
use crate::pipeline::state::RunState;
use crate::pipeline::Step;

/// Name recorded for failures that happen before the first step
pub const PREFLIGHT: &str = "preflight";

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Not attempted because an earlier step failed
    Skipped,
}

/// What happened to one step of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub tool: String,
    pub status: StepStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub started_at: Option<SystemTime>,
    #[serde(default)]
    pub duration_ms: u64,
    /// Tags pushed by this step
    #[serde(default)]
    pub published: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StepRecord {
    pub fn succeeded(step: &Step, started_at: SystemTime, duration: Duration) -> Self {
        Self {
            step: step.name.clone(),
            tool: step.tool_name().to_string(),
            status: StepStatus::Succeeded,
            exit_code: Some(0),
            started_at: Some(started_at),
            duration_ms: duration.as_millis() as u64,
            published: vec![],
            message: None,
        }
    }

    pub fn failed(
        step: &Step,
        started_at: SystemTime,
        duration: Duration,
        exit_code: Option<i32>,
        message: String,
    ) -> Self {
        Self {
            step: step.name.clone(),
            tool: step.tool_name().to_string(),
            status: StepStatus::Failed,
            exit_code,
            started_at: Some(started_at),
            duration_ms: duration.as_millis() as u64,
            published: vec![],
            message: Some(message),
        }
    }

    pub fn skipped(step: &Step) -> Self {
        Self {
            step: step.name.clone(),
            tool: step.tool_name().to_string(),
            status: StepStatus::Skipped,
            exit_code: None,
            started_at: None,
            duration_ms: 0,
            published: vec![],
            message: None,
        }
    }

    pub fn with_published(mut self, tags: Vec<String>) -> Self {
        self.published = tags;
        self
    }
}

/// One execution of the pipeline for one commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub commit: String,
    pub branch: String,
    pub pipeline: String,
    pub created_at: SystemTime,
    #[serde(default)]
    pub finished_at: Option<SystemTime>,
    pub status: RunStatus,
    pub state: RunState,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub failed_step: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PipelineRun {
    /// Create a pending run bound to a commit
    pub fn new(commit: &str, branch: &str, pipeline: &str) -> Self {
        let created_at = SystemTime::now();
        Self {
            id: run_id(commit, branch, created_at),
            commit: commit.to_string(),
            branch: branch.to_string(),
            pipeline: pipeline.to_string(),
            created_at,
            finished_at: None,
            status: RunStatus::Pending,
            state: RunState::Pending,
            steps: vec![],
            failed_step: None,
            error: None,
        }
    }

    /// Pending -> Running
    pub fn start(&mut self) -> Result<(), PushflowError> {
        if self.status != RunStatus::Pending {
            return Err(PushflowError::InvalidTransition {
                from: self.status.to_string(),
                step: PREFLIGHT.to_string(),
            });
        }
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Record a successful step and advance the state machine
    pub fn record_success(
        &mut self,
        step: &Step,
        is_last: bool,
        record: StepRecord,
    ) -> Result<(), PushflowError> {
        self.state = self.state.advance(step, is_last)?;
        self.steps.push(record);
        if self.state == RunState::Succeeded {
            self.status = RunStatus::Succeeded;
            self.finished_at = Some(SystemTime::now());
        }
        Ok(())
    }

    /// Record a failed step; the run becomes terminal
    pub fn record_failure(&mut self, step: &Step, record: StepRecord) -> Result<(), PushflowError> {
        self.error = record.message.clone();
        self.steps.push(record);
        self.terminate(&step.name)
    }

    /// Fail the run before any step ran
    pub fn fail_preflight(&mut self, error: &PushflowError) -> Result<(), PushflowError> {
        self.error = Some(error.to_string());
        self.terminate(PREFLIGHT)
    }

    /// Record steps that will not be attempted
    pub fn record_skipped(&mut self, step: &Step) {
        self.steps.push(StepRecord::skipped(step));
    }

    fn terminate(&mut self, step: &str) -> Result<(), PushflowError> {
        self.state = self.state.fail(step)?;
        self.status = RunStatus::Failed;
        self.failed_step = Some(step.to_string());
        self.finished_at = Some(SystemTime::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded | RunStatus::Failed)
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Record of a named step, if it was reached
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step == name)
    }

    /// Every tag this run pushed, in push order
    pub fn published_tags(&self) -> Vec<String> {
        self.steps.iter().flat_map(|s| s.published.iter().cloned()).collect()
    }

    /// Wall-clock duration, once finished
    pub fn duration(&self) -> Option<Duration> {
        self.finished_at?.duration_since(self.created_at).ok()
    }
}

/// `<short commit>-<8 hex>` where the hex part hashes commit, branch and time
fn run_id(commit: &str, branch: &str, created_at: SystemTime) -> String {
    let nanos = created_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(commit.as_bytes());
    hasher.update(b"\0");
    hasher.update(branch.as_bytes());
    hasher.update(b"\0");
    hasher.update(&nanos.to_le_bytes());
    let hash = hasher.finalize().to_hex();

    let short: String = commit.chars().take(7).collect();
    format!("{}-{}", short, &hash.as_str()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_run_id_shape() {
        let run = PipelineRun::new("abc1234def", "main", "langflow-images");
        assert!(run.id.starts_with("abc1234-"));
        assert_eq!(run.id.len(), 16);
        assert_eq!(run.status, RunStatus::Pending);
    }

    #[test]
    fn test_success_path() {
        let steps = Pipeline::default().steps();
        let mut run = PipelineRun::new("abc123", "main", "p");
        run.start().unwrap();

        for (i, step) in steps.iter().enumerate() {
            let record = StepRecord::succeeded(step, SystemTime::now(), Duration::ZERO);
            run.record_success(step, i == steps.len() - 1, record).unwrap();
        }

        assert!(run.succeeded());
        assert!(run.finished_at.is_some());
        assert_eq!(run.steps.len(), 5);
    }

    #[test]
    fn test_failure_is_terminal() {
        let steps = Pipeline::default().steps();
        let mut run = PipelineRun::new("abc123", "main", "p");
        run.start().unwrap();
        let record = StepRecord::failed(&steps[0], SystemTime::now(), Duration::ZERO, Some(128), "boom".into());
        run.record_failure(&steps[0], record).unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.failed_step.as_deref(), Some("checkout"));
        assert_eq!(run.error.as_deref(), Some("boom"));
        assert!(run.start().is_err());
    }

    #[test]
    fn test_serializes_without_credentials() {
        let run = PipelineRun::new("abc123", "main", "p");
        let json = serde_json::to_string(&run).unwrap();
        let parsed: PipelineRun = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, run.id);
        assert_eq!(parsed.state, RunState::Pending);
    }
}
