// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Run archive
//!
//! Keeps a record of every finished run: its commit, step outcomes, the
//! tags it published and where it failed. Credentials never reach a record.

mod filesystem;

pub use filesystem::FilesystemArchive;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::errors::PushflowResult;
use crate::pipeline::PipelineRun;

/// Trait for run archives
#[async_trait]
pub trait RunArchive: Send + Sync {
    /// Record a finished run, replacing any record with the same id
    async fn store(&self, run: &PipelineRun) -> PushflowResult<()>;

    /// Look up a run by id or unique id prefix
    async fn get(&self, id: &str) -> PushflowResult<Option<PipelineRun>>;

    /// All recorded runs, newest first
    async fn list(&self) -> PushflowResult<Vec<PipelineRun>>;

    /// Remove every record, returning how many were removed
    async fn clear(&self) -> PushflowResult<usize>;

    /// Get archive statistics
    async fn stats(&self) -> PushflowResult<ArchiveStats>;
}

/// Archive statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveStats {
    /// Number of recorded runs
    pub runs: usize,
    /// Runs that succeeded
    pub succeeded: usize,
    /// Runs that failed
    pub failed: usize,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Creation time of the oldest run
    pub oldest_run: Option<SystemTime>,
    /// Creation time of the newest run
    pub newest_run: Option<SystemTime>,
}

impl ArchiveStats {
    /// Format size for display
    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.size_bytes >= MB {
            format!("{:.2} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.2} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_size() {
        let mut stats = ArchiveStats::default();
        assert_eq!(stats.formatted_size(), "0 bytes");
        stats.size_bytes = 2048;
        assert_eq!(stats.formatted_size(), "2.00 KB");
        stats.size_bytes = 3 * 1024 * 1024;
        assert_eq!(stats.formatted_size(), "3.00 MB");
    }
}
