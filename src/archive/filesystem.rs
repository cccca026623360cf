// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Filesystem-based run archive
//!
//! Stores one pretty-printed JSON file per run in the archive directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ArchiveStats, RunArchive};
use crate::errors::PushflowError;
use crate::pipeline::{ArchiveConfig, PipelineRun, RunStatus};

/// Filesystem-based archive
pub struct FilesystemArchive {
    /// Archive directory, created on first store
    archive_dir: PathBuf,
}

impl FilesystemArchive {
    /// Create an archive rooted at `archive_dir`
    pub fn new(archive_dir: PathBuf) -> Self {
        Self { archive_dir }
    }

    /// Archive configured for a pipeline, relative to `base_dir`
    pub fn from_config(config: &ArchiveConfig, base_dir: &Path) -> Self {
        Self::new(base_dir.join(&config.directory))
    }

    pub fn directory(&self) -> &Path {
        &self.archive_dir
    }

    /// Get path for a run record
    fn run_path(&self, id: &str) -> PathBuf {
        self.archive_dir.join(format!("{}.json", id))
    }

    /// Paths of all run records
    async fn record_paths(&self) -> Result<Vec<PathBuf>, PushflowError> {
        let mut paths = Vec::new();

        if !self.archive_dir.exists() {
            return Ok(paths);
        }

        let mut dir = tokio::fs::read_dir(&self.archive_dir)
            .await
            .map_err(|e| PushflowError::ArchiveError {
                message: format!("Failed to read archive directory: {}", e),
            })?;

        while let Some(entry) = dir.next_entry().await.map_err(|e| PushflowError::ArchiveError {
            message: format!("Failed to read archive entry: {}", e),
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }

        Ok(paths)
    }

    async fn read_record(path: &Path) -> Result<PipelineRun, PushflowError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PushflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| PushflowError::ArchiveError {
            message: format!("Failed to parse run record {}: {}", path.display(), e),
        })
    }
}

/// Run ids are `<short sha>-<hex>`; anything else is never a file name
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[async_trait]
impl RunArchive for FilesystemArchive {
    async fn store(&self, run: &PipelineRun) -> Result<(), PushflowError> {
        if !is_valid_id(&run.id) {
            return Err(PushflowError::ArchiveError {
                message: format!("Invalid run id '{}'", run.id),
            });
        }

        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|e| PushflowError::ArchiveError {
                message: format!("Failed to create archive directory: {}", e),
            })?;

        let json = serde_json::to_string_pretty(run)?;
        let path = self.run_path(&run.id);

        tokio::fs::write(&path, json)
            .await
            .map_err(|e| PushflowError::FileWriteError {
                path: path.clone(),
                error: e.to_string(),
            })?;

        tracing::debug!("Archived run {} to {}", run.id, path.display());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PipelineRun>, PushflowError> {
        if !is_valid_id(id) {
            return Ok(None);
        }

        let path = self.run_path(id);
        if path.exists() {
            return Self::read_record(&path).await.map(Some);
        }

        // Fall back to a unique prefix
        let mut matches = Vec::new();
        for path in self.record_paths().await? {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if stem.starts_with(id) {
                matches.push(path);
            }
        }

        match matches.as_slice() {
            [only] => Self::read_record(only).await.map(Some),
            [] => Ok(None),
            _ => Err(PushflowError::ArchiveError {
                message: format!("Run id prefix '{}' is ambiguous ({} matches)", id, matches.len()),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<PipelineRun>, PushflowError> {
        let mut runs = Vec::new();

        for path in self.record_paths().await? {
            match Self::read_record(&path).await {
                Ok(run) => runs.push(run),
                Err(e) => tracing::warn!("Skipping unreadable run record: {}", e),
            }
        }

        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(runs)
    }

    async fn clear(&self) -> Result<usize, PushflowError> {
        let paths = self.record_paths().await?;

        for path in &paths {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| PushflowError::ArchiveError {
                    message: format!("Failed to remove {}: {}", path.display(), e),
                })?;
        }

        Ok(paths.len())
    }

    async fn stats(&self) -> Result<ArchiveStats, PushflowError> {
        let mut stats = ArchiveStats::default();

        for path in self.record_paths().await? {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                stats.size_bytes += metadata.len();
            }
        }

        for run in self.list().await? {
            stats.runs += 1;
            match run.status {
                RunStatus::Succeeded => stats.succeeded += 1,
                RunStatus::Failed => stats.failed += 1,
                _ => {}
            }

            if stats.oldest_run.map_or(true, |oldest| run.created_at < oldest) {
                stats.oldest_run = Some(run.created_at);
            }
            if stats.newest_run.map_or(true, |newest| run.created_at > newest) {
                stats.newest_run = Some(run.created_at);
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PushflowError;
    use crate::pipeline::Pipeline;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn make_run(commit: &str, age_secs: u64) -> PipelineRun {
        let mut run = PipelineRun::new(commit, "main", "langflow-images");
        run.created_at = SystemTime::now() - Duration::from_secs(age_secs);
        run
    }

    fn failed_run(commit: &str) -> PipelineRun {
        let mut run = make_run(commit, 0);
        run.start().unwrap();
        run.fail_preflight(&PushflowError::MissingSecrets {
            names: vec!["REGISTRY".into()],
        })
        .unwrap();
        run
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let archive = FilesystemArchive::new(temp_dir.path().join("runs"));

        let run = failed_run("abc1234");
        archive.store(&run).await.unwrap();

        assert!(temp_dir.path().join("runs").join(format!("{}.json", run.id)).exists());

        let stored = archive.get(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.commit, "abc1234");
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.failed_step.as_deref(), Some("preflight"));
    }

    #[tokio::test]
    async fn test_get_by_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let archive = FilesystemArchive::new(temp_dir.path().to_path_buf());

        let run = make_run("abc1234", 0);
        archive.store(&run).await.unwrap();
        archive.store(&make_run("def5678", 0)).await.unwrap();

        let found = archive.get("abc").await.unwrap().unwrap();
        assert_eq!(found.id, run.id);
        assert!(archive.get("fff").await.unwrap().is_none());
        assert!(archive.get("../etc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let archive = FilesystemArchive::new(temp_dir.path().to_path_buf());

        archive.store(&make_run("aaaaaaa", 300)).await.unwrap();
        archive.store(&make_run("bbbbbbb", 10)).await.unwrap();
        archive.store(&make_run("ccccccc", 100)).await.unwrap();

        let commits: Vec<String> = archive
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.commit)
            .collect();
        assert_eq!(commits, vec!["bbbbbbb", "ccccccc", "aaaaaaa"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let archive = FilesystemArchive::from_config(
            &Pipeline::default().archive,
            temp_dir.path(),
        );

        assert!(archive.list().await.unwrap().is_empty());
        assert_eq!(archive.stats().await.unwrap().runs, 0);
        assert!(!archive.directory().exists());
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let archive = FilesystemArchive::new(temp_dir.path().to_path_buf());

        archive.store(&failed_run("abc1234")).await.unwrap();
        archive.store(&make_run("def5678", 0)).await.unwrap();

        let stats = archive.stats().await.unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failed, 1);
        assert!(stats.size_bytes > 0);

        assert_eq!(archive.clear().await.unwrap(), 2);
        assert_eq!(archive.stats().await.unwrap().runs, 0);
    }

    #[tokio::test]
    async fn test_record_has_no_secret_values() {
        let temp_dir = TempDir::new().unwrap();
        let archive = FilesystemArchive::new(temp_dir.path().to_path_buf());

        let run = failed_run("abc1234");
        archive.store(&run).await.unwrap();

        let content =
            std::fs::read_to_string(temp_dir.path().join(format!("{}.json", run.id))).unwrap();
        assert!(content.contains("\"failed_step\": \"preflight\""));
        assert!(!content.to_lowercase().contains("password\":"));
    }
}
