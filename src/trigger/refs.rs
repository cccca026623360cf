// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Branch head snapshots of a local repository

use std::collections::BTreeMap;
use std::path::Path;

use super::PushEvent;
use crate::errors::PushflowError;
use crate::executors::ToolCommand;

/// `refs/heads/*` of a repository, ref name to commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefSnapshot {
    heads: BTreeMap<String, String>,
}

impl RefSnapshot {
    /// Read the branch heads of `repo` with `git for-each-ref`
    pub async fn capture(repo: &Path) -> Result<Self, PushflowError> {
        let git = which::which("git").map_err(|_| PushflowError::tool_not_found("git"))?;
        let output = ToolCommand::new(git, repo)
            .arg("for-each-ref")
            .arg("--format=%(objectname) %(refname)")
            .arg("refs/heads")
            .run()
            .await?;

        if !output.success() {
            return Err(PushflowError::step_failed_with_help(
                "for-each-ref",
                output.exit_code,
                output.stderr,
                "git",
            ));
        }

        Ok(Self::parse(&output.stdout))
    }

    /// Parse `<sha> <ref>` lines
    pub fn parse(output: &str) -> Self {
        let heads = output
            .lines()
            .filter_map(|line| {
                let (sha, name) = line.trim().split_once(' ')?;
                Some((name.trim().to_string(), sha.to_string()))
            })
            .collect();
        Self { heads }
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Commit a ref points to
    pub fn head(&self, git_ref: &str) -> Option<&str> {
        self.heads.get(git_ref).map(String::as_str)
    }

    /// Pushes that turn `self` into `newer`
    ///
    /// New and moved refs become push events; removed refs become
    /// deletion events.
    pub fn diff(&self, newer: &RefSnapshot) -> Vec<PushEvent> {
        let mut events = Vec::new();

        for (name, sha) in &newer.heads {
            if self.heads.get(name) != Some(sha) {
                events.push(PushEvent::new(name, sha));
            }
        }

        for name in self.heads.keys() {
            if !newer.heads.contains_key(name) {
                let mut event = PushEvent::new(name, &"0".repeat(40));
                event.deleted = true;
                events.push(event);
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN_A: &str = "1111111111111111111111111111111111111111";
    const MAIN_B: &str = "2222222222222222222222222222222222222222";
    const DEV: &str = "3333333333333333333333333333333333333333";

    #[test]
    fn test_parse_for_each_ref_output() {
        let snapshot = RefSnapshot::parse(&format!(
            "{} refs/heads/main\n{} refs/heads/develop\n\n",
            MAIN_A, DEV
        ));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.head("refs/heads/main"), Some(MAIN_A));
    }

    #[test]
    fn test_diff_reports_moved_and_new_heads() {
        let before = RefSnapshot::parse(&format!("{} refs/heads/main\n", MAIN_A));
        let after = RefSnapshot::parse(&format!(
            "{} refs/heads/main\n{} refs/heads/develop\n",
            MAIN_B, DEV
        ));

        let events = before.diff(&after);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].branch(), Some("develop"));
        assert_eq!(events[1].branch(), Some("main"));
        assert_eq!(events[1].commit, MAIN_B);
    }

    #[test]
    fn test_unchanged_snapshot_has_no_events() {
        let snapshot = RefSnapshot::parse(&format!("{} refs/heads/main\n", MAIN_A));
        assert!(snapshot.diff(&snapshot.clone()).is_empty());
    }

    #[test]
    fn test_removed_head_is_deletion() {
        let before = RefSnapshot::parse(&format!("{} refs/heads/old\n", DEV));
        let events = before.diff(&RefSnapshot::default());
        assert_eq!(events.len(), 1);
        assert!(events[0].is_deletion());
    }
}
