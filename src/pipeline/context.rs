// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Per-run execution context
//!
//! Built once, after credentials are bound, and only ever read by steps.

use std::path::{Path, PathBuf};

use crate::credentials::Credentials;
use crate::pipeline::tags::{format_tags, TagPair};
use crate::pipeline::ImageSpec;

/// Everything a step may read about the run
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    commit: String,
    branch: String,
    image_name: String,
    credentials: Credentials,
    workspace: PathBuf,
}

impl RunContext {
    pub fn new(
        run_id: &str,
        commit: &str,
        branch: &str,
        image_name: &str,
        credentials: Credentials,
        workspace: PathBuf,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            commit: commit.to_string(),
            branch: branch.to_string(),
            image_name: image_name.to_string(),
            credentials,
            workspace,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn registry(&self) -> &str {
        &self.credentials.host
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Directory the source is checked out into
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Tags for an image of this run
    pub fn tags_for(&self, image: &ImageSpec) -> TagPair {
        format_tags(self.registry(), &self.image_name, &image.suffix, &self.commit)
    }
}
