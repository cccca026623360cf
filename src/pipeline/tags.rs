// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Image tag formatting
//!
//! Every published image gets exactly two tags: one qualified by the
//! triggering commit and one floating `latest`. Both come from the same
//! build, so they always point at the same image.

use serde::{Deserialize, Serialize};

/// Version label of the floating tag
pub const LATEST: &str = "latest";

/// A fully qualified image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageTag {
    pub registry: String,
    pub image: String,
    pub suffix: String,
    pub version: String,
}

impl ImageTag {
    /// Repository part of the reference, without the version label
    pub fn repository(&self) -> String {
        format!("{}/{}{}", self.registry, self.image, self.suffix)
    }
}

impl std::fmt::Display for ImageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository(), self.version)
    }
}

/// The two tags carried by one published image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    /// `{registry}/{image}{suffix}:{commit}`
    pub versioned: ImageTag,
    /// `{registry}/{image}{suffix}:latest`
    pub latest: ImageTag,
}

impl TagPair {
    /// Both tags as strings, versioned first
    pub fn to_strings(&self) -> Vec<String> {
        vec![self.versioned.to_string(), self.latest.to_string()]
    }
}

/// Derive the tag pair for one image variant
pub fn format_tags(registry: &str, image: &str, suffix: &str, commit: &str) -> TagPair {
    let registry = registry.trim_end_matches('/');
    let tag = |version: &str| ImageTag {
        registry: registry.to_string(),
        image: image.to_string(),
        suffix: suffix.to_string(),
        version: version.to_string(),
    };

    TagPair {
        versioned: tag(commit),
        latest: tag(LATEST),
    }
}
