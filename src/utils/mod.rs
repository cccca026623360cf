// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Utility modules
//!
//! Terminal helpers for the pushflow CLI.

pub mod spinner;

pub use spinner::*;
