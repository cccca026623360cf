// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Run state machine
//!
//! Pending -> CheckedOut -> Authenticated -> Built(image)... -> Succeeded,
//! with Failed reachable from every non-terminal state.

use serde::{Deserialize, Serialize};

use crate::errors::PushflowError;
use crate::pipeline::{Step, StepAction};

/// Where a run is in its step sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Pending,
    CheckedOut,
    Authenticated,
    /// The named image was built and pushed
    Built(String),
    Succeeded,
    /// The named step failed
    Failed(String),
}

impl RunState {
    /// Succeeded and Failed accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// State after `step` completed successfully
    ///
    /// `is_last` marks the final step of the run, which moves the run to
    /// Succeeded instead of the step's own state.
    pub fn advance(&self, step: &Step, is_last: bool) -> Result<Self, PushflowError> {
        let next = match (self, &step.action) {
            (Self::Pending, StepAction::Checkout) => Self::CheckedOut,
            (Self::CheckedOut, StepAction::Login) => Self::Authenticated,
            (Self::Authenticated | Self::Built(_), StepAction::BuildPush(image)) => {
                Self::Built(image.name.clone())
            }
            _ => {
                return Err(PushflowError::InvalidTransition {
                    from: self.to_string(),
                    step: step.name.clone(),
                })
            }
        };

        Ok(if is_last { Self::Succeeded } else { next })
    }

    /// State after `step` failed
    pub fn fail(&self, step: &str) -> Result<Self, PushflowError> {
        if self.is_terminal() {
            return Err(PushflowError::InvalidTransition {
                from: self.to_string(),
                step: step.to_string(),
            });
        }
        Ok(Self::Failed(step.to_string()))
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::CheckedOut => write!(f, "CheckedOut"),
            Self::Authenticated => write!(f, "Authenticated"),
            Self::Built(image) => {
                let mut chars = image.chars();
                match chars.next() {
                    Some(first) => write!(f, "{}{}Built", first.to_uppercase(), chars.as_str()),
                    None => write!(f, "Built"),
                }
            }
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed(step) => write!(f, "Failed({})", step),
        }
    }
}
