// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution-time failures captured into pipeline results.
//!
//! Unlike the structural errors, these are never fatal at the call site:
//! the runner records them, halts further levels, and reports them through
//! [`crate::engine::PipelineResult::errors`]. The failure kind is preserved
//! so that the fallback runner can distinguish a budget-exhausted run from
//! an ordinary step failure and route to the next execution mode.

use thiserror::Error;

use crate::definition::StepToken;
use crate::errors::GraphError;

/// A failure raised by a step, a hook, or the budget monitor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// The step itself raised.
    #[error("step failed: {0}")]
    Failed(String),

    /// The wall-clock budget ran out before or during the step.
    #[error("wall-clock budget exhausted ({remaining_ms}ms remaining)")]
    BudgetExhausted { remaining_ms: u64 },

    /// Level building failed before any step could start.
    #[error(transparent)]
    Structural(#[from] GraphError),
}

impl StepFailure {
    /// Convenience constructor for ad-hoc step failures.
    pub fn message(message: impl Into<String>) -> Self {
        StepFailure::Failed(message.into())
    }

    /// Stable surface name for this failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StepFailure::Failed(_) => "step-failure",
            StepFailure::BudgetExhausted { .. } => "budget-exhausted",
            StepFailure::Structural(e) => e.kind(),
        }
    }

    /// True when the failure came from the budget monitor.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, StepFailure::BudgetExhausted { .. })
    }
}

/// A failure attributed to a point in a run.
///
/// `token` is `None` for failures that precede step execution (level
/// building, `before_pipeline`, `before_level`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub token: Option<StepToken>,
    pub failure: StepFailure,
}

impl RunFailure {
    pub fn for_step(token: StepToken, failure: StepFailure) -> Self {
        Self {
            token: Some(token),
            failure,
        }
    }

    pub fn for_run(failure: StepFailure) -> Self {
        Self {
            token: None,
            failure,
        }
    }
}
