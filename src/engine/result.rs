// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured results of a pipeline run.

use std::sync::Arc;

use crate::definition::{PipelineContext, StepToken};
use crate::errors::RunFailure;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Every level completed, no step raised, no step requested a stop.
    Success,
    /// A step requested a stop and none raised before that.
    Stopped,
    /// At least one step (or hook) raised.
    Error,
}

/// The structured outcome of one pipeline execution.
///
/// * `executed` lists successful steps in completion order. Within a level
///   that order is scheduling-dependent; across levels it respects level
///   order.
/// * `completed_levels` records every level that was fully awaited,
///   including the level that produced the terminal condition.
/// * `errors` carries captured execution failures; structural failures
///   (level building) appear here with no token attached.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub context: Arc<PipelineContext>,
    pub errors: Vec<RunFailure>,
    pub executed: Vec<StepToken>,
    pub completed_levels: Vec<Vec<StepToken>>,
}

impl PipelineStatus {
    /// Stable lowercase label used in logs and planner output.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Success => "success",
            PipelineStatus::Stopped => "stopped",
            PipelineStatus::Error => "error",
        }
    }
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }

    /// True when the run terminated because the wall-clock budget ran out.
    /// The fallback runner keys its mode chain off this predicate.
    pub fn is_budget_exhausted(&self) -> bool {
        self.errors.iter().any(|e| e.failure.is_budget_exhausted())
    }
}
