// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by critical-path analysis and execution-mode planning.

use thiserror::Error;

/// Planner failure modes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Every node has at least one predecessor, so no path can start.
    #[error("model has no entry nodes")]
    NoEntries,

    /// A hybrid execution was requested but no valid cut point exists.
    #[error("no valid hybrid cut point found")]
    NoCutFound,

    /// The model is cyclic, so no longest path is defined.
    #[error("cyclic model; unresolved nodes: {}", unresolved.join(", "))]
    Cyclic { unresolved: Vec<String> },
}

impl PlanError {
    /// Stable surface name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::NoEntries => "no-entries",
            PlanError::NoCutFound => "no-cut-found",
            PlanError::Cyclic { .. } => "cycle",
        }
    }
}
