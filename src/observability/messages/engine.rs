// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for runner lifecycle and execution events.

use std::fmt::{Display, Formatter};

use tracing::Span;

use crate::observability::messages::StructuredLog;

/// A pipeline run started.
pub struct PipelineStarted {
    pub step_count: usize,
    pub level_count: usize,
    pub max_concurrency: usize,
}

impl Display for PipelineStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting pipeline: {} steps across {} levels, max_concurrency={}",
            self.step_count, self.level_count, self.max_concurrency
        )
    }
}

impl StructuredLog for PipelineStarted {
    fn log(&self) {
        tracing::info!(
            step_count = self.step_count,
            level_count = self.level_count,
            max_concurrency = self.max_concurrency,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline",
            span_name = name,
            step_count = self.step_count,
            level_count = self.level_count,
            max_concurrency = self.max_concurrency,
        )
    }
}

/// A pipeline run reached a terminal status.
pub struct PipelineCompleted {
    pub status: &'static str,
    pub executed_count: usize,
    pub completed_levels: usize,
}

impl Display for PipelineCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline finished with status '{}': {} steps executed, {} levels completed",
            self.status, self.executed_count, self.completed_levels
        )
    }
}

impl StructuredLog for PipelineCompleted {
    fn log(&self) {
        tracing::info!(
            status = self.status,
            executed_count = self.executed_count,
            completed_levels = self.completed_levels,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_completed",
            span_name = name,
            status = self.status,
            executed_count = self.executed_count,
            completed_levels = self.completed_levels,
        )
    }
}

/// A step (or a before-step hook) failed.
pub struct StepFailed<'a> {
    pub token: &'a str,
    pub kind: &'a str,
    pub error: &'a str,
}

impl Display for StepFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Step {} failed ({}): {}", self.token, self.kind, self.error)
    }
}

impl StructuredLog for StepFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            token = self.token,
            kind = self.kind,
            error = self.error,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "step_failed",
            span_name = name,
            token = self.token,
            kind = self.kind,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_their_fields() {
        let started = PipelineStarted {
            step_count: 4,
            level_count: 3,
            max_concurrency: 2,
        };
        assert_eq!(
            started.to_string(),
            "Starting pipeline: 4 steps across 3 levels, max_concurrency=2"
        );

        let failed = StepFailed {
            token: "step#7",
            kind: "step-failure",
            error: "boom",
        };
        assert!(failed.to_string().contains("step#7"));
        assert!(failed.to_string().contains("boom"));
    }
}
