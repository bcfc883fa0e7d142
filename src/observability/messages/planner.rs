// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for planner decisions and fallback transitions.

use std::fmt::{Display, Formatter};

use tracing::Span;

use crate::observability::messages::StructuredLog;

/// The mode selector settled on an execution mode.
pub struct ModeSelected {
    pub mode: &'static str,
    pub pessimistic_ms: u64,
    pub safe_budget_ms: u64,
}

impl Display for ModeSelected {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Planner selected '{}' mode (critical path p99 {}ms, safe budget {}ms)",
            self.mode, self.pessimistic_ms, self.safe_budget_ms
        )
    }
}

impl StructuredLog for ModeSelected {
    fn log(&self) {
        tracing::info!(
            mode = self.mode,
            pessimistic_ms = self.pessimistic_ms,
            safe_budget_ms = self.safe_budget_ms,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "plan",
            span_name = name,
            mode = self.mode,
            pessimistic_ms = self.pessimistic_ms,
            safe_budget_ms = self.safe_budget_ms,
        )
    }
}

/// A budget-exhausted run triggered the next mode in the fallback chain.
pub struct FallbackTriggered {
    pub from: &'static str,
    pub to: &'static str,
}

impl Display for FallbackTriggered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Budget exhausted in '{}' mode; falling back to '{}'",
            self.from, self.to
        )
    }
}

impl StructuredLog for FallbackTriggered {
    fn log(&self) {
        tracing::warn!(from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("fallback", span_name = name, from = self.from, to = self.to)
    }
}
