// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Optional per-step scheduling metadata.
//!
//! Metadata never changes what a step does; it informs the planner where a
//! step may run and how long it is expected to take. It travels with
//! registry entries, with definition entries, and through the conventional
//! `config.metadata` location on neutral-model nodes so that dialect
//! round-trips preserve it.

use serde::{Deserialize, Serialize};

/// Default optimistic estimate when none is supplied, in milliseconds.
pub const DEFAULT_P50_MS: u64 = 1_000;

/// Where a step is allowed to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    /// Must run in the caller's worker pool.
    #[serde(rename = "inline-only")]
    InlineOnly,
    /// Must run on the orchestrated service.
    #[serde(rename = "orchestrated-only")]
    OrchestratedOnly,
    /// The planner may place it anywhere.
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

/// Optimistic (p50) and pessimistic (p99) duration estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingEstimate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99_ms: Option<u64>,
}

impl TimingEstimate {
    pub fn new(p50_ms: u64, p99_ms: u64) -> Self {
        Self {
            p50_ms: Some(p50_ms),
            p99_ms: Some(p99_ms),
        }
    }

    /// Resolve to concrete `(p50, p99)` values, applying the defaults:
    /// p50 = 1000ms, p99 = 2 × p50.
    pub fn resolved(&self) -> (u64, u64) {
        let p50 = self.p50_ms.unwrap_or(DEFAULT_P50_MS);
        let p99 = self.p99_ms.unwrap_or(p50.saturating_mul(2));
        (p50, p99)
    }
}

/// Per-step scheduling metadata: placement constraint plus timing estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepMetadata {
    pub placement: Placement,
    pub timing: TimingEstimate,
}

impl StepMetadata {
    pub fn with_timing(p50_ms: u64, p99_ms: u64) -> Self {
        Self {
            placement: Placement::Auto,
            timing: TimingEstimate::new(p50_ms, p99_ms),
        }
    }

    pub fn with_placement(placement: Placement) -> Self {
        Self {
            placement,
            timing: TimingEstimate::default(),
        }
    }
}
