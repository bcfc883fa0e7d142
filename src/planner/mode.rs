// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution-mode selection.
//!
//! The selector weighs the pessimistic critical path against the caller's
//! wall-clock budget (shrunk by a safety margin) and chooses where the DAG
//! should run. The rules apply in order:
//!
//! 1. any `orchestrated-only` node forces orchestrated;
//! 2. a pessimistic path at or beyond the safe budget forces orchestrated;
//! 3. a path at or beyond 80% of the safe budget attempts a hybrid cut;
//! 4. otherwise the DAG runs inline.
//!
//! The hybrid cut walks the critical path accumulating pessimistic time:
//! nodes fit into the inline prefix while the prefix stays within 70% of
//! the safe budget; the remainder is the orchestrated suffix. Off-path
//! nodes follow their dependencies: a node is inline only if all of its
//! predecessors are. Placement hints play no part in off-path assignment.
//!
//! Every decision is recorded in `reasoning`, with the concrete threshold
//! values, so identical inputs yield identical plans — reasoning included.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::definition::{Placement, StepMetadata};
use crate::errors::PlanError;
use crate::model::WorkflowModel;
use crate::observability::messages::planner::ModeSelected;
use crate::observability::messages::StructuredLog;
use crate::planner::critical_path::{critical_path, node_timing, CriticalPath};

/// Default fraction of the budget held back as safety margin.
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.1;

/// Fraction of the safe budget at which hybrid execution is considered.
const HYBRID_CONSIDERATION_FRACTION: f64 = 0.8;

/// Fraction of the safe budget the inline prefix of a hybrid cut may use.
const INLINE_PREFIX_FRACTION: f64 = 0.7;

/// Where a planned DAG executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Inline,
    Hybrid,
    Orchestrated,
}

impl ExecutionMode {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::Inline => "inline",
            ExecutionMode::Hybrid => "hybrid",
            ExecutionMode::Orchestrated => "orchestrated",
        }
    }
}

/// Planner inputs beyond the model and metadata.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Wall-clock envelope for the whole run, in milliseconds.
    pub budget_ms: u64,
    /// When set, the selection rules are bypassed and this mode is planned
    /// directly.
    pub default_mode: Option<ExecutionMode>,
    /// Fraction of the budget held back; the rules compare against
    /// `budget × (1 − safety_margin)`.
    pub safety_margin: f64,
}

impl PlanConfig {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            budget_ms,
            default_mode: None,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    fn safe_budget_ms(&self) -> u64 {
        (self.budget_ms as f64 * (1.0 - self.safety_margin)).round() as u64
    }
}

/// A hybrid partition of the model's node ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridSplit {
    pub inline_nodes: Vec<String>,
    pub orchestrated_nodes: Vec<String>,
}

/// The planner's decision, serializable with the stable field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    pub critical_path: CriticalPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_nodes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrated_nodes: Option<Vec<String>>,
    pub reasoning: Vec<String>,
}

/// Choose an execution mode for `model` under `cfg`.
pub fn plan(
    model: &WorkflowModel,
    metadata: &HashMap<String, StepMetadata>,
    cfg: &PlanConfig,
) -> Result<ExecutionPlan, PlanError> {
    let path = critical_path(model, metadata)?;
    let safe_budget = cfg.safe_budget_ms();
    let pessimistic = path.timing.pessimistic_ms;

    let mut reasoning = vec![format!(
        "safe budget is {}ms ({}ms budget with {:.0}% safety margin)",
        safe_budget,
        cfg.budget_ms,
        cfg.safety_margin * 100.0
    )];

    if let Some(mode) = cfg.default_mode {
        reasoning.push(format!(
            "requested mode '{}' bypasses the selection rules",
            mode.label()
        ));
        let (inline_nodes, orchestrated_nodes) = match mode {
            ExecutionMode::Hybrid => {
                let split = cut_along_path(model, metadata, &path, safe_budget)
                    .ok_or(PlanError::NoCutFound)?;
                (Some(split.inline_nodes), Some(split.orchestrated_nodes))
            }
            _ => (None, None),
        };
        return Ok(finish(mode, path, inline_nodes, orchestrated_nodes, reasoning, safe_budget));
    }

    if let Some(pinned) = model.nodes.iter().find(|n| {
        metadata
            .get(&n.id)
            .map(|m| m.placement == Placement::OrchestratedOnly)
            .unwrap_or(false)
    }) {
        reasoning.push(format!(
            "node '{}' is orchestrated-only; the whole DAG runs orchestrated",
            pinned.id
        ));
        return Ok(finish(
            ExecutionMode::Orchestrated,
            path,
            None,
            None,
            reasoning,
            safe_budget,
        ));
    }

    if pessimistic >= safe_budget {
        reasoning.push(format!(
            "pessimistic critical path {}ms meets or exceeds safe budget {}ms",
            pessimistic, safe_budget
        ));
        return Ok(finish(
            ExecutionMode::Orchestrated,
            path,
            None,
            None,
            reasoning,
            safe_budget,
        ));
    }

    let hybrid_threshold = (safe_budget as f64 * HYBRID_CONSIDERATION_FRACTION).round() as u64;
    if pessimistic >= hybrid_threshold {
        reasoning.push(format!(
            "pessimistic critical path {}ms reaches the hybrid threshold {}ms (80% of safe budget)",
            pessimistic, hybrid_threshold
        ));
        if let Some(split) = cut_along_path(model, metadata, &path, safe_budget) {
            reasoning.push(format!(
                "hybrid cut keeps {} node(s) inline within the {}ms prefix limit (70% of safe budget)",
                split.inline_nodes.len(),
                (safe_budget as f64 * INLINE_PREFIX_FRACTION).round() as u64
            ));
            return Ok(finish(
                ExecutionMode::Hybrid,
                path,
                Some(split.inline_nodes),
                Some(split.orchestrated_nodes),
                reasoning,
                safe_budget,
            ));
        }
        reasoning.push("no valid hybrid cut point exists".to_string());
    }

    reasoning.push(format!(
        "pessimistic critical path {}ms fits within safe budget {}ms",
        pessimistic, safe_budget
    ));
    Ok(finish(
        ExecutionMode::Inline,
        path,
        None,
        None,
        reasoning,
        safe_budget,
    ))
}

/// Compute the hybrid partition for `model` under `cfg`, if one exists.
/// This is the entry point the fallback runner uses when it reaches the
/// hybrid link of its chain.
pub fn hybrid_split(
    model: &WorkflowModel,
    metadata: &HashMap<String, StepMetadata>,
    cfg: &PlanConfig,
) -> Result<Option<HybridSplit>, PlanError> {
    let path = critical_path(model, metadata)?;
    Ok(cut_along_path(model, metadata, &path, cfg.safe_budget_ms()))
}

fn finish(
    mode: ExecutionMode,
    critical_path: CriticalPath,
    inline_nodes: Option<Vec<String>>,
    orchestrated_nodes: Option<Vec<String>>,
    reasoning: Vec<String>,
    safe_budget: u64,
) -> ExecutionPlan {
    ModeSelected {
        mode: mode.label(),
        pessimistic_ms: critical_path.timing.pessimistic_ms,
        safe_budget_ms: safe_budget,
    }
    .log();

    ExecutionPlan {
        mode,
        critical_path,
        inline_nodes,
        orchestrated_nodes,
        reasoning,
    }
}

/// Walk the critical path accumulating pessimistic time to find the cut,
/// then assign off-path nodes by dependency.
fn cut_along_path(
    model: &WorkflowModel,
    metadata: &HashMap<String, StepMetadata>,
    path: &CriticalPath,
    safe_budget: u64,
) -> Option<HybridSplit> {
    let prefix_limit = (safe_budget as f64 * INLINE_PREFIX_FRACTION).round() as u64;

    let mut boundary = 0;
    let mut prefix_pess = 0u64;
    for id in &path.node_ids {
        let (_, pess) = node_timing(metadata, id);
        if prefix_pess + pess <= prefix_limit {
            prefix_pess += pess;
            boundary += 1;
        } else {
            break;
        }
    }

    // Both sides of the cut must be non-empty.
    if boundary == 0 || boundary == path.node_ids.len() {
        return None;
    }

    let mut inline: Vec<String> = path.node_ids[..boundary].to_vec();
    let mut orchestrated: Vec<String> = path.node_ids[boundary..].to_vec();

    let on_path: HashSet<&str> = path.node_ids.iter().map(|s| s.as_str()).collect();
    let mut inline_set: HashSet<String> = inline.iter().cloned().collect();

    let order = model.topological_order().ok()?;
    for node in order {
        if on_path.contains(node.id.as_str()) {
            continue;
        }
        if node.depends_on.iter().all(|d| inline_set.contains(d)) {
            inline_set.insert(node.id.clone());
            inline.push(node.id.clone());
        } else {
            orchestrated.push(node.id.clone());
        }
    }

    Some(HybridSplit {
        inline_nodes: inline,
        orchestrated_nodes: orchestrated,
    })
}
