// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! State-machine JSON dialect adapter.
//!
//! The dialect is a `StartAt` + `States` document where each state chains
//! to others through `Next`, `Choices[].Next`, `Default`,
//! `Branches[].StartAt`, and `Catch[].Next`. Import inverts every such
//! transition `s → t` into `s ∈ dependsOn(t)`; the `StartAt` root is
//! always an entry and further entries are inferred from states with no
//! predecessors.
//!
//! Export walks the model and re-emits transitions from the graph. A
//! task or pass node with several successors cannot say so with a single
//! `Next`, so it is promoted: the node keeps its own state and gains a
//! synthetic parallel state (marked `SyntheticFanOut`) whose branches
//! each start at one successor. Import collapses marked states back into
//! direct edges, which keeps model → blob → model exact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::adapters::{AdapterWarning, DowngradeKind};
use crate::errors::AdapterError;
use crate::model::{NodeKind, WorkflowModel, WorkflowNode};

const DIALECT: &str = "state-machine";

/// Marker carried by synthetic fan-out states so import can undo the
/// promotion.
const SYNTHETIC_FANOUT_KEY: &str = "SyntheticFanOut";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateMachineDocument {
    #[serde(rename = "StartAt")]
    start_at: String,
    #[serde(rename = "States")]
    states: BTreeMap<String, StateDefinition>,
    #[serde(rename = "Comment", default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(
        rename = "TimeoutSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateDefinition {
    #[serde(rename = "Type")]
    state_type: String,
    #[serde(rename = "Next", default, skip_serializing_if = "Option::is_none")]
    next: Option<String>,
    #[serde(rename = "End", default, skip_serializing_if = "Option::is_none")]
    end: Option<bool>,
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    resource: Option<String>,
    #[serde(rename = "Default", default, skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(rename = "Choices", default, skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<Value>>,
    #[serde(rename = "Branches", default, skip_serializing_if = "Option::is_none")]
    branches: Option<Vec<Value>>,
    #[serde(rename = "Catch", default, skip_serializing_if = "Option::is_none")]
    catch: Option<Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl StateDefinition {
    /// Every state name this state transitions to.
    fn transition_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        if let Some(next) = &self.next {
            targets.push(next.as_str());
        }
        if let Some(choices) = &self.choices {
            for choice in choices {
                if let Some(next) = choice.get("Next").and_then(Value::as_str) {
                    targets.push(next);
                }
            }
        }
        if let Some(default) = &self.default {
            targets.push(default.as_str());
        }
        if let Some(branches) = &self.branches {
            for branch in branches {
                if let Some(start) = branch.get("StartAt").and_then(Value::as_str) {
                    targets.push(start);
                }
            }
        }
        if let Some(catchers) = &self.catch {
            for catcher in catchers {
                if let Some(next) = catcher.get("Next").and_then(Value::as_str) {
                    targets.push(next);
                }
            }
        }
        targets
    }
}

/// Import a state-machine document into the neutral model.
pub fn import(blob: &str) -> Result<(WorkflowModel, Vec<AdapterWarning>), AdapterError> {
    let doc: StateMachineDocument =
        serde_json::from_str(blob).map_err(|e| AdapterError::InvalidDialect {
            dialect: DIALECT,
            message: e.to_string(),
        })?;

    let mut warnings = Vec::new();
    if doc.comment.is_some() || doc.version.is_some() || doc.timeout_seconds.is_some() {
        warnings.push(AdapterWarning::new(
            &doc.start_at,
            DowngradeKind::MetadataDropped,
            "document-level Comment/Version/TimeoutSeconds have no model slot",
        ));
    }

    // BTreeMap iteration keeps node emission lexicographic and stable.
    let mut kept: BTreeMap<String, WorkflowNode> = BTreeMap::new();
    for (name, state) in &doc.states {
        let (kind, canonical_type) = match state.state_type.as_str() {
            "Task" => (NodeKind::Task, "Task"),
            "Pass" => (NodeKind::Pass, "Pass"),
            "Choice" => (NodeKind::Choice, "Choice"),
            "Parallel" => (NodeKind::Parallel, "Parallel"),
            "Map" | "Wait" | "Succeed" | "Fail" => {
                warnings.push(AdapterWarning::new(
                    name,
                    DowngradeKind::UnsupportedKind,
                    format!("{} state downgraded to task", state.state_type),
                ));
                (NodeKind::Task, "Task")
            }
            other => {
                warnings.push(AdapterWarning::new(
                    name,
                    DowngradeKind::DroppedElement,
                    format!("unrecognized state type '{other}'"),
                ));
                continue;
            }
        };

        let mut node = WorkflowNode::new(name.clone(), kind);
        node.step_ref = Some(resolve_step_ref(name, state, kind));
        node.config = preserved_config(state, canonical_type);
        kept.insert(name.clone(), node);
    }

    for (name, state) in &doc.states {
        if !kept.contains_key(name) {
            continue;
        }
        for target in state.transition_targets() {
            if !doc.states.contains_key(target) {
                return Err(AdapterError::SchemaViolation {
                    element: name.clone(),
                    message: format!("transition to unknown state '{target}'"),
                });
            }
            if let Some(node) = kept.get_mut(target) {
                if !node.depends_on.iter().any(|d| d == name) {
                    node.depends_on.push(name.clone());
                }
            }
        }
    }

    let mut nodes: Vec<WorkflowNode> = kept.into_values().collect();
    for node in &mut nodes {
        node.depends_on.sort_unstable();
    }
    collapse_synthetic_fanouts(&mut nodes);

    let mut entry_ids = Vec::new();
    if nodes.iter().any(|n| n.id == doc.start_at) {
        entry_ids.push(doc.start_at.clone());
    }
    for node in &nodes {
        if node.depends_on.is_empty() && !entry_ids.contains(&node.id) {
            entry_ids.push(node.id.clone());
        }
    }

    Ok((WorkflowModel::with_entries(nodes, entry_ids), warnings))
}

/// Export the neutral model as a state-machine document.
pub fn export(model: &WorkflowModel) -> Result<(String, Vec<AdapterWarning>), AdapterError> {
    let mut warnings = Vec::new();

    let order = model
        .topological_order()
        .map_err(|e| AdapterError::InvalidDialect {
            dialect: DIALECT,
            message: e.to_string(),
        })?;

    let entries = model.entries();
    let start_at = entries
        .first()
        .cloned()
        .ok_or_else(|| AdapterError::UnsupportedExport {
            element: "States".to_string(),
            reason: "model has no entry node".to_string(),
        })?;

    let successor_map = model.successors();
    let mut states: BTreeMap<String, StateDefinition> = BTreeMap::new();

    for node in order {
        let mut successors: Vec<&str> = successor_map
            .get(node.id.as_str())
            .map(|s| s.to_vec())
            .unwrap_or_default();
        successors.sort_unstable();

        match node.kind {
            NodeKind::Task | NodeKind::Pass => {
                let canonical = if node.kind == NodeKind::Task { "Task" } else { "Pass" };
                let mut state = base_state(node, canonical);
                match successors.len() {
                    0 => state.end = Some(true),
                    1 => state.next = Some(successors[0].to_string()),
                    _ => {
                        let fanout_id = format!("{}.fanout", node.id);
                        state.next = Some(fanout_id.clone());
                        states.insert(fanout_id, synthetic_fanout(&successors));
                    }
                }
                states.insert(node.id.clone(), state);
            }
            NodeKind::Choice => {
                let mut state = base_state(node, "Choice");
                if state.choices.is_none() {
                    state.choices = Some(
                        successors
                            .iter()
                            .map(|s| json!({ "Next": s }))
                            .collect(),
                    );
                }
                states.insert(node.id.clone(), state);
            }
            NodeKind::Parallel => {
                let mut state = base_state(node, "Parallel");
                if state.branches.is_none() {
                    state.branches = Some(
                        successors
                            .iter()
                            .map(|s| json!({ "StartAt": s }))
                            .collect(),
                    );
                    state.end = Some(true);
                } else {
                    let branch_starts: Vec<&str> = state
                        .branches
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|b| b.get("StartAt").and_then(Value::as_str))
                        .collect();
                    let mut leftover: Vec<&str> = successors
                        .iter()
                        .copied()
                        .filter(|s| !branch_starts.contains(s))
                        .collect();
                    match leftover.len() {
                        0 => state.end = Some(true),
                        1 => state.next = Some(leftover[0].to_string()),
                        _ => {
                            warnings.push(AdapterWarning::new(
                                &node.id,
                                DowngradeKind::AmbiguousFanOut,
                                "parallel state has several successors outside its branches; only the first becomes Next",
                            ));
                            leftover.sort_unstable();
                            state.next = Some(leftover[0].to_string());
                        }
                    }
                }
                states.insert(node.id.clone(), state);
            }
        }
    }

    let doc = StateMachineDocument {
        start_at,
        states,
        comment: None,
        version: None,
        timeout_seconds: None,
    };

    let blob = serde_json::to_string_pretty(&doc).map_err(|e| AdapterError::InvalidDialect {
        dialect: DIALECT,
        message: e.to_string(),
    })?;
    Ok((blob, warnings))
}

/// `stepRef` extraction: ARN-shaped `…:function:NAME` / `…:activity:NAME`
/// resources yield `NAME`; non-ARN resources are taken literally; anything
/// else falls back to the state name.
fn resolve_step_ref(name: &str, state: &StateDefinition, kind: NodeKind) -> String {
    if kind != NodeKind::Task {
        return name.to_string();
    }
    match state.resource.as_deref() {
        None => name.to_string(),
        Some(resource) => {
            if resource.starts_with("arn:") {
                for marker in [":function:", ":activity:"] {
                    if let Some(idx) = resource.find(marker) {
                        let tail = &resource[idx + marker.len()..];
                        let extracted = tail.split(':').next().unwrap_or(tail);
                        if !extracted.is_empty() {
                            return extracted.to_string();
                        }
                    }
                }
                name.to_string()
            } else {
                resource.to_string()
            }
        }
    }
}

/// Everything a round-trip needs to re-emit the state, minus the pure
/// edge fields (`Next`, `End`) which export recomputes from the graph.
fn preserved_config(state: &StateDefinition, canonical_type: &str) -> Map<String, Value> {
    let mut config = Map::new();
    if state.state_type != canonical_type {
        config.insert("Type".to_string(), json!(state.state_type));
    }
    if let Some(resource) = &state.resource {
        config.insert("Resource".to_string(), json!(resource));
    }
    if let Some(choices) = &state.choices {
        config.insert("Choices".to_string(), Value::Array(choices.clone()));
    }
    if let Some(default) = &state.default {
        config.insert("Default".to_string(), json!(default));
    }
    if let Some(branches) = &state.branches {
        config.insert("Branches".to_string(), Value::Array(branches.clone()));
    }
    if let Some(catchers) = &state.catch {
        config.insert("Catch".to_string(), Value::Array(catchers.clone()));
    }
    for (key, value) in &state.extra {
        config.insert(key.clone(), value.clone());
    }
    config
}

/// Rebuild a state from a node's kind and preserved config.
fn base_state(node: &WorkflowNode, canonical_type: &str) -> StateDefinition {
    let mut state = StateDefinition {
        state_type: canonical_type.to_string(),
        ..Default::default()
    };
    for (key, value) in &node.config {
        match key.as_str() {
            "Type" => {
                if let Some(original) = value.as_str() {
                    state.state_type = original.to_string();
                }
            }
            "Resource" => state.resource = value.as_str().map(str::to_string),
            "Choices" => state.choices = value.as_array().cloned(),
            "Default" => state.default = value.as_str().map(str::to_string),
            "Branches" => state.branches = value.as_array().cloned(),
            "Catch" => state.catch = value.as_array().cloned(),
            _ => {
                state.extra.insert(key.clone(), value.clone());
            }
        }
    }
    state
}

fn synthetic_fanout(successors: &[&str]) -> StateDefinition {
    let mut state = StateDefinition {
        state_type: "Parallel".to_string(),
        end: Some(true),
        branches: Some(
            successors
                .iter()
                .map(|s| json!({ "StartAt": s }))
                .collect(),
        ),
        ..Default::default()
    };
    state
        .extra
        .insert(SYNTHETIC_FANOUT_KEY.to_string(), Value::Bool(true));
    state
}

/// Undo export's fan-out promotion: replace each marked parallel node by
/// direct predecessor → successor edges.
fn collapse_synthetic_fanouts(nodes: &mut Vec<WorkflowNode>) {
    let synthetic: Vec<String> = nodes
        .iter()
        .filter(|n| {
            n.kind == NodeKind::Parallel
                && n.config.get(SYNTHETIC_FANOUT_KEY) == Some(&Value::Bool(true))
        })
        .map(|n| n.id.clone())
        .collect();

    for synthetic_id in synthetic {
        let predecessors: Vec<String> = nodes
            .iter()
            .find(|n| n.id == synthetic_id)
            .map(|n| n.depends_on.clone())
            .unwrap_or_default();

        for node in nodes.iter_mut() {
            if node.depends_on.iter().any(|d| d == &synthetic_id) {
                node.depends_on.retain(|d| d != &synthetic_id);
                for pred in &predecessors {
                    if !node.depends_on.contains(pred) {
                        node.depends_on.push(pred.clone());
                    }
                }
                node.depends_on.sort_unstable();
            }
        }
        nodes.retain(|n| n.id != synthetic_id);
    }
}
