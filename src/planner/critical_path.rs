// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Critical-path analysis over the neutral model.
//!
//! The critical path is the entry-to-sink path maximizing total
//! pessimistic (p99) time, with ties broken by larger optimistic (p50)
//! time and then by smaller node id. Per-node timings come from the
//! supplied metadata map, defaulting to p50 = 1000ms and p99 = 2 × p50.
//!
//! Nodes are processed in the model's deterministic topological order, so
//! the longest-distance pair for a node is computed only after all of its
//! predecessors; the path is reconstructed by backtracking predecessor
//! choices from the best sink.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::definition::StepMetadata;
use crate::errors::{GraphError, PlanError};
use crate::model::WorkflowModel;

/// Accumulated optimistic/pessimistic duration of a path, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathTiming {
    pub optimistic_ms: u64,
    pub pessimistic_ms: u64,
}

/// The longest pessimistic entry-to-sink path through a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPath {
    pub node_ids: Vec<String>,
    pub timing: PathTiming,
}

#[derive(Debug, Clone)]
struct Distance {
    optimistic_ms: u64,
    pessimistic_ms: u64,
    predecessor: Option<String>,
}

/// Resolved `(p50, p99)` for a node, with the contract defaults.
pub(crate) fn node_timing(metadata: &HashMap<String, StepMetadata>, id: &str) -> (u64, u64) {
    metadata
        .get(id)
        .map(|m| m.timing.resolved())
        .unwrap_or_else(|| StepMetadata::default().timing.resolved())
}

/// Compute the critical path of `model` under `metadata` timings.
pub fn critical_path(
    model: &WorkflowModel,
    metadata: &HashMap<String, StepMetadata>,
) -> Result<CriticalPath, PlanError> {
    let has_entry = model.nodes.iter().any(|n| n.depends_on.is_empty());
    if !has_entry {
        return Err(PlanError::NoEntries);
    }

    let order = model.topological_order().map_err(|e| match e {
        GraphError::Cycle { unresolved } => PlanError::Cyclic { unresolved },
        other => PlanError::Cyclic {
            unresolved: vec![other.to_string()],
        },
    })?;

    let mut distances: HashMap<String, Distance> = HashMap::new();
    for node in &order {
        let (own_opt, own_pess) = node_timing(metadata, &node.id);

        let mut best: Option<(&str, &Distance)> = None;
        for dep in &node.depends_on {
            if let Some(candidate) = distances.get(dep.as_str()) {
                best = Some(match best {
                    None => (dep.as_str(), candidate),
                    Some((best_id, incumbent)) => {
                        if prefer(candidate, dep, incumbent, best_id) {
                            (dep.as_str(), candidate)
                        } else {
                            (best_id, incumbent)
                        }
                    }
                });
            }
        }

        let distance = match best {
            None => Distance {
                optimistic_ms: own_opt,
                pessimistic_ms: own_pess,
                predecessor: None,
            },
            Some((pred_id, pred)) => Distance {
                optimistic_ms: pred.optimistic_ms + own_opt,
                pessimistic_ms: pred.pessimistic_ms + own_pess,
                predecessor: Some(pred_id.to_string()),
            },
        };
        distances.insert(node.id.clone(), distance);
    }

    let successors = model.successors();
    let mut best_sink: Option<(&str, &Distance)> = None;
    for node in &order {
        let is_sink = successors
            .get(node.id.as_str())
            .map(|s| s.is_empty())
            .unwrap_or(true);
        if !is_sink {
            continue;
        }
        let distance = &distances[&node.id];
        best_sink = Some(match best_sink {
            None => (node.id.as_str(), distance),
            Some((best_id, incumbent)) => {
                if prefer(distance, &node.id, incumbent, best_id) {
                    (node.id.as_str(), distance)
                } else {
                    (best_id, incumbent)
                }
            }
        });
    }

    let (sink_id, sink_distance) = best_sink.ok_or(PlanError::NoEntries)?;

    let mut node_ids = vec![sink_id.to_string()];
    let mut cursor = sink_distance.predecessor.clone();
    while let Some(id) = cursor {
        cursor = distances[&id].predecessor.clone();
        node_ids.push(id);
    }
    node_ids.reverse();

    Ok(CriticalPath {
        node_ids,
        timing: PathTiming {
            optimistic_ms: sink_distance.optimistic_ms,
            pessimistic_ms: sink_distance.pessimistic_ms,
        },
    })
}

/// True when `candidate` beats `incumbent`: larger pessimistic time, then
/// larger optimistic time, then smaller id.
fn prefer(candidate: &Distance, candidate_id: &str, incumbent: &Distance, incumbent_id: &str) -> bool {
    (
        candidate.pessimistic_ms,
        candidate.optimistic_ms,
        std::cmp::Reverse(candidate_id),
    ) > (
        incumbent.pessimistic_ms,
        incumbent.optimistic_ms,
        std::cmp::Reverse(incumbent_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowNode;

    fn timings(entries: &[(&str, u64, u64)]) -> HashMap<String, StepMetadata> {
        entries
            .iter()
            .map(|(id, p50, p99)| (id.to_string(), StepMetadata::with_timing(*p50, *p99)))
            .collect()
    }

    #[test]
    fn linear_chain_sums_timings() {
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a"),
            WorkflowNode::task("b", "b").with_dependencies(&["a"]),
            WorkflowNode::task("c", "c").with_dependencies(&["b"]),
        ]);
        let metadata = timings(&[("a", 10, 100), ("b", 20, 200), ("c", 30, 300)]);

        let path = critical_path(&model, &metadata).unwrap();
        assert_eq!(path.node_ids, vec!["a", "b", "c"]);
        assert_eq!(path.timing.optimistic_ms, 60);
        assert_eq!(path.timing.pessimistic_ms, 600);
    }

    #[test]
    fn diamond_follows_the_slower_branch() {
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a"),
            WorkflowNode::task("fast", "fast").with_dependencies(&["a"]),
            WorkflowNode::task("slow", "slow").with_dependencies(&["a"]),
            WorkflowNode::task("d", "d").with_dependencies(&["fast", "slow"]),
        ]);
        let metadata = timings(&[
            ("a", 10, 100),
            ("fast", 5, 50),
            ("slow", 50, 500),
            ("d", 10, 100),
        ]);

        let path = critical_path(&model, &metadata).unwrap();
        assert_eq!(path.node_ids, vec!["a", "slow", "d"]);
        assert_eq!(path.timing.pessimistic_ms, 700);
    }

    #[test]
    fn pessimistic_tie_breaks_on_optimistic_then_id() {
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a"),
            WorkflowNode::task("left", "left").with_dependencies(&["a"]),
            WorkflowNode::task("right", "right").with_dependencies(&["a"]),
            WorkflowNode::task("z", "z").with_dependencies(&["left", "right"]),
        ]);
        // Equal p99, larger p50 on `right` wins the tie.
        let metadata = timings(&[
            ("a", 10, 100),
            ("left", 5, 300),
            ("right", 40, 300),
            ("z", 10, 100),
        ]);

        let path = critical_path(&model, &metadata).unwrap();
        assert_eq!(path.node_ids, vec!["a", "right", "z"]);
    }

    #[test]
    fn full_timing_tie_breaks_on_smaller_id() {
        // Both branches carry identical p50 and p99, so the predecessor
        // choice at `z` comes down to the id alone.
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a"),
            WorkflowNode::task("left", "left").with_dependencies(&["a"]),
            WorkflowNode::task("right", "right").with_dependencies(&["a"]),
            WorkflowNode::task("z", "z").with_dependencies(&["left", "right"]),
        ]);
        let metadata = timings(&[
            ("a", 10, 100),
            ("left", 20, 300),
            ("right", 20, 300),
            ("z", 10, 100),
        ]);

        let path = critical_path(&model, &metadata).unwrap();
        assert_eq!(path.node_ids, vec!["a", "left", "z"]);
    }

    #[test]
    fn sink_selection_tie_breaks_on_smaller_id() {
        // Two sinks with identical path sums; the smaller id is the sink
        // the path is reconstructed from.
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a"),
            WorkflowNode::task("s1", "s1").with_dependencies(&["a"]),
            WorkflowNode::task("s2", "s2").with_dependencies(&["a"]),
        ]);
        let metadata = timings(&[("a", 10, 100), ("s1", 20, 300), ("s2", 20, 300)]);

        let path = critical_path(&model, &metadata).unwrap();
        assert_eq!(path.node_ids, vec!["a", "s1"]);
        assert_eq!(path.timing.optimistic_ms, 30);
        assert_eq!(path.timing.pessimistic_ms, 400);
    }

    #[test]
    fn defaults_apply_when_metadata_is_absent() {
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a"),
            WorkflowNode::task("b", "b").with_dependencies(&["a"]),
        ]);
        let path = critical_path(&model, &HashMap::new()).unwrap();
        assert_eq!(path.timing.optimistic_ms, 2_000);
        assert_eq!(path.timing.pessimistic_ms, 4_000);
    }

    #[test]
    fn no_entries_is_an_error() {
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("a", "a").with_dependencies(&["b"]),
            WorkflowNode::task("b", "b").with_dependencies(&["a"]),
        ]);
        let err = critical_path(&model, &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), "no-entries");
    }

    #[test]
    fn serializes_with_stable_names() {
        let path = CriticalPath {
            node_ids: vec!["a".into()],
            timing: PathTiming {
                optimistic_ms: 1,
                pessimistic_ms: 2,
            },
        };
        let value = serde_json::to_value(&path).unwrap();
        assert_eq!(value["nodeIds"][0], "a");
        assert_eq!(value["timing"]["optimisticMs"], 1);
        assert_eq!(value["timing"]["pessimisticMs"], 2);
    }
}
