// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The neutral intermediate workflow model.
//!
//! Every dialect adapter imports into and exports from this model, and the
//! registry materializes it into runnable definitions. It is deliberately
//! small: nodes with string ids, four kinds, id-based `dependsOn` edges
//! with set semantics, an optional registry reference, and an opaque
//! `config` map that preserves dialect-specific richness verbatim for
//! round-trips. Dialect extensions ride in `config`; there are no parallel
//! class trees per dialect.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GraphError;

/// The closed set of node kinds the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Task,
    Pass,
    Choice,
    Parallel,
}

/// One node of the neutral model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: String,
    pub kind: NodeKind,
    /// Ids of nodes this node depends on. Set semantics: order carries no
    /// meaning, duplicates carry no meaning.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Registry key used to materialize this node into a step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_ref: Option<String>,
    /// Opaque dialect payload, preserved verbatim for round-trips.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            depends_on: Vec::new(),
            step_ref: None,
            config: Map::new(),
        }
    }

    /// Shorthand for a task node with a registry reference.
    pub fn task(id: impl Into<String>, step_ref: impl Into<String>) -> Self {
        let mut node = Self::new(id, NodeKind::Task);
        node.step_ref = Some(step_ref.into());
        node
    }

    pub fn with_dependencies(mut self, depends_on: &[&str]) -> Self {
        self.depends_on = depends_on.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_config_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// An adapter-independent DAG of workflow nodes.
///
/// # Examples
///
/// ## Building a diamond and inspecting its shape
/// ```
/// use virta::model::{WorkflowModel, WorkflowNode};
///
/// // fetch → [price, stock] → commit
/// let model = WorkflowModel::new(vec![
///     WorkflowNode::task("fetch", "fetchOrder"),
///     WorkflowNode::task("price", "priceOrder").with_dependencies(&["fetch"]),
///     WorkflowNode::task("stock", "checkStock").with_dependencies(&["fetch"]),
///     WorkflowNode::task("commit", "commitOrder").with_dependencies(&["price", "stock"]),
/// ]);
///
/// assert_eq!(model.entries(), vec!["fetch"]);
///
/// let order: Vec<&str> = model
///     .topological_order()
///     .unwrap()
///     .iter()
///     .map(|n| n.id.as_str())
///     .collect();
/// assert_eq!(order, vec!["fetch", "price", "stock", "commit"]);
/// ```
///
/// ## Cycle detection
/// ```
/// use virta::model::{WorkflowModel, WorkflowNode};
///
/// let cyclic = WorkflowModel::new(vec![
///     WorkflowNode::task("a", "a").with_dependencies(&["b"]),
///     WorkflowNode::task("b", "b").with_dependencies(&["a"]),
/// ]);
///
/// assert!(cyclic.topological_order().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowModel {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    /// Explicit entry override. When absent, the entries are the nodes
    /// with no dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_ids: Option<Vec<String>>,
}

impl WorkflowModel {
    pub fn new(nodes: Vec<WorkflowNode>) -> Self {
        Self {
            nodes,
            entry_ids: None,
        }
    }

    pub fn with_entries(nodes: Vec<WorkflowNode>, entry_ids: Vec<String>) -> Self {
        Self {
            nodes,
            entry_ids: Some(entry_ids),
        }
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Effective entry ids: the explicit override when present, otherwise
    /// the nodes with no dependencies, in node order.
    pub fn entries(&self) -> Vec<String> {
        match &self.entry_ids {
            Some(ids) => ids.clone(),
            None => self
                .nodes
                .iter()
                .filter(|n| n.depends_on.is_empty())
                .map(|n| n.id.clone())
                .collect(),
        }
    }

    /// Forward adjacency: node id → ids of nodes that depend on it.
    pub fn successors(&self) -> HashMap<&str, Vec<&str>> {
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            successors.entry(node.id.as_str()).or_default();
        }
        for node in &self.nodes {
            for dep in &node.depends_on {
                let dependents = successors.entry(dep.as_str()).or_default();
                // dependsOn has set semantics; a repeated id is one edge.
                if !dependents.contains(&node.id.as_str()) {
                    dependents.push(node.id.as_str());
                }
            }
        }
        successors
    }

    /// Kahn's algorithm with a lexicographic tie-break: among the ready
    /// nodes, the smallest id goes first. Adapters rely on this for
    /// byte-stable export ordering; the planner relies on it for
    /// deterministic longest-path processing.
    pub fn topological_order(&self) -> Result<Vec<&WorkflowNode>, GraphError> {
        let by_id: HashMap<&str, &WorkflowNode> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            let known_deps = node
                .depends_on
                .iter()
                .filter(|d| by_id.contains_key(d.as_str()))
                .collect::<HashSet<_>>()
                .len();
            in_degree.insert(node.id.as_str(), known_deps);
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        ready.sort_unstable();

        let successors = self.successors();
        let mut order = Vec::with_capacity(self.nodes.len());

        while !ready.is_empty() {
            let id = ready.remove(0);
            order.push(by_id[id]);

            if let Some(dependents) = successors.get(id) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            match ready.binary_search(dependent) {
                                Ok(_) => {}
                                Err(pos) => ready.insert(pos, *dependent),
                            }
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let placed: HashSet<&str> = order.iter().map(|n| n.id.as_str()).collect();
            let unresolved = self
                .nodes
                .iter()
                .filter(|n| !placed.contains(n.id.as_str()))
                .map(|n| n.id.clone())
                .collect();
            return Err(GraphError::Cycle { unresolved });
        }

        Ok(order)
    }

    /// The induced subgraph over `ids`: kept nodes in model order, with
    /// dependency edges into the dropped set removed (the caller is
    /// responsible for having satisfied them). Entry ids are recomputed.
    pub fn restricted_to(&self, ids: &HashSet<String>) -> WorkflowModel {
        let nodes = self
            .nodes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .map(|n| {
                let mut node = n.clone();
                node.depends_on.retain(|d| ids.contains(d));
                node
            })
            .collect();
        WorkflowModel::new(nodes)
    }
}
