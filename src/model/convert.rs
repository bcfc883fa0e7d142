// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Conversions between the neutral model and pipeline definitions.
//!
//! `materialize` turns a model into something the runner can execute:
//! every node's `stepRef` is resolved through the registry to a token and
//! a fresh step instance, and id-based edges become token-based edges.
//! `lift` is the inverse: tokens map back to their registry names, which
//! become node ids.
//!
//! Round-trip law: for a model whose nodes are all tasks, whose `stepRef`s
//! are all registered, and whose edges all resolve,
//! `materialize` ∘ `lift` is the identity on definitions and
//! `lift` ∘ `materialize` is the identity on models up to within-level
//! reordering.

use std::collections::HashMap;

use crate::definition::{PipelineDefinition, StepMetadata, StepToken};
use crate::errors::ModelError;
use crate::model::{StepRegistry, WorkflowModel, WorkflowNode};

/// Conventional `config` key under which node-level step metadata rides.
pub const METADATA_CONFIG_KEY: &str = "metadata";

/// Materialize a model into a runnable definition.
///
/// Metadata precedence per node: the conventional `config.metadata`
/// location wins; otherwise the registration's default metadata applies;
/// otherwise the entry carries none.
pub fn materialize(
    model: &WorkflowModel,
    registry: &StepRegistry,
) -> Result<PipelineDefinition, ModelError> {
    let mut token_by_id: HashMap<&str, StepToken> = HashMap::new();
    for node in &model.nodes {
        let step_ref = node
            .step_ref
            .as_deref()
            .ok_or_else(|| ModelError::MissingStepRef {
                node: node.id.clone(),
            })?;
        let registered = registry.resolve(step_ref)?;
        token_by_id.insert(node.id.as_str(), registered.token);
    }

    let mut definition = PipelineDefinition::new();
    for node in &model.nodes {
        // Resolution is repeated rather than cached; registries are maps
        // and nodes are few compared to executions.
        let step_ref = node.step_ref.as_deref().unwrap_or_default();
        let registered = registry.resolve(step_ref)?;

        let mut depends_on = Vec::with_capacity(node.depends_on.len());
        for dep in &node.depends_on {
            let token =
                token_by_id
                    .get(dep.as_str())
                    .ok_or_else(|| ModelError::UnknownDependency {
                        node: node.id.clone(),
                        dependency: dep.clone(),
                    })?;
            depends_on.push(*token);
        }

        let metadata = node_metadata(node)?.or(registered.metadata);
        definition.insert(registered.token, registered.instantiate(), depends_on, metadata);
    }

    Ok(definition)
}

/// Lift a definition back into the neutral model. Every token must map
/// back to a registry name; edges become id references; `entryIds` is
/// populated from the entries with no predecessors.
pub fn lift(
    definition: &PipelineDefinition,
    registry: &StepRegistry,
) -> Result<WorkflowModel, ModelError> {
    let mut nodes = Vec::with_capacity(definition.len());
    let mut entry_ids = Vec::new();

    for entry in definition.entries() {
        let name = registry.name_of(entry.token)?;

        let mut depends_on = Vec::with_capacity(entry.depends_on.len());
        for dep in &entry.depends_on {
            depends_on.push(registry.name_of(*dep)?.to_string());
        }

        let mut node = WorkflowNode::task(name, name);
        node.depends_on = depends_on;
        if let Some(metadata) = &entry.metadata {
            let value = serde_json::to_value(metadata).map_err(|e| {
                ModelError::InvalidMetadata {
                    node: name.to_string(),
                    message: e.to_string(),
                }
            })?;
            node.config.insert(METADATA_CONFIG_KEY.to_string(), value);
        }

        if node.depends_on.is_empty() {
            entry_ids.push(node.id.clone());
        }
        nodes.push(node);
    }

    Ok(WorkflowModel::with_entries(nodes, entry_ids))
}

/// Read step metadata from the conventional `config.metadata` location.
fn node_metadata(node: &WorkflowNode) -> Result<Option<StepMetadata>, ModelError> {
    match node.config.get(METADATA_CONFIG_KEY) {
        None => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ModelError::InvalidMetadata {
                node: node.id.clone(),
                message: e.to_string(),
            }),
    }
}
