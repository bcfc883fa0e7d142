// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation for neutral workflow models.
//!
//! The validation pipeline runs three checks in a fixed order and reports
//! every violation it finds rather than stopping at the first:
//!
//! 1. **Uniqueness** — node ids appear at most once;
//! 2. **References** — every `dependsOn` id and every explicit entry id
//!    names an existing node;
//! 3. **Acyclicity** — the dependency graph admits a topological order.
//!
//! The ordering matters: cycle detection is only attempted over a
//! structurally valid graph, so reference validation must pass first.

use std::collections::HashSet;

use crate::errors::GraphError;
use crate::model::WorkflowModel;

/// Validate a model's structure, collecting all violations.
pub fn validate_model(model: &WorkflowModel) -> Result<(), Vec<GraphError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for node in &model.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(GraphError::DuplicateRegistration {
                element: node.id.clone(),
            });
        }
    }

    for node in &model.nodes {
        for dep in &node.depends_on {
            if !seen.contains(dep.as_str()) {
                errors.push(GraphError::UnknownDependency {
                    element: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    if let Some(entry_ids) = &model.entry_ids {
        for entry in entry_ids {
            if !seen.contains(entry.as_str()) {
                errors.push(GraphError::UnknownDependency {
                    element: "entryIds".to_string(),
                    dependency: entry.clone(),
                });
            }
        }
    }

    // Cycle detection only makes sense once references resolve.
    if errors.is_empty() {
        if let Err(cycle) = model.topological_order() {
            errors.push(cycle);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
