// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Topological leveling of pipeline definitions.
//!
//! The leveler converts a definition into an ordered list of levels of
//! mutually independent steps using Kahn-style wave expansion: a resolved
//! set grows one wave at a time, and each wave collects every remaining
//! step whose dependencies are already resolved. The guarantees:
//!
//! * every token of the definition appears in exactly one level;
//! * for every dependency edge `u → v`, `level(u) < level(v)`;
//! * no dependency edge connects two steps of the same level;
//! * within a level, tokens follow definition insertion order, so the
//!   output is deterministic for a given definition.
//!
//! This is also where the definition invariants are enforced: duplicate
//! tokens, dependencies on unregistered tokens, and cycles all surface
//! here, before anything executes.

use std::collections::HashSet;

use crate::definition::{PipelineDefinition, StepToken};
use crate::errors::GraphError;

/// Build execution levels for a definition.
///
/// Failure order: duplicates first, then unresolved references, then
/// cycles — cycle detection is only meaningful over a structurally valid
/// graph.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use virta::definition::PipelineDefinition;
/// use virta::engine::build_levels;
/// use virta::steps::StubStep;
///
/// let mut definition = PipelineDefinition::new();
/// let fetch = definition.add(Arc::new(StubStep::new("fetch")));
/// let price = definition.add_with_dependencies(Arc::new(StubStep::new("price")), &[fetch]);
/// let stock = definition.add_with_dependencies(Arc::new(StubStep::new("stock")), &[fetch]);
/// let commit = definition.add_with_dependencies(Arc::new(StubStep::new("commit")), &[price, stock]);
///
/// let levels = build_levels(&definition).unwrap();
/// assert_eq!(levels, vec![vec![fetch], vec![price, stock], vec![commit]]);
/// ```
pub fn build_levels(definition: &PipelineDefinition) -> Result<Vec<Vec<StepToken>>, GraphError> {
    let mut seen = HashSet::new();
    for entry in definition.entries() {
        if !seen.insert(entry.token) {
            return Err(GraphError::DuplicateRegistration {
                element: entry.token.to_string(),
            });
        }
    }

    for entry in definition.entries() {
        for dependency in &entry.depends_on {
            if !seen.contains(dependency) {
                return Err(GraphError::UnknownDependency {
                    element: entry.token.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }

    let mut levels = Vec::new();
    let mut resolved: HashSet<StepToken> = HashSet::new();

    while resolved.len() < definition.len() {
        // Insertion order within the wave keeps level contents deterministic.
        let wave: Vec<StepToken> = definition
            .entries()
            .iter()
            .filter(|entry| !resolved.contains(&entry.token))
            .filter(|entry| entry.depends_on.iter().all(|d| resolved.contains(d)))
            .map(|entry| entry.token)
            .collect();

        if wave.is_empty() {
            let unresolved = definition
                .entries()
                .iter()
                .filter(|entry| !resolved.contains(&entry.token))
                .map(|entry| entry.token.to_string())
                .collect();
            return Err(GraphError::Cycle { unresolved });
        }

        resolved.extend(wave.iter().copied());
        levels.push(wave);
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StubStep;
    use std::sync::Arc;

    fn stub() -> Arc<StubStep> {
        Arc::new(StubStep::new("test"))
    }

    #[test]
    fn empty_definition_has_no_levels() {
        let levels = build_levels(&PipelineDefinition::new()).unwrap();
        assert!(levels.is_empty());
    }

    #[test]
    fn linear_chain_levels_one_per_step() {
        let mut definition = PipelineDefinition::new();
        let a = definition.add(stub());
        let b = definition.add_with_dependencies(stub(), &[a]);
        let c = definition.add_with_dependencies(stub(), &[b]);

        let levels = build_levels(&definition).unwrap();
        assert_eq!(levels, vec![vec![a], vec![b], vec![c]]);
    }

    #[test]
    fn diamond_levels_fan_out_together() {
        let mut definition = PipelineDefinition::new();
        let a = definition.add(stub());
        let b = definition.add_with_dependencies(stub(), &[a]);
        let c = definition.add_with_dependencies(stub(), &[a]);
        let d = definition.add_with_dependencies(stub(), &[b, c]);

        let levels = build_levels(&definition).unwrap();
        assert_eq!(levels, vec![vec![a], vec![b, c], vec![d]]);
    }

    #[test]
    fn within_level_order_follows_insertion() {
        let mut definition = PipelineDefinition::new();
        let z = definition.add(stub());
        let a = definition.add(stub());
        let m = definition.add(stub());

        let levels = build_levels(&definition).unwrap();
        assert_eq!(levels, vec![vec![z, a, m]]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut definition = PipelineDefinition::new();
        let ghost = StepToken::next();
        definition.insert(StepToken::next(), stub(), vec![ghost], None);

        let err = build_levels(&definition).unwrap_err();
        assert_eq!(err.kind(), "unknown-dependency");
    }

    #[test]
    fn duplicate_token_is_rejected() {
        let mut definition = PipelineDefinition::new();
        let token = StepToken::next();
        definition.insert(token, stub(), vec![], None);
        definition.insert(token, stub(), vec![], None);

        let err = build_levels(&definition).unwrap_err();
        assert_eq!(err.kind(), "duplicate-registration");
    }

    #[test]
    fn cycle_is_rejected() {
        let mut definition = PipelineDefinition::new();
        let a = StepToken::next();
        let b = StepToken::next();
        definition.insert(a, stub(), vec![b], None);
        definition.insert(b, stub(), vec![a], None);

        let err = build_levels(&definition).unwrap_err();
        assert_eq!(err.kind(), "cycle");
    }

    #[test]
    fn every_token_appears_in_exactly_one_level() {
        let mut definition = PipelineDefinition::new();
        let a = definition.add(stub());
        let b = definition.add(stub());
        let c = definition.add_with_dependencies(stub(), &[a]);
        let d = definition.add_with_dependencies(stub(), &[a, b]);
        let e = definition.add_with_dependencies(stub(), &[c, d]);

        let levels = build_levels(&definition).unwrap();
        let mut all: Vec<StepToken> = levels.iter().flatten().copied().collect();
        all.sort();
        let mut expected = vec![a, b, c, d, e];
        expected.sort();
        assert_eq!(all, expected);

        // Every edge crosses a level boundary in the right direction.
        let level_of = |token: StepToken| {
            levels
                .iter()
                .position(|level| level.contains(&token))
                .unwrap()
        };
        for entry in definition.entries() {
            for dep in &entry.depends_on {
                assert!(level_of(*dep) < level_of(entry.token));
            }
        }
    }
}
