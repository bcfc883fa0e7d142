// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural errors raised while building execution levels from a graph.
//!
//! These cover the three definition invariants: identity uniqueness,
//! dependency resolution, and acyclicity. All variants carry enough context
//! to identify the offending element by its display form, so the same type
//! serves both token-keyed definitions and string-keyed neutral models.

use thiserror::Error;

/// Errors detected while leveling or validating a dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No remaining element has all of its dependencies satisfied.
    #[error("cyclic dependency detected among: {}", unresolved.join(", "))]
    Cycle {
        /// Elements that could not be placed into any level.
        unresolved: Vec<String>,
    },

    /// An element references a dependency that is not part of the graph.
    #[error("'{element}' depends on '{dependency}' which does not exist")]
    UnknownDependency { element: String, dependency: String },

    /// An element identity appears more than once.
    #[error("duplicate registration of '{element}'")]
    DuplicateRegistration { element: String },
}

impl GraphError {
    /// Stable surface name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::Cycle { .. } => "cycle",
            GraphError::UnknownDependency { .. } => "unknown-dependency",
            GraphError::DuplicateRegistration { .. } => "duplicate-registration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_use_surface_names() {
        let cycle = GraphError::Cycle {
            unresolved: vec!["a".into(), "b".into()],
        };
        assert_eq!(cycle.kind(), "cycle");
        assert!(cycle.to_string().contains("a, b"));

        let unknown = GraphError::UnknownDependency {
            element: "b".into(),
            dependency: "ghost".into(),
        };
        assert_eq!(unknown.kind(), "unknown-dependency");
        assert!(unknown.to_string().contains("ghost"));

        let dup = GraphError::DuplicateRegistration { element: "a".into() };
        assert_eq!(dup.kind(), "duplicate-registration");
    }
}
