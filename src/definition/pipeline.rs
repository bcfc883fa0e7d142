// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed pipeline definitions over opaque step tokens.
//!
//! A [`PipelineDefinition`] is an ordered sequence of registered steps.
//! Each entry carries a construction token (the step's only identity), the
//! step object, its dependency tokens, and optional scheduling metadata.
//! The definition itself performs no validation; the leveler detects
//! duplicate tokens, unknown dependencies, and cycles when levels are
//! built, so a malformed definition fails before anything executes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::definition::StepMetadata;
use crate::traits::Step;

/// Opaque step identity, unique within a process.
///
/// Tokens are the only key the scheduler understands: dependency edges and
/// result reporting are both token-keyed. String names exist solely in the
/// registry, which bridges string-keyed external dialects to tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepToken(u64);

impl StepToken {
    /// Allocate a fresh token from the process-wide counter.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StepToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step#{}", self.0)
    }
}

/// One registered step within a definition.
#[derive(Clone)]
pub struct StepEntry {
    pub token: StepToken,
    pub step: Arc<dyn Step>,
    pub depends_on: Vec<StepToken>,
    pub metadata: Option<StepMetadata>,
}

impl fmt::Debug for StepEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepEntry")
            .field("token", &self.token)
            .field("step", &self.step.name())
            .field("depends_on", &self.depends_on)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// An ordered sequence of registered steps forming a DAG by dependency.
///
/// Definitions are immutable during a run. Insertion order is significant:
/// the leveler uses it as the deterministic within-level ordering.
#[derive(Debug, Clone, Default)]
pub struct PipelineDefinition {
    entries: Vec<StepEntry>,
}

impl PipelineDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step with a fresh token and no dependencies.
    pub fn add(&mut self, step: Arc<dyn Step>) -> StepToken {
        self.add_with_dependencies(step, &[])
    }

    /// Register a step with a fresh token depending on earlier entries.
    pub fn add_with_dependencies(
        &mut self,
        step: Arc<dyn Step>,
        depends_on: &[StepToken],
    ) -> StepToken {
        self.add_with_metadata(step, depends_on, None)
    }

    /// Register a step with a fresh token, dependencies, and metadata.
    pub fn add_with_metadata(
        &mut self,
        step: Arc<dyn Step>,
        depends_on: &[StepToken],
        metadata: Option<StepMetadata>,
    ) -> StepToken {
        let token = StepToken::next();
        self.insert(token, step, depends_on.to_vec(), metadata);
        token
    }

    /// Register a step under a caller-supplied token. Conversions from the
    /// neutral model use this with registry-resolved tokens; inserting the
    /// same token twice is reported by the leveler, not here.
    pub fn insert(
        &mut self,
        token: StepToken,
        step: Arc<dyn Step>,
        depends_on: Vec<StepToken>,
        metadata: Option<StepMetadata>,
    ) {
        self.entries.push(StepEntry {
            token,
            step,
            depends_on,
            metadata,
        });
    }

    pub fn entries(&self) -> &[StepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, token: StepToken) -> Option<&StepEntry> {
        self.entries.iter().find(|e| e.token == token)
    }

    /// Tokens in insertion order.
    pub fn tokens(&self) -> impl Iterator<Item = StepToken> + '_ {
        self.entries.iter().map(|e| e.token)
    }

    pub fn metadata_for(&self, token: StepToken) -> Option<&StepMetadata> {
        self.entry(token).and_then(|e| e.metadata.as_ref())
    }
}
