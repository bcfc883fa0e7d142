// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bidirectional adapters between the neutral model and external dialects.
//!
//! Every adapter exposes `import(blob) → (model, warnings)` and
//! `export(model, …) → (blob, warnings)` and follows a common discipline:
//!
//! * **Schema ignore list** — unrecognized fields are carried verbatim in
//!   node `config` and re-emitted on export.
//! * **Downgrade policy** — non-mappable constructs are dropped on import
//!   or refused on export, with a structured warning naming the element.
//!   Warnings are returned, never thrown and never logged.
//! * **Deterministic ordering** — emission follows a deterministic order
//!   (topological with lexicographic tie-break for sequences, sorted maps
//!   for keyed collections), so equal inputs produce byte-equal outputs.

pub mod process_xml;
pub mod scenario;
pub mod state_machine;

use serde::Serialize;

/// Why an element was downgraded or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DowngradeKind {
    /// The element has no counterpart and was removed entirely.
    DroppedElement,
    /// The element was mapped to a weaker kind.
    UnsupportedKind,
    /// Document-level metadata with no slot in the neutral model.
    MetadataDropped,
    /// A fan-out could not be represented exactly.
    AmbiguousFanOut,
}

/// Non-fatal structured diagnostic returned alongside adapter results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterWarning {
    pub element_id: String,
    pub kind: DowngradeKind,
    pub reason: String,
}

impl AdapterWarning {
    pub fn new(
        element_id: impl Into<String>,
        kind: DowngradeKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            kind,
            reason: reason.into(),
        }
    }
}
