// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fatal errors raised by the dialect adapters.
//!
//! Non-fatal diagnostics (downgrades, dropped elements) are never errors;
//! adapters return those as [`crate::adapters::AdapterWarning`] values
//! alongside their result.

use thiserror::Error;

/// Fatal import/export errors for all dialect adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The blob is not parseable as the expected dialect at all.
    #[error("invalid {dialect} document: {message}")]
    InvalidDialect { dialect: &'static str, message: String },

    /// A recognized document whose content violates the dialect schema.
    #[error("schema violation at '{element}': {message}")]
    SchemaViolation { element: String, message: String },

    /// The requested scenario name is absent from a scenario document.
    #[error("scenario '{scenario}' not found")]
    ScenarioNotFound { scenario: String },

    /// The model contains a construct this dialect refuses to export.
    #[error("cannot export '{element}': {reason}")]
    UnsupportedExport { element: String, reason: String },
}

impl AdapterError {
    /// Stable surface name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::InvalidDialect { .. } => "invalid-dialect",
            AdapterError::SchemaViolation { .. } => "schema-violation",
            AdapterError::ScenarioNotFound { .. } => "scenario-not-found",
            AdapterError::UnsupportedExport { .. } => "invalid-dialect",
        }
    }
}
