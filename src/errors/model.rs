// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by the step registry and by conversions between the
//! neutral workflow model and pipeline definitions.

use thiserror::Error;

use crate::definition::StepToken;

/// Registry and model-conversion errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A step name is not present in the registry.
    #[error("step '{name}' is not registered")]
    UnknownStep { name: String },

    /// A node references a dependency id that is not part of the model.
    #[error("node '{node}' depends on '{dependency}' which does not exist")]
    UnknownDependency { node: String, dependency: String },

    /// A registry name was registered twice.
    #[error("step '{name}' is already registered")]
    DuplicateRegistration { name: String },

    /// A definition token has no registry name to lift back to.
    #[error("token {token} is not registered under any name")]
    UnregisteredToken { token: StepToken },

    /// The conventional `config.metadata` location held something that is
    /// not step metadata.
    #[error("node '{node}' carries malformed step metadata: {message}")]
    InvalidMetadata { node: String, message: String },

    /// A node lacks the `stepRef` required to materialize it.
    #[error("node '{node}' has no stepRef to resolve")]
    MissingStepRef { node: String },
}

impl ModelError {
    /// Stable surface name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::UnknownStep { .. } | ModelError::MissingStepRef { .. } => "unknown-step",
            ModelError::UnknownDependency { .. } => "unknown-dependency",
            ModelError::DuplicateRegistration { .. } => "duplicate-registration",
            ModelError::UnregisteredToken { .. } => "unregistered-token",
            ModelError::InvalidMetadata { .. } => "schema-violation",
        }
    }
}
