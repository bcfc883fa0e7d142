// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The process-scoped step registry.
//!
//! The registry bridges the string-keyed external world (dialect
//! `stepRef`s) to the token-keyed scheduler: registering a name allocates
//! a construction token and records a factory for building fresh step
//! instances, plus optional default scheduling metadata. The reverse map
//! supports lifting definitions back into the neutral model.
//!
//! The registry's lifetime is independent of any definition: it is
//! read-only during runs and may be extended between runs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::{StepMetadata, StepToken};
use crate::errors::ModelError;
use crate::traits::Step;

/// Builds a fresh step instance per materialization.
pub type StepFactory = Arc<dyn Fn() -> Arc<dyn Step> + Send + Sync>;

/// A registered step: its token, its factory, and default metadata.
#[derive(Clone)]
pub struct RegisteredStep {
    pub token: StepToken,
    factory: StepFactory,
    pub metadata: Option<StepMetadata>,
}

impl std::fmt::Debug for RegisteredStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredStep")
            .field("token", &self.token)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl RegisteredStep {
    pub fn instantiate(&self) -> Arc<dyn Step> {
        (self.factory)()
    }
}

/// Name → token/factory/metadata map with reverse token lookup.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use virta::model::StepRegistry;
/// use virta::steps::StubStep;
/// use virta::traits::Step;
///
/// let mut registry = StepRegistry::new();
/// let token = registry
///     .register("validateOrder", Arc::new(|| {
///         Arc::new(StubStep::new("validate")) as Arc<dyn Step>
///     }))
///     .unwrap();
///
/// assert_eq!(registry.name_of(token).unwrap(), "validateOrder");
/// assert!(registry.resolve("validateOrder").is_ok());
/// assert!(registry.resolve("ghost").is_err());
/// ```
#[derive(Clone, Default)]
pub struct StepRegistry {
    by_name: HashMap<String, RegisteredStep>,
    name_by_token: HashMap<StepToken, String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under `name`, allocating its token.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: StepFactory,
    ) -> Result<StepToken, ModelError> {
        self.register_with_metadata(name, factory, None)
    }

    /// Register a step with default scheduling metadata.
    pub fn register_with_metadata(
        &mut self,
        name: impl Into<String>,
        factory: StepFactory,
        metadata: Option<StepMetadata>,
    ) -> Result<StepToken, ModelError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ModelError::DuplicateRegistration { name });
        }

        let token = StepToken::next();
        self.name_by_token.insert(token, name.clone());
        self.by_name.insert(
            name,
            RegisteredStep {
                token,
                factory,
                metadata,
            },
        );
        Ok(token)
    }

    /// Look a step up by name.
    pub fn resolve(&self, name: &str) -> Result<&RegisteredStep, ModelError> {
        self.by_name.get(name).ok_or_else(|| ModelError::UnknownStep {
            name: name.to_string(),
        })
    }

    /// Reverse lookup from a token to its registered name.
    pub fn name_of(&self, token: StepToken) -> Result<&str, ModelError> {
        self.name_by_token
            .get(&token)
            .map(|s| s.as_str())
            .ok_or(ModelError::UnregisteredToken { token })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("registered", &self.by_name.len())
            .finish_non_exhaustive()
    }
}
