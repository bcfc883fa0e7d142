// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod convert;
mod loader;
mod node;
mod registry;
mod validation;

pub use convert::{lift, materialize, METADATA_CONFIG_KEY};
pub use loader::{load_and_validate_model, load_model, parse_model};
pub use node::{NodeKind, WorkflowModel, WorkflowNode};
pub use registry::{RegisteredStep, StepFactory, StepRegistry};
pub use validation::validate_model;
