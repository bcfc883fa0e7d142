// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod adapter;
mod execution;
mod graph;
mod model;
mod planner;

pub use adapter::AdapterError;
pub use execution::{RunFailure, StepFailure};
pub use graph::GraphError;
pub use model::ModelError;
pub use planner::PlanError;
