// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod context;
mod metadata;
mod pipeline;

pub use context::PipelineContext;
pub use metadata::{Placement, StepMetadata, TimingEstimate};
pub use pipeline::{PipelineDefinition, StepEntry, StepToken};
