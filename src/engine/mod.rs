// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod integration_tests;
mod leveler;
mod result;
mod runner;

pub use leveler::build_levels;
pub use result::{PipelineResult, PipelineStatus};
pub use runner::PipelineRunner;
