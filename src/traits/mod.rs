// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backend;
pub mod hooks;
pub mod step;

pub use backend::OrchestratedBackend;
pub use hooks::{NoopHooks, PipelineHooks};
pub use step::Step;
