// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod critical_path;
mod mode;

pub use critical_path::{critical_path, CriticalPath, PathTiming};
pub use mode::{hybrid_split, plan, ExecutionMode, ExecutionPlan, HybridSplit, PlanConfig};
