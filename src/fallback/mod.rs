// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod monitor;
mod runner;

pub use monitor::{BudgetMonitor, MonitoredHooks, DEFAULT_WARNING_FRACTION};
pub use runner::{FallbackConfig, FallbackRunner, InProcessBackend, RunMode};
