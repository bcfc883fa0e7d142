// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod retry;
pub mod stub;

pub use retry::{RetryPolicy, RetryStep};
pub use stub::{FailingStep, RecordingStep, SleepStep, StopStep, StubStep};
