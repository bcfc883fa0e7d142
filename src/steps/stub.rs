// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stub step implementations for exercising the runner and the fallback
//! chain without real workloads.
//!
//! # Available Stubs
//!
//! * [`StubStep`] — always succeeds immediately; validates DAG structure
//!   and dependency resolution.
//! * [`FailingStep`] — always fails with a fixed message; validates error
//!   capture and terminal semantics.
//! * [`StopStep`] — sets the context stop flag; validates graceful-stop
//!   semantics.
//! * [`SleepStep`] — sleeps for a fixed duration; validates intra-level
//!   concurrency and budget behavior.
//! * [`RecordingStep`] — writes a field into the target accumulator;
//!   validates the per-field-owner write convention and hybrid handoff.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::PipelineContext;
use crate::errors::StepFailure;
use crate::traits::Step;

/// A no-op step that always succeeds.
pub struct StubStep {
    pub id: String,
}

impl StubStep {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Step for StubStep {
    async fn execute(&self, _ctx: &PipelineContext) -> Result<(), StepFailure> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// A step that always fails with the configured message.
pub struct FailingStep {
    pub message: String,
}

impl FailingStep {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Step for FailingStep {
    async fn execute(&self, _ctx: &PipelineContext) -> Result<(), StepFailure> {
        Err(StepFailure::message(self.message.clone()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// A step that requests a graceful stop and succeeds.
pub struct StopStep;

#[async_trait]
impl Step for StopStep {
    async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
        ctx.request_stop();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

/// A step that sleeps for a fixed duration, cooperating with cancellation.
pub struct SleepStep {
    pub duration: Duration,
}

impl SleepStep {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Step for SleepStep {
    async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
        tokio::select! {
            _ = tokio::time::sleep(self.duration) => Ok(()),
            _ = ctx.cancellation().cancelled() => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "sleep"
    }
}

/// A step that writes `value` under `key` in the target accumulator.
///
/// Concurrent recording steps in one level must use distinct keys; that is
/// the caller's field-disjointness contract, not something the runner
/// checks.
pub struct RecordingStep {
    pub key: String,
    pub value: Value,
}

impl RecordingStep {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[async_trait]
impl Step for RecordingStep {
    async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
        let key = self.key.clone();
        let value = self.value.clone();
        ctx.update_target(move |target| {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            target[&key] = value;
        })
        .await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stub_succeeds_and_failing_fails() {
        let ctx = PipelineContext::new(Value::Null);
        assert!(StubStep::new("s").execute(&ctx).await.is_ok());

        let err = FailingStep::new("boom").execute(&ctx).await.unwrap_err();
        assert_eq!(err, StepFailure::message("boom"));
    }

    #[tokio::test]
    async fn stop_step_sets_the_flag() {
        let ctx = PipelineContext::new(Value::Null);
        StopStep.execute(&ctx).await.unwrap();
        assert!(ctx.stop_requested());
    }

    #[tokio::test]
    async fn recording_step_writes_its_field() {
        let ctx = PipelineContext::new(Value::Null);
        RecordingStep::new("validated", json!(true))
            .execute(&ctx)
            .await
            .unwrap();
        assert_eq!(ctx.target().await, json!({"validated": true}));
    }

    #[tokio::test]
    async fn sleep_step_honors_cancellation() {
        let ctx = PipelineContext::new(Value::Null);
        ctx.cancellation().cancel();
        let started = std::time::Instant::now();
        SleepStep::new(Duration::from_secs(5)).execute(&ctx).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
