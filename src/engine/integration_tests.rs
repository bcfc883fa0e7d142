// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end runner scenarios: linear success, graceful stop, error
//! capture, concurrent fan-out, hooks, and retry composition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::definition::{PipelineContext, PipelineDefinition, StepToken};
use crate::engine::{PipelineRunner, PipelineStatus};
use crate::errors::StepFailure;
use crate::steps::{FailingStep, RetryPolicy, RetryStep, SleepStep, StopStep, StubStep};
use crate::traits::{PipelineHooks, Step};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn linear_dag_success() {
    init_tracing();
    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));
    let b = definition.add_with_dependencies(Arc::new(StubStep::new("b")), &[a]);
    let c = definition.add_with_dependencies(Arc::new(StubStep::new("c")), &[b]);

    let runner = PipelineRunner::new(4);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;

    assert_eq!(result.status, PipelineStatus::Success);
    assert_eq!(result.executed, vec![a, b, c]);
    assert_eq!(result.completed_levels.len(), 3);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn stop_mid_pipeline_skips_later_levels() {
    init_tracing();
    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));
    let s = definition.add_with_dependencies(Arc::new(StopStep), &[a]);
    let c = definition.add_with_dependencies(Arc::new(StubStep::new("c")), &[s]);

    let runner = PipelineRunner::new(4);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;

    assert_eq!(result.status, PipelineStatus::Stopped);
    assert_eq!(result.executed, vec![a, s]);
    assert_eq!(result.completed_levels.len(), 2);
    assert!(!result.executed.contains(&c));
}

#[tokio::test]
async fn error_halts_progress_and_is_reported() {
    init_tracing();
    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));
    let f = definition.add_with_dependencies(Arc::new(FailingStep::new("boom")), &[a]);
    let c = definition.add_with_dependencies(Arc::new(StubStep::new("c")), &[f]);

    let runner = PipelineRunner::new(4);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;

    assert_eq!(result.status, PipelineStatus::Error);
    assert_eq!(result.executed, vec![a]);
    assert_eq!(result.completed_levels.len(), 2);
    assert!(!result.executed.contains(&c));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].token, Some(f));
    assert_eq!(result.errors[0].failure, StepFailure::message("boom"));
}

#[tokio::test]
async fn parallel_fan_out_runs_concurrently() {
    init_tracing();
    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));
    let b = definition.add_with_dependencies(
        Arc::new(SleepStep::new(Duration::from_millis(50))),
        &[a],
    );
    let c = definition.add_with_dependencies(
        Arc::new(SleepStep::new(Duration::from_millis(50))),
        &[a],
    );
    let d = definition.add_with_dependencies(Arc::new(StubStep::new("d")), &[b, c]);

    let runner = PipelineRunner::new(4);
    let started = Instant::now();
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, PipelineStatus::Success);
    assert_eq!(result.executed.len(), 4);
    assert_eq!(*result.executed.first().unwrap(), a);
    assert_eq!(*result.executed.last().unwrap(), d);
    // Both sleepers share one level, so wall time stays well under the
    // 100ms a sequential execution would need.
    assert!(
        elapsed < Duration::from_millis(120),
        "fan-out took {elapsed:?}"
    );
}

#[tokio::test]
async fn level_writes_are_visible_to_the_next_level() {
    init_tracing();

    struct WriteStep;

    #[async_trait]
    impl Step for WriteStep {
        async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
            ctx.update_target(|t| t["written"] = json!(true)).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "write"
        }
    }

    struct ReadStep;

    #[async_trait]
    impl Step for ReadStep {
        async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
            let target = ctx.target().await;
            if target["written"] != json!(true) {
                return Err(StepFailure::message("earlier level's write not visible"));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "read"
        }
    }

    let mut definition = PipelineDefinition::new();
    let w = definition.add(Arc::new(WriteStep));
    definition.add_with_dependencies(Arc::new(ReadStep), &[w]);

    let runner = PipelineRunner::new(4);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;
    assert_eq!(result.status, PipelineStatus::Success);
}

#[tokio::test]
async fn hooks_observe_the_full_lifecycle() {
    init_tracing();

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PipelineHooks for RecordingHooks {
        async fn before_pipeline(&self, _ctx: &PipelineContext) -> Result<(), StepFailure> {
            self.events.lock().await.push("before_pipeline".into());
            Ok(())
        }

        async fn before_level(
            &self,
            level: &[StepToken],
            _ctx: &PipelineContext,
        ) -> Result<(), StepFailure> {
            self.events
                .lock()
                .await
                .push(format!("before_level({})", level.len()));
            Ok(())
        }

        async fn before_step(
            &self,
            _token: StepToken,
            _ctx: &PipelineContext,
        ) -> Result<(), StepFailure> {
            self.events.lock().await.push("before_step".into());
            Ok(())
        }

        async fn after_step(&self, _token: StepToken, _ctx: &PipelineContext) {
            self.events.lock().await.push("after_step".into());
        }

        async fn on_step_error(
            &self,
            _token: StepToken,
            _failure: &StepFailure,
            _ctx: &PipelineContext,
        ) {
            self.events.lock().await.push("on_step_error".into());
        }

        async fn after_level(&self, _level: &[StepToken], _ctx: &PipelineContext) {
            self.events.lock().await.push("after_level".into());
        }

        async fn after_pipeline(&self, _result: &crate::engine::PipelineResult) {
            self.events.lock().await.push("after_pipeline".into());
        }
    }

    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));
    definition.add_with_dependencies(Arc::new(FailingStep::new("boom")), &[a]);

    let hooks = Arc::new(RecordingHooks::default());
    let runner = PipelineRunner::new(1);
    let result = runner
        .run_with_hooks(
            &definition,
            PipelineContext::new(Value::Null),
            hooks.clone(),
        )
        .await;

    assert_eq!(result.status, PipelineStatus::Error);
    let events = hooks.events.lock().await.clone();
    assert_eq!(
        events,
        vec![
            "before_pipeline",
            "before_level(1)",
            "before_step",
            "after_step",
            "after_level",
            "before_level(1)",
            "before_step",
            "on_step_error",
            "after_level",
            "after_pipeline",
        ]
    );
}

#[tokio::test]
async fn before_step_hook_failure_counts_as_step_failure() {
    init_tracing();

    struct RejectingHooks;

    #[async_trait]
    impl PipelineHooks for RejectingHooks {
        async fn before_step(
            &self,
            _token: StepToken,
            _ctx: &PipelineContext,
        ) -> Result<(), StepFailure> {
            Err(StepFailure::BudgetExhausted { remaining_ms: 0 })
        }
    }

    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));

    let runner = PipelineRunner::new(1);
    let result = runner
        .run_with_hooks(
            &definition,
            PipelineContext::new(Value::Null),
            Arc::new(RejectingHooks),
        )
        .await;

    assert_eq!(result.status, PipelineStatus::Error);
    assert!(result.is_budget_exhausted());
    assert_eq!(result.errors[0].token, Some(a));
    assert!(result.executed.is_empty());
    // The level was awaited, so it still counts as completed.
    assert_eq!(result.completed_levels.len(), 1);
}

#[tokio::test]
async fn retry_wrapped_step_is_one_logical_execution() {
    init_tracing();

    struct SecondTryStep {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Step for SecondTryStep {
        async fn execute(&self, _ctx: &PipelineContext) -> Result<(), StepFailure> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StepFailure::message("first attempt fails"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "second_try"
        }
    }

    let inner = Arc::new(SecondTryStep {
        calls: AtomicUsize::new(0),
    });
    let mut definition = PipelineDefinition::new();
    let token = definition.add(Arc::new(RetryStep::new(
        inner.clone(),
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            backoff_multiplier: 1.0,
        },
    )));

    let runner = PipelineRunner::new(1);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;

    // Two inner attempts, one executed step, no recorded errors.
    assert_eq!(result.status, PipelineStatus::Success);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.executed, vec![token]);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn recorded_last_error_halts_without_a_raise() {
    init_tracing();

    struct QuietFailureStep;

    #[async_trait]
    impl Step for QuietFailureStep {
        async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
            ctx.set_last_error(StepFailure::message("recorded, not raised"))
                .await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "quiet_failure"
        }
    }

    let mut definition = PipelineDefinition::new();
    let q = definition.add(Arc::new(QuietFailureStep));
    let c = definition.add_with_dependencies(Arc::new(StubStep::new("c")), &[q]);

    let runner = PipelineRunner::new(2);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;

    // The step completed, but once lastError is set no further level starts.
    assert_eq!(result.status, PipelineStatus::Error);
    assert_eq!(result.executed, vec![q]);
    assert!(!result.executed.contains(&c));
    assert_eq!(result.completed_levels.len(), 1);
    assert_eq!(
        result.errors[0].failure,
        StepFailure::message("recorded, not raised")
    );
}

#[tokio::test]
async fn executed_counts_match_completed_level_membership() {
    init_tracing();
    let mut definition = PipelineDefinition::new();
    let a = definition.add(Arc::new(StubStep::new("a")));
    let b = definition.add(Arc::new(StubStep::new("b")));
    let f = definition.add_with_dependencies(Arc::new(FailingStep::new("boom")), &[a]);
    let g = definition.add_with_dependencies(Arc::new(StubStep::new("g")), &[b]);
    definition.add_with_dependencies(Arc::new(StubStep::new("tail")), &[f, g]);

    let runner = PipelineRunner::new(4);
    let result = runner
        .run(&definition, PipelineContext::new(Value::Null))
        .await;

    assert_eq!(result.status, PipelineStatus::Error);
    assert!(result.executed.contains(&g));

    // Everything that was part of an awaited level is accounted for:
    // executed steps plus failed steps equal the level memberships.
    let awaited: usize = result.completed_levels.iter().map(|l| l.len()).sum();
    assert_eq!(result.executed.len() + result.errors.len(), awaited);
}
