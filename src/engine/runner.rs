// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Level-synchronous parallel pipeline runner.
//!
//! The runner executes levels sequentially and the steps within a level
//! concurrently, as spawned tasks behind a semaphore. A level is a join
//! barrier: every step in it is awaited (success or failure) before the
//! runner inspects terminal conditions. This gives the ordering guarantee
//! steps rely on — writes from level `i` happen-before reads in level
//! `i+1` — while leaving intra-level order unspecified.
//!
//! Terminal semantics, decided at each level boundary:
//!
//! 1. any captured failure ⇒ `status = error`, no further levels start;
//! 2. otherwise, a requested stop ⇒ `status = stopped`;
//! 3. otherwise, advance to the next level.
//!
//! The runner never forcibly aborts an in-flight step. Cancellation is
//! cooperative via the context token, and budget enforcement arrives from
//! the outside through hook failures.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::definition::{PipelineContext, PipelineDefinition, StepEntry, StepToken};
use crate::engine::leveler::build_levels;
use crate::engine::{PipelineResult, PipelineStatus};
use crate::errors::{RunFailure, StepFailure};
use crate::observability::messages::engine::{PipelineCompleted, PipelineStarted, StepFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::{NoopHooks, PipelineHooks};

/// Executes pipeline definitions level by level.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use virta::definition::{PipelineContext, PipelineDefinition};
/// use virta::engine::{PipelineRunner, PipelineStatus};
/// use virta::steps::RecordingStep;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut definition = PipelineDefinition::new();
/// definition.add(Arc::new(RecordingStep::new("greeting", json!("hello"))));
///
/// let runner = PipelineRunner::new(2);
/// let result = runner.run(&definition, PipelineContext::new(json!({}))).await;
///
/// assert_eq!(result.status, PipelineStatus::Success);
/// assert_eq!(result.context.target().await, json!({"greeting": "hello"}));
/// # }
/// ```
pub struct PipelineRunner {
    /// Maximum number of concurrently executing steps within a level.
    max_concurrency: usize,
}

impl PipelineRunner {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Concurrency limit from available parallelism, falling back to 4.
    pub fn with_default_concurrency() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(concurrency)
    }

    /// Run a definition with no hooks.
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        ctx: PipelineContext,
    ) -> PipelineResult {
        self.run_with_hooks(definition, ctx, Arc::new(NoopHooks)).await
    }

    /// Run a definition, emitting lifecycle events through `hooks`.
    pub async fn run_with_hooks(
        &self,
        definition: &PipelineDefinition,
        ctx: PipelineContext,
        hooks: Arc<dyn PipelineHooks>,
    ) -> PipelineResult {
        let ctx = Arc::new(ctx);

        let levels = match build_levels(definition) {
            Ok(levels) => levels,
            Err(graph_error) => {
                let result = PipelineResult {
                    status: PipelineStatus::Error,
                    context: ctx,
                    errors: vec![RunFailure::for_run(StepFailure::Structural(graph_error))],
                    executed: Vec::new(),
                    completed_levels: Vec::new(),
                };
                hooks.after_pipeline(&result).await;
                return result;
            }
        };

        PipelineStarted {
            step_count: definition.len(),
            level_count: levels.len(),
            max_concurrency: self.max_concurrency,
        }
        .log();

        if let Err(failure) = hooks.before_pipeline(&ctx).await {
            ctx.set_last_error(failure.clone()).await;
            let result = PipelineResult {
                status: PipelineStatus::Error,
                context: ctx,
                errors: vec![RunFailure::for_run(failure)],
                executed: Vec::new(),
                completed_levels: Vec::new(),
            };
            hooks.after_pipeline(&result).await;
            return result;
        }

        let entry_index: HashMap<StepToken, &StepEntry> = definition
            .entries()
            .iter()
            .map(|entry| (entry.token, entry))
            .collect();

        let executed = Arc::new(Mutex::new(Vec::new()));
        let mut completed_levels: Vec<Vec<StepToken>> = Vec::new();
        let mut errors: Vec<RunFailure> = Vec::new();
        let mut status = PipelineStatus::Success;

        for level in &levels {
            if let Err(failure) = hooks.before_level(level, &ctx).await {
                ctx.set_last_error(failure.clone()).await;
                errors.push(RunFailure::for_run(failure));
                status = PipelineStatus::Error;
                break;
            }

            let level_failures = self
                .execute_level(level, &entry_index, &ctx, &hooks, &executed)
                .await;

            completed_levels.push(level.clone());
            hooks.after_level(level, &ctx).await;

            if !level_failures.is_empty() {
                errors.extend(level_failures);
                status = PipelineStatus::Error;
                break;
            }

            // A step may record a failure without raising it; once
            // lastError is set, no further level starts.
            if let Some(failure) = ctx.last_error().await {
                errors.push(RunFailure::for_run(failure));
                status = PipelineStatus::Error;
                break;
            }

            if ctx.stop_requested() {
                status = PipelineStatus::Stopped;
                break;
            }
        }

        let executed = executed.lock().await.clone();

        PipelineCompleted {
            status: status.label(),
            executed_count: executed.len(),
            completed_levels: completed_levels.len(),
        }
        .log();

        let result = PipelineResult {
            status,
            context: ctx,
            errors,
            executed,
            completed_levels,
        };
        hooks.after_pipeline(&result).await;
        result
    }

    /// Start every step of the level concurrently and await them all.
    /// Returns the failures captured while the level ran.
    async fn execute_level(
        &self,
        level: &[StepToken],
        entry_index: &HashMap<StepToken, &StepEntry>,
        ctx: &Arc<PipelineContext>,
        hooks: &Arc<dyn PipelineHooks>,
        executed: &Arc<Mutex<Vec<StepToken>>>,
    ) -> Vec<RunFailure> {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = Vec::new();

        for &token in level {
            let step = match entry_index.get(&token) {
                Some(entry) => entry.step.clone(),
                None => {
                    // Unreachable for levels produced by build_levels over
                    // the same definition; recorded rather than panicking.
                    failures.lock().await.push(RunFailure::for_step(
                        token,
                        StepFailure::message(format!("{token} is not part of the definition")),
                    ));
                    continue;
                }
            };

            let ctx = Arc::clone(ctx);
            let hooks = Arc::clone(hooks);
            let executed = Arc::clone(executed);
            let failures = Arc::clone(&failures);
            let semaphore = Arc::clone(&semaphore);

            tasks.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                if let Err(failure) = hooks.before_step(token, &ctx).await {
                    record_failure(&ctx, &hooks, &failures, token, failure).await;
                    return;
                }

                match step.execute(&ctx).await {
                    Ok(()) => {
                        executed.lock().await.push(token);
                        hooks.after_step(token, &ctx).await;
                    }
                    Err(failure) => {
                        record_failure(&ctx, &hooks, &failures, token, failure).await;
                    }
                }
            }));
        }

        for task in tasks {
            if let Err(join_error) = task.await {
                failures.lock().await.push(RunFailure::for_run(StepFailure::message(format!(
                    "step task join error: {join_error}"
                ))));
            }
        }

        let mut guard = failures.lock().await;
        std::mem::take(&mut *guard)
    }
}

async fn record_failure(
    ctx: &Arc<PipelineContext>,
    hooks: &Arc<dyn PipelineHooks>,
    failures: &Arc<Mutex<Vec<RunFailure>>>,
    token: StepToken,
    failure: StepFailure,
) {
    StepFailed {
        token: &token.to_string(),
        kind: failure.kind(),
        error: &failure.to_string(),
    }
    .log();

    ctx.set_last_error(failure.clone()).await;
    hooks.on_step_error(token, &failure, ctx).await;
    failures.lock().await.push(RunFailure::for_step(token, failure));
}
