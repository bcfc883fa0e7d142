// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared mutable context owned by a single pipeline run.
//!
//! The context carries the immutable `source` payload, the `target`
//! accumulator that steps progressively fill, the monotonic stop flag, and
//! the last failure observed. Steps in the same level share the context
//! concurrently; writes from level `i` happen-before reads in level `i+1`
//! because the runner joins every step before starting the next level.
//!
//! Intra-level steps that write `target` must write disjoint fields. The
//! runner does not enforce field disjointness and provides no per-field
//! lock; the level barrier is the only synchronization point. Integration
//! layers should establish a field-owner convention per step.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::errors::StepFailure;

/// Mutable run state shared by all steps of one pipeline execution.
pub struct PipelineContext {
    source: Value,
    target: Mutex<Value>,
    stop: AtomicBool,
    last_error: Mutex<Option<StepFailure>>,
    cancellation: CancellationToken,
}

impl PipelineContext {
    /// Create a context with an empty object accumulator.
    pub fn new(source: Value) -> Self {
        Self::with_target(source, Value::Object(Default::default()))
    }

    /// Create a context with an explicit initial accumulator. The hybrid
    /// execution path uses this to seed the orchestrated stage with the
    /// inline prefix's output.
    pub fn with_target(source: Value, target: Value) -> Self {
        Self {
            source,
            target: Mutex::new(target),
            stop: AtomicBool::new(false),
            last_error: Mutex::new(None),
            cancellation: CancellationToken::new(),
        }
    }

    /// The immutable input payload.
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Snapshot of the current accumulator.
    pub async fn target(&self) -> Value {
        self.target.lock().await.clone()
    }

    /// Apply a mutation to the accumulator under the context lock.
    pub async fn update_target<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut guard = self.target.lock().await;
        mutate(&mut guard);
    }

    /// Replace the accumulator wholesale.
    pub async fn set_target(&self, target: Value) {
        *self.target.lock().await = target;
    }

    /// Request a graceful stop. Once set, the flag never clears.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Record the most recent failure. The runner calls this for every
    /// failed step; steps may also record failures they recover from.
    pub async fn set_last_error(&self, failure: StepFailure) {
        *self.last_error.lock().await = Some(failure);
    }

    pub async fn last_error(&self) -> Option<StepFailure> {
        self.last_error.lock().await.clone()
    }

    /// Cooperative cancellation token. The runner never forcibly aborts an
    /// in-flight step; long-running steps may poll or await this token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("source", &self.source)
            .field("stop", &self.stop_requested())
            .finish_non_exhaustive()
    }
}
