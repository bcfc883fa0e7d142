// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-step retry, composed at registration time.
//!
//! Retry is a wrapper around a step, not a runner feature: the runner sees
//! a retried step as a single logical execution. The wrapper catches a
//! failure, consults its policy, backs off, and re-invokes the inner step
//! against the same shared context. Budget-exhausted failures are never
//! retried; retrying against a spent budget only burns more of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::definition::PipelineContext;
use crate::errors::StepFailure;
use crate::traits::Step;

/// Attempt and backoff policy for [`RetryStep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1` (zero-based failed attempt).
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        self.initial_backoff.mul_f64(factor.max(0.0))
    }
}

/// A step wrapper that re-invokes its inner step per a [`RetryPolicy`].
pub struct RetryStep {
    inner: Arc<dyn Step>,
    policy: RetryPolicy,
}

impl RetryStep {
    pub fn new(inner: Arc<dyn Step>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn with_defaults(inner: Arc<dyn Step>) -> Self {
        Self::new(inner, RetryPolicy::default())
    }
}

#[async_trait]
impl Step for RetryStep {
    async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_failure = None;

        for attempt in 0..attempts {
            match self.inner.execute(ctx).await {
                Ok(()) => return Ok(()),
                Err(failure) => {
                    if failure.is_budget_exhausted() {
                        return Err(failure);
                    }
                    last_failure = Some(failure);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.policy.backoff_for(attempt)).await;
                    }
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| StepFailure::message("retry exhausted")))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
