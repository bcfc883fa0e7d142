// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wall-clock budget tracking for pipeline runs.
//!
//! A [`BudgetMonitor`] is created per run attempt with a budget in
//! milliseconds. It exposes the remaining time, a one-shot warning
//! callback fired asynchronously once elapsed time crosses the warning
//! fraction, and an exhaustion predicate. The monitor never interrupts a
//! step: its effect is synchronized at the hook boundary, where
//! [`MonitoredHooks`] raises a budget-exhausted failure from
//! `before_level`/`before_step` once the remaining time falls below a
//! small threshold. In-flight steps are never observed mid-execution
//! unless they cooperate via the context's cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::definition::{PipelineContext, StepToken};
use crate::errors::StepFailure;
use crate::traits::PipelineHooks;

/// Fraction of the budget at which the warning callback fires.
pub const DEFAULT_WARNING_FRACTION: f64 = 0.8;

/// Remaining time below which the budget counts as exhausted, in
/// milliseconds. Scheduling anything into a sliver this small only
/// guarantees it will overrun.
const EXHAUSTION_THRESHOLD_MS: u64 = 5;

/// Single-writer wall-clock budget tracker.
pub struct BudgetMonitor {
    started: Instant,
    budget: Duration,
    warning_fraction: f64,
    warning_fired: AtomicBool,
}

impl BudgetMonitor {
    pub fn new(budget_ms: u64) -> Self {
        Self::with_warning_fraction(budget_ms, DEFAULT_WARNING_FRACTION)
    }

    pub fn with_warning_fraction(budget_ms: u64, warning_fraction: f64) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_millis(budget_ms),
            warning_fraction: warning_fraction.clamp(0.0, 1.0),
            warning_fired: AtomicBool::new(false),
        }
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Remaining budget, saturating at zero once overrun.
    pub fn remaining_ms(&self) -> u64 {
        self.budget
            .saturating_sub(self.started.elapsed())
            .as_millis() as u64
    }

    /// True once the remaining time is too small to schedule anything.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_ms() < EXHAUSTION_THRESHOLD_MS
    }

    /// Register the one-shot warning callback. The callback runs on a
    /// spawned timer task the first time elapsed time reaches
    /// `warning_fraction × budget`; it fires at most once per monitor,
    /// regardless of how often it is registered.
    pub fn on_warning<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let warning_after = monitor.budget.mul_f64(monitor.warning_fraction);
            let wait = warning_after.saturating_sub(monitor.started.elapsed());
            tokio::time::sleep(wait).await;
            if !monitor.warning_fired.swap(true, Ordering::SeqCst) {
                callback();
            }
        });
    }

    fn exhaustion_failure(&self) -> StepFailure {
        StepFailure::BudgetExhausted {
            remaining_ms: self.remaining_ms(),
        }
    }
}

/// Hooks that enforce a budget on top of any inner hooks.
///
/// The monitor is consulted before each level and before each step; once
/// exhausted, the failure surfaces through the normal hook-failure path
/// and the run terminates at the next level boundary with the
/// `budget-exhausted` kind intact for the fallback chain to route on.
pub struct MonitoredHooks {
    monitor: Arc<BudgetMonitor>,
    inner: Arc<dyn PipelineHooks>,
}

impl MonitoredHooks {
    pub fn new(monitor: Arc<BudgetMonitor>, inner: Arc<dyn PipelineHooks>) -> Self {
        Self { monitor, inner }
    }
}

#[async_trait]
impl PipelineHooks for MonitoredHooks {
    async fn before_pipeline(&self, ctx: &PipelineContext) -> Result<(), StepFailure> {
        self.inner.before_pipeline(ctx).await
    }

    async fn before_level(
        &self,
        level: &[StepToken],
        ctx: &PipelineContext,
    ) -> Result<(), StepFailure> {
        if self.monitor.is_exhausted() {
            // In-flight steps can notice the spent budget cooperatively.
            ctx.cancellation().cancel();
            return Err(self.monitor.exhaustion_failure());
        }
        self.inner.before_level(level, ctx).await
    }

    async fn before_step(
        &self,
        token: StepToken,
        ctx: &PipelineContext,
    ) -> Result<(), StepFailure> {
        if self.monitor.is_exhausted() {
            ctx.cancellation().cancel();
            return Err(self.monitor.exhaustion_failure());
        }
        self.inner.before_step(token, ctx).await
    }

    async fn after_step(&self, token: StepToken, ctx: &PipelineContext) {
        self.inner.after_step(token, ctx).await;
    }

    async fn on_step_error(&self, token: StepToken, failure: &StepFailure, ctx: &PipelineContext) {
        self.inner.on_step_error(token, failure, ctx).await;
    }

    async fn after_level(&self, level: &[StepToken], ctx: &PipelineContext) {
        self.inner.after_level(level, ctx).await;
    }

    async fn after_pipeline(&self, result: &crate::engine::PipelineResult) {
        self.inner.after_pipeline(result).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn remaining_counts_down_and_saturates() {
        let monitor = BudgetMonitor::new(50);
        assert!(monitor.remaining_ms() <= 50);
        assert!(!monitor.is_exhausted());

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(monitor.remaining_ms(), 0);
        assert!(monitor.is_exhausted());
    }

    #[tokio::test]
    async fn warning_fires_once_at_or_after_the_fraction() {
        let monitor = Arc::new(BudgetMonitor::new(100));
        let fired = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            monitor.on_warning(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(monitor.elapsed_ms() >= 80);
    }

    #[tokio::test]
    async fn monitored_hooks_fail_once_exhausted() {
        let monitor = Arc::new(BudgetMonitor::new(0));
        let hooks = MonitoredHooks::new(Arc::clone(&monitor), Arc::new(crate::traits::NoopHooks));
        let ctx = PipelineContext::new(serde_json::Value::Null);

        let failure = hooks.before_level(&[], &ctx).await.unwrap_err();
        assert!(failure.is_budget_exhausted());

        let failure = hooks.before_step(StepToken::next(), &ctx).await.unwrap_err();
        assert!(failure.is_budget_exhausted());
    }

    #[tokio::test]
    async fn monitored_hooks_pass_through_within_budget() {
        let monitor = Arc::new(BudgetMonitor::new(60_000));
        let hooks = MonitoredHooks::new(monitor, Arc::new(crate::traits::NoopHooks));
        let ctx = PipelineContext::new(serde_json::Value::Null);

        assert!(hooks.before_level(&[], &ctx).await.is_ok());
        assert!(hooks.before_step(StepToken::next(), &ctx).await.is_ok());
    }
}
