use async_trait::async_trait;

use crate::definition::{PipelineContext, StepToken};
use crate::engine::PipelineResult;
use crate::errors::StepFailure;

/// Lifecycle hooks observed by the runner.
///
/// All methods default to no-ops and all may suspend. The `before_*`
/// methods may fail: the runner treats a `before_pipeline` failure as a
/// run failure, a `before_level` failure as a failure of that level, and a
/// `before_step` failure as a failure of that step. This is how the budget
/// monitor injects budget-exhausted failures without the runner knowing
/// about budgets at all.
///
/// Hooks may mutate the context; they may not mutate the definition.
#[async_trait]
pub trait PipelineHooks: Send + Sync {
    async fn before_pipeline(&self, _ctx: &PipelineContext) -> Result<(), StepFailure> {
        Ok(())
    }

    async fn before_level(
        &self,
        _level: &[StepToken],
        _ctx: &PipelineContext,
    ) -> Result<(), StepFailure> {
        Ok(())
    }

    async fn before_step(
        &self,
        _token: StepToken,
        _ctx: &PipelineContext,
    ) -> Result<(), StepFailure> {
        Ok(())
    }

    async fn after_step(&self, _token: StepToken, _ctx: &PipelineContext) {}

    async fn on_step_error(
        &self,
        _token: StepToken,
        _failure: &StepFailure,
        _ctx: &PipelineContext,
    ) {
    }

    async fn after_level(&self, _level: &[StepToken], _ctx: &PipelineContext) {}

    async fn after_pipeline(&self, _result: &PipelineResult) {}
}

/// The hooks used when a caller supplies none.
pub struct NoopHooks;

#[async_trait]
impl PipelineHooks for NoopHooks {}
