use async_trait::async_trait;

use crate::definition::PipelineContext;
use crate::errors::StepFailure;

/// The contract every unit of work satisfies.
///
/// A step receives the shared run context: it may read `source` and
/// `target`, mutate `target`, request a stop, or fail. Steps are shared
/// across concurrent tasks and across retry attempts, so implementations
/// hold no per-run mutable state of their own.
#[async_trait]
pub trait Step: Send + Sync {
    async fn execute(&self, ctx: &PipelineContext) -> Result<(), StepFailure>;

    fn name(&self) -> &'static str;
}
