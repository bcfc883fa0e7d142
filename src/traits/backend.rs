use async_trait::async_trait;

use serde_json::Value;

use crate::engine::PipelineResult;
use crate::model::WorkflowModel;

/// Execution seam for the orchestrated service.
///
/// The core never talks to an orchestrator directly; the fallback runner
/// hands the (sub)model and a source payload to whatever backend the
/// caller wires in. Transport and deployment concerns live entirely behind
/// this trait, which is why it returns `anyhow::Result`: a backend failure
/// is an external-collaborator failure, not part of the core taxonomy.
#[async_trait]
pub trait OrchestratedBackend: Send + Sync {
    async fn execute(&self, model: &WorkflowModel, source: Value)
        -> anyhow::Result<PipelineResult>;
}
