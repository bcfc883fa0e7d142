// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The unified runner with its auto-fallback chain.
//!
//! In `auto` mode the runner tries inline → hybrid → orchestrated. Only a
//! budget-exhausted result moves the chain forward; any other failure is
//! the caller's answer. Explicit modes bypass the chain entirely.
//!
//! Hybrid execution runs the inline prefix under the budget monitor,
//! hands the prefix's `target` to the orchestrated stage as its `source`,
//! and merges `executed` and `completed_levels` from both stages. Each
//! attempt gets a fresh monitor over the full budget; the orchestrated
//! stage runs unmonitored because its resources belong to the external
//! service, not to this process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::{PipelineContext, StepMetadata};
use crate::engine::{PipelineResult, PipelineRunner, PipelineStatus};
use crate::errors::PlanError;
use crate::fallback::{BudgetMonitor, MonitoredHooks};
use crate::model::{materialize, StepRegistry, WorkflowModel, METADATA_CONFIG_KEY};
use crate::observability::messages::planner::FallbackTriggered;
use crate::observability::messages::StructuredLog;
use crate::planner::{hybrid_split, HybridSplit, PlanConfig};
use crate::traits::{NoopHooks, OrchestratedBackend};

/// How the unified runner should execute a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Walk the fallback chain: inline → hybrid → orchestrated.
    Auto,
    Inline,
    Hybrid,
    Orchestrated,
}

/// Budget and mode for one unified-runner invocation.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub budget_ms: u64,
    pub mode: RunMode,
    pub safety_margin: f64,
}

impl FallbackConfig {
    pub fn auto(budget_ms: u64) -> Self {
        Self {
            budget_ms,
            mode: RunMode::Auto,
            safety_margin: crate::planner::PlanConfig::new(budget_ms).safety_margin,
        }
    }

    pub fn with_mode(budget_ms: u64, mode: RunMode) -> Self {
        Self {
            mode,
            ..Self::auto(budget_ms)
        }
    }

    fn plan_config(&self) -> PlanConfig {
        let mut cfg = PlanConfig::new(self.budget_ms);
        cfg.safety_margin = self.safety_margin;
        cfg
    }
}

/// Orchestrated backend that executes the model in-process.
///
/// Stands in for a real orchestrator in tests and single-process
/// deployments: it materializes the model against the shared registry and
/// runs it with no budget monitor attached.
pub struct InProcessBackend {
    registry: Arc<StepRegistry>,
    runner: PipelineRunner,
}

impl InProcessBackend {
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        Self {
            registry,
            runner: PipelineRunner::with_default_concurrency(),
        }
    }
}

#[async_trait]
impl OrchestratedBackend for InProcessBackend {
    async fn execute(
        &self,
        model: &WorkflowModel,
        source: Value,
    ) -> anyhow::Result<PipelineResult> {
        let definition = materialize(model, &self.registry)?;
        Ok(self
            .runner
            .run(&definition, PipelineContext::new(source))
            .await)
    }
}

/// Runs models inline, orchestrated, or split across both, with the
/// auto-fallback chain layered on top.
pub struct FallbackRunner {
    registry: Arc<StepRegistry>,
    runner: PipelineRunner,
    backend: Arc<dyn OrchestratedBackend>,
}

impl FallbackRunner {
    pub fn new(registry: Arc<StepRegistry>, backend: Arc<dyn OrchestratedBackend>) -> Self {
        Self {
            registry,
            runner: PipelineRunner::with_default_concurrency(),
            backend,
        }
    }

    /// A runner whose orchestrated stage also executes in-process.
    pub fn in_process(registry: Arc<StepRegistry>) -> Self {
        let backend = Arc::new(InProcessBackend::new(Arc::clone(&registry)));
        Self::new(registry, backend)
    }

    /// Execute `model` per `cfg`, walking the fallback chain in auto mode.
    pub async fn execute(
        &self,
        model: &WorkflowModel,
        source: Value,
        cfg: &FallbackConfig,
    ) -> anyhow::Result<PipelineResult> {
        let metadata = collect_metadata(model, &self.registry);

        match cfg.mode {
            RunMode::Inline => self.run_inline(model, source, cfg).await,
            RunMode::Orchestrated => self.backend.execute(model, source).await,
            RunMode::Hybrid => {
                let split = hybrid_split(model, &metadata, &cfg.plan_config())?
                    .ok_or(PlanError::NoCutFound)?;
                self.run_hybrid(model, source, cfg, &split).await
            }
            RunMode::Auto => {
                let inline_result = self.run_inline(model, source.clone(), cfg).await?;
                if !inline_result.is_budget_exhausted() {
                    return Ok(inline_result);
                }

                if let Ok(Some(split)) = hybrid_split(model, &metadata, &cfg.plan_config()) {
                    FallbackTriggered {
                        from: "inline",
                        to: "hybrid",
                    }
                    .log();
                    let hybrid_result =
                        self.run_hybrid(model, source.clone(), cfg, &split).await?;
                    if !hybrid_result.is_budget_exhausted() {
                        return Ok(hybrid_result);
                    }
                    FallbackTriggered {
                        from: "hybrid",
                        to: "orchestrated",
                    }
                    .log();
                } else {
                    FallbackTriggered {
                        from: "inline",
                        to: "orchestrated",
                    }
                    .log();
                }

                self.backend.execute(model, source).await
            }
        }
    }

    async fn run_inline(
        &self,
        model: &WorkflowModel,
        source: Value,
        cfg: &FallbackConfig,
    ) -> anyhow::Result<PipelineResult> {
        let definition = materialize(model, &self.registry)?;
        let monitor = Arc::new(BudgetMonitor::new(cfg.budget_ms));
        let hooks = Arc::new(MonitoredHooks::new(monitor, Arc::new(NoopHooks)));
        Ok(self
            .runner
            .run_with_hooks(&definition, PipelineContext::new(source), hooks)
            .await)
    }

    async fn run_hybrid(
        &self,
        model: &WorkflowModel,
        source: Value,
        cfg: &FallbackConfig,
        split: &HybridSplit,
    ) -> anyhow::Result<PipelineResult> {
        let inline_ids: HashSet<String> = split.inline_nodes.iter().cloned().collect();
        let orchestrated_ids: HashSet<String> =
            split.orchestrated_nodes.iter().cloned().collect();

        let prefix_model = model.restricted_to(&inline_ids);
        let suffix_model = model.restricted_to(&orchestrated_ids);

        let prefix_result = self.run_inline(&prefix_model, source, cfg).await?;
        if prefix_result.status != PipelineStatus::Success {
            return Ok(prefix_result);
        }

        let handoff = prefix_result.context.target().await;
        let suffix_result = self.backend.execute(&suffix_model, handoff).await?;
        Ok(merge_stages(prefix_result, suffix_result))
    }
}

/// Stitch the inline prefix and orchestrated suffix into one result. The
/// terminal status, errors, and context come from the suffix; execution
/// history concatenates in stage order.
fn merge_stages(prefix: PipelineResult, suffix: PipelineResult) -> PipelineResult {
    let mut executed = prefix.executed;
    executed.extend(suffix.executed);

    let mut completed_levels = prefix.completed_levels;
    completed_levels.extend(suffix.completed_levels);

    PipelineResult {
        status: suffix.status,
        context: suffix.context,
        errors: suffix.errors,
        executed,
        completed_levels,
    }
}

/// Per-node metadata for planning: the conventional `config.metadata`
/// location wins, then the registration default. Malformed config
/// metadata is ignored here; materialization reports it.
pub fn collect_metadata(
    model: &WorkflowModel,
    registry: &StepRegistry,
) -> HashMap<String, StepMetadata> {
    let mut metadata = HashMap::new();
    for node in &model.nodes {
        let from_config: Option<StepMetadata> = node
            .config
            .get(METADATA_CONFIG_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let from_registry = node
            .step_ref
            .as_deref()
            .and_then(|name| registry.resolve(name).ok())
            .and_then(|registered| registered.metadata);

        if let Some(value) = from_config.or(from_registry) {
            metadata.insert(node.id.clone(), value);
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StepFactory, WorkflowNode};
    use crate::steps::RecordingStep;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn recording_factory(key: &'static str) -> StepFactory {
        Arc::new(move || {
            Arc::new(RecordingStep::new(key, json!("done"))) as Arc<dyn crate::traits::Step>
        })
    }

    fn registry_with_chain() -> Arc<StepRegistry> {
        let mut registry = StepRegistry::new();
        registry
            .register_with_metadata(
                "first",
                recording_factory("first"),
                Some(StepMetadata::with_timing(150_000, 300_000)),
            )
            .unwrap();
        registry
            .register_with_metadata(
                "second",
                recording_factory("second"),
                Some(StepMetadata::with_timing(125_000, 250_000)),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn chain_model() -> WorkflowModel {
        WorkflowModel::new(vec![
            WorkflowNode::task("a", "first"),
            WorkflowNode::task("b", "second").with_dependencies(&["a"]),
        ])
    }

    struct CountingBackend {
        inner: InProcessBackend,
        calls: AtomicU32,
    }

    impl CountingBackend {
        fn new(registry: Arc<StepRegistry>) -> Self {
            Self {
                inner: InProcessBackend::new(registry),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl OrchestratedBackend for CountingBackend {
        async fn execute(
            &self,
            model: &WorkflowModel,
            source: Value,
        ) -> anyhow::Result<PipelineResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.execute(model, source).await
        }
    }

    #[tokio::test]
    async fn auto_mode_stays_inline_within_budget() {
        let registry = registry_with_chain();
        let backend = Arc::new(CountingBackend::new(Arc::clone(&registry)));
        let runner = FallbackRunner::new(Arc::clone(&registry), backend.clone());

        let result = runner
            .execute(&chain_model(), json!({}), &FallbackConfig::auto(60_000))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.executed.len(), 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_falls_back_to_orchestrated() {
        let registry = registry_with_chain();
        let backend = Arc::new(CountingBackend::new(Arc::clone(&registry)));
        let runner = FallbackRunner::new(Arc::clone(&registry), backend.clone());

        // A zero budget exhausts the inline attempt before its first
        // level and admits no hybrid cut, so the chain lands on the
        // unmonitored orchestrated stage.
        let result = runner
            .execute(&chain_model(), json!({}), &FallbackConfig::auto(0))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.executed.len(), 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_orchestrated_bypasses_the_chain() {
        let registry = registry_with_chain();
        let backend = Arc::new(CountingBackend::new(Arc::clone(&registry)));
        let runner = FallbackRunner::new(Arc::clone(&registry), backend.clone());

        let result = runner
            .execute(
                &chain_model(),
                json!({}),
                &FallbackConfig::with_mode(60_000, RunMode::Orchestrated),
            )
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hybrid_hands_the_prefix_target_to_the_suffix() {
        // Registry timings put the cut between `a` (300s p99) and `b`
        // (250s p99) under a 720s budget.
        let registry = registry_with_chain();
        let backend = Arc::new(CountingBackend::new(Arc::clone(&registry)));
        let runner = FallbackRunner::new(Arc::clone(&registry), backend.clone());

        let result = runner
            .execute(
                &chain_model(),
                json!({"order": 7}),
                &FallbackConfig::with_mode(720_000, RunMode::Hybrid),
            )
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.executed.len(), 2);
        assert_eq!(result.completed_levels.len(), 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        // The suffix stage's source is the prefix stage's target.
        assert_eq!(result.context.source(), &json!({"first": "done"}));
        assert_eq!(result.context.target().await, json!({"second": "done"}));
    }

    #[tokio::test]
    async fn explicit_hybrid_without_a_cut_is_an_error() {
        let mut registry = StepRegistry::new();
        registry
            .register("only", recording_factory("only"))
            .unwrap();
        let registry = Arc::new(registry);
        let runner = FallbackRunner::in_process(Arc::clone(&registry));

        let model = WorkflowModel::new(vec![WorkflowNode::task("solo", "only")]);
        let err = runner
            .execute(
                &model,
                json!({}),
                &FallbackConfig::with_mode(60_000, RunMode::Hybrid),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cut"));
    }

    #[tokio::test]
    async fn non_budget_failures_do_not_fall_back() {
        let mut registry = StepRegistry::new();
        registry
            .register(
                "broken",
                Arc::new(|| Arc::new(crate::steps::FailingStep::new("boom")) as Arc<dyn crate::traits::Step>),
            )
            .unwrap();
        let registry = Arc::new(registry);
        let backend = Arc::new(CountingBackend::new(Arc::clone(&registry)));
        let runner = FallbackRunner::new(Arc::clone(&registry), backend.clone());

        let model = WorkflowModel::new(vec![WorkflowNode::task("x", "broken")]);
        let result = runner
            .execute(&model, json!({}), &FallbackConfig::auto(60_000))
            .await
            .unwrap();

        assert_eq!(result.status, PipelineStatus::Error);
        assert!(!result.is_budget_exhausted());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn metadata_collection_prefers_config_over_registry() {
        let registry = registry_with_chain();
        let mut model = chain_model();
        model.nodes[0].config.insert(
            METADATA_CONFIG_KEY.to_string(),
            json!({"timing": {"p50Ms": 1, "p99Ms": 2}}),
        );

        let metadata = collect_metadata(&model, &registry);
        assert_eq!(metadata["a"].timing.resolved(), (1, 2));
        assert_eq!(metadata["b"].timing.resolved(), (125_000, 250_000));
    }
}
