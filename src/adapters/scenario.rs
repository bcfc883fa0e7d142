// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scenario JSON dialect adapter.
//!
//! A scenario document holds named scenarios, each an array of steps with
//! explicit `runAfter` dependencies — already a DAG, so import is a direct
//! translation: `runAfter` becomes `dependsOn`, `operationId` (falling
//! back to the step id) becomes `stepRef`, and every other step property
//! rides in `config`. Export emits one scenario whose steps appear in
//! topological order with a lexicographic tie-break.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapters::{AdapterWarning, DowngradeKind};
use crate::errors::AdapterError;
use crate::model::{NodeKind, WorkflowModel, WorkflowNode};

const DIALECT: &str = "scenario";

/// Dialect version stamped on exported documents.
const ARAZZO_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScenarioDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arazzo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    openapi: Option<Value>,
    scenarios: BTreeMap<String, Scenario>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScenarioStep {
    id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    step_type: Option<String>,
    #[serde(rename = "runAfter", default, skip_serializing_if = "Option::is_none")]
    run_after: Option<Vec<String>>,
    #[serde(
        rename = "operationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    operation_id: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Options for [`export`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub scenario: String,
    pub description: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scenario: "workflow".to_string(),
            description: None,
        }
    }
}

/// Import one named scenario from a document.
pub fn import(
    blob: &str,
    scenario_name: &str,
) -> Result<(WorkflowModel, Vec<AdapterWarning>), AdapterError> {
    let doc: ScenarioDocument =
        serde_json::from_str(blob).map_err(|e| AdapterError::InvalidDialect {
            dialect: DIALECT,
            message: e.to_string(),
        })?;

    let scenario = doc
        .scenarios
        .get(scenario_name)
        .ok_or_else(|| AdapterError::ScenarioNotFound {
            scenario: scenario_name.to_string(),
        })?;

    let mut warnings = Vec::new();
    if doc.info.is_some() || doc.openapi.is_some() {
        warnings.push(AdapterWarning::new(
            scenario_name,
            DowngradeKind::MetadataDropped,
            "document-level info/openapi have no model slot",
        ));
    }

    let known_ids: Vec<&str> = scenario.steps.iter().map(|s| s.id.as_str()).collect();

    let mut nodes = Vec::with_capacity(scenario.steps.len());
    let mut entry_ids = Vec::new();
    for step in &scenario.steps {
        let declared = step.step_type.as_deref().unwrap_or("operation");
        let (kind, canonical) = match declared {
            "operation" => (NodeKind::Task, "operation"),
            "pass" => (NodeKind::Pass, "pass"),
            "switch" => (NodeKind::Choice, "switch"),
            "parallel" => (NodeKind::Parallel, "parallel"),
            "loop" | "sleep" => {
                warnings.push(AdapterWarning::new(
                    &step.id,
                    DowngradeKind::UnsupportedKind,
                    format!("{declared} step downgraded to task"),
                ));
                (NodeKind::Task, "operation")
            }
            other => {
                warnings.push(AdapterWarning::new(
                    &step.id,
                    DowngradeKind::UnsupportedKind,
                    format!("unrecognized step type '{other}' treated as task"),
                ));
                (NodeKind::Task, "operation")
            }
        };

        let mut node = WorkflowNode::new(step.id.clone(), kind);
        node.step_ref = Some(
            step.operation_id
                .clone()
                .unwrap_or_else(|| step.id.clone()),
        );

        for dep in step.run_after.as_deref().unwrap_or_default() {
            if !known_ids.contains(&dep.as_str()) {
                return Err(AdapterError::SchemaViolation {
                    element: step.id.clone(),
                    message: format!("runAfter references unknown step '{dep}'"),
                });
            }
            if !node.depends_on.contains(dep) {
                node.depends_on.push(dep.clone());
            }
        }

        if declared != canonical {
            node.config.insert("type".to_string(), Value::String(declared.to_string()));
        }
        if let Some(operation_id) = &step.operation_id {
            node.config
                .insert("operationId".to_string(), Value::String(operation_id.clone()));
        }
        for (key, value) in &step.extra {
            node.config.insert(key.clone(), value.clone());
        }

        if node.depends_on.is_empty() {
            entry_ids.push(node.id.clone());
        }
        nodes.push(node);
    }

    Ok((WorkflowModel::with_entries(nodes, entry_ids), warnings))
}

/// Export the model as a single-scenario document.
pub fn export(
    model: &WorkflowModel,
    opts: &ExportOptions,
) -> Result<(String, Vec<AdapterWarning>), AdapterError> {
    let order = model
        .topological_order()
        .map_err(|e| AdapterError::InvalidDialect {
            dialect: DIALECT,
            message: e.to_string(),
        })?;

    let mut steps = Vec::with_capacity(order.len());
    for node in order {
        let step_type = node
            .config
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                match node.kind {
                    NodeKind::Task => "operation",
                    NodeKind::Pass => "pass",
                    NodeKind::Choice => "switch",
                    NodeKind::Parallel => "parallel",
                }
                .to_string()
            });

        let operation_id = node
            .config
            .get("operationId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                node.step_ref
                    .as_ref()
                    .filter(|step_ref| **step_ref != node.id)
                    .cloned()
            });

        let mut run_after: Vec<String> = node.depends_on.clone();
        run_after.sort_unstable();

        let mut extra = Map::new();
        for (key, value) in &node.config {
            if key != "type" && key != "operationId" {
                extra.insert(key.clone(), value.clone());
            }
        }

        steps.push(ScenarioStep {
            id: node.id.clone(),
            step_type: Some(step_type),
            run_after: if run_after.is_empty() {
                None
            } else {
                Some(run_after)
            },
            operation_id,
            extra,
        });
    }

    let mut scenarios = BTreeMap::new();
    scenarios.insert(
        opts.scenario.clone(),
        Scenario {
            description: opts.description.clone(),
            steps,
        },
    );

    let doc = ScenarioDocument {
        arazzo: Some(ARAZZO_VERSION.to_string()),
        info: None,
        openapi: None,
        scenarios,
    };

    let blob = serde_json::to_string_pretty(&doc).map_err(|e| AdapterError::InvalidDialect {
        dialect: DIALECT,
        message: e.to_string(),
    })?;
    Ok((blob, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_processing_blob() -> String {
        json!({
            "arazzo": "1.0.0",
            "scenarios": {
                "order-processing": {
                    "steps": [
                        {"id": "validate", "type": "operation", "operationId": "validateOrder"},
                        {"id": "process", "type": "operation", "operationId": "processOrder",
                         "runAfter": ["validate"]}
                    ]
                }
            }
        })
        .to_string()
    }

    #[test]
    fn imports_the_order_processing_scenario() {
        let (model, warnings) = import(&order_processing_blob(), "order-processing").unwrap();
        assert!(warnings.is_empty());

        assert_eq!(model.nodes[0].id, "validate");
        assert_eq!(model.nodes[0].kind, NodeKind::Task);
        assert!(model.nodes[0].depends_on.is_empty());
        assert_eq!(model.nodes[0].step_ref.as_deref(), Some("validateOrder"));

        assert_eq!(model.nodes[1].id, "process");
        assert_eq!(model.nodes[1].kind, NodeKind::Task);
        assert_eq!(model.nodes[1].depends_on, vec!["validate"]);
        assert_eq!(model.nodes[1].step_ref.as_deref(), Some("processOrder"));

        assert_eq!(model.entries(), vec!["validate"]);
    }

    #[test]
    fn missing_scenario_is_an_error() {
        let err = import(&order_processing_blob(), "missing").unwrap_err();
        assert_eq!(err.kind(), "scenario-not-found");
    }

    #[test]
    fn loop_and_sleep_downgrade_to_tasks() {
        let blob = json!({
            "scenarios": {
                "s": {
                    "steps": [
                        {"id": "poll", "type": "loop", "maxIterations": 5},
                        {"id": "wait", "type": "sleep", "durationMs": 100, "runAfter": ["poll"]}
                    ]
                }
            }
        })
        .to_string();

        let (model, warnings) = import(&blob, "s").unwrap();
        assert_eq!(model.nodes[0].kind, NodeKind::Task);
        assert_eq!(model.nodes[1].kind, NodeKind::Task);
        assert_eq!(model.nodes[0].config["type"], "loop");
        assert_eq!(model.nodes[0].config["maxIterations"], 5);
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| w.kind == DowngradeKind::UnsupportedKind));
    }

    #[test]
    fn unknown_run_after_is_a_schema_violation() {
        let blob = json!({
            "scenarios": {
                "s": {"steps": [{"id": "a", "runAfter": ["ghost"]}]}
            }
        })
        .to_string();

        let err = import(&blob, "s").unwrap_err();
        assert_eq!(err.kind(), "schema-violation");
    }

    #[test]
    fn untyped_steps_default_to_operation() {
        let blob = json!({
            "scenarios": {"s": {"steps": [{"id": "a"}]}}
        })
        .to_string();

        let (model, warnings) = import(&blob, "s").unwrap();
        assert!(warnings.is_empty());
        assert_eq!(model.nodes[0].kind, NodeKind::Task);
        assert_eq!(model.nodes[0].step_ref.as_deref(), Some("a"));
    }

    #[test]
    fn export_orders_steps_topologically() {
        let model = WorkflowModel::new(vec![
            WorkflowNode::task("zfetch", "fetchOrder"),
            WorkflowNode::task("enrich", "enrichOrder").with_dependencies(&["zfetch"]),
            WorkflowNode::task("audit", "auditOrder").with_dependencies(&["zfetch"]),
        ]);

        let (blob, _) = export(&model, &ExportOptions::default()).unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        let steps = value["scenarios"]["workflow"]["steps"].as_array().unwrap();

        let ids: Vec<&str> = steps.iter().map(|s| s["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["zfetch", "audit", "enrich"]);
        assert_eq!(steps[0]["operationId"], "fetchOrder");
        assert_eq!(steps[2]["runAfter"][0], "zfetch");
        assert_eq!(value["arazzo"], "1.0.0");
    }

    #[test]
    fn round_trip_preserves_the_scenario() {
        let (model, _) = import(&order_processing_blob(), "order-processing").unwrap();
        let opts = ExportOptions {
            scenario: "order-processing".to_string(),
            description: None,
        };
        let (blob, _) = export(&model, &opts).unwrap();
        let (reimported, _) = import(&blob, "order-processing").unwrap();
        assert_eq!(reimported, model);
    }
}
