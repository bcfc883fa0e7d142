// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process XML dialect adapter (BPMN-2.0-shaped).
//!
//! Import walks the event stream and accepts both prefixed
//! (`bpmn:serviceTask`) and default-namespace (`serviceTask`) forms by
//! matching on local names. Task kinds map to task nodes, exclusive
//! gateways to choice, parallel gateways to parallel, and inclusive
//! gateways to parallel with a warning. Start and end events never become
//! nodes: a sequence flow out of a start event only marks its target as
//! an entry, and flows into an end event are the exit set. Every other
//! sequence flow `source → target` becomes `source ∈ dependsOn(target)`.
//!
//! Export emits a canonical document: one synthetic start event, the flow
//! nodes in topological order (lexicographic tie-break), one end event,
//! and a deterministic, sorted flow list — entry nodes gain a flow from
//! the start event, sink nodes a flow to the end event. Imported elements
//! remember their element name in `config.element` and re-export under it.

use std::collections::{BTreeSet, HashMap, HashSet};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde_json::Value;

use crate::adapters::{AdapterWarning, DowngradeKind};
use crate::errors::AdapterError;
use crate::model::{NodeKind, WorkflowModel, WorkflowNode};

const DIALECT: &str = "process-xml";

const BPMN_NAMESPACE: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
const TARGET_NAMESPACE: &str = "http://virta.dev/process";

/// Synthetic event ids used by export.
const START_EVENT_ID: &str = "start";
const END_EVENT_ID: &str = "end";

/// Config key remembering the source element name for re-export.
const ELEMENT_CONFIG_KEY: &str = "element";

#[derive(Debug)]
struct ParsedFlowNode {
    id: String,
    element: String,
    attributes: Vec<(String, String)>,
}

#[derive(Debug)]
struct ParsedFlow {
    id: String,
    source: String,
    target: String,
}

fn invalid(message: impl ToString) -> AdapterError {
    AdapterError::InvalidDialect {
        dialect: DIALECT,
        message: message.to_string(),
    }
}

fn attributes_of(element: &BytesStart) -> Result<Vec<(String, String)>, AdapterError> {
    let mut attributes = Vec::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(invalid)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
        let value = attribute.unescape_value().map_err(invalid)?.to_string();
        attributes.push((key, value));
    }
    Ok(attributes)
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name || key.ends_with(&format!(":{name}")))
        .map(|(_, value)| value.as_str())
}

/// What the event loop should do after an opening tag.
enum OpenAction {
    /// Keep walking into the element's children.
    Descend,
    /// The element is fully handled from its attributes; children are
    /// ignored.
    SkipChildren,
}

/// Import a process XML document into the neutral model.
pub fn import(blob: &str) -> Result<(WorkflowModel, Vec<AdapterWarning>), AdapterError> {
    let mut reader = Reader::from_str(blob);
    let mut buf = Vec::new();

    let mut warnings = Vec::new();
    let mut flow_nodes: Vec<ParsedFlowNode> = Vec::new();
    let mut flows: Vec<ParsedFlow> = Vec::new();
    let mut start_events: HashSet<String> = HashSet::new();
    let mut end_events: HashSet<String> = HashSet::new();
    let mut in_process = false;
    // Depth of an element subtree currently being ignored.
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Ok(Event::Start(ref e)) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else {
                    let action = handle_open_tag(
                        e,
                        &mut in_process,
                        &mut flow_nodes,
                        &mut flows,
                        &mut start_events,
                        &mut end_events,
                        &mut warnings,
                    )?;
                    if matches!(action, OpenAction::SkipChildren) {
                        skip_depth = 1;
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if skip_depth == 0 {
                    handle_open_tag(
                        e,
                        &mut in_process,
                        &mut flow_nodes,
                        &mut flows,
                        &mut start_events,
                        &mut end_events,
                        &mut warnings,
                    )?;
                }
            }
            Ok(Event::End(ref e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else if String::from_utf8_lossy(e.local_name().as_ref()) == "process" {
                    in_process = false;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(invalid(e)),
        }
        buf.clear();
    }

    if flow_nodes.is_empty() {
        return Err(invalid("document contains no process flow elements"));
    }

    build_model(flow_nodes, flows, start_events, end_events, warnings)
}

/// Accepts both prefixed and default-namespace forms by matching local
/// names, the usual discipline for BPMN-shaped documents.
fn handle_open_tag(
    e: &BytesStart,
    in_process: &mut bool,
    flow_nodes: &mut Vec<ParsedFlowNode>,
    flows: &mut Vec<ParsedFlow>,
    start_events: &mut HashSet<String>,
    end_events: &mut HashSet<String>,
    warnings: &mut Vec<AdapterWarning>,
) -> Result<OpenAction, AdapterError> {
    let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

    match local.as_str() {
        "definitions" => Ok(OpenAction::Descend),
        "process" => {
            *in_process = true;
            Ok(OpenAction::Descend)
        }
        _ if !*in_process => Ok(OpenAction::SkipChildren),
        "startEvent" | "endEvent" => {
            let attributes = attributes_of(e)?;
            let id = attribute(&attributes, "id")
                .ok_or_else(|| AdapterError::SchemaViolation {
                    element: local.clone(),
                    message: "event is missing its id".to_string(),
                })?
                .to_string();
            if local == "startEvent" {
                start_events.insert(id);
            } else {
                end_events.insert(id);
            }
            Ok(OpenAction::SkipChildren)
        }
        "sequenceFlow" => {
            let attributes = attributes_of(e)?;
            let id = attribute(&attributes, "id").unwrap_or_default().to_string();
            let source = attribute(&attributes, "sourceRef");
            let target = attribute(&attributes, "targetRef");
            match (source, target) {
                (Some(source), Some(target)) => flows.push(ParsedFlow {
                    id,
                    source: source.to_string(),
                    target: target.to_string(),
                }),
                _ => {
                    return Err(AdapterError::SchemaViolation {
                        element: id,
                        message: "sequenceFlow is missing sourceRef/targetRef".to_string(),
                    })
                }
            }
            Ok(OpenAction::SkipChildren)
        }
        "task" | "serviceTask" | "userTask" | "scriptTask" | "exclusiveGateway"
        | "parallelGateway" | "inclusiveGateway" => {
            let attributes = attributes_of(e)?;
            let id = attribute(&attributes, "id")
                .ok_or_else(|| AdapterError::SchemaViolation {
                    element: local.clone(),
                    message: "flow element is missing its id".to_string(),
                })?
                .to_string();
            flow_nodes.push(ParsedFlowNode {
                id,
                element: local,
                attributes,
            });
            Ok(OpenAction::SkipChildren)
        }
        other => {
            let attributes = attributes_of(e)?;
            let id = attribute(&attributes, "id").unwrap_or(other);
            warnings.push(AdapterWarning::new(
                id,
                DowngradeKind::DroppedElement,
                format!("unsupported element '{other}' dropped"),
            ));
            Ok(OpenAction::SkipChildren)
        }
    }
}

fn build_model(
    flow_nodes: Vec<ParsedFlowNode>,
    flows: Vec<ParsedFlow>,
    start_events: HashSet<String>,
    end_events: HashSet<String>,
    mut warnings: Vec<AdapterWarning>,
) -> Result<(WorkflowModel, Vec<AdapterWarning>), AdapterError> {
    let mut nodes: Vec<WorkflowNode> = Vec::with_capacity(flow_nodes.len());
    for parsed in &flow_nodes {
        let kind = match parsed.element.as_str() {
            "task" | "serviceTask" | "userTask" | "scriptTask" => NodeKind::Task,
            "exclusiveGateway" => NodeKind::Choice,
            "inclusiveGateway" => {
                warnings.push(AdapterWarning::new(
                    &parsed.id,
                    DowngradeKind::UnsupportedKind,
                    "inclusive gateway treated as parallel",
                ));
                NodeKind::Parallel
            }
            _ => NodeKind::Parallel,
        };

        let mut node = WorkflowNode::new(parsed.id.clone(), kind);
        node.step_ref = Some(
            attribute(&parsed.attributes, "name")
                .unwrap_or(&parsed.id)
                .to_string(),
        );
        node.config.insert(
            ELEMENT_CONFIG_KEY.to_string(),
            Value::String(parsed.element.clone()),
        );
        for (key, value) in &parsed.attributes {
            if key != "id" {
                node.config.insert(key.clone(), Value::String(value.clone()));
            }
        }
        nodes.push(node);
    }

    let node_ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let mut start_flagged: Vec<String> = Vec::new();

    for flow in &flows {
        if start_events.contains(&flow.source) {
            if node_ids.contains(&flow.target) {
                if !start_flagged.contains(&flow.target) {
                    start_flagged.push(flow.target.clone());
                }
            } else if !end_events.contains(&flow.target) {
                warnings.push(AdapterWarning::new(
                    &flow.id,
                    DowngradeKind::DroppedElement,
                    format!("flow targets unknown element '{}'", flow.target),
                ));
            }
            continue;
        }
        if end_events.contains(&flow.target) {
            continue;
        }
        if !node_ids.contains(&flow.source) || !node_ids.contains(&flow.target) {
            warnings.push(AdapterWarning::new(
                &flow.id,
                DowngradeKind::DroppedElement,
                "flow references a dropped or unknown element",
            ));
            continue;
        }
        if let Some(node) = nodes.iter_mut().find(|n| n.id == flow.target) {
            if !node.depends_on.contains(&flow.source) {
                node.depends_on.push(flow.source.clone());
            }
        }
    }

    for node in &mut nodes {
        node.depends_on.sort_unstable();
    }

    let mut entry_ids = start_flagged;
    for node in &nodes {
        if node.depends_on.is_empty() && !entry_ids.contains(&node.id) {
            entry_ids.push(node.id.clone());
        }
    }

    Ok((WorkflowModel::with_entries(nodes, entry_ids), warnings))
}

/// Export the neutral model as a canonical process XML document.
pub fn export(model: &WorkflowModel) -> Result<(String, Vec<AdapterWarning>), AdapterError> {
    let mut warnings = Vec::new();

    let order = model.topological_order().map_err(invalid)?;
    if order.is_empty() {
        return Err(AdapterError::UnsupportedExport {
            element: "process".to_string(),
            reason: "model has no nodes".to_string(),
        });
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(invalid)?;

    let mut definitions = BytesStart::new("definitions");
    definitions.push_attribute(("xmlns", BPMN_NAMESPACE));
    definitions.push_attribute(("targetNamespace", TARGET_NAMESPACE));
    writer
        .write_event(Event::Start(definitions))
        .map_err(invalid)?;

    let mut process = BytesStart::new("process");
    process.push_attribute(("id", "process-1"));
    process.push_attribute(("isExecutable", "true"));
    writer.write_event(Event::Start(process)).map_err(invalid)?;

    let mut start_event = BytesStart::new("startEvent");
    start_event.push_attribute(("id", START_EVENT_ID));
    writer
        .write_event(Event::Empty(start_event))
        .map_err(invalid)?;

    for node in &order {
        let element_name = element_name_for(node, &mut warnings);

        let mut element = BytesStart::new(element_name.as_str());
        element.push_attribute(("id", node.id.as_str()));

        let configured_name = node.config.get("name").and_then(Value::as_str);
        match configured_name {
            Some(name) => element.push_attribute(("name", name)),
            None => {
                if let Some(step_ref) = node.step_ref.as_deref() {
                    if step_ref != node.id {
                        element.push_attribute(("name", step_ref));
                    }
                }
            }
        }

        for (key, value) in &node.config {
            if key == ELEMENT_CONFIG_KEY || key == "name" {
                continue;
            }
            match value {
                Value::String(text) => element.push_attribute((key.as_str(), text.as_str())),
                _ => warnings.push(AdapterWarning::new(
                    &node.id,
                    DowngradeKind::MetadataDropped,
                    format!("non-textual config entry '{key}' cannot ride as an attribute"),
                )),
            }
        }

        writer.write_event(Event::Empty(element)).map_err(invalid)?;
    }

    let mut end_event = BytesStart::new("endEvent");
    end_event.push_attribute(("id", END_EVENT_ID));
    writer
        .write_event(Event::Empty(end_event))
        .map_err(invalid)?;

    for (id, source, target) in collect_flows(model, &order) {
        let mut flow = BytesStart::new("sequenceFlow");
        flow.push_attribute(("id", id.as_str()));
        flow.push_attribute(("sourceRef", source.as_str()));
        flow.push_attribute(("targetRef", target.as_str()));
        writer.write_event(Event::Empty(flow)).map_err(invalid)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("process")))
        .map_err(invalid)?;
    writer
        .write_event(Event::End(BytesEnd::new("definitions")))
        .map_err(invalid)?;

    let blob = String::from_utf8(writer.into_inner()).map_err(invalid)?;
    Ok((blob, warnings))
}

fn element_name_for(node: &WorkflowNode, warnings: &mut Vec<AdapterWarning>) -> String {
    if let Some(element) = node.config.get(ELEMENT_CONFIG_KEY).and_then(Value::as_str) {
        return element.to_string();
    }
    match node.kind {
        NodeKind::Task => "task".to_string(),
        NodeKind::Choice => "exclusiveGateway".to_string(),
        NodeKind::Parallel => "parallelGateway".to_string(),
        NodeKind::Pass => {
            warnings.push(AdapterWarning::new(
                &node.id,
                DowngradeKind::UnsupportedKind,
                "pass node exported as a plain task",
            ));
            "task".to_string()
        }
    }
}

/// Deterministic flow list: start flows to entries, one flow per edge,
/// end flows from sinks — each group sorted.
fn collect_flows(model: &WorkflowModel, order: &[&WorkflowNode]) -> Vec<(String, String, String)> {
    let mut flows = Vec::new();

    let entries: BTreeSet<String> = model.entries().into_iter().collect();
    for entry in &entries {
        flows.push((
            format!("flow-{START_EVENT_ID}-{entry}"),
            START_EVENT_ID.to_string(),
            entry.clone(),
        ));
    }

    let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
    for node in order {
        for dep in &node.depends_on {
            edges.insert((dep.clone(), node.id.clone()));
        }
    }
    for (source, target) in &edges {
        flows.push((
            format!("flow-{source}-{target}"),
            source.clone(),
            target.clone(),
        ));
    }

    let successors: HashMap<&str, Vec<&str>> = model.successors();
    let mut sinks: BTreeSet<String> = BTreeSet::new();
    for node in order {
        let is_sink = successors
            .get(node.id.as_str())
            .map(|s| s.is_empty())
            .unwrap_or(true);
        if is_sink {
            sinks.insert(node.id.clone());
        }
    }
    for sink in &sinks {
        flows.push((
            format!("flow-{sink}-{END_EVENT_ID}"),
            sink.clone(),
            END_EVENT_ID.to_string(),
        ));
    }

    flows
}
