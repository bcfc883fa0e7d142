// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading neutral models from YAML or JSON files.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::model::{validate_model, WorkflowModel};

/// Parse a model from YAML or JSON text. YAML is a superset of JSON, so a
/// single parser covers both on-disk formats.
pub fn parse_model(content: &str) -> anyhow::Result<WorkflowModel> {
    let model: WorkflowModel =
        serde_yaml::from_str(content).context("failed to parse workflow model")?;
    Ok(model)
}

/// Load a model from a file.
pub fn load_model<P: AsRef<Path>>(path: P) -> anyhow::Result<WorkflowModel> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read model file '{}'", path.display()))?;
    parse_model(&content)
}

/// Load a model and validate its structure: unique ids, resolvable
/// references, and acyclicity. All violations are reported together.
pub fn load_and_validate_model<P: AsRef<Path>>(path: P) -> anyhow::Result<WorkflowModel> {
    let model = load_model(path)?;

    if let Err(validation_errors) = validate_model(&model) {
        let messages: Vec<String> = validation_errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("model validation failed:\n{}", messages.join("\n"));
    }

    Ok(model)
}
