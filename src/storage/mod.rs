// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline storage interface.
//!
//! The core never persists pipelines itself; it defines the store
//! contract consumed by the tool surface and ships one in-memory
//! implementation. Records carry the neutral model plus per-node
//! scheduling metadata, so a stored pipeline can be re-planned and
//! re-materialized without consulting any dialect.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::definition::StepMetadata;
use crate::model::WorkflowModel;

/// A stored pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub definition: WorkflowModel,
    #[serde(default)]
    pub metadata_by_node_id: HashMap<String, StepMetadata>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl PipelineRecord {
    pub fn new(id: impl Into<String>, definition: WorkflowModel) -> Self {
        let now = SystemTime::now();
        Self {
            id: id.into(),
            name: None,
            description: None,
            definition,
            metadata_by_node_id: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A row of [`PipelineStore::list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub updated_at: SystemTime,
}

/// Storage contract for pipelines.
///
/// Implementations preserve `created_at` across updates of the same id
/// and refresh `updated_at` on every save.
pub trait PipelineStore: Send + Sync {
    fn save(&self, record: PipelineRecord);
    fn get(&self, id: &str) -> Option<PipelineRecord>;
    fn list(&self) -> Vec<PipelineSummary>;
    fn delete(&self, id: &str) -> bool;
    fn has(&self, id: &str) -> bool;
    fn clear(&self);
}

/// In-memory store keyed by pipeline id.
#[derive(Debug, Default)]
pub struct MemoryPipelineStore {
    records: RwLock<HashMap<String, PipelineRecord>>,
}

impl MemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineStore for MemoryPipelineStore {
    fn save(&self, mut record: PipelineRecord) {
        let mut records = self.records.write().expect("pipeline store poisoned");
        if let Some(existing) = records.get(&record.id) {
            record.created_at = existing.created_at;
        }
        record.updated_at = SystemTime::now();
        records.insert(record.id.clone(), record);
    }

    fn get(&self, id: &str) -> Option<PipelineRecord> {
        self.records
            .read()
            .expect("pipeline store poisoned")
            .get(id)
            .cloned()
    }

    fn list(&self) -> Vec<PipelineSummary> {
        let records = self.records.read().expect("pipeline store poisoned");
        let mut summaries: Vec<PipelineSummary> = records
            .values()
            .map(|r| PipelineSummary {
                id: r.id.clone(),
                name: r.name.clone(),
                updated_at: r.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    fn delete(&self, id: &str) -> bool {
        self.records
            .write()
            .expect("pipeline store poisoned")
            .remove(id)
            .is_some()
    }

    fn has(&self, id: &str) -> bool {
        self.records
            .read()
            .expect("pipeline store poisoned")
            .contains_key(id)
    }

    fn clear(&self) {
        self.records
            .write()
            .expect("pipeline store poisoned")
            .clear();
    }
}
