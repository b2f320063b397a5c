//! In-memory [`StateStore`] for tests, demos and single-process hosts.

use async_trait::async_trait;
use chrono::Utc;
use phaseflow_core::{FlowId, FlowRecord, StateStore, StoreError, TenantScope};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Volatile state store keyed by flow id.
///
/// Cloning is cheap and clones share the same records.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStateStore {
    records: Arc<RwLock<HashMap<FlowId, FlowRecord>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Every record visible within `scope`, oldest first.
    pub async fn list(&self, scope: &TenantScope) -> Vec<FlowRecord> {
        let records = self.records.read().await;
        let mut visible: Vec<FlowRecord> = records
            .values()
            .filter(|record| record.tenant_scope == *scope)
            .cloned()
            .collect();
        visible.sort_by_key(|record| record.created_at);
        visible
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn create(&self, record: FlowRecord) -> Result<FlowId, StoreError> {
        let mut records = self.records.write().await;
        let flow_id = record.flow_id;
        if records.contains_key(&flow_id) {
            return Err(StoreError::AlreadyExists(flow_id));
        }
        records.insert(flow_id, record);
        Ok(flow_id)
    }

    async fn get(&self, scope: &TenantScope, flow_id: FlowId) -> Result<FlowRecord, StoreError> {
        let records = self.records.read().await;
        records
            .get(&flow_id)
            .filter(|record| record.tenant_scope == *scope)
            .cloned()
            .ok_or(StoreError::NotFound(flow_id))
    }

    async fn update(
        &self,
        record: &FlowRecord,
        expected_version: u64,
    ) -> Result<FlowRecord, StoreError> {
        let mut records = self.records.write().await;
        let flow_id = record.flow_id;
        let stored = records
            .get_mut(&flow_id)
            .filter(|stored| stored.tenant_scope == record.tenant_scope)
            .ok_or(StoreError::NotFound(flow_id))?;

        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                flow_id,
                expected: expected_version,
                found: stored.version,
            });
        }

        let mut next = record.clone();
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }
}
