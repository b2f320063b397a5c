//! Persistence contract for flow records.

use crate::error::StoreError;
use crate::flow::{FlowId, FlowRecord, TenantScope};
use async_trait::async_trait;

/// Durable storage for [`FlowRecord`]s.
///
/// Implementations must filter every read and write by tenant scope: a record
/// outside the caller's scope behaves as if it did not exist.
///
/// Updates are compare-and-swap on [`FlowRecord::version`], which is what
/// serializes writers across processes.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persists a new record.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the flow id is taken.
    async fn create(&self, record: FlowRecord) -> Result<FlowId, StoreError>;

    /// Loads a record visible within `scope`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent or owned by another tenant.
    async fn get(&self, scope: &TenantScope, flow_id: FlowId) -> Result<FlowRecord, StoreError>;

    /// Replaces the stored record if its version still equals
    /// `expected_version`, and returns the stored copy with the version
    /// incremented and `updated_at` refreshed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if absent or owned by another tenant
    /// - [`StoreError::Conflict`] if another writer got there first
    async fn update(
        &self,
        record: &FlowRecord,
        expected_version: u64,
    ) -> Result<FlowRecord, StoreError>;
}
