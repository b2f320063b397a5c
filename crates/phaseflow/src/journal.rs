//! Failure journal implementations.

use async_trait::async_trait;
use phaseflow_core::{FailureJournal, FlowId, JournalEntry, JournalError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Writes every entry as a `warn!` event. The engine default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJournal;

#[async_trait]
impl FailureJournal for TracingJournal {
    async fn record(&self, entry: JournalEntry) -> Result<(), JournalError> {
        warn!(
            flow_id = %entry.flow_id,
            flow_type = %entry.flow_type,
            phase = %entry.phase,
            kind = %entry.kind,
            attempt = entry.attempt,
            "{}",
            entry.message
        );
        Ok(())
    }
}

/// Keeps entries in memory, for tests and diagnostics endpoints.
#[derive(Debug, Default, Clone)]
pub struct InMemoryJournal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in the order they were recorded.
    pub async fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn entries_for(&self, flow_id: FlowId) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.flow_id == flow_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FailureJournal for InMemoryJournal {
    async fn record(&self, entry: JournalEntry) -> Result<(), JournalError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}
