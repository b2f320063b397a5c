//! Failure journal: a side channel recording why flows stalled or failed.

use crate::flow::{FlowId, FlowType};
use crate::phase::PhaseName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    PreValidationFailed,
    PostValidationFailed,
    /// A transient failure that will be retried.
    AttemptFailed,
    ExecutorFailed,
    Cancelled,
}

impl fmt::Display for JournalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JournalKind::PreValidationFailed => "pre_validation_failed",
            JournalKind::PostValidationFailed => "post_validation_failed",
            JournalKind::AttemptFailed => "attempt_failed",
            JournalKind::ExecutorFailed => "executor_failed",
            JournalKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub flow_id: FlowId,
    pub flow_type: FlowType,
    pub phase: PhaseName,
    pub kind: JournalKind,
    pub message: String,
    /// Executor attempt the entry belongs to; 0 outside the attempt loop.
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(
        flow_id: FlowId,
        flow_type: FlowType,
        phase: PhaseName,
        kind: JournalKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            flow_id,
            flow_type,
            phase,
            kind,
            message: message.into(),
            attempt: 0,
            at: Utc::now(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failure journal unavailable: {0}")]
pub struct JournalError(pub String);

/// Sink for [`JournalEntry`]s.
///
/// Best effort: the engine logs and ignores a failing journal, so an
/// implementation must never be relied on for flow correctness.
#[async_trait]
pub trait FailureJournal: Send + Sync {
    async fn record(&self, entry: JournalEntry) -> Result<(), JournalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let flow_id = FlowId::new();
        let entry = JournalEntry::new(
            flow_id,
            FlowType::DISCOVERY,
            PhaseName::new("import"),
            JournalKind::AttemptFailed,
            "connection reset",
        )
        .with_attempt(2);
        assert_eq!(entry.flow_id, flow_id);
        assert_eq!(entry.attempt, 2);
        assert_eq!(entry.kind.to_string(), "attempt_failed");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&JournalKind::PostValidationFailed).expect("serialize");
        assert_eq!(json, "\"post_validation_failed\"");
    }
}
