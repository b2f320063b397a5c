//! Flow identity, lifecycle status and persisted state.

use crate::error::{FlowError, FlowOperation};
use crate::payload::PhasePayload;
use crate::phase::PhaseName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

/// Process-wide unique flow identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(Uuid);

impl FlowId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FlowId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of pipeline; determines the ordered phase list.
///
/// The well-known types are associated constants. Hosts add their own with
/// [`FlowType::new`].
///
/// ```
/// use phaseflow_core::FlowType;
///
/// assert_eq!(FlowType::DISCOVERY.as_str(), "discovery");
/// assert_eq!(FlowType::new("discovery"), FlowType::DISCOVERY);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowType(Cow<'static, str>);

impl FlowType {
    pub const DISCOVERY: FlowType = FlowType(Cow::Borrowed("discovery"));
    pub const COLLECTION: FlowType = FlowType(Cow::Borrowed("collection"));
    pub const ASSESSMENT: FlowType = FlowType(Cow::Borrowed("assessment"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlowType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FlowType {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

impl std::borrow::Borrow<str> for FlowType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a flow.
///
/// ```text
/// INITIALIZED -> RUNNING -> { PAUSED <-> RUNNING } -> { COMPLETED | FAILED | CANCELLED }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Initialized,
    Running,
    /// Waiting for external input before the current phase is re-run.
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl FlowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowStatus::Completed | FlowStatus::Failed | FlowStatus::Cancelled
        )
    }

    /// Returns `true` if the state machine allows moving to `next`.
    ///
    /// Administrative re-runs bypass this table.
    pub fn can_transition_to(self, next: FlowStatus) -> bool {
        use FlowStatus::*;
        matches!(
            (self, next),
            (Initialized, Running)
                | (Initialized, Cancelled)
                | (Running, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowStatus::Initialized => "INITIALIZED",
            FlowStatus::Running => "RUNNING",
            FlowStatus::Paused => "PAUSED",
            FlowStatus::Completed => "COMPLETED",
            FlowStatus::Failed => "FAILED",
            FlowStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant isolation pair. Propagated to every store call, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    pub account_id: String,
    pub engagement_id: String,
}

impl TenantScope {
    pub fn new(account_id: impl Into<String>, engagement_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            engagement_id: engagement_id.into(),
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.engagement_id)
    }
}

/// Last failure recorded on a flow, kept so operators can diagnose a
/// `FAILED` flow without replaying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub phase: PhaseName,
    pub message: String,
    pub attempts: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Persisted state of one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub flow_id: FlowId,
    pub flow_type: FlowType,
    pub status: FlowStatus,
    pub current_phase: PhaseName,
    pub tenant_scope: TenantScope,
    pub payload: PhasePayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<ErrorDetail>,
    pub pause_reason: Option<String>,
    /// Optimistic concurrency token; bumped by every store update.
    pub version: u64,
}

impl FlowRecord {
    /// Creates a new `INITIALIZED` record positioned at `first_phase`.
    pub fn new(
        flow_type: FlowType,
        first_phase: PhaseName,
        tenant_scope: TenantScope,
        payload: PhasePayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            flow_id: FlowId::new(),
            flow_type,
            status: FlowStatus::Initialized,
            current_phase: first_phase,
            tenant_scope,
            payload,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_error: None,
            pause_reason: None,
            version: 0,
        }
    }

    /// Moves to `next` if the state machine allows it.
    pub fn transition(&mut self, next: FlowStatus, operation: FlowOperation) -> Result<(), FlowError> {
        if !self.status.can_transition_to(next) {
            return Err(FlowError::InvalidTransition {
                flow_id: self.flow_id,
                status: self.status,
                operation,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            flow_id: self.flow_id,
            flow_type: self.flow_type.clone(),
            status: self.status,
            current_phase: self.current_phase.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            last_error: self.last_error.clone(),
            pause_reason: self.pause_reason.clone(),
        }
    }
}

/// Read-only projection returned by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub flow_id: FlowId,
    pub flow_type: FlowType,
    pub status: FlowStatus,
    pub current_phase: PhaseName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<ErrorDetail>,
    pub pause_reason: Option<String>,
}
