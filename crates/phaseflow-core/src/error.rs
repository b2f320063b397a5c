//! Error taxonomy.

use crate::flow::{FlowId, FlowStatus, FlowType};
use crate::phase::{ExecutorRef, PhaseName};
use crate::retry::RetryPolicyError;
use crate::validation::ValidatorName;
use std::fmt;
use thiserror::Error;

/// The engine operation a caller attempted.
///
/// Used in [`FlowError::InvalidTransition`] to identify what was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOperation {
    Execute,
    Resume,
    Cancel,
    ForceRerun,
}

impl fmt::Display for FlowOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowOperation::Execute => write!(f, "execute"),
            FlowOperation::Resume => write!(f, "resume"),
            FlowOperation::Cancel => write!(f, "cancel"),
            FlowOperation::ForceRerun => write!(f, "force re-run"),
        }
    }
}

/// Malformed registries, phase configurations or alias tables.
///
/// Raised while building the catalog at startup, never at runtime.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("Flow type '{0}' declares no phases")]
    EmptyFlowType(FlowType),

    #[error("Flow type '{flow_type}' declares phase '{phase}' more than once")]
    DuplicatePhase { flow_type: FlowType, phase: PhaseName },

    #[error("Flow type '{0}' is already registered with a different phase list")]
    ConflictingRegistration(FlowType),

    #[error("Phase '{phase}' of flow type '{flow_type}' references unknown validator '{validator}'")]
    UnknownValidator {
        flow_type: FlowType,
        phase: PhaseName,
        validator: ValidatorName,
    },

    #[error("Phase '{phase}' of flow type '{flow_type}' references unknown executor '{executor}'")]
    UnknownExecutor {
        flow_type: FlowType,
        phase: PhaseName,
        executor: ExecutorRef,
    },

    #[error("Validator '{0}' is registered more than once")]
    DuplicateValidator(ValidatorName),

    #[error("Executor '{0}' is registered more than once")]
    DuplicateExecutor(ExecutorRef),

    #[error("Flow type '{0}' is not registered")]
    UnregisteredFlowType(FlowType),

    #[error("Alias '{alias}' of flow type '{flow_type}' targets '{target}', which is not a canonical phase")]
    AliasTargetNotCanonical {
        flow_type: FlowType,
        alias: String,
        target: String,
    },

    #[error("Alias '{alias}' shadows a different canonical phase of flow type '{flow_type}'")]
    AliasShadowsCanonical { flow_type: FlowType, alias: String },

    #[error("Alias '{alias}' of flow type '{flow_type}' maps to both '{first}' and '{second}'")]
    AmbiguousAlias {
        flow_type: FlowType,
        alias: String,
        first: PhaseName,
        second: PhaseName,
    },

    #[error("Phase '{phase}' is marked as moved out of flow type '{flow_type}' but still resolves there")]
    MovedPhaseStillResolves { flow_type: FlowType, phase: String },

    #[error("Phase '{phase}' cannot move from flow type '{flow_type}' to itself")]
    MovedToSameFlowType { flow_type: FlowType, phase: String },

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(#[from] RetryPolicyError),

    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidEngineConfig(&'static str),
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(error: serde_json::Error) -> Self {
        ConfigurationError::Catalog(error.to_string())
    }
}

/// Phase-name resolution failure. The flow is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    /// Not a canonical name or known alias anywhere it could be attributed.
    #[error("Unknown phase '{phase}' for flow type '{flow_type}'")]
    UnknownPhase { flow_type: FlowType, phase: String },

    /// The name is valid, but the work now lives in another flow type.
    #[error("Phase '{phase}' no longer belongs to flow type '{flow_type}'; it moved to '{target_flow_type}'")]
    PhaseMoved {
        flow_type: FlowType,
        phase: String,
        target_flow_type: FlowType,
    },

    #[error("Flow type '{0}' is not registered")]
    UnregisteredFlowType(FlowType),
}

/// Failure reported by a [`StateStore`](crate::StateStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// Absent, or not visible within the requested tenant scope.
    #[error("Flow not found: {0}")]
    NotFound(FlowId),

    #[error("Flow already exists: {0}")]
    AlreadyExists(FlowId),

    /// Optimistic concurrency check failed.
    #[error("Version conflict on flow {flow_id}: expected {expected}, found {found}")]
    Conflict {
        flow_id: FlowId,
        expected: u64,
        found: u64,
    },

    #[error("State store backend error: {0}")]
    Backend(String),
}

/// Failure returned by a [`PhaseExecutor`](crate::PhaseExecutor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Transient; retried per the phase's retry policy.
    #[error("Retryable executor error: {0}")]
    Retryable(String),

    /// Non-retryable; fails the flow immediately.
    #[error("Fatal executor error: {0}")]
    Fatal(String),
}

impl ExecutorError {
    pub fn retryable(details: impl Into<String>) -> Self {
        ExecutorError::Retryable(details.into())
    }

    pub fn fatal(details: impl Into<String>) -> Self {
        ExecutorError::Fatal(details.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutorError::Retryable(_))
    }
}

/// Errors returned by engine operations.
///
/// Validation failures and executor failures are *not* errors: they are
/// reported as phase outcomes. An `Err` means the operation itself could not
/// be carried out.
///
/// # Non-Exhaustive
///
/// Always include a wildcard arm when matching:
///
/// ```
/// use phaseflow_core::FlowError;
///
/// fn describe(error: &FlowError) -> &'static str {
///     match error {
///         FlowError::Conflict(_) => "retry the whole operation",
///         FlowError::Resolve(_) => "fix the phase name",
///         FlowError::InvalidTransition { .. } => "check the flow status",
///         _ => "unexpected",
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    FlowNotFound(FlowId),

    #[error("Flow type '{0}' is not registered")]
    UnregisteredFlowType(FlowType),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Cannot {operation} flow {flow_id} while it is {status}")]
    InvalidTransition {
        flow_id: FlowId,
        status: FlowStatus,
        operation: FlowOperation,
    },

    /// Another caller is executing or has modified the flow. Retry the whole
    /// operation; the phase logic did not fail.
    #[error("Flow {0} was modified concurrently")]
    Conflict(FlowId),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl From<StoreError> for FlowError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(flow_id) => FlowError::FlowNotFound(flow_id),
            StoreError::Conflict { flow_id, .. } => FlowError::Conflict(flow_id),
            other => FlowError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ResolveError::PhaseMoved {
            flow_type: FlowType::DISCOVERY,
            phase: "gap_analysis".to_string(),
            target_flow_type: FlowType::ASSESSMENT,
        };
        assert_eq!(
            error.to_string(),
            "Phase 'gap_analysis' no longer belongs to flow type 'discovery'; it moved to 'assessment'"
        );

        let flow_id = FlowId::new();
        let error = FlowError::InvalidTransition {
            flow_id,
            status: FlowStatus::Running,
            operation: FlowOperation::Resume,
        };
        assert_eq!(
            error.to_string(),
            format!("Cannot resume flow {flow_id} while it is RUNNING")
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let flow_id = FlowId::new();
        assert!(matches!(
            FlowError::from(StoreError::NotFound(flow_id)),
            FlowError::FlowNotFound(id) if id == flow_id
        ));
        assert!(matches!(
            FlowError::from(StoreError::Conflict { flow_id, expected: 1, found: 2 }),
            FlowError::Conflict(id) if id == flow_id
        ));
        assert!(matches!(
            FlowError::from(StoreError::Backend("disk full".to_string())),
            FlowError::Store(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_executor_error_kind() {
        assert!(ExecutorError::retryable("timeout").is_retryable());
        assert!(!ExecutorError::fatal("bad schema").is_retryable());
        assert_eq!(
            ExecutorError::fatal("bad schema").to_string(),
            "Fatal executor error: bad schema"
        );
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(FlowOperation::Execute.to_string(), "execute");
        assert_eq!(FlowOperation::ForceRerun.to_string(), "force re-run");
    }
}
