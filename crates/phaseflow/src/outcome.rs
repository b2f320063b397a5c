//! Results of a single phase execution.

use phaseflow_core::{PhaseName, ValidationResult};
use std::fmt;

/// Which side of the executor a validation failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Pre,
    Post,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Pre => write!(f, "pre"),
            Boundary::Post => write!(f, "post"),
        }
    }
}

/// What happened when the engine ran the current phase of a flow.
///
/// Validation and executor failures are outcomes, not errors: the operation
/// itself succeeded in recording them.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// The phase succeeded and the flow moved to the next one.
    Advanced {
        from: PhaseName,
        to: PhaseName,
        attempts: u32,
    },
    /// The last phase succeeded; the flow is `COMPLETED`.
    Completed { phase: PhaseName, attempts: u32 },
    /// The executor asked for external input; the flow is `PAUSED`.
    Paused { phase: PhaseName, reason: String },
    /// The flow stays `RUNNING` at the same phase; nothing was persisted
    /// beyond the claim.
    ValidationFailed {
        phase: PhaseName,
        boundary: Boundary,
        result: ValidationResult,
    },
    /// Fatal error or retries exhausted; the flow is `FAILED`.
    Failed {
        phase: PhaseName,
        error: String,
        attempts: u32,
    },
    /// The flow was cancelled while the phase was running.
    Cancelled { phase: PhaseName },
}

impl PhaseOutcome {
    /// The phase the outcome is about.
    pub fn phase(&self) -> &PhaseName {
        match self {
            PhaseOutcome::Advanced { from, .. } => from,
            PhaseOutcome::Completed { phase, .. }
            | PhaseOutcome::Paused { phase, .. }
            | PhaseOutcome::ValidationFailed { phase, .. }
            | PhaseOutcome::Failed { phase, .. }
            | PhaseOutcome::Cancelled { phase } => phase,
        }
    }

    pub fn is_advanced(&self) -> bool {
        matches!(self, PhaseOutcome::Advanced { .. })
    }

    /// Returns `true` if the flow can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseOutcome::Completed { .. } | PhaseOutcome::Failed { .. } | PhaseOutcome::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_phase() {
        let outcome = PhaseOutcome::Advanced {
            from: PhaseName::new("import"),
            to: PhaseName::new("mapping"),
            attempts: 1,
        };
        assert_eq!(outcome.phase(), "import");
        assert!(outcome.is_advanced());
        assert!(!outcome.is_terminal());

        let outcome = PhaseOutcome::ValidationFailed {
            phase: PhaseName::new("mapping"),
            boundary: Boundary::Post,
            result: ValidationResult::fail("no mappings"),
        };
        assert_eq!(outcome.phase(), "mapping");
        assert!(!outcome.is_terminal());
        assert!(PhaseOutcome::Cancelled { phase: PhaseName::new("mapping") }.is_terminal());
    }
}
