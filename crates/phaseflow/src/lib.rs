//! A resumable, phase-based flow execution engine.
//!
//! Flows move through the ordered phases of their flow type one
//! [`ExecutionEngine::execute_phase`] call at a time. Each phase is guarded by
//! validators, retried on transient executor failures, may pause for human
//! input, and persists its result through a [`StateStore`] so a flow survives
//! restarts.
//!
//! # Example
//!
//! ```rust,ignore
//! use phaseflow::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = CatalogConfig::from_json_str(include_str!("catalog.json"))?
//!         .build(Arc::new(validators()), Arc::new(executors()))?;
//!     let engine = ExecutionEngine::builder(catalog).build()?;
//!
//!     let scope = TenantScope::new("acct-1", "eng-1");
//!     let flow_id = engine.initialize(&FlowType::DISCOVERY, &scope, inputs()).await?;
//!     match engine.run_until_blocked(&scope, flow_id).await? {
//!         PhaseOutcome::Paused { reason, .. } => println!("waiting for: {reason}"),
//!         outcome => println!("{outcome:?}"),
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod journal;
mod lock;
mod memory;
mod outcome;

// Re-export core types
pub use phaseflow_core::*;

pub use config::{Catalog, CatalogConfig, EngineConfig, FlowTypeConfig};
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use journal::{InMemoryJournal, TracingJournal};
pub use lock::{FlowLease, FlowLocks};
pub use memory::InMemoryStateStore;
pub use outcome::{Boundary, PhaseOutcome};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Boundary, Catalog, CatalogConfig, EngineConfig, ExecutionEngine, ExecutorError,
        ExecutorOutput, ExecutorRegistry, FlowError, FlowId, FlowStatus, FlowType,
        FlowTypeRegistry, InputKey, PhaseAliasResolver, PhaseConfig, PhaseExecutor, PhaseInputs,
        PhaseName, PhaseOutcome, PhasePayload, PhaseSection, RetryPolicy, StateStore,
        TenantScope, ValidationResult, ValidatorRegistry,
    };
}
