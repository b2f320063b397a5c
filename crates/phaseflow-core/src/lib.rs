//! Core traits and types for the phaseflow execution engine.
//!
//! This crate provides the domain model and contracts without runtime
//! dependencies. Hosts depend on it to implement executors, validators and
//! state stores; the `phaseflow` crate drives them.
//!
//! # Core Types
//!
//! - [`FlowRecord`] - Persisted state of one flow
//! - [`PhasePayload`] - Caller inputs plus one output section per phase
//! - [`PhaseConfig`] - Declarative description of one phase
//! - [`PhaseExecutor`] - The pluggable unit of work a phase invokes
//! - [`RetryPolicy`] - Backoff and exhaustion arithmetic
//!
//! # Registries
//!
//! - [`ValidatorRegistry`] - Named boundary checks
//! - [`ExecutorRegistry`] - Named executors
//! - [`FlowTypeRegistry`] - Ordered phases per flow type
//! - [`PhaseAliasResolver`] - Legacy phase names to canonical ones
//!
//! # Contracts
//!
//! - [`StateStore`] - Version-checked persistence
//! - [`FailureJournal`] - Best-effort failure side channel

mod alias;
pub mod duration_ms;
mod error;
mod flow;
mod journal;
mod payload;
mod phase;
mod registry;
mod retry;
mod store;
mod validation;

pub use alias::{PhaseAliasResolver, PhaseAliasResolverBuilder};
pub use error::{
    ConfigurationError, ExecutorError, FlowError, FlowOperation, ResolveError, StoreError,
};
pub use flow::{ErrorDetail, FlowId, FlowRecord, FlowSnapshot, FlowStatus, FlowType, TenantScope};
pub use journal::{FailureJournal, JournalEntry, JournalError, JournalKind};
pub use payload::{InputKey, PhaseInputs, PhasePayload, PhaseSection};
pub use phase::{
    ExecutorOutput, ExecutorRef, ExecutorRegistry, PhaseConfig, PhaseExecutor, PhaseName,
    ResolvedInputs,
};
pub use registry::FlowTypeRegistry;
pub use retry::{RetryPolicy, RetryPolicyError};
pub use store::StateStore;
pub use validation::{ValidationResult, Validator, ValidatorName, ValidatorRegistry};
