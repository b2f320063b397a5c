//! Execution engine driving flows through their phases.

use crate::config::{Catalog, EngineConfig};
use crate::journal::TracingJournal;
use crate::lock::FlowLocks;
use crate::memory::InMemoryStateStore;
use crate::outcome::{Boundary, PhaseOutcome};
use chrono::Utc;
use phaseflow_core::{
    ConfigurationError, ErrorDetail, ExecutorError, ExecutorOutput, FailureJournal, FlowError,
    FlowId, FlowOperation, FlowRecord, FlowSnapshot, FlowStatus, FlowType, JournalEntry,
    JournalKind, PhaseConfig, PhasePayload, ResolveError, StateStore, StoreError,
    TenantScope, ValidationResult,
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runs flows one phase at a time.
///
/// The engine holds no per-flow state between calls: everything needed to
/// resume lives in the [`StateStore`]. Each call executes at most one phase.
///
/// # Examples
///
/// ```
/// use phaseflow::prelude::*;
/// use async_trait::async_trait;
/// use serde_json::{json, Map};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Import;
///
/// #[async_trait]
/// impl PhaseExecutor for Import {
///     async fn run(&self, _: &PhasePayload, _: &PhaseInputs) -> Result<ExecutorOutput, ExecutorError> {
///         Ok(ExecutorOutput::done(json!({"rows": 3})))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut executors = ExecutorRegistry::new();
/// executors.register("import", Import)?;
/// let mut registry = FlowTypeRegistry::new(Arc::new(ValidatorRegistry::new()), Arc::new(executors));
/// registry.register(FlowType::DISCOVERY, vec![PhaseConfig::new("data_import", "import")])?;
///
/// let engine = ExecutionEngine::builder(Catalog::canonical_only(Arc::new(registry))).build()?;
/// let scope = TenantScope::new("acct-1", "eng-1");
/// let flow_id = engine.initialize(&FlowType::DISCOVERY, &scope, Map::new()).await?;
///
/// let outcome = engine.execute_phase(&scope, flow_id).await?;
/// assert!(matches!(outcome, PhaseOutcome::Completed { .. }));
/// assert_eq!(engine.get_status(&scope, flow_id).await?.status, FlowStatus::Completed);
/// # Ok(())
/// # }
/// ```
pub struct ExecutionEngine {
    catalog: Catalog,
    store: Arc<dyn StateStore>,
    journal: Arc<dyn FailureJournal>,
    locks: FlowLocks,
    config: EngineConfig,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("flow_types", &self.catalog.registry().flow_types().collect::<Vec<_>>())
            .field("in_flight", &self.locks.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ExecutionEngine {
    /// Creates a new engine builder.
    pub fn builder(catalog: Catalog) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a flow positioned at the first phase of `flow_type`.
    pub async fn initialize(
        &self,
        flow_type: &FlowType,
        scope: &TenantScope,
        inputs: Map<String, Value>,
    ) -> Result<FlowId, FlowError> {
        let first = self
            .catalog
            .registry()
            .first_phase(flow_type)
            .ok_or_else(|| FlowError::UnregisteredFlowType(flow_type.clone()))?;

        let record = FlowRecord::new(
            flow_type.clone(),
            first.name.clone(),
            scope.clone(),
            PhasePayload::with_inputs(inputs),
        );
        let flow_id = self.store.create(record).await?;
        info!(
            flow_id = %flow_id,
            flow_type = %flow_type,
            tenant = %scope,
            "Flow initialized at phase '{}'",
            first.name
        );
        Ok(flow_id)
    }

    /// Executes the current phase of a flow that is `INITIALIZED` or `RUNNING`.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Conflict`] if another call is executing the flow, or
    ///   the flow changed underneath this call
    /// - [`FlowError::FlowNotFound`] if absent or outside `scope`
    /// - [`FlowError::InvalidTransition`] from any other status
    /// - [`FlowError::Resolve`] if the stored phase no longer resolves
    pub async fn execute_phase(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
    ) -> Result<PhaseOutcome, FlowError> {
        let _lease = self
            .locks
            .try_acquire(flow_id)
            .ok_or(FlowError::Conflict(flow_id))?;

        let mut record = self.store.get(scope, flow_id).await?;
        if !matches!(record.status, FlowStatus::Initialized | FlowStatus::Running) {
            return Err(invalid_transition(&record, FlowOperation::Execute));
        }
        record.transition(FlowStatus::Running, FlowOperation::Execute)?;
        self.run_current_phase(record).await
    }

    /// Re-executes the current phase of a `PAUSED` flow.
    pub async fn resume(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
    ) -> Result<PhaseOutcome, FlowError> {
        self.resume_with_input(scope, flow_id, Map::new()).await
    }

    /// Merges `inputs` into the payload of a `PAUSED` flow, then resumes it.
    ///
    /// This is how an approval gate receives its decision.
    pub async fn resume_with_input(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
        inputs: Map<String, Value>,
    ) -> Result<PhaseOutcome, FlowError> {
        let _lease = self
            .locks
            .try_acquire(flow_id)
            .ok_or(FlowError::Conflict(flow_id))?;

        let mut record = self.store.get(scope, flow_id).await?;
        if record.status != FlowStatus::Paused {
            return Err(invalid_transition(&record, FlowOperation::Resume));
        }
        record.transition(FlowStatus::Running, FlowOperation::Resume)?;
        record.pause_reason = None;
        if !inputs.is_empty() {
            debug!(flow_id = %flow_id, keys = inputs.len(), "Merging resume inputs");
            record.payload.extend_inputs(inputs);
        }
        info!(flow_id = %flow_id, "Resuming phase '{}'", record.current_phase);
        self.run_current_phase(record).await
    }

    /// Moves a flow back to `phase_name`, whatever its status, and executes it.
    ///
    /// The name is resolved against the flow's type first; on a resolution
    /// error nothing is written.
    pub async fn force_rerun_phase(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
        phase_name: &str,
    ) -> Result<PhaseOutcome, FlowError> {
        let _lease = self
            .locks
            .try_acquire(flow_id)
            .ok_or(FlowError::Conflict(flow_id))?;

        let mut record = self.store.get(scope, flow_id).await?;
        let canonical = self
            .catalog
            .resolver()
            .normalize(&record.flow_type, phase_name)?;

        warn!(
            flow_id = %flow_id,
            status = %record.status,
            "Forcing re-run of phase '{}' (was at '{}')",
            canonical,
            record.current_phase
        );
        record.current_phase = canonical;
        record.status = FlowStatus::Running;
        record.last_error = None;
        record.pause_reason = None;
        record.completed_at = None;
        self.run_current_phase(record).await
    }

    /// Read-only view of a flow. Takes no lock.
    pub async fn get_status(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
    ) -> Result<FlowSnapshot, FlowError> {
        Ok(self.store.get(scope, flow_id).await?.snapshot())
    }

    /// Cancels a non-terminal flow.
    ///
    /// Takes no execution lock: an in-flight execution notices the
    /// cancellation at its next attempt boundary or when it persists.
    pub async fn cancel(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
    ) -> Result<FlowSnapshot, FlowError> {
        for attempt in 1..=self.config.cancel_write_attempts {
            let mut record = self.store.get(scope, flow_id).await?;
            record.transition(FlowStatus::Cancelled, FlowOperation::Cancel)?;
            record.pause_reason = None;

            match self.store.update(&record, record.version).await {
                Ok(stored) => {
                    info!(flow_id = %flow_id, "Flow cancelled at phase '{}'", stored.current_phase);
                    self.record_journal(JournalEntry::new(
                        flow_id,
                        stored.flow_type.clone(),
                        stored.current_phase.clone(),
                        JournalKind::Cancelled,
                        "flow cancelled",
                    ))
                    .await;
                    return Ok(stored.snapshot());
                }
                Err(StoreError::Conflict { .. }) => {
                    debug!(flow_id = %flow_id, attempt, "Cancel lost a version race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(FlowError::Conflict(flow_id))
    }

    /// Executes phases until one does not advance, and returns that outcome.
    pub async fn run_until_blocked(
        &self,
        scope: &TenantScope,
        flow_id: FlowId,
    ) -> Result<PhaseOutcome, FlowError> {
        loop {
            let outcome = self.execute_phase(scope, flow_id).await?;
            if !outcome.is_advanced() {
                return Ok(outcome);
            }
        }
    }

    /// Claims the current phase, validates, runs the executor and persists
    /// the result. `record` must already carry status `RUNNING`.
    async fn run_current_phase(&self, mut record: FlowRecord) -> Result<PhaseOutcome, FlowError> {
        let canonical = self
            .catalog
            .resolver()
            .normalize(&record.flow_type, record.current_phase.as_str())?;
        let phase = self
            .catalog
            .registry()
            .phase(&record.flow_type, canonical.as_str())
            .ok_or_else(|| ResolveError::UnknownPhase {
                flow_type: record.flow_type.clone(),
                phase: canonical.as_str().to_string(),
            })?;

        if record.current_phase != canonical {
            debug!(
                flow_id = %record.flow_id,
                "Stored phase '{}' normalized to '{}'",
                record.current_phase,
                canonical
            );
            record.current_phase = canonical;
        }
        record = self.store.update(&record, record.version).await?;

        let resolved = phase.resolve_inputs(&record.payload);
        let mut pre = ValidationResult::ok();
        for key in &resolved.missing {
            pre.add_error(format!("required input '{key}' is missing"));
        }
        pre.merge(
            self.catalog
                .registry()
                .validators()
                .run_all(&phase.pre_validators, &record.payload),
        );
        if !pre.is_valid() {
            return Ok(self.validation_failed(&record, phase, Boundary::Pre, pre).await);
        }

        let executor = match self.catalog.registry().executors().get(phase.executor.as_str()) {
            Some(executor) => Arc::clone(executor),
            None => {
                let message = format!("executor '{}' is not registered", phase.executor);
                return self.fail(record, phase, message, 0).await;
            }
        };
        let timeout_duration = phase.timeout.unwrap_or(self.config.default_phase_timeout);
        let policy = phase.retry_policy;

        let mut attempt = 0;
        let output = loop {
            attempt += 1;
            if self.is_cancelled(&record).await? {
                return Ok(PhaseOutcome::Cancelled {
                    phase: phase.name.clone(),
                });
            }

            let result = timeout(timeout_duration, executor.run(&record.payload, &resolved.inputs)).await;
            let error = match result {
                Ok(Ok(output)) => break output,
                Ok(Err(ExecutorError::Fatal(details))) => {
                    warn!(flow_id = %record.flow_id, "Phase '{}' failed fatally: {}", phase.name, details);
                    return self.fail(record, phase, details, attempt).await;
                }
                Ok(Err(ExecutorError::Retryable(details))) => details,
                Err(_) => format!("timed out after {timeout_duration:?}"),
            };

            if !policy.should_retry(attempt) {
                warn!(
                    flow_id = %record.flow_id,
                    "Phase '{}' failed after {} attempts: {}",
                    phase.name,
                    attempt,
                    error
                );
                return self.fail(record, phase, error, attempt).await;
            }

            let delay = policy.next_delay(attempt);
            info!(
                flow_id = %record.flow_id,
                "Phase '{}' failed ({}), retrying ({}/{}) in {:?}",
                phase.name,
                error,
                attempt + 1,
                policy.max_attempts(),
                delay
            );
            self.record_journal(
                self.entry(&record, JournalKind::AttemptFailed, error)
                    .with_attempt(attempt),
            )
            .await;
            tokio::time::sleep(delay).await;
        };

        match output {
            ExecutorOutput::RequiresInput { reason } => {
                info!(flow_id = %record.flow_id, "Phase '{}' paused: {}", phase.name, reason);
                record.transition(FlowStatus::Paused, FlowOperation::Execute)?;
                record.pause_reason = Some(reason.clone());
                let outcome = PhaseOutcome::Paused {
                    phase: phase.name.clone(),
                    reason,
                };
                self.persist(record, outcome).await
            }
            ExecutorOutput::Completed(value) => {
                let mut candidate = record.payload.clone();
                candidate.set_output(phase.name.clone(), value);
                let post = self
                    .catalog
                    .registry()
                    .validators()
                    .run_all(&phase.post_validators, &candidate);
                if !post.is_valid() {
                    return Ok(self.validation_failed(&record, phase, Boundary::Post, post).await);
                }

                info!(flow_id = %record.flow_id, "Phase '{}' completed successfully", phase.name);
                record.payload = candidate;
                let outcome = match self
                    .catalog
                    .registry()
                    .next_phase(&record.flow_type, phase.name.as_str())
                {
                    Some(next) => {
                        record.current_phase = next.name.clone();
                        PhaseOutcome::Advanced {
                            from: phase.name.clone(),
                            to: next.name.clone(),
                            attempts: attempt,
                        }
                    }
                    None => {
                        record.transition(FlowStatus::Completed, FlowOperation::Execute)?;
                        record.completed_at = Some(Utc::now());
                        info!(flow_id = %record.flow_id, "Flow completed");
                        PhaseOutcome::Completed {
                            phase: phase.name.clone(),
                            attempts: attempt,
                        }
                    }
                };
                self.persist(record, outcome).await
            }
        }
    }

    async fn validation_failed(
        &self,
        record: &FlowRecord,
        phase: &PhaseConfig,
        boundary: Boundary,
        result: ValidationResult,
    ) -> PhaseOutcome {
        warn!(
            flow_id = %record.flow_id,
            errors = ?result.errors,
            "Phase '{}' failed {}-validation",
            phase.name,
            boundary
        );
        let kind = match boundary {
            Boundary::Pre => JournalKind::PreValidationFailed,
            Boundary::Post => JournalKind::PostValidationFailed,
        };
        self.record_journal(self.entry(record, kind, result.errors.join("; ")))
            .await;
        PhaseOutcome::ValidationFailed {
            phase: phase.name.clone(),
            boundary,
            result,
        }
    }

    async fn fail(
        &self,
        mut record: FlowRecord,
        phase: &PhaseConfig,
        message: String,
        attempts: u32,
    ) -> Result<PhaseOutcome, FlowError> {
        record.transition(FlowStatus::Failed, FlowOperation::Execute)?;
        record.last_error = Some(ErrorDetail {
            phase: phase.name.clone(),
            message: message.clone(),
            attempts,
            occurred_at: Utc::now(),
        });
        self.record_journal(
            self.entry(&record, JournalKind::ExecutorFailed, message.clone())
                .with_attempt(attempts),
        )
        .await;
        let outcome = PhaseOutcome::Failed {
            phase: phase.name.clone(),
            error: message,
            attempts,
        };
        self.persist(record, outcome).await
    }

    /// Writes the final state of a phase. A lost version race against a
    /// cancellation reports the cancellation instead of a conflict.
    async fn persist(
        &self,
        record: FlowRecord,
        outcome: PhaseOutcome,
    ) -> Result<PhaseOutcome, FlowError> {
        match self.store.update(&record, record.version).await {
            Ok(_) => Ok(outcome),
            Err(StoreError::Conflict { flow_id, .. }) => {
                let current = self.store.get(&record.tenant_scope, flow_id).await?;
                if current.status == FlowStatus::Cancelled {
                    info!(
                        flow_id = %flow_id,
                        "Phase '{}' result discarded, flow was cancelled",
                        outcome.phase()
                    );
                    return Ok(PhaseOutcome::Cancelled {
                        phase: outcome.phase().clone(),
                    });
                }
                Err(FlowError::Conflict(flow_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_cancelled(&self, record: &FlowRecord) -> Result<bool, FlowError> {
        let current = self.store.get(&record.tenant_scope, record.flow_id).await?;
        if current.status != FlowStatus::Cancelled {
            return Ok(false);
        }
        info!(
            flow_id = %record.flow_id,
            "Phase '{}' stopped, flow was cancelled",
            record.current_phase
        );
        Ok(true)
    }

    fn entry(&self, record: &FlowRecord, kind: JournalKind, message: String) -> JournalEntry {
        JournalEntry::new(
            record.flow_id,
            record.flow_type.clone(),
            record.current_phase.clone(),
            kind,
            message,
        )
    }

    async fn record_journal(&self, entry: JournalEntry) {
        let flow_id = entry.flow_id;
        if let Err(e) = self.journal.record(entry).await {
            warn!(flow_id = %flow_id, "Failed to write failure journal: {}", e);
        }
    }
}

fn invalid_transition(record: &FlowRecord, operation: FlowOperation) -> FlowError {
    FlowError::InvalidTransition {
        flow_id: record.flow_id,
        status: record.status,
        operation,
    }
}

/// Builder for constructing [`ExecutionEngine`] instances.
pub struct ExecutionEngineBuilder {
    catalog: Catalog,
    store: Option<Arc<dyn StateStore>>,
    journal: Option<Arc<dyn FailureJournal>>,
    config: EngineConfig,
}

impl ExecutionEngineBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            store: None,
            journal: None,
            config: EngineConfig::default(),
        }
    }

    /// Sets the state store. Defaults to a fresh [`InMemoryStateStore`].
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the failure journal. Defaults to [`TracingJournal`].
    pub fn with_journal(mut self, journal: Arc<dyn FailureJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<ExecutionEngine, ConfigurationError> {
        self.config.validate()?;
        Ok(ExecutionEngine {
            catalog: self.catalog,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStateStore::new())),
            journal: self.journal.unwrap_or_else(|| Arc::new(TracingJournal)),
            locks: FlowLocks::new(),
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::InMemoryJournal;
    use async_trait::async_trait;
    use phaseflow_core::{
        ExecutorRegistry, FlowTypeRegistry, PhaseExecutor, PhaseInputs, PhaseName, RetryPolicy,
        ValidatorRegistry,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl PhaseExecutor for Echo {
        async fn run(
            &self,
            _payload: &PhasePayload,
            inputs: &PhaseInputs,
        ) -> Result<ExecutorOutput, ExecutorError> {
            Ok(ExecutorOutput::done(json!({ "inputs": inputs.len() })))
        }
    }

    /// Fails with a retryable error until `succeed_on`.
    #[derive(Debug)]
    struct Flaky {
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    }

    #[async_trait]
    impl PhaseExecutor for Flaky {
        async fn run(
            &self,
            _payload: &PhasePayload,
            _inputs: &PhaseInputs,
        ) -> Result<ExecutorOutput, ExecutorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                Err(ExecutorError::retryable(format!("attempt {call} failed")))
            } else {
                Ok(ExecutorOutput::done(json!({ "ok": true })))
            }
        }
    }

    #[derive(Debug)]
    struct Sleepy;

    #[async_trait]
    impl PhaseExecutor for Sleepy {
        async fn run(
            &self,
            _payload: &PhasePayload,
            _inputs: &PhaseInputs,
        ) -> Result<ExecutorOutput, ExecutorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ExecutorOutput::done(Value::Null))
        }
    }

    fn engine_with(phases: Vec<PhaseConfig>, calls: Arc<AtomicU32>) -> (ExecutionEngine, InMemoryJournal) {
        let mut executors = ExecutorRegistry::new();
        executors.register("echo", Echo).expect("unique");
        executors
            .register("flaky", Flaky { calls, succeed_on: 3 })
            .expect("unique");
        executors.register("sleepy", Sleepy).expect("unique");
        let mut registry =
            FlowTypeRegistry::new(Arc::new(ValidatorRegistry::new()), Arc::new(executors));
        registry
            .register(FlowType::DISCOVERY, phases)
            .expect("valid phases");

        let journal = InMemoryJournal::new();
        let engine = ExecutionEngine::builder(Catalog::canonical_only(Arc::new(registry)))
            .with_journal(Arc::new(journal.clone()))
            .with_config(EngineConfig::default().with_default_phase_timeout(Duration::from_millis(50)))
            .build()
            .expect("valid engine");
        (engine, journal)
    }

    fn scope() -> TenantScope {
        TenantScope::new("acct", "eng")
    }

    #[tokio::test]
    async fn test_unregistered_flow_type() {
        let (engine, _) = engine_with(vec![PhaseConfig::new("a", "echo")], Arc::default());
        let err = engine
            .initialize(&FlowType::ASSESSMENT, &scope(), Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnregisteredFlowType(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let phases = vec![
            PhaseConfig::new("a", "flaky").with_retry(RetryPolicy::fixed(3, Duration::from_millis(10))),
            PhaseConfig::new("b", "echo"),
        ];
        let (engine, journal) = engine_with(phases, Arc::clone(&calls));
        let flow_id = engine
            .initialize(&FlowType::DISCOVERY, &scope(), Map::new())
            .await
            .expect("initialize");

        let outcome = engine.execute_phase(&scope(), flow_id).await.expect("execute");
        assert_eq!(
            outcome,
            PhaseOutcome::Advanced {
                from: PhaseName::new("a"),
                to: PhaseName::new("b"),
                attempts: 3,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let attempts: Vec<u32> = journal.entries_for(flow_id).await.iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exhausts_retries() {
        let phases = vec![PhaseConfig::new("slow", "sleepy")
            .with_retry(RetryPolicy::fixed(2, Duration::from_millis(5)))];
        let (engine, _) = engine_with(phases, Arc::default());
        let flow_id = engine
            .initialize(&FlowType::DISCOVERY, &scope(), Map::new())
            .await
            .expect("initialize");

        let outcome = engine.execute_phase(&scope(), flow_id).await.expect("execute");
        assert!(matches!(outcome, PhaseOutcome::Failed { attempts: 2, ref error, .. } if error.contains("timed out")));

        let status = engine.get_status(&scope(), flow_id).await.expect("status");
        assert_eq!(status.status, FlowStatus::Failed);
        let last_error = status.last_error.expect("error recorded");
        assert_eq!(last_error.attempts, 2);
        assert_eq!(last_error.phase, "slow");
    }

    #[tokio::test]
    async fn test_missing_required_input_is_pre_validation_failure() {
        let phases = vec![PhaseConfig::new("a", "echo").requires("source")];
        let (engine, journal) = engine_with(phases, Arc::default());
        let flow_id = engine
            .initialize(&FlowType::DISCOVERY, &scope(), Map::new())
            .await
            .expect("initialize");

        let outcome = engine.execute_phase(&scope(), flow_id).await.expect("execute");
        assert!(matches!(
            outcome,
            PhaseOutcome::ValidationFailed { boundary: Boundary::Pre, ref result, .. }
                if result.errors == vec!["required input 'source' is missing"]
        ));

        let status = engine.get_status(&scope(), flow_id).await.expect("status");
        assert_eq!(status.status, FlowStatus::Running);
        assert_eq!(status.current_phase, "a");
        assert_eq!(journal.entries().await[0].kind, JournalKind::PreValidationFailed);
    }

    #[tokio::test]
    async fn test_engine_rejects_invalid_config() {
        let registry = FlowTypeRegistry::new(
            Arc::new(ValidatorRegistry::new()),
            Arc::new(ExecutorRegistry::new()),
        );
        let result = ExecutionEngine::builder(Catalog::canonical_only(Arc::new(registry)))
            .with_config(EngineConfig::default().with_cancel_write_attempts(0))
            .build();
        assert!(result.is_err());
    }
}
