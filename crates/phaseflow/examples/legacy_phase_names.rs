//! Legacy Phase Names.
//!
//! This example shows how flows survive phase renames across releases:
//! 1. A flow persisted by an older release still points at `attribute_mapping`
//! 2. The engine normalizes it to `field_mapping` before executing
//! 3. An operator asks for `tech_debt_analysis`, which moved to assessment
//! 4. A failed flow is recovered with a forced re-run, another is cancelled
//!
//! Use cases:
//! - Rolling upgrades with flows in flight
//! - Operator tooling built against older phase names

use async_trait::async_trait;
use phaseflow::prelude::*;
use phaseflow::{FlowRecord, InMemoryJournal, InMemoryStateStore};
use serde_json::{json, Map};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Noop(&'static str);

#[async_trait]
impl PhaseExecutor for Noop {
    async fn run(
        &self,
        _payload: &PhasePayload,
        _inputs: &PhaseInputs,
    ) -> Result<ExecutorOutput, ExecutorError> {
        println!("  Running {}", self.0);
        Ok(ExecutorOutput::done(json!({ "by": self.0 })))
    }
}

/// Fails until the upstream CMDB is marked healthy.
#[derive(Debug)]
struct CmdbSync {
    healthy: Arc<AtomicBool>,
}

#[async_trait]
impl PhaseExecutor for CmdbSync {
    async fn run(
        &self,
        _payload: &PhasePayload,
        _inputs: &PhaseInputs,
    ) -> Result<ExecutorOutput, ExecutorError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(ExecutorOutput::done(json!({ "synced": true })))
        } else {
            Err(ExecutorError::retryable("CMDB returned 503"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let healthy = Arc::new(AtomicBool::new(false));
    let mut executors = ExecutorRegistry::new();
    executors.register("import", Noop("import"))?;
    executors.register("mapping", Noop("mapping"))?;
    executors.register("cmdb_sync", CmdbSync { healthy: Arc::clone(&healthy) })?;
    executors.register("tech_debt", Noop("tech_debt"))?;

    let mut registry = FlowTypeRegistry::new(Arc::new(ValidatorRegistry::new()), Arc::new(executors));
    registry.register(
        FlowType::DISCOVERY,
        vec![
            PhaseConfig::new("data_import", "import"),
            PhaseConfig::new("field_mapping", "mapping"),
            PhaseConfig::new("cmdb_sync", "cmdb_sync")
                .with_retry(RetryPolicy::exponential(3, Duration::from_millis(50))),
        ],
    )?;
    registry.register(
        FlowType::ASSESSMENT,
        vec![PhaseConfig::new("tech_debt", "tech_debt")],
    )?;

    let resolver = PhaseAliasResolver::builder(Arc::new(registry))
        .alias(FlowType::DISCOVERY, "attribute_mapping", "field_mapping")
        .alias(FlowType::ASSESSMENT, "tech_debt_analysis", "tech_debt")
        .build()?;

    let store = InMemoryStateStore::new();
    let journal = InMemoryJournal::new();
    let engine = ExecutionEngine::builder(Catalog::new(resolver))
        .with_store(Arc::new(store.clone()))
        .with_journal(Arc::new(journal.clone()))
        .build()?;
    let scope = TenantScope::new("acme", "datacenter-migration");

    println!("=== Flow written by an older release ===\n");
    let mut legacy = FlowRecord::new(
        FlowType::DISCOVERY,
        PhaseName::new("attribute_mapping"),
        scope.clone(),
        PhasePayload::new(),
    );
    legacy.status = FlowStatus::Running;
    let flow_id = store.create(legacy).await?;

    let outcome = engine.run_until_blocked(&scope, flow_id).await?;
    println!("Outcome: {outcome:?}");

    println!("\n=== Operator uses an outdated phase name ===\n");
    match engine.force_rerun_phase(&scope, flow_id, "tech_debt_analysis").await {
        Err(FlowError::Resolve(error)) => println!("Rejected: {error}"),
        other => println!("Unexpected: {other:?}"),
    }

    println!("\n=== Recovering the failed flow ===\n");
    healthy.store(true, Ordering::SeqCst);
    let outcome = engine.force_rerun_phase(&scope, flow_id, "cmdb-sync").await?;
    println!("Outcome: {outcome:?}");

    println!("\n=== Cancelling a flow ===\n");
    let other = engine.initialize(&FlowType::DISCOVERY, &scope, Map::new()).await?;
    engine.execute_phase(&scope, other).await?;
    let snapshot = engine.cancel(&scope, other).await?;
    println!("Flow {} is {} at '{}'", snapshot.flow_id, snapshot.status, snapshot.current_phase);

    println!("\n=== Failure journal ===\n");
    for entry in journal.entries().await {
        println!("{} {} [{}] {}", entry.flow_id, entry.phase, entry.kind, entry.message);
    }

    Ok(())
}
