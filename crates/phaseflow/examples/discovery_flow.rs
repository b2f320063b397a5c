//! Discovery Flow.
//!
//! This example drives an asset-discovery flow through its phases:
//! 1. Import an inventory export
//! 2. Map source fields to the target schema (needs a human approval)
//! 3. Cleanse the mapped records
//!
//! The catalog is declared in JSON, executors exchange typed payload
//! sections, and the approval gate pauses the flow until an operator
//! resumes it with a decision.

use async_trait::async_trait;
use phaseflow::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::sync::Arc;

const CATALOG: &str = r#"{
    "flow_types": [{
        "flow_type": "discovery",
        "phases": [
            {
                "name": "data_import",
                "display_name": "Data Import",
                "executor": "inventory_import",
                "required_inputs": ["source_file"],
                "pre_validators": ["source_is_csv"],
                "retry_policy": {"max_attempts": 3, "initial_delay_ms": 200, "backoff_multiplier": 2.0},
                "timeout_ms": 10000
            },
            {
                "name": "field_mapping",
                "display_name": "Field Mapping",
                "executor": "field_mapper",
                "required_inputs": ["data_import"],
                "optional_inputs": ["mapping_approved"],
                "post_validators": ["mappings_cover_hostname"]
            },
            {
                "name": "data_cleansing",
                "display_name": "Data Cleansing",
                "executor": "cleanser",
                "required_inputs": ["data_import", "field_mapping"]
            }
        ],
        "aliases": {"attribute_mapping": "field_mapping", "import": "data_import"}
    }]
}"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImportSection {
    rows: Vec<Map<String, serde_json::Value>>,
}

impl PhaseSection for ImportSection {
    const PHASE: &'static str = "data_import";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MappingSection {
    mappings: Vec<(String, String)>,
}

impl PhaseSection for MappingSection {
    const PHASE: &'static str = "field_mapping";
}

#[derive(Debug)]
struct InventoryImport;

#[async_trait]
impl PhaseExecutor for InventoryImport {
    async fn run(
        &self,
        _payload: &PhasePayload,
        inputs: &PhaseInputs,
    ) -> Result<ExecutorOutput, ExecutorError> {
        let source = inputs
            .get("source_file")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExecutorError::fatal("source_file must be a string"))?;
        println!("  Importing {source}...");

        // In production, read and parse the file
        let rows = vec![
            json!({"host": "web-01", "os": "linux", "owner": " ops "}),
            json!({"host": "db-01", "os": "linux", "owner": "dba"}),
            json!({"host": "", "os": "windows", "owner": "unknown"}),
        ];
        Ok(ExecutorOutput::done(json!({ "rows": rows })))
    }
}

#[derive(Debug)]
struct FieldMapper;

#[async_trait]
impl PhaseExecutor for FieldMapper {
    async fn run(
        &self,
        _payload: &PhasePayload,
        inputs: &PhaseInputs,
    ) -> Result<ExecutorOutput, ExecutorError> {
        if inputs.get("mapping_approved") != Some(&json!(true)) {
            return Ok(ExecutorOutput::requires_input(
                "proposed field mappings await approval",
            ));
        }
        let mappings = vec![
            ("host".to_string(), "hostname".to_string()),
            ("os".to_string(), "operating_system".to_string()),
            ("owner".to_string(), "business_owner".to_string()),
        ];
        let section = serde_json::to_value(MappingSection { mappings })
            .map_err(|e| ExecutorError::fatal(e.to_string()))?;
        Ok(ExecutorOutput::done(section))
    }
}

#[derive(Debug)]
struct Cleanser;

#[async_trait]
impl PhaseExecutor for Cleanser {
    async fn run(
        &self,
        payload: &PhasePayload,
        _inputs: &PhaseInputs,
    ) -> Result<ExecutorOutput, ExecutorError> {
        let import = payload
            .section::<ImportSection>()
            .map_err(|e| ExecutorError::fatal(e.to_string()))?
            .ok_or_else(|| ExecutorError::fatal("import section missing"))?;
        let mapping = payload
            .section::<MappingSection>()
            .map_err(|e| ExecutorError::fatal(e.to_string()))?
            .ok_or_else(|| ExecutorError::fatal("mapping section missing"))?;

        let mut kept = 0;
        let mut dropped = 0;
        for row in &import.rows {
            match row.get("host").and_then(|v| v.as_str()) {
                Some(host) if !host.is_empty() => kept += 1,
                _ => dropped += 1,
            }
        }
        println!("  Cleansed with {} mappings: kept {kept}, dropped {dropped}", mapping.mappings.len());
        Ok(ExecutorOutput::done(json!({ "kept": kept, "dropped": dropped })))
    }
}

fn validators() -> Result<ValidatorRegistry, Box<dyn std::error::Error>> {
    let mut validators = ValidatorRegistry::new();
    validators.register("source_is_csv", |payload: &PhasePayload| {
        match payload.input("source_file").and_then(|v| v.as_str()) {
            Some(name) if name.ends_with(".csv") => ValidationResult::ok(),
            Some(name) => ValidationResult::fail(format!("{name} is not a CSV export")),
            None => ValidationResult::fail("source_file is missing"),
        }
    })?;
    validators.register("mappings_cover_hostname", |payload: &PhasePayload| {
        match payload.section::<MappingSection>() {
            Ok(Some(section)) if section.mappings.iter().any(|(_, to)| to == "hostname") => {
                ValidationResult::ok()
            }
            Ok(_) => ValidationResult::fail("no field maps to hostname"),
            Err(e) => ValidationResult::fail(format!("mapping section is malformed: {e}")),
        }
    })?;
    Ok(validators)
}

fn executors() -> Result<ExecutorRegistry, Box<dyn std::error::Error>> {
    let mut executors = ExecutorRegistry::new();
    executors.register("inventory_import", InventoryImport)?;
    executors.register("field_mapper", FieldMapper)?;
    executors.register("cleanser", Cleanser)?;
    Ok(executors)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let catalog =
        CatalogConfig::from_json_str(CATALOG)?.build(Arc::new(validators()?), Arc::new(executors()?))?;
    let engine = ExecutionEngine::builder(catalog).build()?;

    let scope = TenantScope::new("acme", "datacenter-migration");
    let mut inputs = Map::new();
    inputs.insert("source_file".to_string(), json!("inventory.csv"));
    let flow_id = engine.initialize(&FlowType::DISCOVERY, &scope, inputs).await?;

    println!("=== Discovery flow {flow_id} ===\n");

    match engine.run_until_blocked(&scope, flow_id).await? {
        PhaseOutcome::Paused { phase, reason } => {
            println!("\nPaused at '{phase}': {reason}");
            println!("Operator approves the mappings.\n");
            let mut decision = Map::new();
            decision.insert("mapping_approved".to_string(), json!(true));
            let outcome = engine.resume_with_input(&scope, flow_id, decision).await?;
            println!("Resumed: {outcome:?}");
        }
        outcome => {
            eprintln!("Flow stopped unexpectedly: {outcome:?}");
            std::process::exit(1);
        }
    }

    match engine.run_until_blocked(&scope, flow_id).await? {
        PhaseOutcome::Completed { .. } => {
            let status = engine.get_status(&scope, flow_id).await?;
            println!("\nDiscovery completed at {:?}", status.completed_at);
        }
        outcome => {
            eprintln!("Discovery flow failed: {outcome:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}
