//! Flow type registry: the single source of truth for which phases exist and
//! in what order.

use crate::error::ConfigurationError;
use crate::flow::FlowType;
use crate::phase::{ExecutorRegistry, PhaseConfig, PhaseName};
use crate::validation::ValidatorRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Maps each flow type to its ordered list of [`PhaseConfig`]s.
///
/// Built once at startup, then shared read-only (usually behind an `Arc`).
///
/// # Examples
///
/// ```
/// use phaseflow_core::{
///     ExecutorError, ExecutorOutput, ExecutorRegistry, FlowType, FlowTypeRegistry, PhaseConfig,
///     PhaseExecutor, PhaseInputs, PhasePayload, ValidatorRegistry,
/// };
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Noop;
///
/// #[async_trait]
/// impl PhaseExecutor for Noop {
///     async fn run(&self, _: &PhasePayload, _: &PhaseInputs) -> Result<ExecutorOutput, ExecutorError> {
///         Ok(ExecutorOutput::done(serde_json::Value::Null))
///     }
/// }
///
/// let mut executors = ExecutorRegistry::new();
/// executors.register("noop", Noop)?;
///
/// let mut registry = FlowTypeRegistry::new(Arc::new(ValidatorRegistry::new()), Arc::new(executors));
/// registry.register(
///     FlowType::DISCOVERY,
///     vec![PhaseConfig::new("import", "noop"), PhaseConfig::new("mapping", "noop")],
/// )?;
///
/// assert_eq!(registry.first_phase(&FlowType::DISCOVERY).map(|p| p.name.as_str()), Some("import"));
/// assert_eq!(
///     registry.next_phase(&FlowType::DISCOVERY, "import").map(|p| p.name.as_str()),
///     Some("mapping")
/// );
/// # Ok::<(), phaseflow_core::ConfigurationError>(())
/// ```
#[derive(Debug)]
pub struct FlowTypeRegistry {
    validators: Arc<ValidatorRegistry>,
    executors: Arc<ExecutorRegistry>,
    phases: HashMap<FlowType, Vec<PhaseConfig>>,
    order: Vec<FlowType>,
}

impl FlowTypeRegistry {
    pub fn new(validators: Arc<ValidatorRegistry>, executors: Arc<ExecutorRegistry>) -> Self {
        Self {
            validators,
            executors,
            phases: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers the ordered phase list of `flow_type`.
    ///
    /// Registering an identical list twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if:
    /// - the list is empty
    /// - two phases share a name (ignoring case and `-`/`_` differences)
    /// - the flow type is already registered with a different list
    /// - a phase references a validator or executor that is not registered
    pub fn register(
        &mut self,
        flow_type: FlowType,
        phases: Vec<PhaseConfig>,
    ) -> Result<(), ConfigurationError> {
        if phases.is_empty() {
            return Err(ConfigurationError::EmptyFlowType(flow_type));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(phases.len());
        for mut phase in phases {
            if !seen.insert(PhaseName::lookup_key(phase.name.as_str())) {
                return Err(ConfigurationError::DuplicatePhase {
                    flow_type,
                    phase: phase.name,
                });
            }
            self.check_references(&flow_type, &phase)?;
            if phase.display_name.is_empty() {
                phase.display_name = phase.name.as_str().to_string();
            }
            normalized.push(phase);
        }

        if let Some(existing) = self.phases.get(&flow_type) {
            if *existing == normalized {
                return Ok(());
            }
            return Err(ConfigurationError::ConflictingRegistration(flow_type));
        }

        self.order.push(flow_type.clone());
        self.phases.insert(flow_type, normalized);
        Ok(())
    }

    fn check_references(
        &self,
        flow_type: &FlowType,
        phase: &PhaseConfig,
    ) -> Result<(), ConfigurationError> {
        let validators = phase.pre_validators.iter().chain(&phase.post_validators);
        for validator in validators {
            if !self.validators.contains(validator.as_str()) {
                return Err(ConfigurationError::UnknownValidator {
                    flow_type: flow_type.clone(),
                    phase: phase.name.clone(),
                    validator: validator.clone(),
                });
            }
        }
        if !self.executors.contains(phase.executor.as_str()) {
            return Err(ConfigurationError::UnknownExecutor {
                flow_type: flow_type.clone(),
                phase: phase.name.clone(),
                executor: phase.executor.clone(),
            });
        }
        Ok(())
    }

    /// Returns the ordered phases of `flow_type`.
    pub fn get_phases(&self, flow_type: &FlowType) -> Option<&[PhaseConfig]> {
        self.phases.get(flow_type).map(Vec::as_slice)
    }

    pub fn contains(&self, flow_type: &FlowType) -> bool {
        self.phases.contains_key(flow_type)
    }

    /// Registered flow types in registration order.
    pub fn flow_types(&self) -> impl Iterator<Item = &FlowType> {
        self.order.iter()
    }

    pub fn first_phase(&self, flow_type: &FlowType) -> Option<&PhaseConfig> {
        self.phases.get(flow_type).and_then(|phases| phases.first())
    }

    /// Looks up a phase by its exact canonical name.
    pub fn phase(&self, flow_type: &FlowType, name: &str) -> Option<&PhaseConfig> {
        self.phases
            .get(flow_type)
            .and_then(|phases| phases.iter().find(|p| p.name.as_str() == name))
    }

    /// Zero-based position of a canonical phase.
    pub fn position(&self, flow_type: &FlowType, name: &str) -> Option<usize> {
        self.phases
            .get(flow_type)
            .and_then(|phases| phases.iter().position(|p| p.name.as_str() == name))
    }

    /// The phase after `name`, or `None` if `name` is the last one.
    pub fn next_phase(&self, flow_type: &FlowType, name: &str) -> Option<&PhaseConfig> {
        let index = self.position(flow_type, name)?;
        self.phases.get(flow_type)?.get(index + 1)
    }

    pub fn validators(&self) -> &Arc<ValidatorRegistry> {
        &self.validators
    }

    pub fn executors(&self) -> &Arc<ExecutorRegistry> {
        &self.executors
    }
}
