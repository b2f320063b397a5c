//! Phase configuration, executors and the executor registry.

use crate::error::{ConfigurationError, ExecutorError};
use crate::payload::{InputKey, PhaseInputs, PhasePayload};
use crate::retry::RetryPolicy;
use crate::validation::ValidatorName;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

/// Type-safe phase name wrapper.
///
/// Canonical names are compared exactly. Lookups of caller-supplied names go
/// through [`PhaseName::lookup_key`], which ignores case and treats `-` and
/// spaces like `_`.
///
/// ```
/// use phaseflow_core::PhaseName;
///
/// let name = PhaseName::new("data_import");
/// assert_eq!(name.as_str(), "data_import");
/// assert_eq!(PhaseName::lookup_key(" Data-Import "), "data_import");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseName(String);

impl PhaseName {
    /// Creates a new PhaseName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the phase name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formatting-insensitive key used for name resolution.
    pub fn lookup_key(name: &str) -> String {
        name.trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect()
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PhaseName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PhaseName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for PhaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for PhaseName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PhaseName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PhaseName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Handle the host resolves to a [`PhaseExecutor`] through an
/// [`ExecutorRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorRef(String);

impl ExecutorRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutorRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExecutorRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ExecutorRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Output from a phase executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorOutput {
    /// The phase finished; the value becomes the phase's payload section.
    Completed(Value),
    /// The phase cannot finish without external input (e.g. an approval).
    RequiresInput {
        /// Shown to operators while the flow is paused.
        reason: String,
    },
}

impl ExecutorOutput {
    /// Creates a Completed output.
    pub fn done(value: Value) -> Self {
        Self::Completed(value)
    }

    /// Creates a RequiresInput output.
    pub fn requires_input(reason: impl Into<String>) -> Self {
        Self::RequiresInput {
            reason: reason.into(),
        }
    }
}

/// The pluggable unit of work a phase invokes.
///
/// The engine treats executors as opaque: it only sees success, a pause
/// request, a retryable error, a fatal error, or a timeout.
///
/// # Examples
///
/// ```
/// use phaseflow_core::{ExecutorError, ExecutorOutput, PhaseExecutor, PhaseInputs, PhasePayload};
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// #[derive(Debug)]
/// struct CountRows;
///
/// #[async_trait]
/// impl PhaseExecutor for CountRows {
///     async fn run(
///         &self,
///         _payload: &PhasePayload,
///         inputs: &PhaseInputs,
///     ) -> Result<ExecutorOutput, ExecutorError> {
///         let rows = inputs
///             .get("rows")
///             .and_then(|v| v.as_array())
///             .ok_or_else(|| ExecutorError::fatal("rows must be an array"))?;
///         Ok(ExecutorOutput::done(json!({ "count": rows.len() })))
///     }
/// }
/// ```
#[async_trait]
pub trait PhaseExecutor: Send + Sync + Debug {
    /// Performs the phase's work.
    ///
    /// # Returns
    ///
    /// - `Ok(ExecutorOutput::Completed(value))` - advance the flow
    /// - `Ok(ExecutorOutput::RequiresInput { .. })` - pause the flow
    /// - `Err(ExecutorError::Retryable(_))` - retried per the phase's policy
    /// - `Err(ExecutorError::Fatal(_))` - fails the flow immediately
    async fn run(
        &self,
        payload: &PhasePayload,
        inputs: &PhaseInputs,
    ) -> Result<ExecutorOutput, ExecutorError>;
}

/// Declarative description of one phase.
///
/// # Examples
///
/// ```
/// use phaseflow_core::{PhaseConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let phase = PhaseConfig::new("import", "csv_importer")
///     .with_display_name("Data Import")
///     .requires("source_file")
///     .validate_before("source_readable")
///     .with_retry(RetryPolicy::exponential(3, Duration::from_millis(200)))
///     .with_timeout(Duration::from_secs(120));
///
/// assert_eq!(phase.name.as_str(), "import");
/// assert_eq!(phase.retry_policy.max_attempts(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseConfig {
    /// Canonical phase name.
    pub name: PhaseName,
    /// Human readable label. Filled with `name` on registration when empty.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub required_inputs: Vec<InputKey>,
    #[serde(default)]
    pub optional_inputs: Vec<InputKey>,
    /// Run in order before the executor.
    #[serde(default)]
    pub pre_validators: Vec<ValidatorName>,
    /// Run in order against the payload including the produced output.
    #[serde(default)]
    pub post_validators: Vec<ValidatorName>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    pub executor: ExecutorRef,
    /// Executor timeout. `None` uses the engine default.
    #[serde(default, rename = "timeout_ms", with = "crate::duration_ms::option")]
    pub timeout: Option<Duration>,
}

/// Inputs resolved for a phase, plus the required ones that were absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs {
    pub inputs: PhaseInputs,
    pub missing: Vec<InputKey>,
}

impl PhaseConfig {
    pub fn new(name: impl Into<PhaseName>, executor: impl Into<ExecutorRef>) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            required_inputs: Vec::new(),
            optional_inputs: Vec::new(),
            pre_validators: Vec::new(),
            post_validators: Vec::new(),
            retry_policy: RetryPolicy::none(),
            executor: executor.into(),
            timeout: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Declares a required input.
    pub fn requires(mut self, key: impl Into<InputKey>) -> Self {
        self.required_inputs.push(key.into());
        self
    }

    /// Declares an optional input.
    pub fn accepts(mut self, key: impl Into<InputKey>) -> Self {
        self.optional_inputs.push(key.into());
        self
    }

    /// Appends a pre-validator.
    pub fn validate_before(mut self, validator: impl Into<ValidatorName>) -> Self {
        self.pre_validators.push(validator.into());
        self
    }

    /// Appends a post-validator.
    pub fn validate_after(mut self, validator: impl Into<ValidatorName>) -> Self {
        self.post_validators.push(validator.into());
        self
    }

    pub fn with_retry(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            self.name.as_str()
        } else {
            &self.display_name
        }
    }

    /// Collects declared inputs from `payload`.
    pub fn resolve_inputs(&self, payload: &PhasePayload) -> ResolvedInputs {
        let mut resolved = ResolvedInputs::default();
        for key in &self.required_inputs {
            match payload.lookup(key.as_str()) {
                Some(value) => resolved.inputs.insert(key.clone(), value.clone()),
                None => resolved.missing.push(key.clone()),
            }
        }
        for key in &self.optional_inputs {
            if let Some(value) = payload.lookup(key.as_str()) {
                resolved.inputs.insert(key.clone(), value.clone());
            }
        }
        resolved
    }
}

/// Executor lookup by [`ExecutorRef`].
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<ExecutorRef, Arc<dyn PhaseExecutor>>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.executors)
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `executor` under `key`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateExecutor`] if the key is taken.
    pub fn register<E: PhaseExecutor + 'static>(
        &mut self,
        key: impl Into<ExecutorRef>,
        executor: E,
    ) -> Result<(), ConfigurationError> {
        self.register_shared(key, Arc::new(executor))
    }

    /// Registers an executor that is shared with other owners.
    pub fn register_shared(
        &mut self,
        key: impl Into<ExecutorRef>,
        executor: Arc<dyn PhaseExecutor>,
    ) -> Result<(), ConfigurationError> {
        let key = key.into();
        if self.executors.contains_key(&key) {
            return Err(ConfigurationError::DuplicateExecutor(key));
        }
        self.executors.insert(key, executor);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn PhaseExecutor>> {
        self.executors.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.executors.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl PhaseExecutor for Echo {
        async fn run(
            &self,
            _payload: &PhasePayload,
            inputs: &PhaseInputs,
        ) -> Result<ExecutorOutput, ExecutorError> {
            Ok(ExecutorOutput::done(json!(inputs.len())))
        }
    }

    #[test]
    fn test_lookup_key() {
        assert_eq!(PhaseName::lookup_key("Mapping"), "mapping");
        assert_eq!(PhaseName::lookup_key("field-mapping"), "field_mapping");
        assert_eq!(PhaseName::lookup_key("  field mapping "), "field_mapping");
        let once = PhaseName::lookup_key("Field-Mapping");
        assert_eq!(PhaseName::lookup_key(&once), once);
    }

    #[test]
    fn test_resolve_inputs_reports_missing() {
        let phase = PhaseConfig::new("mapping", "mapper")
            .requires("import")
            .requires("schema")
            .accepts("hints")
            .accepts("extra");

        let mut payload = PhasePayload::new();
        payload.set_output(PhaseName::new("import"), json!({"rows": 2}));
        payload.insert_input("hints", json!(["x"]));

        let resolved = phase.resolve_inputs(&payload);
        assert_eq!(resolved.missing, vec![InputKey::new("schema")]);
        assert_eq!(resolved.inputs.get("import"), Some(&json!({"rows": 2})));
        assert_eq!(resolved.inputs.get("hints"), Some(&json!(["x"])));
        assert!(!resolved.inputs.contains_key("extra"));
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let phase = PhaseConfig::new("cleansing", "cleaner");
        assert_eq!(phase.display_name(), "cleansing");
        let phase = phase.with_display_name("Data Cleansing");
        assert_eq!(phase.display_name(), "Data Cleansing");
    }

    #[test]
    fn test_phase_config_from_json() {
        let phase: PhaseConfig = serde_json::from_str(
            r#"{
                "name": "analysis",
                "executor": "analyzer",
                "required_inputs": ["cleansing"],
                "post_validators": ["scores_present"],
                "retry_policy": {"max_attempts": 3, "initial_delay_ms": 50, "backoff_multiplier": 2.0},
                "timeout_ms": 1500
            }"#,
        )
        .expect("valid phase json");
        assert_eq!(phase.name, "analysis");
        assert_eq!(phase.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(phase.retry_policy.max_attempts(), 3);
        assert!(phase.pre_validators.is_empty());
    }

    #[tokio::test]
    async fn test_executor_registry() {
        let mut registry = ExecutorRegistry::new();
        registry.register("echo", Echo).expect("unique key");
        assert!(matches!(
            registry.register("echo", Echo),
            Err(ConfigurationError::DuplicateExecutor(_))
        ));

        let executor = registry.get("echo").expect("registered");
        let output = executor
            .run(&PhasePayload::new(), &PhaseInputs::new())
            .await
            .expect("echo succeeds");
        assert_eq!(output, ExecutorOutput::done(json!(0)));
    }
}
