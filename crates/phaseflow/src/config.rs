//! Engine settings and declarative flow catalogs.

use phaseflow_core::{
    duration_ms, ConfigurationError, ExecutorRegistry, FlowType, FlowTypeRegistry,
    PhaseAliasResolver, PhaseConfig, ValidatorRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Engine-wide settings.
///
/// ```
/// use phaseflow::EngineConfig;
/// use std::time::Duration;
///
/// let config: EngineConfig = serde_json::from_str(r#"{"default_phase_timeout_ms": 5000}"#)?;
/// assert_eq!(config.default_phase_timeout, Duration::from_secs(5));
/// assert_eq!(config.cancel_write_attempts, 3);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Executor timeout for phases that do not set their own.
    #[serde(rename = "default_phase_timeout_ms", with = "duration_ms")]
    pub default_phase_timeout: Duration,
    /// How often `cancel` retries its write after losing a version race.
    pub cancel_write_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_phase_timeout: Duration::from_secs(30),
            cancel_write_attempts: 3,
        }
    }
}

impl EngineConfig {
    pub fn with_default_phase_timeout(mut self, timeout: Duration) -> Self {
        self.default_phase_timeout = timeout;
        self
    }

    pub fn with_cancel_write_attempts(mut self, attempts: u32) -> Self {
        self.cancel_write_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.default_phase_timeout.is_zero() {
            return Err(ConfigurationError::InvalidEngineConfig(
                "default_phase_timeout must be greater than zero",
            ));
        }
        if self.cancel_write_attempts == 0 {
            return Err(ConfigurationError::InvalidEngineConfig(
                "cancel_write_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

/// One flow type in a [`CatalogConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowTypeConfig {
    pub flow_type: FlowType,
    pub phases: Vec<PhaseConfig>,
    /// Alternate name -> canonical phase name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Former phase name -> flow type that now owns it.
    #[serde(default)]
    pub moved: BTreeMap<String, FlowType>,
}

/// Declarative description of every flow type, their phases and alias
/// tables.
///
/// Validators and executors are referenced by name and bound when the
/// catalog is built.
///
/// # Examples
///
/// ```
/// use phaseflow::{CatalogConfig, ExecutorRegistry, ValidatorRegistry};
/// # use phaseflow::{ExecutorError, ExecutorOutput, PhaseExecutor, PhaseInputs, PhasePayload};
/// # use async_trait::async_trait;
/// # #[derive(Debug)]
/// # struct Noop;
/// # #[async_trait]
/// # impl PhaseExecutor for Noop {
/// #     async fn run(&self, _: &PhasePayload, _: &PhaseInputs) -> Result<ExecutorOutput, ExecutorError> {
/// #         Ok(ExecutorOutput::done(serde_json::Value::Null))
/// #     }
/// # }
/// use std::sync::Arc;
///
/// let config = CatalogConfig::from_json_str(
///     r#"{
///         "flow_types": [{
///             "flow_type": "discovery",
///             "phases": [
///                 {"name": "data_import", "executor": "noop"},
///                 {"name": "field_mapping", "executor": "noop", "required_inputs": ["data_import"]}
///             ],
///             "aliases": {"attribute_mapping": "field_mapping"}
///         }]
///     }"#,
/// )?;
///
/// let mut executors = ExecutorRegistry::new();
/// executors.register("noop", Noop)?;
/// let catalog = config.build(Arc::new(ValidatorRegistry::new()), Arc::new(executors))?;
/// assert_eq!(
///     catalog.resolver().normalize(&"discovery".into(), "attribute-mapping")?.as_str(),
///     "field_mapping"
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    pub flow_types: Vec<FlowTypeConfig>,
}

impl CatalogConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Registers every flow type and builds the alias tables.
    pub fn build(
        self,
        validators: Arc<ValidatorRegistry>,
        executors: Arc<ExecutorRegistry>,
    ) -> Result<Catalog, ConfigurationError> {
        let mut registry = FlowTypeRegistry::new(validators, executors);
        let mut aliases = Vec::new();
        let mut moved = Vec::new();

        for entry in self.flow_types {
            registry.register(entry.flow_type.clone(), entry.phases)?;
            for (alias, canonical) in entry.aliases {
                aliases.push((entry.flow_type.clone(), alias, canonical));
            }
            for (phase, target) in entry.moved {
                moved.push((entry.flow_type.clone(), phase, target));
            }
        }

        let mut builder = PhaseAliasResolver::builder(Arc::new(registry));
        for (flow_type, alias, canonical) in aliases {
            builder = builder.alias(flow_type, alias, canonical);
        }
        for (flow_type, phase, target) in moved {
            builder = builder.moved(flow_type, phase, target);
        }
        Ok(Catalog::new(builder.build()?))
    }
}

/// The registry and alias resolver an engine runs against.
#[derive(Debug, Clone)]
pub struct Catalog {
    resolver: Arc<PhaseAliasResolver>,
}

impl Catalog {
    pub fn new(resolver: PhaseAliasResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// A catalog without aliases or moved phases.
    pub fn canonical_only(registry: Arc<FlowTypeRegistry>) -> Self {
        Self::new(PhaseAliasResolver::canonical_only(registry))
    }

    pub fn registry(&self) -> &Arc<FlowTypeRegistry> {
        self.resolver.registry()
    }

    pub fn resolver(&self) -> &Arc<PhaseAliasResolver> {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use phaseflow_core::{
        ExecutorError, ExecutorOutput, PhaseExecutor, PhaseInputs, PhasePayload, ResolveError,
    };

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl PhaseExecutor for Noop {
        async fn run(
            &self,
            _payload: &PhasePayload,
            _inputs: &PhaseInputs,
        ) -> Result<ExecutorOutput, ExecutorError> {
            Ok(ExecutorOutput::done(serde_json::Value::Null))
        }
    }

    fn executors() -> Arc<ExecutorRegistry> {
        let mut executors = ExecutorRegistry::new();
        executors.register("noop", Noop).expect("unique");
        Arc::new(executors)
    }

    const CATALOG: &str = r#"{
        "flow_types": [
            {
                "flow_type": "discovery",
                "phases": [
                    {"name": "data_import", "executor": "noop"},
                    {"name": "field_mapping", "executor": "noop", "timeout_ms": 250}
                ],
                "aliases": {"mapping": "field_mapping"},
                "moved": {"tech_debt_analysis": "assessment"}
            },
            {
                "flow_type": "assessment",
                "phases": [
                    {
                        "name": "tech_debt",
                        "executor": "noop",
                        "retry_policy": {"max_attempts": 4, "initial_delay_ms": 100, "backoff_multiplier": 2.0}
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_phase_timeout, Duration::from_secs(30));
        assert_eq!(config.cancel_write_attempts, 3);
        assert!(config.validate().is_ok());

        let parsed: EngineConfig = serde_json::from_str("{}").expect("all fields default");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_engine_config_validation() {
        let config = EngineConfig::default().with_cancel_write_attempts(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidEngineConfig(_))
        ));
        let config = EngineConfig::default().with_default_phase_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_builds_registry_and_resolver() {
        let catalog = CatalogConfig::from_json_str(CATALOG)
            .expect("valid json")
            .build(Arc::new(ValidatorRegistry::new()), executors())
            .expect("valid catalog");

        let registry = catalog.registry();
        let mapping = registry
            .phase(&FlowType::DISCOVERY, "field_mapping")
            .expect("registered");
        assert_eq!(mapping.timeout, Some(Duration::from_millis(250)));
        assert_eq!(
            registry
                .phase(&FlowType::ASSESSMENT, "tech_debt")
                .map(|p| p.retry_policy.max_attempts()),
            Some(4)
        );

        let resolver = catalog.resolver();
        assert_eq!(
            resolver
                .normalize(&FlowType::DISCOVERY, "Mapping")
                .expect("alias"),
            "field_mapping"
        );
        assert!(matches!(
            resolver.normalize(&FlowType::DISCOVERY, "tech_debt_analysis"),
            Err(ResolveError::PhaseMoved { target_flow_type, .. }) if target_flow_type == FlowType::ASSESSMENT
        ));
    }

    #[test]
    fn test_catalog_rejects_bad_input() {
        let err = CatalogConfig::from_json_str(r#"{"flow_types": [{"flow_type": "discovery"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Catalog(_)));

        let err = CatalogConfig::from_json_str(
            r#"{"flow_types": [{"flow_type": "discovery", "phases": [
                {"name": "a", "executor": "noop", "retry_policy": {"max_attempts": 0, "initial_delay_ms": 0}}
            ]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Catalog(message) if message.contains("max_attempts")));

        let err = CatalogConfig::from_json_str(
            r#"{"flow_types": [{"flow_type": "discovery", "phases": [{"name": "a", "executor": "missing"}]}]}"#,
        )
        .expect("valid json")
        .build(Arc::new(ValidatorRegistry::new()), executors())
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownExecutor { .. }));
    }
}
