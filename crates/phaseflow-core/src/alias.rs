//! Phase alias resolution.
//!
//! Phase names evolve across releases: phases get renamed, and some move to a
//! different flow type entirely. Flows persisted by an older release, and
//! callers running outdated clients, still carry the old names. The resolver
//! maps every historically valid name to the current canonical one, and
//! distinguishes "unknown" from "moved elsewhere" so callers get an
//! actionable error.

use crate::error::{ConfigurationError, ResolveError};
use crate::flow::FlowType;
use crate::phase::PhaseName;
use crate::registry::FlowTypeRegistry;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct AliasTable {
    /// lookup key -> canonical name
    aliases: HashMap<String, PhaseName>,
    /// lookup key -> flow type that now owns the phase
    moved: HashMap<String, FlowType>,
}

/// Resolves legacy and alternate phase names to canonical ones.
///
/// # Examples
///
/// ```
/// # use phaseflow_core::*;
/// # use async_trait::async_trait;
/// # use std::sync::Arc;
/// # #[derive(Debug)]
/// # struct Noop;
/// # #[async_trait]
/// # impl PhaseExecutor for Noop {
/// #     async fn run(&self, _: &PhasePayload, _: &PhaseInputs) -> Result<ExecutorOutput, ExecutorError> {
/// #         Ok(ExecutorOutput::done(serde_json::Value::Null))
/// #     }
/// # }
/// # let mut executors = ExecutorRegistry::new();
/// # executors.register("noop", Noop)?;
/// let mut registry = FlowTypeRegistry::new(Arc::new(ValidatorRegistry::new()), Arc::new(executors));
/// registry.register(FlowType::DISCOVERY, vec![PhaseConfig::new("field_mapping", "noop")])?;
/// registry.register(FlowType::ASSESSMENT, vec![PhaseConfig::new("tech_debt", "noop")])?;
///
/// let resolver = PhaseAliasResolver::builder(Arc::new(registry))
///     .alias(FlowType::DISCOVERY, "attribute_mapping", "field_mapping")
///     .moved(FlowType::DISCOVERY, "tech_debt_analysis", FlowType::ASSESSMENT)
///     .build()?;
///
/// assert_eq!(resolver.normalize(&FlowType::DISCOVERY, "Attribute-Mapping")?.as_str(), "field_mapping");
/// assert!(matches!(
///     resolver.normalize(&FlowType::DISCOVERY, "tech_debt_analysis"),
///     Err(ResolveError::PhaseMoved { target_flow_type, .. }) if target_flow_type == FlowType::ASSESSMENT
/// ));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PhaseAliasResolver {
    registry: Arc<FlowTypeRegistry>,
    canonical: HashMap<FlowType, HashMap<String, PhaseName>>,
    tables: HashMap<FlowType, AliasTable>,
}

impl PhaseAliasResolver {
    pub fn builder(registry: Arc<FlowTypeRegistry>) -> PhaseAliasResolverBuilder {
        PhaseAliasResolverBuilder::new(registry)
    }

    /// A resolver that only knows canonical names.
    pub fn canonical_only(registry: Arc<FlowTypeRegistry>) -> Self {
        let canonical = canonical_index(&registry);
        Self {
            registry,
            canonical,
            tables: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<FlowTypeRegistry> {
        &self.registry
    }

    /// Maps `name` to the canonical phase name of `flow_type`.
    ///
    /// Idempotent: normalizing a canonical name returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::PhaseMoved`] if the name now belongs to another flow
    ///   type, either by an explicit record or because exactly one other flow
    ///   type owns it
    /// - [`ResolveError::UnknownPhase`] otherwise
    /// - [`ResolveError::UnregisteredFlowType`] if `flow_type` is unknown
    pub fn normalize(&self, flow_type: &FlowType, name: &str) -> Result<PhaseName, ResolveError> {
        let canonical = self
            .canonical
            .get(flow_type)
            .ok_or_else(|| ResolveError::UnregisteredFlowType(flow_type.clone()))?;
        let key = PhaseName::lookup_key(name);

        if let Some(phase) = canonical.get(&key) {
            return Ok(phase.clone());
        }
        if let Some(table) = self.tables.get(flow_type) {
            if let Some(phase) = table.aliases.get(&key) {
                return Ok(phase.clone());
            }
            if let Some(target) = table.moved.get(&key) {
                return Err(ResolveError::PhaseMoved {
                    flow_type: flow_type.clone(),
                    phase: name.to_string(),
                    target_flow_type: target.clone(),
                });
            }
        }

        let others: Vec<FlowType> = self
            .owners_of_key(&key)
            .into_iter()
            .filter(|owner| owner != flow_type)
            .collect();
        match others.as_slice() {
            [owner] => Err(ResolveError::PhaseMoved {
                flow_type: flow_type.clone(),
                phase: name.to_string(),
                target_flow_type: owner.clone(),
            }),
            _ => Err(ResolveError::UnknownPhase {
                flow_type: flow_type.clone(),
                phase: name.to_string(),
            }),
        }
    }

    /// Returns `true` if `name` normalizes successfully for `flow_type`.
    pub fn is_resolvable(&self, flow_type: &FlowType, name: &str) -> bool {
        self.normalize(flow_type, name).is_ok()
    }

    /// The single flow type owning `name` as a canonical name or alias.
    ///
    /// `None` when no flow type owns it, or when several do.
    pub fn owning_flow_type(&self, name: &str) -> Option<FlowType> {
        let mut owners = self.owners(name);
        if owners.len() == 1 {
            owners.pop()
        } else {
            None
        }
    }

    /// Every flow type owning `name` as a canonical name or alias, in
    /// registration order.
    pub fn owners(&self, name: &str) -> Vec<FlowType> {
        self.owners_of_key(&PhaseName::lookup_key(name))
    }

    fn owners_of_key(&self, key: &str) -> Vec<FlowType> {
        self.registry
            .flow_types()
            .filter(|flow_type| {
                let canonical = self
                    .canonical
                    .get(*flow_type)
                    .is_some_and(|names| names.contains_key(key));
                let aliased = self
                    .tables
                    .get(*flow_type)
                    .is_some_and(|table| table.aliases.contains_key(key));
                canonical || aliased
            })
            .cloned()
            .collect()
    }
}

fn canonical_index(registry: &FlowTypeRegistry) -> HashMap<FlowType, HashMap<String, PhaseName>> {
    registry
        .flow_types()
        .map(|flow_type| {
            let names = registry
                .get_phases(flow_type)
                .unwrap_or_default()
                .iter()
                .map(|phase| (PhaseName::lookup_key(phase.name.as_str()), phase.name.clone()))
                .collect();
            (flow_type.clone(), names)
        })
        .collect()
}

/// Builder for [`PhaseAliasResolver`]. Validation happens in [`build`](Self::build).
#[derive(Debug)]
pub struct PhaseAliasResolverBuilder {
    registry: Arc<FlowTypeRegistry>,
    aliases: Vec<(FlowType, String, String)>,
    moved: Vec<(FlowType, String, FlowType)>,
}

impl PhaseAliasResolverBuilder {
    pub fn new(registry: Arc<FlowTypeRegistry>) -> Self {
        Self {
            registry,
            aliases: Vec::new(),
            moved: Vec::new(),
        }
    }

    /// Maps `alias` to the canonical phase `canonical` within `flow_type`.
    pub fn alias(
        mut self,
        flow_type: FlowType,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Self {
        self.aliases.push((flow_type, alias.into(), canonical.into()));
        self
    }

    /// Records that `phase` moved out of `flow_type` into `target`.
    pub fn moved(mut self, flow_type: FlowType, phase: impl Into<String>, target: FlowType) -> Self {
        self.moved.push((flow_type, phase.into(), target));
        self
    }

    /// Validates the tables and builds the resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if:
    /// - a flow type (source or move target) is not registered
    /// - an alias targets a name that is not canonical (aliases never chain)
    /// - an alias collides with a different canonical phase
    /// - one alias maps to two canonical phases
    /// - a moved name still resolves in its source flow type, or moves to itself
    pub fn build(self) -> Result<PhaseAliasResolver, ConfigurationError> {
        let canonical = canonical_index(&self.registry);
        let mut tables: HashMap<FlowType, AliasTable> = HashMap::new();

        for (flow_type, alias, target) in self.aliases {
            let names = canonical
                .get(&flow_type)
                .ok_or_else(|| ConfigurationError::UnregisteredFlowType(flow_type.clone()))?;
            let target_phase = match names.get(&PhaseName::lookup_key(&target)) {
                Some(phase) => phase.clone(),
                None => {
                    return Err(ConfigurationError::AliasTargetNotCanonical {
                        flow_type,
                        alias,
                        target,
                    })
                }
            };
            let key = PhaseName::lookup_key(&alias);
            if let Some(existing) = names.get(&key) {
                if *existing == target_phase {
                    continue;
                }
                return Err(ConfigurationError::AliasShadowsCanonical { flow_type, alias });
            }
            let table = tables.entry(flow_type.clone()).or_default();
            match table.aliases.get(&key) {
                Some(first) if *first != target_phase => {
                    return Err(ConfigurationError::AmbiguousAlias {
                        flow_type,
                        alias,
                        first: first.clone(),
                        second: target_phase,
                    });
                }
                Some(_) => {}
                None => {
                    table.aliases.insert(key, target_phase);
                }
            }
        }

        for (flow_type, phase, target) in self.moved {
            let names = canonical
                .get(&flow_type)
                .ok_or_else(|| ConfigurationError::UnregisteredFlowType(flow_type.clone()))?;
            if !canonical.contains_key(&target) {
                return Err(ConfigurationError::UnregisteredFlowType(target));
            }
            if target == flow_type {
                return Err(ConfigurationError::MovedToSameFlowType { flow_type, phase });
            }
            let key = PhaseName::lookup_key(&phase);
            let aliased = tables
                .get(&flow_type)
                .is_some_and(|table| table.aliases.contains_key(&key));
            if names.contains_key(&key) || aliased {
                return Err(ConfigurationError::MovedPhaseStillResolves { flow_type, phase });
            }
            tables.entry(flow_type).or_default().moved.insert(key, target);
        }

        Ok(PhaseAliasResolver {
            registry: self.registry,
            canonical,
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::payload::{PhaseInputs, PhasePayload};
    use crate::phase::{ExecutorOutput, ExecutorRegistry, PhaseConfig, PhaseExecutor};
    use crate::validation::ValidatorRegistry;
    use async_trait::async_trait;

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

    fn registry() -> Arc<FlowTypeRegistry> {
        let mut executors = ExecutorRegistry::new();
        executors.register("noop", Noop).expect("unique");
        let mut registry =
            FlowTypeRegistry::new(Arc::new(ValidatorRegistry::new()), Arc::new(executors));
        let phases = |names: &[&str]| {
            names
                .iter()
                .map(|name| PhaseConfig::new(*name, "noop"))
                .collect::<Vec<_>>()
        };
        registry
            .register(
                FlowType::DISCOVERY,
                phases(&["data_import", "field_mapping", "data_cleansing"]),
            )
            .expect("discovery");
        registry
            .register(FlowType::COLLECTION, phases(&["gap_analysis", "questionnaire"]))
            .expect("collection");
        registry
            .register(
                FlowType::ASSESSMENT,
                phases(&["tech_debt", "dependency_analysis", "questionnaire"]),
            )
            .expect("assessment");
        Arc::new(registry)
    }

    fn resolver() -> PhaseAliasResolver {
        PhaseAliasResolver::builder(registry())
            .alias(FlowType::DISCOVERY, "import", "data_import")
            .alias(FlowType::DISCOVERY, "attribute_mapping", "field_mapping")
            .alias(FlowType::DISCOVERY, "mapping", "field_mapping")
            .alias(FlowType::ASSESSMENT, "tech_debt_analysis", "tech_debt")
            .moved(FlowType::DISCOVERY, "dependency_analysis", FlowType::ASSESSMENT)
            .build()
            .expect("valid tables")
    }

    #[test]
    fn test_canonical_and_alias_resolution() {
        let resolver = resolver();
        let discovery = FlowType::DISCOVERY;
        assert_eq!(resolver.normalize(&discovery, "field_mapping").expect("canonical"), "field_mapping");
        assert_eq!(resolver.normalize(&discovery, "Field-Mapping").expect("formatting"), "field_mapping");
        assert_eq!(resolver.normalize(&discovery, "mapping").expect("alias"), "field_mapping");
        assert_eq!(resolver.normalize(&discovery, "IMPORT").expect("alias"), "data_import");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let resolver = resolver();
        let registry = resolver.registry().clone();
        let candidates = [
            "data_import", "import", "Import", "mapping", "attribute-mapping", "tech_debt_analysis",
            "tech_debt", "questionnaire", "gap_analysis", "data_cleansing",
        ];
        for flow_type in registry.flow_types() {
            for candidate in candidates {
                if let Ok(once) = resolver.normalize(flow_type, candidate) {
                    let twice = resolver
                        .normalize(flow_type, once.as_str())
                        .expect("canonical names resolve");
                    assert_eq!(once, twice, "{flow_type}/{candidate}");
                    assert!(registry.phase(flow_type, once.as_str()).is_some());
                }
            }
        }
    }

    #[test]
    fn test_explicit_move_is_reported() {
        let resolver = resolver();
        let err = resolver
            .normalize(&FlowType::DISCOVERY, "dependency_analysis")
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::PhaseMoved {
                flow_type: FlowType::DISCOVERY,
                phase: "dependency_analysis".to_string(),
                target_flow_type: FlowType::ASSESSMENT,
            }
        );
    }

    #[test]
    fn test_implicit_move_uses_unique_owner() {
        let resolver = resolver();
        // Owned by collection only.
        assert!(matches!(
            resolver.normalize(&FlowType::DISCOVERY, "gap_analysis"),
            Err(ResolveError::PhaseMoved { target_flow_type, .. }) if target_flow_type == FlowType::COLLECTION
        ));
        // Alias of assessment.
        assert!(matches!(
            resolver.normalize(&FlowType::COLLECTION, "tech_debt_analysis"),
            Err(ResolveError::PhaseMoved { target_flow_type, .. }) if target_flow_type == FlowType::ASSESSMENT
        ));
        // Owned by collection and assessment: ambiguous, so unknown.
        assert!(matches!(
            resolver.normalize(&FlowType::DISCOVERY, "questionnaire"),
            Err(ResolveError::UnknownPhase { .. })
        ));
        assert!(matches!(
            resolver.normalize(&FlowType::DISCOVERY, "typo_phase"),
            Err(ResolveError::UnknownPhase { .. })
        ));
    }

    #[test]
    fn test_owning_flow_type() {
        let resolver = resolver();
        assert_eq!(resolver.owning_flow_type("mapping"), Some(FlowType::DISCOVERY));
        assert_eq!(resolver.owning_flow_type("tech_debt"), Some(FlowType::ASSESSMENT));
        assert_eq!(resolver.owning_flow_type("questionnaire"), None);
        assert_eq!(
            resolver.owners("questionnaire"),
            vec![FlowType::COLLECTION, FlowType::ASSESSMENT]
        );
        assert_eq!(resolver.owning_flow_type("nothing"), None);
    }

    #[test]
    fn test_unregistered_flow_type() {
        let resolver = resolver();
        assert!(matches!(
            resolver.normalize(&FlowType::new("migration"), "data_import"),
            Err(ResolveError::UnregisteredFlowType(_))
        ));
    }

    #[test]
    fn test_every_alias_maps_to_one_canonical() {
        let err = PhaseAliasResolver::builder(registry())
            .alias(FlowType::DISCOVERY, "mapping", "field_mapping")
            .alias(FlowType::DISCOVERY, "Mapping", "data_cleansing")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::AmbiguousAlias { .. }));

        // Same mapping twice is fine.
        PhaseAliasResolver::builder(registry())
            .alias(FlowType::DISCOVERY, "mapping", "field_mapping")
            .alias(FlowType::DISCOVERY, "mapping", "field_mapping")
            .build()
            .expect("duplicate identical alias");
    }

    #[test]
    fn test_invalid_alias_tables() {
        let err = PhaseAliasResolver::builder(registry())
            .alias(FlowType::DISCOVERY, "cleanup", "mapping")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::AliasTargetNotCanonical { .. }));

        let err = PhaseAliasResolver::builder(registry())
            .alias(FlowType::DISCOVERY, "data_cleansing", "field_mapping")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::AliasShadowsCanonical { .. }));

        let err = PhaseAliasResolver::builder(registry())
            .moved(FlowType::DISCOVERY, "field_mapping", FlowType::ASSESSMENT)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MovedPhaseStillResolves { .. }));

        let err = PhaseAliasResolver::builder(registry())
            .moved(FlowType::DISCOVERY, "old", FlowType::DISCOVERY)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MovedToSameFlowType { .. }));

        let err = PhaseAliasResolver::builder(registry())
            .moved(FlowType::DISCOVERY, "old", FlowType::new("planning"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnregisteredFlowType(_)));
    }

    #[test]
    fn test_canonical_only() {
        let resolver = PhaseAliasResolver::canonical_only(registry());
        assert!(resolver.is_resolvable(&FlowType::DISCOVERY, "data_import"));
        assert!(!resolver.is_resolvable(&FlowType::DISCOVERY, "import"));
    }
}
