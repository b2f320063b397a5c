//! Boundary validators and their registry.

use crate::error::ConfigurationError;
use crate::payload::PhasePayload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-safe validator name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorName(String);

impl ValidatorName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ValidatorName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ValidatorName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ValidatorName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Outcome of one or more validator runs.
///
/// `valid` is `false` as soon as any merged result was invalid. Errors and
/// warnings keep the order in which validators ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

impl ValidationResult {
    /// A passing result with no messages.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing result with a single error.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.add_error(error);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.add_warning(warning);
        self
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: ValidationResult) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl FromIterator<ValidationResult> for ValidationResult {
    fn from_iter<I: IntoIterator<Item = ValidationResult>>(iter: I) -> Self {
        iter.into_iter().fold(Self::ok(), |mut acc, result| {
            acc.merge(result);
            acc
        })
    }
}

/// A named check run against the flow payload at a phase boundary.
///
/// Implemented for any `Fn(&PhasePayload) -> ValidationResult`, so simple
/// validators can be registered as closures:
///
/// ```
/// use phaseflow_core::{ValidationResult, ValidatorRegistry};
///
/// let mut validators = ValidatorRegistry::new();
/// validators
///     .register("has_source", |payload: &phaseflow_core::PhasePayload| {
///         if payload.input("source").is_some() {
///             ValidationResult::ok()
///         } else {
///             ValidationResult::fail("source is required")
///         }
///     })
///     .expect("unique name");
/// assert!(validators.contains("has_source"));
/// ```
pub trait Validator: Send + Sync {
    fn validate(&self, payload: &PhasePayload) -> ValidationResult;
}

impl<F> Validator for F
where
    F: Fn(&PhasePayload) -> ValidationResult + Send + Sync,
{
    fn validate(&self, payload: &PhasePayload) -> ValidationResult {
        self(payload)
    }
}

/// Name to validator lookup. Read-only once handed to a
/// [`FlowTypeRegistry`](crate::FlowTypeRegistry).
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<ValidatorName, Arc<dyn Validator>>,
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.validators.keys().collect();
        names.sort();
        f.debug_struct("ValidatorRegistry")
            .field("validators", &names)
            .finish()
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator under `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateValidator`] if the name is taken.
    pub fn register<V: Validator + 'static>(
        &mut self,
        name: impl Into<ValidatorName>,
        validator: V,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        if self.validators.contains_key(&name) {
            return Err(ConfigurationError::DuplicateValidator(name));
        }
        self.validators.insert(name, Arc::new(validator));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Validator>> {
        self.validators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Runs every validator in `names` in order and merges the results.
    ///
    /// Never short-circuits: all violations are reported in one pass.
    pub fn run_all(&self, names: &[ValidatorName], payload: &PhasePayload) -> ValidationResult {
        names
            .iter()
            .map(|name| match self.validators.get(name) {
                Some(validator) => validator.validate(payload),
                None => ValidationResult::fail(format!("validator '{name}' is not registered")),
            })
            .collect()
    }
}
