//! Flow payload: caller inputs plus one output section per phase.

use crate::phase::PhaseName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Type-safe input key wrapper.
///
/// Names a data dependency of a phase. Resolved first against the
/// caller-supplied inputs, then against the output section of the phase with
/// the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputKey(String);

impl InputKey {
    /// Creates a new InputKey.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InputKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InputKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for InputKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for InputKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A typed view of one phase's output section.
///
/// ```
/// use phaseflow_core::{PhasePayload, PhaseSection};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct ImportSummary {
///     rows: u64,
/// }
///
/// impl PhaseSection for ImportSummary {
///     const PHASE: &'static str = "import";
/// }
///
/// let mut payload = PhasePayload::new();
/// payload.set_section(&ImportSummary { rows: 42 })?;
/// assert_eq!(payload.section::<ImportSummary>()?, Some(ImportSummary { rows: 42 }));
/// # Ok::<(), serde_json::Error>(())
/// ```
pub trait PhaseSection: Serialize + DeserializeOwned {
    /// Canonical name of the phase that owns this section.
    const PHASE: &'static str;
}

/// Accumulated flow data.
///
/// Phases extend the payload additively: each successful phase owns exactly
/// one section under its canonical name, and re-running a phase replaces only
/// that section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePayload {
    #[serde(default)]
    inputs: Map<String, Value>,
    #[serde(default)]
    outputs: BTreeMap<PhaseName, Value>,
}

impl PhasePayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a payload seeded with caller inputs.
    pub fn with_inputs(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            outputs: BTreeMap::new(),
        }
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    /// Inserts a caller input, replacing any previous value.
    pub fn insert_input(&mut self, key: impl Into<InputKey>, value: Value) {
        self.inputs.insert(key.into().0, value);
    }

    pub fn extend_inputs(&mut self, inputs: Map<String, Value>) {
        self.inputs.extend(inputs);
    }

    /// Returns the output section of `phase`, if it has produced one.
    pub fn output(&self, phase: &str) -> Option<&Value> {
        self.outputs.get(phase)
    }

    pub fn has_output(&self, phase: &str) -> bool {
        self.outputs.contains_key(phase)
    }

    /// Sets the output section of `phase`, returning the previous one.
    pub fn set_output(&mut self, phase: PhaseName, value: Value) -> Option<Value> {
        self.outputs.insert(phase, value)
    }

    /// Iterates over output sections in phase-name order.
    pub fn outputs(&self) -> impl Iterator<Item = (&PhaseName, &Value)> {
        self.outputs.iter()
    }

    /// Looks `key` up in the caller inputs, then in the phase outputs.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key).or_else(|| self.outputs.get(key))
    }

    /// Deserializes the section owned by `S::PHASE`.
    ///
    /// Returns `Ok(None)` when the phase has not produced output yet.
    pub fn section<S: PhaseSection>(&self) -> Result<Option<S>, serde_json::Error> {
        self.outputs
            .get(S::PHASE)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    pub fn set_section<S: PhaseSection>(&mut self, section: &S) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(section)?;
        self.outputs.insert(PhaseName::new(S::PHASE), value);
        Ok(())
    }
}

/// Inputs resolved for one phase invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseInputs {
    values: BTreeMap<InputKey, Value>,
}

impl PhaseInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: InputKey, value: Value) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InputKey, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
