//! Per-container rule input.
//!
//! A [`ResourceRecord`] is the generic key/value tree the rules inspect. It is
//! built from chart values or from rendered manifests and is never mutated by
//! a rule check. Typed accessors parse quantities on demand and report
//! anything malformed as absent.

use super::parser::{cpu_from_value, memory_from_value, MIB};
use super::types::QosClass;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Semantic view of one container's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord(Mapping);

impl ResourceRecord {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    /// Wrap a values tree. Anything other than a mapping yields an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Mapping(mapping) => Self(mapping),
            _ => Self::default(),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        let value: Value = serde_yaml::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Builder: set a top-level key.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Value::String(key.to_string()), value.into());
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the top-level key exists, whatever its value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Walk nested mappings. Missing keys and non-mapping hops yield `None`.
    pub fn path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_mapping()?.get(*key)?;
        }
        Some(current)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Raw `resources.<section>.<name>` value (e.g. `("limits", "cpu")`).
    pub fn resource(&self, section: &str, name: &str) -> Option<&Value> {
        self.path(&["resources", section, name])
    }

    /// True when `resources.<section>.<name>` holds a truthy value.
    pub fn has_resource(&self, section: &str, name: &str) -> bool {
        self.resource(section, name).is_some_and(is_truthy)
    }

    /// Display form of a raw resource value, or an empty string.
    pub fn resource_text(&self, section: &str, name: &str) -> String {
        match self.resource(section, name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// CPU request in millicores.
    pub fn cpu_request(&self) -> Option<f64> {
        self.resource("requests", "cpu").and_then(cpu_from_value)
    }

    /// CPU limit in millicores.
    pub fn cpu_limit(&self) -> Option<f64> {
        self.resource("limits", "cpu").and_then(cpu_from_value)
    }

    /// Memory request in mebibytes.
    pub fn memory_request_mi(&self) -> Option<f64> {
        self.resource("requests", "memory")
            .and_then(memory_from_value)
            .map(|bytes| bytes / MIB)
    }

    /// Memory limit in mebibytes.
    pub fn memory_limit_mi(&self) -> Option<f64> {
        self.resource("limits", "memory")
            .and_then(memory_from_value)
            .map(|bytes| bytes / MIB)
    }

    // ------------------------------------------------------------------
    // Workload shape
    // ------------------------------------------------------------------

    /// Explicit replica count, if the record carries one.
    pub fn replicas(&self) -> Option<i64> {
        match self.get("replicas")? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Replica count with the implicit default of one.
    pub fn replicas_or_default(&self) -> i64 {
        self.replicas().unwrap_or(1)
    }

    /// Declared QoS class, if any.
    pub fn qos_class(&self) -> Option<QosClass> {
        match self.get("qos_class")? {
            Value::String(s) => QosClass::parse(s),
            _ => None,
        }
    }

    /// True when the workload is declared BestEffort, or has no positive
    /// request or limit when no class is declared.
    ///
    /// A declared class that is not BestEffort wins over the quantities.
    pub fn is_best_effort(&self) -> bool {
        if let Some(Value::String(raw)) = self.get("qos_class")
            && !raw.trim().is_empty()
        {
            return raw.trim().eq_ignore_ascii_case("besteffort");
        }

        let any_positive = [
            self.cpu_request(),
            self.cpu_limit(),
            self.memory_request_mi(),
            self.memory_limit_mi(),
        ]
        .into_iter()
        .flatten()
        .any(|v| v > 0.0);

        !any_positive
    }

    /// Truthy top-level flag such as `has_anti_affinity`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    /// The configured disruption budget, preferring `podDisruptionBudget`
    /// over `pdb`.
    pub fn pdb(&self) -> Option<&Value> {
        self.get("podDisruptionBudget").or_else(|| self.get("pdb"))
    }
}

impl From<Mapping> for ResourceRecord {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

/// Loose truthiness for values trees: null, `false`, zero, empty strings
/// and empty collections all count as unset.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}
