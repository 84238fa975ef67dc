//! Structured fix patches.
//!
//! A [`Patch`] mirrors the shape of chart values: either a scalar/sequence
//! override, or a nested map of further patches. Merging never mutates the
//! base document.
//!
//! Merge rule, used both for patch-on-patch and patch-on-values:
//! map ∩ map merges key by key, any other pairing replaces wholesale.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// A recursively mergeable override document.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Replace the target with this value
    Value(Value),
    /// Merge each entry into the target mapping
    Map(BTreeMap<String, Patch>),
}

impl Default for Patch {
    fn default() -> Self {
        Self::empty()
    }
}

impl Patch {
    /// An empty map patch (merging it is a no-op).
    pub fn empty() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Builder: set `value` at the nested `path`, creating maps as needed.
    ///
    /// ```rust
    /// use chart_optimizer::optimizer::Patch;
    ///
    /// let patch = Patch::empty().with(&["resources", "limits", "cpu"], "500m");
    /// assert_eq!(
    ///     patch.get_value(&["resources", "limits", "cpu"]).and_then(|v| v.as_str()),
    ///     Some("500m")
    /// );
    /// ```
    pub fn with(mut self, path: &[&str], value: impl Into<Value>) -> Self {
        self.insert(path, Patch::from_value(value.into()));
        self
    }

    /// Set a sub-patch at the nested `path`.
    pub fn insert(&mut self, path: &[&str], patch: Patch) {
        let Some((head, rest)) = path.split_first() else {
            *self = patch;
            return;
        };
        if !matches!(self, Patch::Map(_)) {
            *self = Patch::empty();
        }
        if let Patch::Map(entries) = self {
            let slot = entries.entry((*head).to_string()).or_insert_with(Patch::empty);
            if rest.is_empty() {
                *slot = patch;
            } else {
                slot.insert(rest, patch);
            }
        }
    }

    /// Sub-patch at `path`, if any.
    pub fn get(&self, path: &[&str]) -> Option<&Patch> {
        let mut current = self;
        for key in path {
            match current {
                Patch::Map(entries) => current = entries.get(*key)?,
                Patch::Value(_) => return None,
            }
        }
        Some(current)
    }

    /// Scalar value at `path`, if the patch holds one there.
    pub fn get_value(&self, path: &[&str]) -> Option<&Value> {
        match self.get(path)? {
            Patch::Value(value) => Some(value),
            Patch::Map(_) => None,
        }
    }

    /// True when merging this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Patch::Map(entries) if entries.is_empty())
    }

    /// Top-level keys touched by this patch.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Patch::Map(entries) => entries.keys().map(String::as_str).collect(),
            Patch::Value(_) => Vec::new(),
        }
    }

    /// Combine two patches; `other` wins on conflicts.
    pub fn merge(&self, other: &Patch) -> Patch {
        match (self, other) {
            (Patch::Map(base), Patch::Map(overlay)) => {
                let mut merged = base.clone();
                for (key, patch) in overlay {
                    let next = match merged.get(key) {
                        Some(existing) => existing.merge(patch),
                        None => patch.clone(),
                    };
                    merged.insert(key.clone(), next);
                }
                Patch::Map(merged)
            }
            _ => other.clone(),
        }
    }

    /// Deep-merge this patch into a copy of `base`.
    ///
    /// A non-mapping base is treated as an empty mapping when the patch is a
    /// map, so a patch always applies to an empty values file.
    pub fn apply_to(&self, base: &Value) -> Value {
        match self {
            Patch::Value(value) => value.clone(),
            Patch::Map(entries) => {
                let mut out = base.as_mapping().cloned().unwrap_or_default();
                for (key, patch) in entries {
                    let key_value = Value::String(key.clone());
                    let merged = match (out.get(&key_value), patch) {
                        (Some(existing @ Value::Mapping(_)), Patch::Map(_)) => {
                            patch.apply_to(existing)
                        }
                        _ => patch.to_value(),
                    };
                    out.insert(key_value, merged);
                }
                Value::Mapping(out)
            }
        }
    }

    /// Convert a YAML value into a patch.
    ///
    /// Mappings whose keys are all strings become [`Patch::Map`]; everything
    /// else (including sequences) is a wholesale override.
    pub fn from_value(value: Value) -> Patch {
        match value {
            Value::Mapping(mapping) if mapping.keys().all(Value::is_string) => {
                let entries = mapping
                    .into_iter()
                    .filter_map(|(k, v)| match k {
                        Value::String(key) => Some((key, Patch::from_value(v))),
                        _ => None,
                    })
                    .collect();
                Patch::Map(entries)
            }
            other => Patch::Value(other),
        }
    }

    /// Convert back into a plain YAML value.
    pub fn to_value(&self) -> Value {
        match self {
            Patch::Value(value) => value.clone(),
            Patch::Map(entries) => {
                let mut mapping = Mapping::new();
                for (key, patch) in entries {
                    mapping.insert(Value::String(key.clone()), patch.to_value());
                }
                Value::Mapping(mapping)
            }
        }
    }

    /// Render as a YAML snippet for previews.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_value()).unwrap_or_default()
    }
}

impl From<Value> for Patch {
    fn from(value: Value) -> Self {
        Patch::from_value(value)
    }
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Patch::from_value)
    }
}
