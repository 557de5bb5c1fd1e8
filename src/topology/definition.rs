//! Worker definitions and their keyword arguments.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::error::TargetError;

/// Resolved topology entry for one worker.
///
/// Materialized fresh from the topology file every time a worker process boots.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerDefinition {
    /// Worker name (the entry's key).
    #[serde(skip)]
    pub name: String,
    /// Strategy tag (`map`, `custom`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Registered target name.
    pub target: String,
    /// Every other field of the entry.
    #[serde(flatten)]
    pub kwargs: Kwargs,
}

/// Keyword arguments of a worker entry, kept as raw YAML values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Kwargs(BTreeMap<String, Value>);

impl Kwargs {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an argument.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes and returns an argument.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Raw value of an argument.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` when the argument is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Decodes an optional argument.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TargetError> {
        self.0
            .get(key)
            .map(|v| {
                serde_yaml::from_value(v.clone()).map_err(|source| TargetError::InvalidArgument {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Decodes a required argument.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, TargetError> {
        self.get_as(key)?.ok_or_else(|| TargetError::MissingArgument {
            key: key.to_string(),
        })
    }

    /// Iterates over arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
