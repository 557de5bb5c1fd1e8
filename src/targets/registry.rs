//! # Target registry.
//!
//! Immutable table from target name to [`Target`], built once at startup with
//! [`TargetsBuilder`] and passed by reference to the supervisor (for eager
//! validation) and to every worker bootstrap (for dispatch).

use std::collections::HashMap;
use std::sync::Arc;

use super::target::{CustomTarget, MapTarget, Target, TargetKind};
use crate::error::ConfigurationError;

/// Read-only table of named targets.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    by_name: HashMap<String, Target>,
}

impl Targets {
    /// Starts an empty builder.
    pub fn builder() -> TargetsBuilder {
        TargetsBuilder::default()
    }

    /// Looks a target up by name.
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.by_name.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves the target of `worker`, checking it has the `expected` kind.
    pub fn resolve(
        &self,
        worker: &str,
        name: &str,
        expected: TargetKind,
    ) -> Result<&Target, ConfigurationError> {
        let target = self
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownTarget {
                worker: worker.to_string(),
                target: name.to_string(),
            })?;
        if target.kind() != expected {
            return Err(kind_mismatch(worker, name, expected));
        }
        Ok(target)
    }

    /// Resolves a target the `map` strategy can drive.
    pub fn map_target(
        &self,
        worker: &str,
        name: &str,
    ) -> Result<Arc<dyn MapTarget>, ConfigurationError> {
        match self.resolve(worker, name, TargetKind::Map)? {
            Target::Map(t) => Ok(Arc::clone(t)),
            Target::Custom(_) => Err(kind_mismatch(worker, name, TargetKind::Map)),
        }
    }

    /// Resolves a target the `custom` strategy can drive.
    pub fn custom_target(
        &self,
        worker: &str,
        name: &str,
    ) -> Result<Arc<dyn CustomTarget>, ConfigurationError> {
        match self.resolve(worker, name, TargetKind::Custom)? {
            Target::Custom(t) => Ok(Arc::clone(t)),
            Target::Map(_) => Err(kind_mismatch(worker, name, TargetKind::Custom)),
        }
    }
}

fn kind_mismatch(worker: &str, name: &str, expected: TargetKind) -> ConfigurationError {
    let found = match expected {
        TargetKind::Map => TargetKind::Custom,
        TargetKind::Custom => TargetKind::Map,
    };
    ConfigurationError::TargetKind {
        worker: worker.to_string(),
        target: name.to_string(),
        expected,
        found,
    }
}

/// Builder for [`Targets`].
#[derive(Debug, Default)]
pub struct TargetsBuilder {
    by_name: HashMap<String, Target>,
}

impl TargetsBuilder {
    /// Registers a target, replacing any earlier one with the same name.
    pub fn register(mut self, name: impl Into<String>, target: Target) -> Self {
        self.by_name.insert(name.into(), target);
        self
    }

    /// Registers a [`MapTarget`].
    pub fn map(self, name: impl Into<String>, target: impl MapTarget) -> Self {
        self.register(name, Target::map(target))
    }

    /// Registers a [`CustomTarget`].
    pub fn custom(self, name: impl Into<String>, target: impl CustomTarget) -> Self {
        self.register(name, Target::custom(target))
    }

    /// Freezes the table.
    pub fn build(self) -> Targets {
        Targets {
            by_name: self.by_name,
        }
    }
}
