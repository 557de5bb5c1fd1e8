//! # Topology files.
//!
//! A topology is one YAML mapping. The `workers` key lists the worker names to
//! run, in seed order; every listed name has its own top-level entry holding a
//! [`WorkerDefinition`]. Other top-level keys are free-form and usually carry
//! anchors shared by several workers (queues, common arguments). Anchors,
//! aliases and `<<` merge keys are resolved at load time.
//!
//! The optional `supervisor` key configures the supervisor itself
//! (see [`SupervisorConfig`]).
//!
//! ```yaml
//! user_ids: &user_ids
//!   kind: spool
//!   dir: /var/spool/topovisor/user_ids
//!
//! ingest_users:
//!   type: map
//!   target: log
//!   source: *user_ids
//!
//! workers:
//!   - ingest_users
//! ```

mod definition;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

pub use definition::{Kwargs, WorkerDefinition};

use crate::core::SupervisorConfig;
use crate::error::{ConfigurationError, TopologyError};
use crate::queue::QueueConfig;
use crate::strategy::Strategies;
use crate::targets::Targets;

const WORKERS_KEY: &str = "workers";
const SUPERVISOR_KEY: &str = "supervisor";

/// A loaded topology file.
#[derive(Debug, Clone)]
pub struct Topology {
    path: PathBuf,
    workers: Vec<String>,
    entries: Mapping,
    supervisor: SupervisorConfig,
}

impl Topology {
    /// Reads and parses the topology at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| TopologyError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(path, &text)
    }

    /// Parses topology text; `path` is recorded for workers and error messages.
    pub fn parse(path: impl AsRef<Path>, text: &str) -> Result<Self, TopologyError> {
        let path = path.as_ref().to_path_buf();
        let parse_err = |source| TopologyError::Parse {
            path: path.clone(),
            source,
        };

        let mut value: Value = serde_yaml::from_str(text).map_err(parse_err)?;
        value.apply_merge().map_err(parse_err)?;
        let entries: Mapping = serde_yaml::from_value(value).map_err(parse_err)?;

        let supervisor = match entries.get(SUPERVISOR_KEY) {
            Some(v) => serde_yaml::from_value(v.clone()).map_err(|source| {
                TopologyError::InvalidDefinition {
                    name: SUPERVISOR_KEY.to_string(),
                    source,
                }
            })?,
            None => SupervisorConfig::default(),
        };

        let workers: Vec<String> = match entries.get(WORKERS_KEY) {
            Some(v) => serde_yaml::from_value(v.clone()).map_err(|source| {
                TopologyError::InvalidDefinition {
                    name: WORKERS_KEY.to_string(),
                    source,
                }
            })?,
            None => return Err(TopologyError::MissingWorkers),
        };

        let mut seen = HashSet::with_capacity(workers.len());
        for name in &workers {
            if !seen.insert(name.as_str()) {
                return Err(TopologyError::DuplicateWorker { name: name.clone() });
            }
            if !entries.contains_key(name.as_str()) {
                return Err(TopologyError::MissingDefinition { name: name.clone() });
            }
        }

        Ok(Self {
            path,
            workers,
            entries,
            supervisor,
        })
    }

    /// Path the topology was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Worker names in seed order.
    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    /// Supervisor settings (defaults when the file has no `supervisor` key).
    pub fn supervisor(&self) -> &SupervisorConfig {
        &self.supervisor
    }

    /// Materializes the definition of one worker.
    pub fn definition(&self, name: &str) -> Result<WorkerDefinition, TopologyError> {
        let mut def: WorkerDefinition = self.entry(name)?;
        def.name = name.to_string();
        Ok(def)
    }

    /// Decodes a top-level entry as a queue description.
    pub fn queue(&self, name: &str) -> Result<QueueConfig, TopologyError> {
        self.entry(name)
    }

    /// Checks every listed worker against the registries.
    pub fn validate(
        &self,
        strategies: &Strategies,
        targets: &Targets,
    ) -> Result<(), ConfigurationError> {
        for name in &self.workers {
            let def = self.definition(name)?;
            strategies.validate(&def, targets)?;
        }
        Ok(())
    }

    fn entry<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, TopologyError> {
        let value = self
            .entries
            .get(name)
            .ok_or_else(|| TopologyError::MissingDefinition {
                name: name.to_string(),
            })?;
        serde_yaml::from_value(value.clone()).map_err(|source| TopologyError::InvalidDefinition {
            name: name.to_string(),
            source,
        })
    }
}
