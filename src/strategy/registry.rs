//! Strategy table keyed by worker type tag.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CustomStrategy, MapStrategy, Strategy};
use crate::error::{ConfigurationError, WorkerError};
use crate::flag::ShutdownFlag;
use crate::targets::Targets;
use crate::topology::WorkerDefinition;

/// Immutable table from type tag to [`Strategy`].
#[derive(Clone, Default)]
pub struct Strategies {
    by_tag: HashMap<String, Arc<dyn Strategy>>,
}

impl Strategies {
    /// Starts an empty builder.
    pub fn builder() -> StrategiesBuilder {
        StrategiesBuilder::default()
    }

    /// Table with the `map` and `custom` strategies.
    pub fn builtin() -> Self {
        Self::builder()
            .register("map", MapStrategy)
            .register("custom", CustomStrategy)
            .build()
    }

    /// Strategy registered for `tag`.
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Strategy>> {
        self.by_tag.get(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.by_tag.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    fn lookup(&self, def: &WorkerDefinition) -> Result<&Arc<dyn Strategy>, ConfigurationError> {
        self.get(&def.kind)
            .ok_or_else(|| ConfigurationError::UnknownType {
                worker: def.name.clone(),
                kind: def.kind.clone(),
            })
    }

    /// Checks `def` against this table and `targets`.
    pub fn validate(
        &self,
        def: &WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), ConfigurationError> {
        self.lookup(def)?.validate(def, targets)
    }

    /// Runs `def` with the strategy registered for its type.
    pub async fn dispatch(
        &self,
        event: ShutdownFlag,
        def: WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), WorkerError> {
        let strategy = Arc::clone(self.lookup(&def)?);
        strategy.run(event, def, targets).await
    }
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategies")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Builder for [`Strategies`].
#[derive(Default)]
pub struct StrategiesBuilder {
    by_tag: HashMap<String, Arc<dyn Strategy>>,
}

impl StrategiesBuilder {
    /// Registers `strategy` under `tag`, replacing any earlier one.
    pub fn register(mut self, tag: impl Into<String>, strategy: impl Strategy) -> Self {
        self.by_tag.insert(tag.into(), Arc::new(strategy));
        self
    }

    /// Freezes the table.
    pub fn build(self) -> Strategies {
        Strategies {
            by_tag: self.by_tag,
        }
    }
}
