//! `custom` strategy: one call, full control.

use async_trait::async_trait;

use super::Strategy;
use crate::error::{ConfigurationError, WorkerError};
use crate::flag::ShutdownFlag;
use crate::targets::{TargetKind, Targets};
use crate::topology::WorkerDefinition;

/// Calls a custom target exactly once with the process's shutdown flag and every
/// keyword argument of the worker entry, and returns when it does.
///
/// Nothing here enforces cancellation: a target that ignores its flag runs until
/// the supervisor's stop deadline kills the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomStrategy;

#[async_trait]
impl Strategy for CustomStrategy {
    fn validate(
        &self,
        def: &WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), ConfigurationError> {
        targets.resolve(&def.name, &def.target, TargetKind::Custom)?;
        Ok(())
    }

    async fn run(
        &self,
        event: ShutdownFlag,
        def: WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), WorkerError> {
        let target = targets.custom_target(&def.name, &def.target)?;
        target.call(event, &def.kwargs).await?;
        Ok(())
    }
}
