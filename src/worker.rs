//! # Worker bootstrap.
//!
//! Entry point of every worker process. Nothing is inherited from the supervisor
//! except the topology path and the worker's name on the command line:
//!
//! ```text
//! topovisor worker --config <path> --name <name>
//!   1. load the topology from <path>
//!   2. SIGINT/SIGTERM/SIGQUIT → this process's ShutdownFlag
//!   3. materialize the definition of <name>
//!   4. Strategies::dispatch(type) until the strategy returns
//! ```
//!
//! Exit code 0 when the strategy returns `Ok`, 1 on any error.

use std::path::Path;

use tracing::Instrument;

use crate::core::wait_for_stop_signal;
use crate::error::WorkerError;
use crate::flag::ShutdownFlag;
use crate::strategy::Strategies;
use crate::targets::Targets;
use crate::topology::Topology;

/// Boots worker `name` from the topology at `config` and runs it to completion.
pub async fn boot(
    config: &Path,
    name: &str,
    strategies: &Strategies,
    targets: &Targets,
) -> Result<(), WorkerError> {
    let topology = Topology::load(config).await?;

    let event = ShutdownFlag::new();
    let stop = wait_for_stop_signal().map_err(WorkerError::Signal)?;
    let setter = event.clone();
    let listener = tokio::spawn(async move {
        stop.await;
        setter.set();
    });

    let span = tracing::info_span!("worker", worker = name, pid = std::process::id());
    let res = async {
        let def = topology.definition(name)?;
        tracing::info!(kind = %def.kind, target = %def.target, "worker started");
        strategies.dispatch(event, def, targets).await
    }
    .instrument(span.clone())
    .await;

    listener.abort();
    span.in_scope(|| match &res {
        Ok(()) => tracing::info!("worker finished"),
        Err(e) => tracing::error!(error = %e, label = e.as_label(), "worker failed"),
    });
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets;

    #[tokio::test]
    async fn map_worker_drains_its_queue_and_fails_on_bad_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.yml");
        std::fs::write(
            &path,
            r#"
w1:
  type: map
  target: exec
  command: 'test "$(cat)" != poison'
  sleep: 0
  source: {kind: memory, items: [a, b, poison, c]}
workers: [w1]
"#,
        )
        .unwrap();

        let err = boot(&path, "w1", &Strategies::builtin(), &targets::builtin())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "target_failed");
    }

    #[tokio::test]
    async fn unknown_worker_is_a_topology_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.yml");
        std::fs::write(&path, "w1: {type: custom, target: idle}\nworkers: [w1]").unwrap();

        let err = boot(&path, "ghost", &Strategies::builtin(), &targets::builtin())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "topology_missing_definition");
    }

    #[tokio::test]
    async fn unknown_type_fails_at_boot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.yml");
        std::fs::write(&path, "w1: {type: reduce, target: idle}\nworkers: [w1]").unwrap();

        let err = boot(&path, "w1", &Strategies::builtin(), &targets::builtin())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "config_unknown_type");
    }
}
