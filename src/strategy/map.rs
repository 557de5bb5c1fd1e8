//! `map` strategy: pull, process, release, repeat.

use std::time::Duration;

use async_trait::async_trait;

use super::Strategy;
use crate::error::{ConfigurationError, TopologyError, WorkerError};
use crate::flag::ShutdownFlag;
use crate::queue::{QueueConfig, Source};
use crate::targets::{MapTarget, TargetKind, Targets};
use crate::topology::{Kwargs, WorkerDefinition};

const SOURCE_KEY: &str = "source";
const SLEEP_KEY: &str = "sleep";
const DEFAULT_SLEEP: Duration = Duration::from_secs(1);

/// Drives a map target over a queue until the shutdown flag is set.
///
/// Per iteration: check the flag, check out one item without waiting, call the
/// target, then release the lease (or nack it and return the error when the target
/// failed). An empty queue costs one `sleep`, cut short by the flag. A worker
/// in the middle of an item is never interrupted.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapStrategy;

/// `source` and `sleep` lifted out of a map worker's arguments.
#[derive(Debug)]
struct MapSettings {
    source: QueueConfig,
    sleep: Duration,
    kwargs: Kwargs,
}

impl MapSettings {
    fn resolve(def: &WorkerDefinition) -> Result<Self, ConfigurationError> {
        let invalid = |source| TopologyError::InvalidDefinition {
            name: def.name.clone(),
            source,
        };
        let mut kwargs = def.kwargs.clone();
        let source = kwargs
            .take(SOURCE_KEY)
            .ok_or_else(|| ConfigurationError::MissingSource {
                worker: def.name.clone(),
            })?;
        let source: QueueConfig = serde_yaml::from_value(source).map_err(invalid)?;
        let sleep = match kwargs.take(SLEEP_KEY) {
            Some(v) => crate::durations::deserialize(v).map_err(invalid)?,
            None => DEFAULT_SLEEP,
        };
        Ok(Self {
            source,
            sleep,
            kwargs,
        })
    }
}

#[async_trait]
impl Strategy for MapStrategy {
    fn validate(
        &self,
        def: &WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), ConfigurationError> {
        targets.resolve(&def.name, &def.target, TargetKind::Map)?;
        MapSettings::resolve(def)?;
        Ok(())
    }

    async fn run(
        &self,
        event: ShutdownFlag,
        def: WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), WorkerError> {
        let target = targets.map_target(&def.name, &def.target)?;
        let settings = MapSettings::resolve(&def)?;
        let source = settings.source.open().await?;
        drive(
            &event,
            source.as_ref(),
            target.as_ref(),
            &settings.kwargs,
            settings.sleep,
        )
        .await
    }
}

async fn drive(
    event: &ShutdownFlag,
    source: &dyn Source,
    target: &dyn MapTarget,
    kwargs: &Kwargs,
    sleep: Duration,
) -> Result<(), WorkerError> {
    while !event.is_set() {
        let Some(lease) = source.checkout().await? else {
            if sleep.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(sleep) => {}
                    _ = event.wait() => {}
                }
            }
            continue;
        };

        match target.call(lease.item(), kwargs).await {
            Ok(()) => lease.release().await?,
            Err(err) => {
                let id = lease.item().id().to_string();
                if let Err(nack) = lease.nack().await {
                    tracing::warn!(id, error = %nack, "cannot return failed item to its queue");
                }
                return Err(err.into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::{QueueError, TargetError};
    use crate::queue::{Item, Lease, MemoryQueue};
    use crate::targets::MapFn;

    /// Yields a fixed script of checkouts, `None` meaning "empty right now".
    struct Scripted {
        script: Mutex<VecDeque<Option<&'static str>>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    struct ScriptedLease {
        item: Item,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Lease for ScriptedLease {
        fn item(&self) -> &Item {
            &self.item
        }
        async fn release(self: Box<Self>) -> Result<(), QueueError> {
            self.log.lock().unwrap().push(format!("release {}", self.item.id()));
            Ok(())
        }
        async fn nack(self: Box<Self>) -> Result<(), QueueError> {
            self.log.lock().unwrap().push(format!("nack {}", self.item.id()));
            Ok(())
        }
    }

    #[async_trait]
    impl Source for Scripted {
        async fn checkout(&self) -> Result<Option<Box<dyn Lease>>, QueueError> {
            let next = self.script.lock().unwrap().pop_front().flatten();
            self.log
                .lock()
                .unwrap()
                .push(format!("checkout {}", next.unwrap_or("-")));
            Ok(next.map(|id| {
                Box::new(ScriptedLease {
                    item: Item::new(id, id.as_bytes().to_vec()),
                    log: Arc::clone(&self.log),
                }) as Box<dyn Lease>
            }))
        }
    }

    fn scripted(items: &[Option<&'static str>]) -> (Scripted, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = Scripted {
            script: Mutex::new(items.iter().copied().collect()),
            log: Arc::clone(&log),
        };
        (source, log)
    }

    /// Records calls; stops the worker on `stop_on`, fails on `fail_on`.
    fn recorder(
        log: Arc<Mutex<Vec<String>>>,
        event: ShutdownFlag,
        stop_on: &'static str,
        fail_on: Option<&'static str>,
    ) -> impl MapTarget {
        MapFn::new(move |item: Item, _: Kwargs| {
            let log = Arc::clone(&log);
            let event = event.clone();
            async move {
                let id = item.id().to_string();
                log.lock().unwrap().push(format!("call {id}"));
                if Some(id.as_str()) == fail_on {
                    return Err(TargetError::fail(format!("bad item {id}")));
                }
                if id == stop_on {
                    event.set();
                }
                Ok(())
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn processes_in_order_with_one_empty_sleep() {
        let (source, log) = scripted(&[Some("A"), Some("B"), None, Some("C")]);
        let event = ShutdownFlag::new();
        let target = recorder(Arc::clone(&log), event.clone(), "C", None);

        let started = tokio::time::Instant::now();
        drive(&event, &source, &target, &Kwargs::new(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            [
                "checkout A", "call A", "release A",
                "checkout B", "call B", "release B",
                "checkout -",
                "checkout C", "call C", "release C",
            ]
        );
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_item_ends_the_worker_before_the_next_checkout() {
        let (source, log) = scripted(&[Some("A"), Some("B"), None, Some("C")]);
        let event = ShutdownFlag::new();
        let target = recorder(Arc::clone(&log), event.clone(), "C", Some("B"));

        let err = drive(&event, &source, &target, &Kwargs::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "target_failed");
        assert_eq!(
            *log.lock().unwrap(),
            ["checkout A", "call A", "release A", "checkout B", "call B", "nack B"]
        );
    }

    #[tokio::test]
    async fn set_flag_stops_before_checkout() {
        let (source, log) = scripted(&[Some("A")]);
        let event = ShutdownFlag::new();
        event.set();
        let target = recorder(Arc::clone(&log), event.clone(), "A", None);

        drive(&event, &source, &target, &Kwargs::new(), Duration::ZERO)
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_sleep_is_cut_short_by_the_flag() {
        let (source, _log) = scripted(&[]);
        let event = ShutdownFlag::new();
        let setter = event.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            setter.set();
        });
        let target = MapFn::new(|_: Item, _: Kwargs| async { Ok::<_, TargetError>(()) });

        let started = tokio::time::Instant::now();
        drive(&event, &source, &target, &Kwargs::new(), Duration::from_secs(3600))
            .await
            .unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn zero_sleep_drains_then_keeps_polling() {
        let queue = MemoryQueue::from_items(["1", "2", "3"]);
        let event = ShutdownFlag::new();
        let calls = Arc::new(Mutex::new(0u32));
        let seen = Arc::clone(&calls);
        let target = MapFn::new(move |_: Item, _: Kwargs| {
            let seen = Arc::clone(&seen);
            async move {
                *seen.lock().unwrap() += 1;
                Ok::<_, TargetError>(())
            }
        });

        let stopper = event.clone();
        let q = queue.clone();
        let watcher = tokio::spawn(async move {
            // Keep polling the empty queue for a while, then stop the worker.
            for _ in 0..100 {
                tokio::task::yield_now().await;
            }
            stopper.set();
            q.len()
        });

        drive(&event, &queue, &target, &Kwargs::new(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(watcher.await.unwrap(), 0);
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(queue.released(), 3);
    }

    #[test]
    fn settings_lift_source_and_sleep_out_of_kwargs() {
        let mut def: WorkerDefinition = serde_yaml::from_str(
            "type: map\ntarget: log\nsource: {kind: memory}\nsleep: 250ms\nlevel: warn",
        )
        .unwrap();
        def.name = "w1".into();
        let s = MapSettings::resolve(&def).unwrap();
        assert_eq!(s.sleep, Duration::from_millis(250));
        assert_eq!(s.source, QueueConfig::Memory { items: vec![] });
        assert_eq!(s.kwargs.len(), 1);
        assert!(s.kwargs.contains("level"));

        def.kwargs.take("source");
        let err = MapSettings::resolve(&def).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingSource { worker } if worker == "w1"));
    }

    #[test]
    fn default_sleep_is_one_second() {
        let mut def: WorkerDefinition =
            serde_yaml::from_str("type: map\ntarget: log\nsource: {kind: memory}").unwrap();
        def.name = "w1".into();
        assert_eq!(MapSettings::resolve(&def).unwrap().sleep, DEFAULT_SLEEP);
    }
}
