//! # Supervisor: keeps one process alive per topology worker.
//!
//! The [`Supervisor`] owns the restart queue and the child table of the current
//! topology. A single loop mutates both; everything concurrent (child exits, OS
//! signals, [`SupervisorHandle`] requests) reaches it as a message.
//!
//! ## High-level architecture
//! ```text
//! seed: topology.workers() ──► RestartQueue
//!
//! loop:
//!   RestartQueue::drain_ready(now) ──► Launcher::launch(name) ──► ChildTable[pid] = name
//!                                                         └──► watcher task (owns process)
//!   select {
//!     exit from a watcher  ──► ChildTable.remove(pid) ──► RestartHistory::decide()
//!                                   ├─ Restart(delay) ──► RestartQueue.push(name, now + delay)
//!                                   └─ Exhausted      ──► WorkerExhausted
//!     Stop                 ──► drain(grace) ──► return
//!     Reboot               ──► drain(grace) ──► reload + validate ──► fresh queue and table
//!     tick / next backoff  ──► (loop)
//!   }
//! ```
//!
//! ## Drain (stop and reboot)
//! ```text
//! SIGTERM every child ──► wait up to `grace` for exits
//!   ├─ all reaped ──► AllStoppedWithin
//!   └─ timeout    ──► GraceExceeded ──► SIGKILL survivors ──► reap (bounded)
//! ```
//!
//! ## Rules
//! - A name is requeued only after its watcher has reaped the process, so it is never
//!   both queued and running.
//! - Once stop is requested nothing is spawned again; names still queued stay there.
//! - A failed reload on reboot keeps the previous topology.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::launcher::{ExitStatus, Launcher, WorkerProcess};
use super::shutdown;
use super::state::{ChildTable, Control, RestartQueue, Running};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::flag::ShutdownFlag;
use crate::policies::{Decision, RestartHistory, RestartRules};
use crate::strategy::Strategies;
use crate::subscribers::{StatusTracker, SubscriberSet};
use crate::targets::Targets;
use crate::topology::Topology;

/// How long SIGKILLed processes get to be reaped before the supervisor moves on.
const KILL_REAP: Duration = Duration::from_secs(1);

/// Operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Stop,
    Reboot,
}

/// Cloneable handle that sends stop and reboot requests to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SupervisorHandle {
    /// Requests a graceful stop. Returns `false` when the supervisor is gone.
    pub fn stop(&self) -> bool {
        self.tx.send(Command::Stop).is_ok()
    }

    /// Requests a drain and reload. Returns `false` when the supervisor is gone.
    pub fn reboot(&self) -> bool {
        self.tx.send(Command::Reboot).is_ok()
    }
}

/// Reaped child, reported by its watcher task.
#[derive(Debug)]
struct Exit {
    generation: u64,
    pid: u32,
    name: Arc<str>,
    status: ExitStatus,
}

/// State rebuilt from scratch for every loaded topology.
struct Generation {
    id: u64,
    rules: RestartRules,
    queue: RestartQueue,
    children: ChildTable,
    history: HashMap<Arc<str>, RestartHistory>,
    attempts: HashMap<Arc<str>, u32>,
    exhausted: HashSet<Arc<str>>,
}

impl Generation {
    fn seed(id: u64, topology: &Topology, now: Instant) -> Self {
        let mut queue = RestartQueue::default();
        for name in topology.workers() {
            queue.push(Arc::from(name.as_str()), now);
        }
        Self {
            id,
            rules: topology.supervisor().rules(),
            queue,
            children: ChildTable::default(),
            history: HashMap::new(),
            attempts: HashMap::new(),
            exhausted: HashSet::new(),
        }
    }

    /// Names of `workers` that are not in exactly one of the restart queue and the
    /// child table (exhausted workers must be in neither).
    fn misplaced(&self, workers: &[String]) -> Vec<String> {
        workers
            .iter()
            .filter(|name| {
                let queued = self.queue.contains(name);
                let running = self.children.contains_name(name);
                if self.exhausted.contains(name.as_str()) {
                    queued || running
                } else {
                    queued == running
                }
            })
            .cloned()
            .collect()
    }
}

fn debug_assert_placement(generation: &Generation, topology: &Topology) {
    debug_assert!(
        generation.misplaced(topology.workers()).is_empty(),
        "workers neither pending nor running exactly once: {:?}",
        generation.misplaced(topology.workers())
    );
}

/// Takes the next queued command without waiting; a closed channel reads as stop.
fn pending(commands: &mut mpsc::UnboundedReceiver<Command>) -> Option<Command> {
    match commands.try_recv() {
        Ok(cmd) => Some(cmd),
        Err(mpsc::error::TryRecvError::Empty) => None,
        Err(mpsc::error::TryRecvError::Disconnected) => Some(Command::Stop),
    }
}

/// Consumes queued commands and reports whether any of them was a stop.
fn stop_requested(commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
    let mut stop = false;
    while let Some(cmd) = pending(commands) {
        if cmd == Command::Stop {
            stop = true;
            break;
        }
    }
    stop
}

/// Runs a topology of worker processes until stopped.
///
/// Built with [`SupervisorBuilder`](crate::SupervisorBuilder).
pub struct Supervisor {
    topology: Topology,
    strategies: Arc<Strategies>,
    targets: Arc<Targets>,
    launcher: Arc<dyn Launcher>,
    bus: Bus,
    subs: SubscriberSet,
    status: Arc<StatusTracker>,
    flag: ShutdownFlag,
    os_signals: bool,
    tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

pub(crate) struct SupervisorParts {
    pub topology: Topology,
    pub strategies: Arc<Strategies>,
    pub targets: Arc<Targets>,
    pub launcher: Arc<dyn Launcher>,
    pub bus: Bus,
    pub subs: SubscriberSet,
    pub status: Arc<StatusTracker>,
    pub os_signals: bool,
}

impl Supervisor {
    pub(crate) fn from_parts(parts: SupervisorParts) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            topology: parts.topology,
            strategies: parts.strategies,
            targets: parts.targets,
            launcher: parts.launcher,
            bus: parts.bus,
            subs: parts.subs,
            status: parts.status,
            flag: ShutdownFlag::new(),
            os_signals: parts.os_signals,
            tx,
            rx,
        }
    }

    /// Handle for sending stop and reboot requests.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Per-worker status, updated from the event stream.
    pub fn status(&self) -> Arc<StatusTracker> {
        Arc::clone(&self.status)
    }

    /// The supervisor's own shutdown flag; set once stop has been requested.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.flag.clone()
    }

    /// The topology currently in effect.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Runs until a stop request has been handled.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] when some workers had to be killed.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let Self {
            mut topology,
            strategies,
            targets,
            launcher,
            bus,
            subs,
            status: _,
            flag,
            os_signals,
            tx,
            mut rx,
        } = self;

        let signals = if os_signals {
            Some(shutdown::forward_signals(tx.clone()).map_err(RuntimeError::Signal)?)
        } else {
            None
        };
        let done = tokio_util::sync::CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, done.clone());

        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let mut lp = Loop {
            launcher,
            bus: bus.clone(),
            flag,
            exit_tx,
            exit_rx,
        };
        let res = lp
            .serve(&mut topology, &strategies, &targets, &mut rx)
            .await;

        if let Some(signals) = signals {
            signals.abort();
        }
        drop(tx);
        done.cancel();
        if let Ok(subs) = listener.await {
            subs.shutdown().await;
        }
        res
    }
}

/// Forwards bus events to the subscriber set until `done`, then drains what is left
/// and hands the set back for an orderly shutdown.
fn subscriber_listener(
    bus: &Bus,
    subs: SubscriberSet,
    done: tokio_util::sync::CancellationToken,
) -> JoinHandle<SubscriberSet> {
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = done.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => subs.emit(&ev),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        subs
    })
}

struct Loop {
    launcher: Arc<dyn Launcher>,
    bus: Bus,
    flag: ShutdownFlag,
    exit_tx: mpsc::UnboundedSender<Exit>,
    exit_rx: mpsc::UnboundedReceiver<Exit>,
}

impl Loop {
    async fn serve(
        &mut self,
        topology: &mut Topology,
        strategies: &Strategies,
        targets: &Targets,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Result<(), RuntimeError> {
        let mut gen_id = 0;
        let mut generation = self.start(topology, gen_id);

        loop {
            let grace = topology.supervisor().grace;
            let cmd = match pending(commands) {
                Some(cmd) => cmd,
                None => {
                    self.spawn_ready(&mut generation, topology);
                    debug_assert_placement(&generation, topology);

                    let mut wake = Instant::now() + topology.supervisor().tick;
                    if let Some(next) = generation.queue.next_deadline() {
                        wake = wake.min(next);
                    }
                    tokio::select! {
                        biased;
                        cmd = commands.recv() => cmd.unwrap_or(Command::Stop),
                        Some(exit) = self.exit_rx.recv() => {
                            self.on_exit(&mut generation, exit);
                            debug_assert_placement(&generation, topology);
                            continue;
                        }
                        _ = tokio::time::sleep_until(wake) => continue,
                    }
                }
            };

            match cmd {
                Command::Stop => {
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                    self.flag.set();
                    let drained = self.drain(&mut generation, grace).await;
                    return drained.map_err(|stuck| RuntimeError::GraceExceeded { grace, stuck });
                }
                Command::Reboot => {
                    self.bus.publish(Event::new(EventKind::RebootRequested));
                    let drained = self.drain(&mut generation, grace).await;
                    // A stop that arrived during the drain wins over the reload.
                    if stop_requested(commands) {
                        self.bus.publish(Event::new(EventKind::ShutdownRequested));
                        self.flag.set();
                        return drained.map_err(|stuck| RuntimeError::GraceExceeded { grace, stuck });
                    }
                    self.reload(topology, strategies, targets).await;
                    gen_id += 1;
                    generation = self.start(topology, gen_id);
                }
            }
        }
    }

    fn start(&self, topology: &Topology, id: u64) -> Generation {
        let now = Instant::now();
        let generation = Generation::seed(id, topology, now);
        self.bus.publish(
            Event::new(EventKind::TopologyLoaded).with_reason(topology.path().display().to_string()),
        );
        for name in topology.workers() {
            self.bus.publish(
                Event::new(EventKind::WorkerQueued)
                    .with_worker(name.as_str())
                    .with_delay(Duration::ZERO),
            );
        }
        generation
    }

    async fn reload(&self, topology: &mut Topology, strategies: &Strategies, targets: &Targets) {
        let fresh = match Topology::load(topology.path()).await {
            Ok(t) => t.validate(strategies, targets).map(|()| t).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match fresh {
            Ok(t) => *topology = t,
            Err(reason) => {
                self.bus
                    .publish(Event::new(EventKind::TopologyRejected).with_reason(reason));
            }
        }
    }

    fn spawn_ready(&self, generation: &mut Generation, topology: &Topology) {
        if self.flag.is_set() {
            return;
        }
        let now = Instant::now();
        for name in generation.queue.drain_ready(now) {
            let attempt = generation.attempts.entry(Arc::clone(&name)).or_insert(0);
            *attempt += 1;
            let attempt = *attempt;

            match self.launcher.launch(&name, topology.path()) {
                Ok(process) => {
                    let pid = process.pid();
                    let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
                    generation
                        .children
                        .insert(pid, Running::new(Arc::clone(&name), now, ctl_tx));
                    tokio::spawn(watch(
                        process,
                        generation.id,
                        Arc::clone(&name),
                        ctl_rx,
                        self.exit_tx.clone(),
                    ));
                    self.bus.publish(
                        Event::new(EventKind::WorkerSpawned)
                            .with_worker(Arc::clone(&name))
                            .with_pid(pid)
                            .with_attempt(attempt),
                    );
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::SpawnFailed)
                            .with_worker(Arc::clone(&name))
                            .with_reason(e.to_string()),
                    );
                    self.requeue(generation, name, ExitStatus::Unknown, Duration::ZERO, now);
                }
            }
        }
    }

    fn on_exit(&self, generation: &mut Generation, exit: Exit) {
        if exit.generation != generation.id {
            return;
        }
        let Some(child) = generation.children.remove(exit.pid) else {
            return;
        };
        let now = Instant::now();
        self.bus.publish(
            Event::new(EventKind::WorkerExited)
                .with_worker(Arc::clone(&exit.name))
                .with_pid(exit.pid)
                .with_status(exit.status),
        );
        let ran = now.saturating_duration_since(child.started);
        self.requeue(generation, child.name, exit.status, ran, now);
    }

    fn requeue(
        &self,
        generation: &mut Generation,
        name: Arc<str>,
        status: ExitStatus,
        ran: Duration,
        now: Instant,
    ) {
        let decision = generation
            .history
            .entry(Arc::clone(&name))
            .or_default()
            .decide(&generation.rules, status, ran, now);

        match decision {
            Decision::Restart { delay } => {
                generation.queue.push(Arc::clone(&name), now + delay);
                self.bus.publish(
                    Event::new(EventKind::WorkerQueued)
                        .with_worker(name)
                        .with_delay(delay),
                );
            }
            Decision::Exhausted { reason } => {
                generation.exhausted.insert(Arc::clone(&name));
                self.bus.publish(
                    Event::new(EventKind::WorkerExhausted)
                        .with_worker(name)
                        .with_reason(reason),
                );
            }
        }
    }

    /// Terminates every child of `generation`; `Err` carries the names that had to be killed.
    async fn drain(&mut self, generation: &mut Generation, grace: Duration) -> Result<(), Vec<String>> {
        for (pid, child) in generation.children.iter() {
            if child.send(Control::Terminate) {
                self.bus.publish(
                    Event::new(EventKind::WorkerTerminating)
                        .with_worker(Arc::clone(&child.name))
                        .with_pid(pid),
                );
            }
        }

        self.reap_until(generation, Instant::now() + grace).await;
        if generation.children.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        }

        let stuck = generation.children.names();
        self.bus
            .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
        for (pid, child) in generation.children.iter() {
            if child.send(Control::Kill) {
                self.bus.publish(
                    Event::new(EventKind::WorkerKilled)
                        .with_worker(Arc::clone(&child.name))
                        .with_pid(pid),
                );
            }
        }
        self.reap_until(generation, Instant::now() + KILL_REAP).await;
        Err(stuck)
    }

    async fn reap_until(&mut self, generation: &mut Generation, deadline: Instant) {
        while !generation.children.is_empty() {
            tokio::select! {
                Some(exit) = self.exit_rx.recv() => {
                    if exit.generation != generation.id {
                        continue;
                    }
                    if generation.children.remove(exit.pid).is_some() {
                        self.bus.publish(
                            Event::new(EventKind::WorkerExited)
                                .with_worker(exit.name)
                                .with_pid(exit.pid)
                                .with_status(exit.status),
                        );
                    }
                }
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }
    }
}

/// Owns one child process until it is reaped, applying control requests meanwhile.
async fn watch(
    mut process: Box<dyn WorkerProcess>,
    generation: u64,
    name: Arc<str>,
    mut control: mpsc::UnboundedReceiver<Control>,
    exits: mpsc::UnboundedSender<Exit>,
) {
    let pid = process.pid();
    let status = loop {
        tokio::select! {
            status = process.wait() => break status,
            Some(ctl) = control.recv() => {
                let res = match ctl {
                    Control::Terminate => process.terminate(),
                    Control::Kill => process.kill(),
                };
                if let Err(e) = res {
                    tracing::warn!(worker = &*name, pid, ?ctl, error = %e, "cannot signal worker");
                }
            }
        }
    };
    let _ = exits.send(Exit {
        generation,
        pid,
        name,
        status,
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::watch;

    use super::*;
    use crate::core::SupervisorBuilder;
    use crate::events::EventKind;
    use crate::subscribers::{Subscribe, WorkerStatus};

    #[derive(Clone, Copy, Debug)]
    enum Plan {
        ExitAfter(Duration, ExitStatus),
        UntilTerminated,
        IgnoreTerm,
    }

    #[derive(Default)]
    struct Record {
        launches: Vec<(String, Instant)>,
        signals: Vec<(String, Control)>,
    }

    #[derive(Clone, Default)]
    struct FakeLauncher {
        plans: Arc<HashMap<String, Plan>>,
        failures: Arc<Mutex<HashMap<String, u32>>>,
        record: Arc<Mutex<Record>>,
        next_pid: Arc<AtomicU32>,
        stop_on_exit: Arc<Mutex<Option<SupervisorHandle>>>,
    }

    impl FakeLauncher {
        fn new<const N: usize>(plans: [(&str, Plan); N]) -> Self {
            Self {
                plans: Arc::new(plans.iter().map(|(n, p)| (n.to_string(), *p)).collect()),
                ..Self::default()
            }
        }

        fn failing(self, worker: &str, times: u32) -> Self {
            self.failures.lock().unwrap().insert(worker.to_string(), times);
            self
        }

        /// Makes every natural exit send a stop request just before it is reported.
        fn stopping_on_exit(&self, handle: SupervisorHandle) {
            *self.stop_on_exit.lock().unwrap() = Some(handle);
        }

        fn launches(&self, worker: &str) -> Vec<Instant> {
            let rec = self.record.lock().unwrap();
            rec.launches
                .iter()
                .filter(|(n, _)| n == worker)
                .map(|(_, at)| *at)
                .collect()
        }

        fn signals(&self, worker: &str) -> Vec<Control> {
            let rec = self.record.lock().unwrap();
            rec.signals
                .iter()
                .filter(|(n, _)| n == worker)
                .map(|(_, c)| *c)
                .collect()
        }
    }

    impl Launcher for FakeLauncher {
        fn launch(&self, worker: &str, _: &Path) -> Result<Box<dyn WorkerProcess>, RuntimeError> {
            if let Some(left) = self.failures.lock().unwrap().get_mut(worker) {
                if *left > 0 {
                    *left -= 1;
                    return Err(RuntimeError::Spawn {
                        worker: worker.to_string(),
                        source: io::Error::other("fork failed"),
                    });
                }
            }
            let plan = self.plans.get(worker).copied().unwrap_or(Plan::UntilTerminated);
            let now = Instant::now();
            self.record
                .lock()
                .unwrap()
                .launches
                .push((worker.to_string(), now));
            let (tx, _) = watch::channel(None);
            Ok(Box::new(FakeProcess {
                pid: 100 + self.next_pid.fetch_add(1, Ordering::SeqCst),
                name: worker.to_string(),
                plan,
                started: now,
                tx,
                record: Arc::clone(&self.record),
                stopper: self.stop_on_exit.lock().unwrap().clone(),
            }))
        }
    }

    struct FakeProcess {
        pid: u32,
        name: String,
        plan: Plan,
        started: Instant,
        tx: watch::Sender<Option<ExitStatus>>,
        record: Arc<Mutex<Record>>,
        stopper: Option<SupervisorHandle>,
    }

    impl FakeProcess {
        fn note(&self, ctl: Control) {
            self.record.lock().unwrap().signals.push((self.name.clone(), ctl));
        }
    }

    #[async_trait]
    impl WorkerProcess for FakeProcess {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.note(Control::Terminate);
            if !matches!(self.plan, Plan::IgnoreTerm) {
                self.tx.send_replace(Some(ExitStatus::Signaled(15)));
            }
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            self.note(Control::Kill);
            self.tx.send_replace(Some(ExitStatus::Signaled(9)));
            Ok(())
        }

        async fn wait(&mut self) -> ExitStatus {
            let (plan, started) = (self.plan, self.started);
            let stopper = self.stopper.clone();
            let natural = async move {
                match plan {
                    Plan::ExitAfter(after, status) => {
                        tokio::time::sleep_until(started + after).await;
                        if let Some(handle) = stopper {
                            handle.stop();
                        }
                        status
                    }
                    Plan::UntilTerminated | Plan::IgnoreTerm => std::future::pending().await,
                }
            };
            let mut rx = self.tx.subscribe();
            let signaled = async move {
                let status = match rx.wait_for(Option::is_some).await {
                    Ok(s) => *s,
                    Err(_) => None,
                };
                match status {
                    Some(status) => status,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                status = natural => status,
                status = signaled => status,
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    const TWO_WORKERS: &str = "
w1: {type: custom, target: idle}
w2: {type: custom, target: idle}
workers: [w1, w2]
";

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn supervisor(text: &str, launcher: &FakeLauncher) -> Supervisor {
        let topology = Topology::parse("/nonexistent/topovisor-test.yml", text).unwrap();
        SupervisorBuilder::new(topology)
            .with_launcher(launcher.clone())
            .with_os_signals(false)
            .build()
            .unwrap()
    }

    #[test]
    fn misplaced_flags_workers_outside_queue_and_table() {
        let topology = Topology::parse("t.yml", TWO_WORKERS).unwrap();
        let workers = topology.workers();
        let now = Instant::now();
        let mut generation = Generation::seed(0, &topology, now);
        assert!(generation.misplaced(workers).is_empty());

        // Running while still queued.
        let (tx, _rx) = mpsc::unbounded_channel();
        generation.children.insert(7, Running::new("w1".into(), now, tx));
        assert_eq!(generation.misplaced(workers), ["w1"]);

        // Neither running nor queued.
        generation.queue.drain_ready(now);
        assert_eq!(generation.misplaced(workers), ["w2"]);

        // Given up on, yet still running.
        generation.exhausted.insert("w2".into());
        assert!(generation.misplaced(workers).is_empty());
        generation.exhausted.insert("w1".into());
        assert_eq!(generation.misplaced(workers), ["w1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn seeds_every_worker_and_requeues_after_exit() {
        let launcher = FakeLauncher::new([("w1", Plan::ExitAfter(ms(100), ExitStatus::Exited(0)))]);
        let sup = supervisor(TWO_WORKERS, &launcher);
        let handle = sup.handle();
        let status = sup.status();
        let flag = sup.shutdown_flag();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(ms(3500)).await;
        // Short runs back off 1s, then 2s.
        let w1 = launcher.launches("w1");
        assert_eq!(w1.len(), 3);
        assert!(w1[1] - w1[0] >= ms(1100) && w1[1] - w1[0] < ms(1150));
        assert!(w1[2] - w1[1] >= ms(2100) && w1[2] - w1[1] < ms(2150));
        assert_eq!(launcher.launches("w2").len(), 1);
        assert!(matches!(status.status("w2").await, Some(WorkerStatus::Running { .. })));
        assert_eq!(status.status("w1").await, Some(WorkerStatus::Pending));

        assert!(handle.stop());
        run.await.unwrap().unwrap();
        assert!(flag.is_set());
        assert_eq!(launcher.signals("w2"), [Control::Terminate]);
        assert!(launcher.signals("w1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_spawned_after_stop() {
        let launcher = FakeLauncher::new([("w1", Plan::ExitAfter(ms(10), ExitStatus::Exited(1)))]);
        let sup = supervisor(TWO_WORKERS, &launcher);
        let handle = sup.handle();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(ms(500)).await;
        // w1 is waiting out its backoff when the stop arrives.
        handle.stop();
        run.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(launcher.launches("w1").len(), 1);
        assert_eq!(launcher.launches("w2").len(), 1);
        assert!(!handle.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wins_over_a_simultaneous_exit() {
        let launcher = FakeLauncher::new([("w1", Plan::ExitAfter(ms(200), ExitStatus::Exited(0)))]);
        let sup = supervisor(TWO_WORKERS, &launcher);
        launcher.stopping_on_exit(sup.handle());
        let run = tokio::spawn(sup.run());

        run.await.unwrap().unwrap();
        assert_eq!(launcher.launches("w1").len(), 1);
        assert_eq!(launcher.launches("w2").len(), 1);
        assert_eq!(launcher.signals("w2"), [Control::Terminate]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_reboot_drain_skips_the_reload() {
        let text = format!("supervisor: {{grace: 2s}}\n{TWO_WORKERS}");
        let launcher = FakeLauncher::new([("w1", Plan::IgnoreTerm)]);
        let recorder = Arc::new(Recorder::default());
        let topology = Topology::parse("/nonexistent/topovisor-test.yml", &text).unwrap();
        let sup = SupervisorBuilder::new(topology)
            .with_launcher(launcher.clone())
            .with_subscribers(vec![recorder.clone()])
            .with_os_signals(false)
            .build()
            .unwrap();
        let handle = sup.handle();
        let flag = sup.shutdown_flag();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(ms(100)).await;
        handle.reboot();
        tokio::time::sleep(ms(500)).await;
        let asked = Instant::now();
        handle.stop();
        let err = run.await.unwrap().unwrap_err();

        assert!(asked.elapsed() < Duration::from_secs(3));
        assert!(matches!(err, RuntimeError::GraceExceeded { ref stuck, .. } if stuck == &["w1"]));
        assert!(flag.is_set());
        assert_eq!(launcher.launches("w1").len(), 1);
        assert_eq!(launcher.launches("w2").len(), 1);
        assert_eq!(launcher.signals("w1"), [Control::Terminate, Control::Kill]);
        let kinds = recorder.0.lock().unwrap().clone();
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert!(!kinds.contains(&EventKind::TopologyRejected));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_exceeded_kills_stuck_worker() {
        let text = format!("supervisor: {{grace: 2s}}\n{TWO_WORKERS}");
        let launcher = FakeLauncher::new([("w1", Plan::IgnoreTerm)]);
        let sup = supervisor(&text, &launcher);
        let handle = sup.handle();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(ms(100)).await;
        let asked = Instant::now();
        handle.stop();
        let err = run.await.unwrap().unwrap_err();

        let waited = asked.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
        match err {
            RuntimeError::GraceExceeded { grace, stuck } => {
                assert_eq!(grace, Duration::from_secs(2));
                assert_eq!(stuck, ["w1"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(launcher.signals("w1"), [Control::Terminate, Control::Kill]);
        assert_eq!(launcher.signals("w2"), [Control::Terminate]);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_limit_exhausts_worker() {
        let text = "
supervisor:
  max_restarts: 2
  restart_window: 60s
  backoff: {first: 10ms}
w1: {type: custom, target: idle}
workers: [w1]
";
        let launcher = FakeLauncher::new([("w1", Plan::ExitAfter(Duration::ZERO, ExitStatus::Exited(1)))]);
        let recorder = Arc::new(Recorder::default());
        let topology = Topology::parse("t.yml", text).unwrap();
        let sup = SupervisorBuilder::new(topology)
            .with_launcher(launcher.clone())
            .with_subscribers(vec![recorder.clone()])
            .with_os_signals(false)
            .build()
            .unwrap();
        let handle = sup.handle();
        let status = sup.status();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(launcher.launches("w1").len(), 3);
        assert_eq!(status.status("w1").await, Some(WorkerStatus::Exhausted));

        handle.stop();
        run.await.unwrap().unwrap();
        let kinds = recorder.0.lock().unwrap().clone();
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::WorkerExhausted).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn on_failure_leaves_clean_exits_alone() {
        let text = format!("supervisor: {{restart: on_failure}}\n{TWO_WORKERS}");
        let launcher = FakeLauncher::new([
            ("w1", Plan::ExitAfter(ms(10), ExitStatus::Exited(0))),
            ("w2", Plan::ExitAfter(ms(10), ExitStatus::Exited(3))),
        ]);
        let sup = supervisor(&text, &launcher);
        let handle = sup.handle();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(launcher.launches("w1").len(), 1);
        assert!(launcher.launches("w2").len() >= 2);

        handle.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_run_is_respawned_without_delay() {
        let launcher = FakeLauncher::new([("w1", Plan::ExitAfter(Duration::from_secs(20), ExitStatus::Exited(0)))]);
        let sup = supervisor(TWO_WORKERS, &launcher);
        let handle = sup.handle();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(21)).await;
        let w1 = launcher.launches("w1");
        assert_eq!(w1.len(), 2);
        assert!(w1[1] - w1[0] < Duration::from_secs(20) + ms(50));

        handle.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_is_retried_with_backoff() {
        let launcher = FakeLauncher::default().failing("w1", 2);
        let sup = supervisor(TWO_WORKERS, &launcher);
        let handle = sup.handle();
        let started = Instant::now();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(4)).await;
        // Failed at 0s and 1s, succeeded at 3s.
        let w1 = launcher.launches("w1");
        assert_eq!(w1.len(), 1);
        assert!(w1[0] - started >= Duration::from_secs(3));

        handle.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_reloads_topology_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.yml");
        std::fs::write(&path, "w1: {type: custom, target: idle}\nworkers: [w1]\n").unwrap();

        let launcher = FakeLauncher::default();
        let sup = SupervisorBuilder::load(&path)
            .await
            .unwrap()
            .with_launcher(launcher.clone())
            .with_os_signals(false)
            .build()
            .unwrap();
        let handle = sup.handle();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        std::fs::write(&path, TWO_WORKERS).unwrap();
        handle.reboot();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(launcher.launches("w1").len(), 2);
        assert_eq!(launcher.launches("w2").len(), 1);
        assert_eq!(launcher.signals("w1"), [Control::Terminate]);

        handle.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reboot_keeps_previous_topology_when_reload_fails() {
        let launcher = FakeLauncher::default();
        let recorder = Arc::new(Recorder::default());
        let topology = Topology::parse("/nonexistent/topovisor-test.yml", TWO_WORKERS).unwrap();
        let sup = SupervisorBuilder::new(topology)
            .with_launcher(launcher.clone())
            .with_subscribers(vec![recorder.clone()])
            .with_os_signals(false)
            .build()
            .unwrap();
        let handle = sup.handle();
        let run = tokio::spawn(sup.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.reboot();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(launcher.launches("w1").len(), 2);
        assert_eq!(launcher.launches("w2").len(), 2);

        handle.stop();
        run.await.unwrap().unwrap();
        let kinds = recorder.0.lock().unwrap().clone();
        assert!(kinds.contains(&EventKind::TopologyRejected));
        assert!(kinds.contains(&EventKind::RebootRequested));
        assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithin));
    }
}
