//! # topovisor
//!
//! **Topovisor** runs a declared *topology* of long-lived worker processes on one
//! host and keeps them alive.
//!
//! A topology is a YAML file naming the workers to run. Each worker has a
//! **strategy** (`map` or `custom`) and a **target** (a named function registered
//! in the binary). The supervisor starts one OS process per worker, restarts it
//! when it exits, and on stop or reboot drains every process with SIGTERM, a grace
//! period and finally SIGKILL.
//!
//! ## Architecture
//! ```text
//!     topology.yml ──► Topology::load ──► validate(Strategies, Targets)
//!                                                │
//!                                                ▼
//!   OS signals ──► Command ──► Supervisor::run (single loop)
//!   handle     ──┘              ├─ RestartQueue ──► Launcher::launch ──► worker process
//!                               ├─ ChildTable   ◄── watcher task ◄──── exit status
//!                               └─ Bus ──► SubscriberSet ──► LogWriter / StatusTracker / custom
//!
//!   worker process:
//!     topovisor worker --config topology.yml --name NAME
//!       └─ worker::boot ──► Strategies::dispatch
//!            ├─ map:    loop { checkout ► MapTarget::call ► release | nack } until ShutdownFlag
//!            └─ custom: CustomTarget::call(ShutdownFlag, kwargs) once
//! ```
//!
//! ## Lifecycle
//! ```text
//! start:  every worker ─► RestartQueue (no delay)
//! loop {
//!   ├─ ready entries ─► spawn ─► ChildTable
//!   ├─ exit (confirmed by reap) ─► RestartPolicy + RestartLimit + BackoffPolicy
//!   │     ├─ respawn ─► RestartQueue(delay)
//!   │     └─ give up ─► WorkerExhausted
//!   ├─ stop   ─► ShutdownFlag ─► drain ─► return
//!   └─ reboot ─► drain ─► reload topology ─► new generation
//! }
//! drain: SIGTERM all ─► wait grace ─► SIGKILL survivors ─► reap
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Topology**      | YAML worker declarations with anchors and merge keys.        | [`Topology`], [`WorkerDefinition`]         |
//! | **Strategies**    | How a worker drives its target.                              | [`Strategy`], [`Strategies`]               |
//! | **Targets**       | Named functions workers call.                                | [`Targets`], [`MapFn`], [`CustomFn`]       |
//! | **Queues**        | Leased work items for `map` workers.                         | [`Source`], [`Spool`], [`MemoryQueue`]     |
//! | **Supervision**   | Process lifecycle, restart queue, stop and reboot.           | [`Supervisor`], [`SupervisorBuilder`]      |
//! | **Policies**      | Restart, restart limit and backoff.                          | [`RestartPolicy`], [`BackoffPolicy`]       |
//! | **Subscriber API**| Hook into lifecycle events.                                  | [`Subscribe`], [`LogWriter`]               |
//! | **Errors**        | Typed errors per layer.                                      | [`TopologyError`], [`RuntimeError`]        |
//!
//! ## Example
//! ```rust,no_run
//! use topovisor::{
//!     CustomFn, Item, Kwargs, MapFn, ShutdownFlag, Strategies, Target, TargetError, Targets, targets,
//! };
//!
//! fn main() -> std::process::ExitCode {
//!     let registry = targets::register_builtin(Targets::builder())
//!         .register(
//!             "shout",
//!             Target::map(MapFn::new(|item: Item, _kwargs: Kwargs| async move {
//!                 println!("{}", item.text().unwrap_or_default().to_uppercase());
//!                 Ok::<_, TargetError>(())
//!             })),
//!         )
//!         .register(
//!             "wait",
//!             Target::custom(CustomFn::new(|flag: ShutdownFlag, _kwargs: Kwargs| {
//!                 async move {
//!                     flag.wait().await;
//!                     Ok::<_, TargetError>(())
//!                 }
//!             })),
//!         )
//!         .build();
//!
//!     topovisor::cli::run(Strategies::builtin(), registry)
//! }
//! ```

#[cfg(not(unix))]
compile_error!("topovisor manages POSIX processes and only builds on unix targets");

pub mod cli;
mod core;
mod durations;
mod error;
mod events;
mod flag;
mod policies;
pub mod queue;
mod strategy;
mod subscribers;
pub mod targets;
mod topology;
pub mod worker;

// ---- Public re-exports ----

pub use core::{
    ExitStatus, Launcher, ProcessLauncher, Supervisor, SupervisorBuilder, SupervisorConfig,
    SupervisorHandle, WorkerProcess, wait_for_stop_signal,
};
pub use error::{
    ConfigurationError, QueueError, RuntimeError, TargetError, TopologyError, WorkerError,
};
pub use events::{Bus, Event, EventKind};
pub use flag::ShutdownFlag;
pub use policies::{BackoffPolicy, JitterPolicy, RestartLimit, RestartPolicy};
pub use queue::{Item, Lease, MemoryQueue, QueueConfig, Source, SourceRef, Spool};
pub use strategy::{CustomStrategy, MapStrategy, Strategies, StrategiesBuilder, Strategy};
pub use subscribers::{LogWriter, StatusTracker, Subscribe, SubscriberSet, WorkerStatus};
pub use targets::{
    CustomFn, CustomTarget, MapFn, MapTarget, Target, TargetKind, Targets, TargetsBuilder,
};
pub use topology::{Kwargs, Topology, WorkerDefinition};
