//! # Target contracts.
//!
//! A target is the domain logic a worker runs. It comes in two kinds, matching the
//! two built-in strategies:
//!
//! - [`MapTarget`] is called once per queue item by the `map` strategy.
//! - [`CustomTarget`] is called once per process by the `custom` strategy and owns
//!   the process until it returns. It receives the process's [`ShutdownFlag`] as
//!   `event` and should return soon after it is set.
//!
//! Errors are never caught: a target that returns `Err` ends its worker process.
//!
//! ## Example
//! ```rust
//! use topovisor::{CustomFn, Kwargs, ShutdownFlag, Target, TargetError};
//!
//! let t = Target::custom(CustomFn::new(|event: ShutdownFlag, _kwargs: Kwargs| async move {
//!     event.wait().await;
//!     Ok::<_, TargetError>(())
//! }));
//! assert_eq!(t.kind().to_string(), "custom");
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TargetError;
use crate::flag::ShutdownFlag;
use crate::queue::Item;
use crate::topology::Kwargs;

/// Per-item domain logic driven by the `map` strategy.
#[async_trait]
pub trait MapTarget: Send + Sync + 'static {
    /// Processes one item.
    async fn call(&self, item: &Item, kwargs: &Kwargs) -> Result<(), TargetError>;
}

/// Whole-process domain logic driven by the `custom` strategy.
#[async_trait]
pub trait CustomTarget: Send + Sync + 'static {
    /// Runs until done or until `event` is set.
    async fn call(&self, event: ShutdownFlag, kwargs: &Kwargs) -> Result<(), TargetError>;
}

/// Closure-backed [`MapTarget`]; the closure builds a fresh future per item.
pub struct MapFn<F> {
    f: F,
}

impl<F> MapFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> MapTarget for MapFn<F>
where
    F: Fn(Item, Kwargs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TargetError>> + Send + 'static,
{
    async fn call(&self, item: &Item, kwargs: &Kwargs) -> Result<(), TargetError> {
        (self.f)(item.clone(), kwargs.clone()).await
    }
}

/// Closure-backed [`CustomTarget`].
pub struct CustomFn<F> {
    f: F,
}

impl<F> CustomFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> CustomTarget for CustomFn<F>
where
    F: Fn(ShutdownFlag, Kwargs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TargetError>> + Send + 'static,
{
    async fn call(&self, event: ShutdownFlag, kwargs: &Kwargs) -> Result<(), TargetError> {
        (self.f)(event, kwargs.clone()).await
    }
}

/// Which strategy can drive a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Called per item.
    Map,
    /// Called once per process.
    Custom,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Map => "map",
            TargetKind::Custom => "custom",
        })
    }
}

/// A registered target.
#[derive(Clone)]
pub enum Target {
    /// Driven by the `map` strategy.
    Map(Arc<dyn MapTarget>),
    /// Driven by the `custom` strategy.
    Custom(Arc<dyn CustomTarget>),
}

impl Target {
    /// Wraps a [`MapTarget`].
    pub fn map(t: impl MapTarget) -> Self {
        Target::Map(Arc::new(t))
    }

    /// Wraps a [`CustomTarget`].
    pub fn custom(t: impl CustomTarget) -> Self {
        Target::Custom(Arc::new(t))
    }

    /// Kind of this target.
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Map(_) => TargetKind::Map,
            Target::Custom(_) => TargetKind::Custom,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&self.kind()).finish()
    }
}
