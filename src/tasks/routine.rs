//! # Routine abstraction and function-backed implementation.
//!
//! A [`Routine`] is the async body of a script: it receives a
//! [`ScriptContext`] and runs until it completes, fails, or the context is
//! cancelled. [`RoutineFn`] wraps a closure that creates a fresh future per run.
//!
//! ## Example
//! ```rust
//! use fleetvisor::{RoutineFn, RoutineRef, ScriptContext, ScriptError};
//!
//! let r: RoutineRef = RoutineFn::arc("hello", |ctx: ScriptContext| async move {
//!     ctx.set_status("hello");
//!     Ok::<_, ScriptError>(())
//! });
//! assert_eq!(r.name(), "hello");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ScriptError;
use crate::tasks::ScriptContext;

/// Shared handle to a routine.
pub type RoutineRef = Arc<dyn Routine>;

/// # Asynchronous, cancellable script body.
///
/// Implementations should watch [`ScriptContext::cancelled`] around long
/// awaits; the hosting script also aborts the future on dispose.
#[async_trait]
pub trait Routine: Send + Sync + 'static {
    /// Stable, human-readable name.
    fn name(&self) -> &str;

    /// Runs the routine to completion.
    async fn run(&self, ctx: ScriptContext) -> Result<(), ScriptError>;
}

/// Function-backed routine.
#[derive(Debug)]
pub struct RoutineFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> RoutineFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the routine as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Routine for RoutineFn<F>
where
    F: Fn(ScriptContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ScriptError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ScriptContext) -> Result<(), ScriptError> {
        (self.f)(ctx).await
    }
}
