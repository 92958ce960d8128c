//! # AsyncScript: synchronous poll façade over an async routine.
//!
//! `init` spawns the routine on the runtime captured at construction, `tick`
//! checks whether it has finished (without blocking), `dispose` cancels the
//! context and aborts the task.
//!
//! ## Outcome mapping
//! ```text
//! routine Ok(())      ─► shall_be_removed = true, tick Ok
//! routine Err(e)      ─► shall_be_removed = true, tick Err(e)
//! routine panicked    ─► shall_be_removed = true, tick Err(Panicked)
//! ```

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{ScriptError, panic_message};
use crate::tasks::{RoutineRef, Script, ScriptContext};

/// Script hosting one [`Routine`](crate::Routine) run.
pub struct AsyncScript {
    routine: RoutineRef,
    ctx: ScriptContext,
    runtime: Handle,
    join: Option<JoinHandle<Result<(), ScriptError>>>,
    finished: bool,
}

impl AsyncScript {
    /// Captures the current tokio runtime; fails outside of one.
    pub fn new(routine: RoutineRef, ctx: ScriptContext) -> Result<Self, ScriptError> {
        let runtime = Handle::try_current().map_err(|_| ScriptError::NoRuntime)?;
        Ok(Self {
            routine,
            ctx,
            runtime,
            join: None,
            finished: false,
        })
    }

    pub fn context(&self) -> &ScriptContext {
        &self.ctx
    }

    fn stop(&mut self) {
        self.ctx.cancel();
        if let Some(join) = self.join.take() {
            join.abort();
        }
        self.finished = true;
    }
}

impl Script for AsyncScript {
    fn init(&mut self) -> Result<(), ScriptError> {
        if self.join.is_some() || self.finished {
            return Ok(());
        }
        let routine = RoutineRef::clone(&self.routine);
        let ctx = self.ctx.clone();
        tracing::debug!(routine = routine.name(), task = %ctx.task(), "routine spawned");
        self.join = Some(self.runtime.spawn(async move { routine.run(ctx).await }));
        Ok(())
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        let Some(join) = self.join.as_mut() else {
            return Ok(());
        };
        if !join.is_finished() {
            return Ok(());
        }
        // Unconstrained so an exhausted coop budget cannot hide the outcome.
        let Some(outcome) = tokio::task::unconstrained(join).now_or_never() else {
            return Ok(());
        };
        self.join = None;
        self.finished = true;

        match outcome {
            Ok(res) => res,
            Err(e) if e.is_panic() => Err(ScriptError::Panicked {
                info: panic_message(&*e.into_panic()),
            }),
            Err(_) => Err(ScriptError::Canceled),
        }
    }

    fn dispose(&mut self) {
        self.stop();
    }

    fn shall_be_removed(&self) -> bool {
        self.finished
    }

    fn status_text(&self) -> String {
        self.ctx.status()
    }
}

impl Drop for AsyncScript {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ControllerToken, MessageBus, TaskInstanceId};
    use crate::tasks::{RoutineFn, ScriptRequest, ScriptRole};
    use std::time::Duration;

    fn ctx() -> ScriptContext {
        let req = ScriptRequest::new(
            ControllerToken::generate(),
            TaskInstanceId::generate(),
            ScriptRole::Controller,
            "test",
        );
        ScriptContext::new(&req, MessageBus::new(8))
    }

    fn explode() -> Result<(), ScriptError> {
        panic!("kaboom")
    }

    async fn settle(script: &mut AsyncScript) -> Result<(), ScriptError> {
        for _ in 0..100 {
            tokio::task::yield_now().await;
            let res = script.tick();
            if script.shall_be_removed() {
                return res;
            }
        }
        panic!("routine never finished");
    }

    #[tokio::test]
    async fn completed_routine_is_removed() {
        let routine = RoutineFn::arc("ok", |ctx: ScriptContext| async move {
            ctx.set_status("done");
            Ok::<_, ScriptError>(())
        });
        let mut script = AsyncScript::new(routine, ctx()).unwrap();
        assert!(!script.shall_be_removed());
        script.init().unwrap();

        assert_eq!(settle(&mut script).await, Ok(()));
        assert_eq!(script.status_text(), "done");
    }

    #[tokio::test]
    async fn routine_error_surfaces_from_tick() {
        let routine = RoutineFn::arc("bad", |_ctx: ScriptContext| async move {
            Err::<(), _>(ScriptError::fail("boom"))
        });
        let mut script = AsyncScript::new(routine, ctx()).unwrap();
        script.init().unwrap();
        assert_eq!(settle(&mut script).await, Err(ScriptError::fail("boom")));
    }

    #[tokio::test]
    async fn routine_panic_becomes_error() {
        let routine = RoutineFn::arc("panicky", |_ctx: ScriptContext| async move { explode() });
        let mut script = AsyncScript::new(routine, ctx()).unwrap();
        script.init().unwrap();
        assert_eq!(
            settle(&mut script).await,
            Err(ScriptError::Panicked {
                info: "kaboom".into()
            })
        );
    }

    #[tokio::test]
    async fn dispose_cancels_the_routine() {
        let routine = RoutineFn::arc("sleepy", |ctx: ScriptContext| async move {
            ctx.cancelled().await;
            Ok::<_, ScriptError>(())
        });
        let mut script = AsyncScript::new(routine, ctx()).unwrap();
        let observer = script.context().clone();
        script.init().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        script.dispose();
        assert!(observer.is_cancelled());
        assert!(script.shall_be_removed());
        assert_eq!(script.tick(), Ok(()));
    }

    #[tokio::test]
    async fn every_finished_failure_is_reported_in_one_pass() {
        let routine: RoutineRef = RoutineFn::arc("bad", |_ctx: ScriptContext| async move {
            Err::<(), _>(ScriptError::fail("boom"))
        });
        let mut scripts: Vec<AsyncScript> = (0..300)
            .map(|_| AsyncScript::new(RoutineRef::clone(&routine), ctx()).unwrap())
            .collect();
        for script in &mut scripts {
            script.init().unwrap();
        }
        while !scripts
            .iter()
            .all(|s| s.join.as_ref().is_some_and(JoinHandle::is_finished))
        {
            tokio::task::yield_now().await;
        }

        let mut errors = 0;
        for script in &mut scripts {
            if script.tick().is_err() {
                errors += 1;
            }
            assert!(script.shall_be_removed());
        }
        assert_eq!(errors, 300);
    }

    #[test]
    fn needs_a_runtime() {
        let routine = RoutineFn::arc("ok", |_ctx: ScriptContext| async move { Ok::<_, ScriptError>(()) });
        let err = AsyncScript::new(routine, ctx()).err();
        assert_eq!(err, Some(ScriptError::NoRuntime));
    }
}
