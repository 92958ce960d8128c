//! # Script: poll-based unit of controller or worker logic.
//!
//! The task controller and the worker host drive scripts from the scheduling
//! loop, so every method must return promptly. Long-running work belongs in an
//! [`AsyncScript`](crate::AsyncScript), which keeps it on the tokio runtime and
//! exposes only this synchronous façade.
//!
//! ## Lifecycle
//! ```text
//! factory.create() ─► init() ─► tick() … tick() ─► shall_be_removed() ─► dispose()
//!                                     │
//!                                     └─ Err(ScriptError) ─► owner tears it down
//! ```

use crate::error::ScriptError;

/// Controller- or worker-side script.
pub trait Script: Send + 'static {
    /// One-time setup, called right after creation.
    fn init(&mut self) -> Result<(), ScriptError> {
        Ok(())
    }

    /// Advances the script by one cycle; must not block.
    fn tick(&mut self) -> Result<(), ScriptError>;

    /// Releases everything the script holds. Called at most once by the owner.
    fn dispose(&mut self) {}

    /// The script is done; the owner disposes and drops it on the next tick.
    fn shall_be_removed(&self) -> bool;

    /// Human-readable progress.
    fn status_text(&self) -> String;
}
