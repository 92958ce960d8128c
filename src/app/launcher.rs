//! Process-launch capability consumed by restarters.

use crate::app::AppId;
use crate::error::LaunchError;

/// Launches app processes on behalf of the restart automaton.
///
/// Implemented by the agent's local operations (process spawning lives outside
/// this crate).
pub trait AppLauncher: Send + Sync + 'static {
    /// Launches the app identified by `id`.
    ///
    /// When `reset_restart_counter` is `false` the implementation must leave
    /// `AppState::restarts_remaining` untouched; restarters always pass `false`
    /// so the remaining budget carries over to the next episode.
    fn launch_app(&self, id: &AppId, reset_restart_counter: bool) -> Result<(), LaunchError>;
}
