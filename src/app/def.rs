//! Static per-app configuration consumed by the restart automaton.

use serde::{Deserialize, Serialize};

use crate::app::AppId;

/// Read-only definition of one app.
///
/// Only the fields this crate needs are modelled; the full definition
/// (executable, arguments, plan membership, ...) belongs to the config loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDef {
    /// Compound identity.
    pub id: AppId,
    /// Inline restart-policy block (see [`RestartPolicy`](crate::RestartPolicy)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarter: Option<String>,
    /// Kill the whole process tree on termination (used by the launcher).
    #[serde(default)]
    pub kill_tree: bool,
}

impl AppDef {
    /// Definition with no restart block and `kill_tree = false`.
    pub fn new(id: AppId) -> Self {
        Self {
            id,
            restarter: None,
            kill_tree: false,
        }
    }

    /// Attaches an inline restart-policy block.
    pub fn with_restarter(mut self, block: impl Into<String>) -> Self {
        self.restarter = Some(block.into());
        self
    }

    pub fn with_kill_tree(mut self, kill_tree: bool) -> Self {
        self.kill_tree = kill_tree;
        self
    }
}
