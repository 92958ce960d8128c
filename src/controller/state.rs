//! Observable state of a task controller.

use serde::{Deserialize, Serialize};

/// Status text shown while no script is held.
pub const NO_SCRIPT_STATUS: &str = "None";

/// State of one [`DTaskController`](crate::DTaskController), refreshed every tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DTaskState {
    pub status_text: String,
}

impl Default for DTaskState {
    fn default() -> Self {
        Self {
            status_text: NO_SCRIPT_STATUS.to_string(),
        }
    }
}
