//! # Controller/worker message contract.
//!
//! ```text
//!   master (controller script)                agents (worker host)
//!   ──────────────────────────                ────────────────────
//!   StartTaskWorker{controller,task,agent} ──► spawn worker script
//!                                         ◄── TaskWorkerReport{controller,task,agent,report}
//!   DTaskController::kill()
//!   KillTaskWorkers{controller,task}      ──► drop every worker for `controller`
//!                                             (unknown controller ⇒ no-op)
//! ```
//!
//! ## Rules
//! - Delivery is at-most-once; nothing is acknowledged or retried.
//! - The protocol has no timeout; controller scripts detect silent workers.
//! - `KillTaskWorkers` is sent exactly once per kill, to every agent.

use serde::{Deserialize, Serialize};

use super::token::{ControllerToken, TaskInstanceId};

/// Progress of one worker's share of a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum WorkerOutcome {
    /// Still working; `text` carries progress.
    Running,
    /// Finished its part.
    Succeeded,
    /// Gave up.
    Failed {
        /// Why the worker failed.
        reason: String,
    },
}

/// Status a worker sends back to its controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub outcome: WorkerOutcome,
    /// Free-form status text.
    #[serde(default)]
    pub text: String,
}

impl WorkerReport {
    pub fn running(text: impl Into<String>) -> Self {
        Self {
            outcome: WorkerOutcome::Running,
            text: text.into(),
        }
    }

    pub fn succeeded(text: impl Into<String>) -> Self {
        Self {
            outcome: WorkerOutcome::Succeeded,
            text: text.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            text: reason.clone(),
            outcome: WorkerOutcome::Failed { reason },
        }
    }

    /// True once the worker will send nothing more.
    pub fn is_final(&self) -> bool {
        !matches!(self.outcome, WorkerOutcome::Running)
    }
}

/// Control message exchanged between the master and agents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Ask agents to start the worker part of a task.
    #[serde(rename_all = "camelCase")]
    StartTaskWorker {
        controller: ControllerToken,
        task: TaskInstanceId,
        /// Target agent; `None` addresses every agent.
        agent: Option<String>,
        /// Worker script name.
        script: String,
        args: Option<String>,
    },

    /// Worker status, addressed to the controller owning `controller`.
    #[serde(rename_all = "camelCase")]
    TaskWorkerReport {
        controller: ControllerToken,
        task: TaskInstanceId,
        agent: String,
        report: WorkerReport,
    },

    /// Discard all worker-side state of the task owned by `controller`.
    ///
    /// `task` is the instance that was running when the kill was issued;
    /// agents refuse later starts for it.
    #[serde(rename_all = "camelCase")]
    KillTaskWorkers {
        controller: ControllerToken,
        task: TaskInstanceId,
    },
}

impl Message {
    /// Controller token the message is scoped to.
    pub fn controller(&self) -> ControllerToken {
        match self {
            Message::StartTaskWorker { controller, .. }
            | Message::TaskWorkerReport { controller, .. }
            | Message::KillTaskWorkers { controller, .. } => *controller,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Message::StartTaskWorker { .. } => "start_task_worker",
            Message::TaskWorkerReport { .. } => "task_worker_report",
            Message::KillTaskWorkers { .. } => "kill_task_workers",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_message_wire_shape() {
        let controller = ControllerToken::generate();
        let task = TaskInstanceId::generate();
        let msg = Message::KillTaskWorkers { controller, task };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "killTaskWorkers");
        assert_eq!(json["controller"], controller.to_string());
        assert_eq!(json["task"], task.to_string());
        assert_eq!(msg.controller(), controller);
    }

    #[test]
    fn report_finality() {
        assert!(!WorkerReport::running("50%").is_final());
        assert!(WorkerReport::succeeded("ok").is_final());
        let failed = WorkerReport::failed("disk full");
        assert!(failed.is_final());
        assert_eq!(failed.text, "disk full");
    }
}
