//! # ScriptContext: what a running routine can see and do.
//!
//! One context is built per script instance from its [`ScriptRequest`]. It is
//! cheap to clone; all clones share the status text, the cancellation token
//! and the report receiver.
//!
//! The report receiver is subscribed when the context is built, so a worker
//! answering before the routine first awaits [`ScriptContext::next_report`]
//! is not lost.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::protocol::{ControllerToken, Message, MessageBus, TaskInstanceId, WorkerReport};
use crate::tasks::{ScriptRequest, ScriptRole};

/// A worker report addressed to this context's controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentReport {
    pub agent: String,
    pub task: TaskInstanceId,
    pub report: WorkerReport,
}

/// Execution context handed to a [`Routine`](crate::Routine).
#[derive(Clone)]
pub struct ScriptContext {
    controller: ControllerToken,
    task: TaskInstanceId,
    role: ScriptRole,
    agent: Option<Arc<str>>,
    args: Option<Arc<str>>,
    vars: Arc<HashMap<String, String>>,
    status: Arc<Mutex<String>>,
    wire: MessageBus,
    reports: Arc<tokio::sync::Mutex<broadcast::Receiver<Message>>>,
    cancel: CancellationToken,
}

impl ScriptContext {
    pub fn new(req: &ScriptRequest, wire: MessageBus) -> Self {
        let reports = wire.subscribe();
        Self {
            controller: req.controller,
            task: req.task,
            role: req.role,
            agent: req.agent.as_deref().map(Arc::from),
            args: req.args.as_deref().map(Arc::from),
            vars: Arc::new(req.vars.clone()),
            status: Arc::new(Mutex::new(String::new())),
            wire,
            reports: Arc::new(tokio::sync::Mutex::new(reports)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn controller(&self) -> ControllerToken {
        self.controller
    }

    pub fn task(&self) -> TaskInstanceId {
        self.task
    }

    pub fn role(&self) -> ScriptRole {
        self.role
    }

    /// Agent hosting this script; `None` on the master.
    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    /// Raw argument string given at start.
    pub fn args(&self) -> Option<&str> {
        self.args.as_deref()
    }

    /// Resolved local variable.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn set_status(&self, text: impl Into<String>) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }

    pub fn status(&self) -> String {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends a raw protocol message. Dropped once the context is cancelled.
    pub fn send(&self, msg: Message) {
        if self.cancel.is_cancelled() {
            tracing::debug!(task = %self.task, kind = msg.as_label(), "send after cancel dropped");
            return;
        }
        self.wire.send(msg);
    }

    /// Asks `agent` (or every agent when `None`) to start a worker script for this task.
    pub fn start_worker(&self, agent: Option<&str>, script: &str, args: Option<&str>) {
        self.send(Message::StartTaskWorker {
            controller: self.controller,
            task: self.task,
            agent: agent.map(str::to_string),
            script: script.to_string(),
            args: args.map(str::to_string),
        });
    }

    /// Reports worker progress back to the controller.
    pub fn report(&self, report: WorkerReport) {
        self.send(Message::TaskWorkerReport {
            controller: self.controller,
            task: self.task,
            agent: self.agent().unwrap_or_default().to_string(),
            report,
        });
    }

    /// Waits for the next worker report addressed to this controller.
    ///
    /// Returns `None` once the context is cancelled or the wire is closed.
    /// There is no timeout; callers race it against their own deadline.
    pub async fn next_report(&self) -> Option<AgentReport> {
        let mut rx = self.reports.lock().await;
        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                msg = rx.recv() => msg,
            };
            match msg {
                Ok(Message::TaskWorkerReport {
                    controller,
                    task,
                    agent,
                    report,
                }) if controller == self.controller => {
                    return Some(AgentReport {
                        agent,
                        task,
                        report,
                    });
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(controller = %self.controller, skipped, "report receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the hosting script is disposed.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}
