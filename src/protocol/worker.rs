//! # WorkerHost: the agent side of the task protocol.
//!
//! One host per agent. It listens on the wire, starts worker scripts for
//! `StartTaskWorker` messages addressed to its agent (or to every agent),
//! ticks them, and discards them on `KillTaskWorkers`.
//!
//! ## Rules
//! - Worker state is keyed by the controller token; one token may own several
//!   workers on the same agent.
//! - A kill for an unknown token is a no-op, so duplicate and late kills are safe.
//! - The killed `(controller, task)` pair is remembered (bounded), and a start
//!   for it that arrives after the kill is ignored.
//! - A worker that fails to start, or whose tick fails, is disposed and a
//!   `Failed` report is sent to its controller. The host is never torn down by
//!   a worker error.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::core::Master;
use crate::error::ScriptError;
use crate::events::{Event, EventKind};
use crate::protocol::{ControllerToken, Message, TaskInstanceId, WorkerReport};
use crate::tasks::{Script, ScriptRequest, ScriptRole};

/// How many killed task instances a host remembers.
const KILLED_MEMORY: usize = 1024;

struct Worker {
    task: TaskInstanceId,
    name: String,
    script: Box<dyn Script>,
}

/// Hosts worker scripts on one agent.
pub struct WorkerHost {
    agent: String,
    master: Master,
    inbox: broadcast::Receiver<Message>,
    workers: HashMap<ControllerToken, Vec<Worker>>,
    killed: HashSet<(ControllerToken, TaskInstanceId)>,
    killed_order: VecDeque<(ControllerToken, TaskInstanceId)>,
}

impl WorkerHost {
    /// Subscribes to the master's wire under the given agent name.
    pub fn new(agent: impl Into<String>, master: Master) -> Self {
        let inbox = master.wire().subscribe();
        Self {
            agent: agent.into(),
            master,
            inbox,
            workers: HashMap::new(),
            killed: HashSet::new(),
            killed_order: VecDeque::new(),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Drains pending messages, then ticks every worker once.
    pub fn tick(&mut self) {
        loop {
            match self.inbox.try_recv() {
                Ok(msg) => self.handle(&msg),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(agent = %self.agent, skipped, "worker inbox lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        self.tick_workers();
    }

    /// Applies one protocol message.
    pub fn handle(&mut self, msg: &Message) {
        match msg {
            Message::StartTaskWorker {
                controller,
                task,
                agent,
                script,
                args,
            } => {
                if !agent.as_deref().is_none_or(|a| a == self.agent) {
                    return;
                }
                if self.killed.contains(&(*controller, *task)) {
                    debug!(agent = %self.agent, %controller, %task, "start for killed task ignored");
                    return;
                }
                self.start_worker(*controller, *task, script, args.clone());
            }
            Message::KillTaskWorkers { controller, task } => {
                self.kill(*controller, *task);
            }
            Message::TaskWorkerReport { .. } => {}
        }
    }

    /// Disposes every worker owned by `controller`; returns how many there were.
    ///
    /// `task` is remembered so a start for it that arrives late is refused.
    pub fn kill(&mut self, controller: ControllerToken, task: TaskInstanceId) -> usize {
        self.remember_killed(controller, task);
        let Some(workers) = self.workers.remove(&controller) else {
            debug!(agent = %self.agent, %controller, "kill for unknown controller ignored");
            return 0;
        };
        let count = workers.len();
        for mut w in workers {
            w.script.dispose();
        }
        self.master.bus().publish(
            Event::new(EventKind::WorkersKilled)
                .with_controller(controller)
                .with_agent(self.agent.as_str())
                .with_reason(format!("disposed {count} worker(s)")),
        );
        count
    }

    /// Number of live workers across all controllers.
    pub fn worker_count(&self) -> usize {
        self.workers.values().map(Vec::len).sum()
    }

    pub fn has_workers(&self, controller: ControllerToken) -> bool {
        self.workers.contains_key(&controller)
    }

    fn remember_killed(&mut self, controller: ControllerToken, task: TaskInstanceId) {
        if !self.killed.insert((controller, task)) {
            return;
        }
        self.killed_order.push_back((controller, task));
        if self.killed_order.len() > KILLED_MEMORY {
            if let Some(oldest) = self.killed_order.pop_front() {
                self.killed.remove(&oldest);
            }
        }
    }

    fn start_worker(
        &mut self,
        controller: ControllerToken,
        task: TaskInstanceId,
        name: &str,
        args: Option<String>,
    ) {
        let req = ScriptRequest::new(controller, task, ScriptRole::Worker, name)
            .with_args(args)
            .with_agent(self.agent.as_str());

        let mut script = match self.master.create_script(&req) {
            Ok(script) => script,
            Err(e) => return self.report_failure(controller, task, name, &e),
        };
        if let Err(e) = script.init() {
            script.dispose();
            return self.report_failure(controller, task, name, &e);
        }

        debug!(agent = %self.agent, %controller, script = name, "worker started");
        self.master.bus().publish(
            Event::new(EventKind::WorkerStarted)
                .with_task(name)
                .with_controller(controller)
                .with_agent(self.agent.as_str()),
        );
        self.workers.entry(controller).or_default().push(Worker {
            task,
            name: name.to_string(),
            script,
        });
    }

    fn tick_workers(&mut self) {
        let mut failed = Vec::new();

        for (controller, workers) in &mut self.workers {
            workers.retain_mut(|w| {
                let res = w.script.tick();
                if res.is_ok() && !w.script.shall_be_removed() {
                    return true;
                }
                w.script.dispose();
                match res {
                    Ok(()) => {
                        self.master.bus().publish(
                            Event::new(EventKind::WorkerStopped)
                                .with_task(w.name.as_str())
                                .with_controller(*controller)
                                .with_agent(self.agent.as_str()),
                        );
                    }
                    Err(e) => failed.push((*controller, w.task, w.name.clone(), e)),
                }
                false
            });
        }
        self.workers.retain(|_, workers| !workers.is_empty());

        for (controller, task, name, e) in failed {
            self.report_failure(controller, task, &name, &e);
        }
    }

    fn report_failure(
        &self,
        controller: ControllerToken,
        task: TaskInstanceId,
        name: &str,
        e: &ScriptError,
    ) {
        warn!(agent = %self.agent, %controller, script = name, error = %e, "worker failed");
        self.master.wire().send(Message::TaskWorkerReport {
            controller,
            task,
            agent: self.agent.clone(),
            report: WorkerReport::failed(e.to_string()),
        });
        self.master.bus().publish(
            Event::new(EventKind::WorkerFailed)
                .with_task(name)
                .with_controller(controller)
                .with_agent(self.agent.as_str())
                .with_reason(e.as_label()),
        );
    }
}

impl Drop for WorkerHost {
    fn drop(&mut self) {
        for (_, workers) in self.workers.drain() {
            for mut w in workers {
                w.script.dispose();
            }
        }
    }
}
