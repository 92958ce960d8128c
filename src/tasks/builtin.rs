//! Built-in scripts.
//!
//! - `gather` (controller): starts `report` on every agent listed in its
//!   arguments and completes once each of them has reported success. Fails on
//!   the first failed report, or when `timeout_ms` (local variable, default
//!   10 000) runs out first.
//! - `report` (worker): reports success to its controller.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ScriptError;
use crate::protocol::{WorkerOutcome, WorkerReport};
use crate::tasks::{RoutineFn, ScriptContext, ScriptRegistry};

const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn register(reg: &mut ScriptRegistry) {
    reg.register_routine("gather", RoutineFn::arc("gather", gather));
    reg.register_routine("report", RoutineFn::arc("report", report));
}

/// Agent names from a comma- or whitespace-separated list, deduplicated.
fn parse_agents(args: Option<&str>) -> BTreeSet<String> {
    args.unwrap_or_default()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn gather(ctx: ScriptContext) -> Result<(), ScriptError> {
    let mut pending = parse_agents(ctx.args());
    let total = pending.len();
    if total == 0 {
        ctx.set_status("No agents");
        return Ok(());
    }

    let timeout = ctx
        .var("timeout_ms")
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(DEFAULT_GATHER_TIMEOUT, Duration::from_millis);

    for agent in &pending {
        ctx.start_worker(Some(agent), "report", None);
    }

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    while !pending.is_empty() {
        ctx.set_status(format!("Waiting for {}/{} agents", pending.len(), total));
        let reply = tokio::select! {
            _ = &mut deadline => {
                let missing: Vec<&str> = pending.iter().map(String::as_str).collect();
                return Err(ScriptError::fail(format!("timed out waiting for {}", missing.join(", "))));
            }
            reply = ctx.next_report() => reply.ok_or(ScriptError::Canceled)?,
        };

        match reply.report.outcome {
            WorkerOutcome::Running => {}
            WorkerOutcome::Succeeded => {
                pending.remove(&reply.agent);
            }
            WorkerOutcome::Failed { reason } => {
                return Err(ScriptError::fail(format!("agent {}: {reason}", reply.agent)));
            }
        }
    }

    ctx.set_status(format!("Done ({total} agents)"));
    Ok(())
}

async fn report(ctx: ScriptContext) -> Result<(), ScriptError> {
    let agent = ctx.agent().unwrap_or("master").to_string();
    ctx.set_status("Reporting");
    ctx.report(WorkerReport::succeeded(format!("{agent} ok")));
    ctx.set_status("Done");
    Ok(())
}
