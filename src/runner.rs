use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cluster::InboundQuery;
use crate::dispatch::{RunQueryParam, QUERY_RUN_JOB};
use crate::scheduler::Execution;
use crate::store::JobStore;

/// Consumes inbound `run:job` queries on a member and executes them.
///
/// The transport acked delivery before the query lands here; what the
/// runner sends back on the response stream is informational. Finished
/// executions are recorded in the store, which is how empty-target
/// dispatches and residual misses become observable.
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    node_name: String,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, node_name: impl Into<String>) -> Self {
        Self {
            store,
            node_name: node_name.into(),
        }
    }

    /// Drain the inbound mailbox until shutdown or the mesh closes it
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundQuery>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                query = inbound.recv() => match query {
                    Some(query) => self.handle(query).await,
                    None => break,
                },
            }
        }
    }

    async fn handle(&self, query: InboundQuery) {
        if query.name != QUERY_RUN_JOB {
            tracing::warn!(query = %query.name, from = %query.from, "Ignoring unknown query");
            return;
        }

        let param = match RunQueryParam::decode(&query.payload) {
            Ok(param) => param,
            Err(e) => {
                tracing::warn!(from = %query.from, error = %e, "Dropping malformed run query");
                return;
            }
        };

        let mut execution = param.execution;
        execution.node_name = self.node_name.clone();
        execution.started_at = Some(Utc::now());
        if let Err(e) = self.store.set_execution(&execution).await {
            tracing::warn!(job = %execution.job_name, error = %e, "Failed to record execution start");
        }

        let command = match self.store.get_job(&execution.job_name).await {
            Ok(job) => job.command,
            Err(e) => {
                tracing::error!(job = %execution.job_name, error = %e, "Job vanished before execution");
                return;
            }
        };

        tracing::info!(
            job = %execution.job_name,
            attempt = execution.attempt,
            command = %command,
            "Executing job"
        );
        let execution = self.execute(execution, &command).await;

        if let Err(e) = self.store.set_execution(&execution).await {
            tracing::warn!(job = %execution.job_name, error = %e, "Failed to record execution result");
        }

        // The full execution rides back on the response stream; the
        // execution-done report to `param.rpc_addr` is the RPC layer's
        // return path and carries the same record.
        match serde_json::to_vec(&execution) {
            Ok(bytes) => query.respond(bytes).await,
            Err(e) => tracing::warn!(job = %execution.job_name, error = %e, "Failed to serialize execution"),
        }
    }

    /// Run the job command through the shell, capturing output and
    /// exit status into the execution record.
    async fn execute(&self, mut execution: Execution, command: &str) -> Execution {
        let result = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        execution.finished_at = Some(Utc::now());
        match result {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                execution.success = output.status.success();
                execution.output = if execution.success || stderr.is_empty() {
                    stdout.to_string()
                } else {
                    stderr.to_string()
                };

                tracing::info!(
                    job = %execution.job_name,
                    success = execution.success,
                    exit_code = ?output.status.code(),
                    "Job finished"
                );
            }
            Err(e) => {
                tracing::error!(job = %execution.job_name, error = %e, "Job execution failed");
                execution.success = false;
                execution.output = e.to_string();
            }
        }
        execution
    }
}
