use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::cluster::{ClusterView, QueryHandle, QueryParams};
use crate::dispatch::payload::{RunQueryParam, QUERY_RUN_JOB};
use crate::dispatch::targets::select_targets;
use crate::error::{CronmeshError, Result};
use crate::scheduler::{Execution, Job, Scheduler};
use crate::store::JobStore;

/// Upper bound on re-broadcasts to members that have not acked
const MAX_QUERY_RETRIES: u32 = 10;

/// Drives the run-query protocol: refresh the job's next fire time,
/// resolve targets, broadcast, and re-broadcast to the unacked residual
/// until everyone acked or the retry bound is hit.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    scheduler: Arc<Scheduler>,
    view: Arc<dyn ClusterView>,
    rpc_addr: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        scheduler: Arc<Scheduler>,
        view: Arc<dyn ClusterView>,
        rpc_addr: String,
    ) -> Self {
        Self {
            store,
            scheduler,
            view,
            rpc_addr,
        }
    }

    /// Ask the matching cluster members to run one execution of a job.
    ///
    /// On the first attempt the target set is resolved from the job's
    /// tag expression; retries of a specific execution go only to the
    /// node already pinned in it. Returns the job with its refreshed
    /// next fire time.
    ///
    /// Under-delivery after the retry bound is not an error: the
    /// residual is logged and the job is returned, and the gap shows up
    /// as missing execution reports.
    pub async fn run_query(&self, job_name: &str, execution: &Execution) -> Result<Job> {
        let start = Instant::now();

        let mut job = self
            .store
            .get_job(job_name)
            .await
            .map_err(|e| CronmeshError::StoreRead(job_name.to_string(), e.to_string()))?;

        // Child jobs fire on their parent's completion and keep no
        // schedule of their own, so `next` is only recomputed here for
        // top-level jobs. The write must land before any broadcast.
        if !job.is_child() {
            match self.scheduler.get_entry(job_name).await {
                Some(entry) => {
                    job.next = Some(entry.next);
                    self.store
                        .set_job(&job)
                        .await
                        .map_err(|e| CronmeshError::StoreWrite(job_name.to_string(), e.to_string()))?;
                }
                None => return Err(CronmeshError::SchedulerMissing(job_name.to_string())),
            }
        }

        // First attempt resolves targets from tags; a retry of this
        // execution is pinned to the node that already took it.
        let mut residual: HashSet<String> = if execution.attempt <= 1 {
            let resolved = select_targets(&job, &self.view.members(), &mut rand::thread_rng())?;
            tracing::debug!(job = %job.name, tags = ?resolved.tags, "Resolved tag filters");
            resolved.nodes
        } else {
            HashSet::from([execution.node_name.clone()])
        };

        let payload = RunQueryParam::new(execution.clone(), self.rpc_addr.clone()).encode()?;

        let mut retry = 0;
        loop {
            let filter_nodes: Vec<String> = residual.iter().cloned().collect();
            tracing::debug!(nodes = ?filter_nodes, "Filtered nodes to run");
            tracing::info!(query = QUERY_RUN_JOB, job = %job.name, "Sending query");

            let handle = self
                .view
                .query(
                    QUERY_RUN_JOB,
                    payload.clone(),
                    QueryParams {
                        filter_nodes,
                        request_ack: true,
                    },
                )
                .await?;

            self.collect_acks(handle, &mut residual).await;

            tracing::debug!(
                query = QUERY_RUN_JOB,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Done receiving acks and responses"
            );

            if residual.is_empty() {
                return Ok(job);
            }
            if retry < MAX_QUERY_RETRIES {
                retry += 1;
                continue;
            }

            tracing::error!(
                job = %job.name,
                nodes = ?residual,
                "Failed to run job on some nodes after {} retries, giving up",
                MAX_QUERY_RETRIES
            );
            return Ok(job);
        }
    }

    /// Consume the ack and response streams of one broadcast until the
    /// transport signals it finished. Each ack removes its sender from
    /// the residual; responses are informational. If the transport
    /// drops both streams early the attempt completes with whatever
    /// acks were collected.
    async fn collect_acks(&self, handle: QueryHandle, residual: &mut HashSet<String>) {
        let QueryHandle {
            mut acks,
            mut responses,
            done,
        } = handle;

        let mut acks_open = true;
        let mut responses_open = true;
        while acks_open || responses_open {
            tokio::select! {
                _ = done.cancelled() => break,
                ack = acks.recv(), if acks_open => match ack {
                    Some(from) => {
                        tracing::debug!(query = QUERY_RUN_JOB, from = %from, "Received ack");
                        residual.remove(&from);
                    }
                    None => acks_open = false,
                },
                resp = responses.recv(), if responses_open => match resp {
                    Some(resp) => {
                        tracing::debug!(
                            query = QUERY_RUN_JOB,
                            from = %resp.from,
                            response = %String::from_utf8_lossy(&resp.payload),
                            "Received response"
                        );
                    }
                    None => responses_open = false,
                },
            }
        }

        // Acks can still be buffered when the finished signal wins the
        // race; they count for this attempt.
        while let Ok(from) = acks.try_recv() {
            residual.remove(&from);
        }
    }
}
