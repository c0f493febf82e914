use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterView, InboundQuery};
use crate::config::AgentConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::runner::JobRunner;
use crate::scheduler::{parse_interval, Execution, Job, Scheduler};
use crate::store::JobStore;

/// One cluster member: owns the scheduler, dispatcher and runner, and
/// wires them to the store and the membership view.
pub struct Agent {
    pub config: AgentConfig,
    store: Arc<dyn JobStore>,
    scheduler: Arc<Scheduler>,
    view: Arc<dyn ClusterView>,
    dispatcher: Arc<Dispatcher>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        store: Arc<dyn JobStore>,
        view: Arc<dyn ClusterView>,
    ) -> Arc<Self> {
        let scheduler = Arc::new(Scheduler::new());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            scheduler.clone(),
            view.clone(),
            config.rpc_addr(),
        ));

        Arc::new(Self {
            config,
            store,
            scheduler,
            view,
            dispatcher,
        })
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    pub fn view(&self) -> Arc<dyn ClusterView> {
        self.view.clone()
    }

    /// Whether this member currently hosts the scheduler-of-record
    pub fn is_leader(&self) -> bool {
        self.view.leader().as_deref() == Some(self.config.node_name.as_str())
    }

    /// Persist a job and register it with the scheduler. The schedule
    /// is validated before anything is written.
    pub async fn set_job(&self, job: Job) -> Result<()> {
        if !job.is_child() {
            parse_interval(&job.schedule)?;
        }
        self.store.set_job(&job).await?;

        if job.is_child() || job.disabled {
            self.scheduler.remove(&job.name).await;
        } else {
            self.scheduler.schedule(&job).await?;
        }
        tracing::info!(job = %job.name, schedule = %job.schedule, "Job set");
        Ok(())
    }

    pub async fn delete_job(&self, name: &str) -> Result<Job> {
        self.scheduler.remove(name).await;
        self.store.delete_job(name).await
    }

    /// Dispatch a fresh execution of a job right now, outside its
    /// schedule. Used by the HTTP trigger and by tests.
    pub async fn run_job(&self, name: &str) -> Result<Job> {
        let execution = Execution::new(name);
        self.dispatcher.run_query(name, &execution).await
    }

    /// Token cancelled on SIGTERM or SIGINT. The trigger loop and the
    /// runner watch it, so a dispatch in flight drains its acks
    /// instead of dying mid-broadcast.
    pub fn shutdown_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let shutdown = token.clone();
        let node = self.config.node_name.clone();

        tokio::spawn(async move {
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => tracing::info!(node = %node, "Received SIGTERM, draining"),
                _ = sigint.recv() => tracing::info!(node = %node, "Received SIGINT, draining"),
            }
            shutdown.cancel();
        });

        token
    }

    /// Run the member until shutdown: the runner drains the inbound
    /// query mailbox while the trigger loop fires due jobs (leader
    /// only).
    pub async fn run(
        self: Arc<Self>,
        inbound: mpsc::Receiver<InboundQuery>,
        shutdown: CancellationToken,
    ) {
        let runner = JobRunner::new(self.store.clone(), self.config.node_name.clone());
        let runner_shutdown = shutdown.clone();
        tokio::spawn(async move {
            runner.run(inbound, runner_shutdown).await;
        });

        self.trigger_loop(shutdown).await;
    }

    /// Fire due scheduler entries. Every member runs this loop; only
    /// the leader dispatches. Each dispatch runs as its own task so a
    /// slow residual retry on one job never delays another.
    async fn trigger_loop(&self, shutdown: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.trigger_interval_ms));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            if !self.is_leader() {
                continue;
            }

            for entry in self.scheduler.advance_due(Utc::now()).await {
                let execution = Execution::new(&entry.job_name);
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    match dispatcher.run_query(&execution.job_name, &execution).await {
                        Ok(job) => {
                            tracing::debug!(job = %job.name, next = ?job.next, "Dispatch complete");
                        }
                        Err(e) => {
                            tracing::error!(job = %execution.job_name, error = %e, "Dispatch failed");
                        }
                    }
                });
            }
        }
        tracing::info!(node = %self.config.node_name, "Agent stopped");
    }
}
