use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CronmeshError, Result};
use crate::scheduler::{Execution, Job};
use crate::store::JobStore;

const MAX_EXECUTIONS_PER_JOB: usize = 100;

/// In-memory store used in dev mode and tests. Jobs are keyed by name,
/// executions by job name in insertion order.
#[derive(Debug, Default)]
pub struct MemStore {
    jobs: RwLock<HashMap<String, Job>>,
    executions: RwLock<HashMap<String, Vec<Execution>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemStore {
    async fn get_job(&self, name: &str) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CronmeshError::JobNotFound(name.to_string()))
    }

    async fn set_job(&self, job: &Job) -> Result<()> {
        self.jobs
            .write()
            .await
            .insert(job.name.clone(), job.clone());
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<Job> {
        self.executions.write().await.remove(name);
        self.jobs
            .write()
            .await
            .remove(name)
            .ok_or_else(|| CronmeshError::JobNotFound(name.to_string()))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn set_execution(&self, execution: &Execution) -> Result<()> {
        let mut all = self.executions.write().await;
        let history = all.entry(execution.job_name.clone()).or_default();

        if let Some(existing) = history.iter_mut().find(|e| e.id == execution.id) {
            *existing = execution.clone();
        } else {
            history.push(execution.clone());
            if history.len() > MAX_EXECUTIONS_PER_JOB {
                history.remove(0);
            }
        }
        Ok(())
    }

    async fn executions(&self, job_name: &str) -> Result<Vec<Execution>> {
        Ok(self
            .executions
            .read()
            .await
            .get(job_name)
            .cloned()
            .unwrap_or_default())
    }
}
