pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::scheduler::{Execution, Job};

pub use memory::MemStore;

/// Persistent view of jobs and their execution history.
///
/// `set_job` is durable by contract: in a clustered deployment it is
/// replicated through consensus before returning, so a member that
/// observes a broadcast can already read the refreshed job.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_job(&self, name: &str) -> Result<Job>;

    async fn set_job(&self, job: &Job) -> Result<()>;

    async fn delete_job(&self, name: &str) -> Result<Job>;

    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Insert or update an execution record, keyed by its id
    async fn set_execution(&self, execution: &Execution) -> Result<()>;

    /// Execution history for a job, oldest first
    async fn executions(&self, job_name: &str) -> Result<Vec<Execution>>;
}
