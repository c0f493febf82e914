use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled job as persisted in the replicated store.
///
/// The leader mutates the authoritative copy; followers read through
/// the store. `tags` is the targeting expression: each value may carry
/// a trailing `:N` cardinality suffix limiting how many matching
/// members run the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    /// Shell command executed on the targeted members
    pub command: String,
    /// Interval schedule, e.g. "30s", "5m", "1h". Empty for child jobs.
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Non-empty marks this as a child job: it fires on its parent's
    /// completion and has no schedule of its own.
    #[serde(default)]
    pub parent_job: String,
    /// Next fire time, recomputed from the scheduler before dispatch
    #[serde(default)]
    pub next: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disabled: bool,
}

impl Job {
    pub fn new(name: impl Into<String>, command: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            schedule: schedule.into(),
            tags: HashMap::new(),
            parent_job: String::new(),
            next: None,
            disabled: false,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_job = parent.into();
        self
    }

    /// Child jobs inherit firing from their parent and skip next-fire
    /// recomputation.
    pub fn is_child(&self) -> bool {
        !self.parent_job.is_empty()
    }
}

/// One scheduled run of a job.
///
/// Created when the job fires, mutated by the dispatcher (attempt,
/// node pinning) and by the runner (timestamps, output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub job_name: String,
    /// Dispatch attempt counter, starts at 1
    pub attempt: u32,
    /// Member that ran this execution; set on the receiving node
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub output: String,
}

impl Execution {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            attempt: 1,
            node_name: String::new(),
            started_at: None,
            finished_at: None,
            success: false,
            output: String::new(),
        }
    }

}
